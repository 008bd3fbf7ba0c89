//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults (the standard five-level plan)
//! 2. Global config: `$XDG_CONFIG_HOME/partnet/partnet.toml`
//! 3. Local config: file given with `--config`
//! 4. Environment variables: `PARTNET_*` prefix, `__` as separator

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::CommissionPlan;

/// Commission plan settings.
///
/// Rates are keyed by level as strings because TOML table keys are strings:
/// ```toml
/// [plan.rates]
/// 1 = "20"
/// 2 = "10"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlanSettings {
    pub max_levels: u8,
    pub rates: BTreeMap<String, Decimal>,
}

impl Default for PlanSettings {
    fn default() -> Self {
        let plan = CommissionPlan::default();
        Self {
            max_levels: plan.max_levels,
            rates: plan
                .rates
                .into_iter()
                .map(|(level, rate)| (level.to_string(), rate))
                .collect(),
        }
    }
}

/// Reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplaySettings {
    /// Currency code printed next to amounts
    pub currency: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            currency: "EUR".into(),
        }
    }
}

/// Raw plan settings for intermediate parsing (Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawPlanSettings {
    pub max_levels: Option<u8>,
    pub rates: Option<BTreeMap<String, Decimal>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawDisplaySettings {
    pub currency: Option<String>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub plan: RawPlanSettings,
    pub display: RawDisplaySettings,
}

/// Unified configuration for partnet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub plan: PlanSettings,
    pub display: DisplaySettings,
}

/// Get the XDG config directory for partnet.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "partnet").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("partnet.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

impl Settings {
    /// Overlay wins for every field it specifies; a rate table replaces the
    /// current one entirely.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            plan: PlanSettings {
                max_levels: overlay.plan.max_levels.unwrap_or(self.plan.max_levels),
                rates: overlay
                    .plan
                    .rates
                    .clone()
                    .unwrap_or_else(|| self.plan.rates.clone()),
            },
            display: DisplaySettings {
                currency: overlay
                    .display
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.display.currency.clone()),
            },
        }
    }

    /// Load settings from the global XDG location and an optional local file.
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), local)
    }

    /// Load settings with layered precedence from explicit locations.
    ///
    /// A missing global file is skipped; a missing local file is an error
    /// because it was asked for explicitly.
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("load: global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(global_path)?);
            }
        }

        // 3. Local config
        if let Some(local_path) = local {
            if !local_path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", local_path.display()),
                });
            }
            debug!("load: local config {}", local_path.display());
            current = current.merge_with(&load_raw_settings(local_path)?);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        Ok(current)
    }

    /// Apply PARTNET_* environment variables as explicit overrides.
    ///
    /// `PARTNET_PLAN__MAX_LEVELS`, `PARTNET_PLAN__RATES__<level>`,
    /// `PARTNET_DISPLAY__CURRENCY`. Individual rate variables replace single
    /// levels, not the whole table.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("PARTNET")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("plan.max_levels") {
            settings.plan.max_levels = val.parse().map_err(|e| ApplicationError::Config {
                message: format!("PARTNET_PLAN__MAX_LEVELS={}: {}", val, e),
            })?;
        }
        for level in 1..=settings.plan.max_levels {
            if let Ok(val) = config.get_string(&format!("plan.rates.{}", level)) {
                let rate = Decimal::from_str(&val).map_err(|e| ApplicationError::Config {
                    message: format!("PARTNET_PLAN__RATES__{}={}: {}", level, val, e),
                })?;
                settings.plan.rates.insert(level.to_string(), rate);
            }
        }
        if let Ok(val) = config.get_string("display.currency") {
            settings.display.currency = val;
        }

        Ok(settings)
    }

    /// Validated commission plan built from these settings.
    pub fn commission_plan(&self) -> Result<CommissionPlan, ApplicationError> {
        let mut rates = BTreeMap::new();
        for (key, rate) in &self.plan.rates {
            let level: u8 = key.trim().parse().map_err(|_| ApplicationError::Config {
                message: format!("rate key '{}' is not a level number", key),
            })?;
            rates.insert(level, *rate);
        }
        Ok(CommissionPlan::new(self.plan.max_levels, rates)?)
    }

    /// Default upline chain length for network queries.
    pub fn chain_levels(&self) -> usize {
        usize::from(self.plan.max_levels)
    }

    /// Serialize to TOML for `config show`.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }
}
