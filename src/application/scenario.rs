//! Scenario files: a partner network plus a list of purchases, in TOML.
//!
//! ```toml
//! [[partners]]
//! id = 1
//! name = "Anna Berg"
//!
//! [[partners]]
//! id = 2
//! upline = 1
//! status = "inactive"
//!
//! [[purchases]]
//! buyer = 2
//! amount = "1000.00"
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::services::{ContactDetails, PartnerManager, PurchaseOutcome, PurchaseService};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{PartnerId, PartnerStatus};
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioPartner {
    pub id: PartnerId,
    #[serde(default)]
    pub upline: Option<PartnerId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: PartnerStatus,
}

impl ScenarioPartner {
    fn contact(&self) -> ContactDetails {
        let (first_name, last_name) = match self.name.as_deref().map(str::trim) {
            Some(name) => match name.split_once(' ') {
                Some((first, last)) => (first.to_string(), last.trim().to_string()),
                None => (name.to_string(), String::new()),
            },
            None => (format!("Partner {}", self.id), String::new()),
        };
        ContactDetails {
            first_name,
            last_name,
            email: self.email.clone().unwrap_or_default(),
            phone: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioPurchase {
    pub buyer: PartnerId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub partners: Vec<ScenarioPartner>,
    #[serde(default)]
    pub purchases: Vec<ScenarioPurchase>,
}

impl Scenario {
    /// Parse scenario content; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> ApplicationResult<Self> {
        toml::from_str(content).map_err(|e| ApplicationError::Scenario {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(fs: &dyn FileSystem, path: &Path) -> ApplicationResult<Self> {
        debug!("load scenario: {}", path.display());
        if !fs.exists(path) {
            return Err(ApplicationError::Scenario {
                path: path.to_path_buf(),
                message: "file not found".into(),
            });
        }
        let content = fs.read_to_string(path).with_path_context("read scenario", path)?;
        Self::parse(&content, path)
    }

    /// Build the network, then apply statuses in file order.
    ///
    /// Statuses are applied after all registrations so that compression sees
    /// the complete structure.
    pub fn build_network(&self, partners: &PartnerManager) -> ApplicationResult<()> {
        for p in &self.partners {
            partners.register_partner(p.id, p.contact(), p.upline)?;
        }
        for p in self.partners.iter().filter(|p| p.status != PartnerStatus::Active) {
            partners.update_status(p.id, p.status);
        }
        info!("scenario network built: {} partners", self.partners.len());
        Ok(())
    }

    /// Build the network and process every purchase in order.
    pub fn apply(
        &self,
        partners: &PartnerManager,
        purchases: &PurchaseService,
    ) -> ApplicationResult<Vec<PurchaseOutcome>> {
        self.build_network(partners)?;
        self.purchases
            .iter()
            .map(|p| purchases.process_purchase(p.buyer, p.amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_status_to_active() {
        let content = r#"
[[partners]]
id = 1

[[partners]]
id = 2
upline = 1
name = "Anna Berg"
status = "suspended"

[[purchases]]
buyer = 2
amount = "12.50"
"#;
        let scenario = Scenario::parse(content, Path::new("s.toml")).unwrap();
        assert_eq!(scenario.partners[0].status, PartnerStatus::Active);
        assert_eq!(scenario.partners[1].status, PartnerStatus::Suspended);
        assert_eq!(scenario.partners[1].contact().last_name, "Berg");
        assert_eq!(scenario.purchases[0].amount, Decimal::new(1250, 2));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Scenario::parse("[[partners]]\nid = \"x\"", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().starts_with("invalid scenario bad.toml"));
    }
}
