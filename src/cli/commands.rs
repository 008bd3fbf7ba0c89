//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{read_network, PurchaseOutcome};
use crate::application::Scenario;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::PartnerId;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Simulate { scenario, json }) => simulate(cli, scenario, *json),
        Some(Commands::Chain {
            scenario,
            partner,
            levels,
        }) => chain(cli, scenario, *partner, *levels),
        Some(Commands::Tree {
            scenario,
            partner,
            depth,
        }) => tree(cli, scenario, *partner, *depth),
        Some(Commands::Summary { scenario, partner }) => summary(cli, scenario, *partner),
        Some(Commands::Config { command }) => config(cli, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see `partnet --help`".into(),
        )),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    Ok(Settings::load(cli.config.as_deref())?)
}

/// Load settings and the scenario, and wire up a fresh set of services.
fn prepare(cli: &Cli, scenario_path: &Path) -> CliResult<(ServiceContainer, Scenario)> {
    if !scenario_path.exists() {
        return Err(InfraError::NotFound(scenario_path.to_path_buf()).into());
    }
    let container = ServiceContainer::new(load_settings(cli)?)?;
    let scenario = Scenario::load(container.fs.as_ref(), scenario_path)?;
    debug!(
        "prepare: {} partners, {} purchases",
        scenario.partners.len(),
        scenario.purchases.len()
    );
    Ok((container, scenario))
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        CliError::Infra(InfraError::Serialize {
            what: what.to_string(),
            message: e.to_string(),
        })
    })
}

#[instrument(skip(cli))]
fn simulate(cli: &Cli, scenario_path: &Path, json: bool) -> CliResult<()> {
    let (container, scenario) = prepare(cli, scenario_path)?;
    let outcomes = scenario.apply(&container.partners, &container.purchases)?;

    if json {
        output::info(&to_json("purchase outcomes", &outcomes)?);
        return Ok(());
    }

    let currency = &container.settings.display.currency;
    output::header("Purchases");
    for outcome in &outcomes {
        print_outcome(outcome, currency);
    }

    output::header("Partners");
    let network = read_network(&container.network)?;
    for id in network.get_all_partner_ids() {
        let earned = container.ledger.get_total_commissions(id, None, None, None);
        let state = if network.is_active(id) { "active" } else { "inactive" };
        output::detail(&format!(
            "{:<6} {:<8} earned {:>12}",
            id,
            state,
            output::money(earned, currency)
        ));
    }
    Ok(())
}

fn print_outcome(outcome: &PurchaseOutcome, currency: &str) {
    output::action(
        "purchase",
        &format!(
            "buyer {} spent {}",
            outcome.buyer,
            output::money(outcome.amount, currency)
        ),
    );
    if outcome.commissions.is_empty() {
        output::detail(&"no commissions issued");
    }
    for record in &outcome.commissions {
        output::detail(&output::commission_line(record, currency));
    }
    output::detail(&format!(
        "total paid: {}",
        output::money(outcome.total_paid(), currency)
    ));
}

#[instrument(skip(cli))]
fn chain(cli: &Cli, scenario_path: &Path, partner: PartnerId, levels: Option<usize>) -> CliResult<()> {
    let (container, scenario) = prepare(cli, scenario_path)?;
    scenario.build_network(&container.partners)?;

    let network = read_network(&container.network)?;
    if !network.contains(partner) {
        return Err(CliError::InvalidArgs(format!("unknown partner {}", partner)));
    }
    let levels = levels.unwrap_or_else(|| network.max_levels());
    let entries = network.get_upline_chain(partner, levels);
    if entries.is_empty() {
        output::warning(&format!("partner {} has no upline", partner));
    }
    for (i, entry) in entries.iter().enumerate() {
        output::info(&output::chain_line(i + 1, entry));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn tree(cli: &Cli, scenario_path: &Path, partner: PartnerId, depth: Option<usize>) -> CliResult<()> {
    let (container, scenario) = prepare(cli, scenario_path)?;
    scenario.build_network(&container.partners)?;

    let network = read_network(&container.network)?;
    if !network.contains(partner) {
        return Err(CliError::InvalidArgs(format!("unknown partner {}", partner)));
    }
    output::info(&network.get_network_tree(partner, depth).to_tree_string());
    output::detail(&format!(
        "size {}, depth {}",
        network.get_network_size(partner),
        network.get_network_depth(partner)
    ));
    Ok(())
}

#[instrument(skip(cli))]
fn summary(cli: &Cli, scenario_path: &Path, partner: PartnerId) -> CliResult<()> {
    let (container, scenario) = prepare(cli, scenario_path)?;
    scenario.apply(&container.partners, &container.purchases)?;

    let summary = container.ledger.get_commission_summary(partner, None, None);
    output::info(&to_json("commission summary", &summary)?);
    Ok(())
}

fn config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            // Reject an invalid plan before printing it
            settings.commission_plan()?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => match global_config_path() {
            Some(path) => {
                if !path.exists() {
                    output::warning(&format!("{} does not exist", path.display()));
                }
                output::info(&path.display());
            }
            None => output::warning(&"no config directory on this platform"),
        },
    }
    Ok(())
}
