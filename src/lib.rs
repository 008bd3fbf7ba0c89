//! partnet: referral network engine
//!
//! Layers:
//! - `domain`: partner forest, structural compression, commission calculation
//! - `application`: ledger, partner profiles, purchase orchestration, scenarios
//! - `infrastructure`: clock/filesystem boundaries and service wiring
//! - `config`: layered settings
//! - `cli`: command line front end

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
