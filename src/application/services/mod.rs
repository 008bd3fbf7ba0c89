//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (Clock, FileSystem)
//! but are themselves concrete structs, not traits.

mod ledger;
mod partner;
mod purchase;

pub use ledger::{CommissionLedger, CommissionSummary, LevelSummary};
pub use partner::{
    shared_network, ContactDetails, Partner, PartnerManager, PartnerSummary, SharedNetwork,
};
pub(crate) use partner::read_network;
pub use purchase::{PurchaseOutcome, PurchaseService};
