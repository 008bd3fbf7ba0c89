//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod commission;
pub mod entities;
pub mod error;
pub mod network;

pub use arena::{NetworkNode, PartnerArena};
pub use commission::{
    round_for_display, CommissionCalculator, CommissionPlan, PurchaseEvent, MAX_LEVELS,
};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use network::{NetworkManager, NetworkTree};
