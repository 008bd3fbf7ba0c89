//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::{CommissionStatus, PartnerId};

/// Domain errors represent business rule violations inside the network
/// and commission engines. Public operations that report plain `bool`
/// outcomes log these as warnings instead of returning them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("partner not found: {0}")]
    PartnerNotFound(PartnerId),

    #[error("partner already in network: {0}")]
    DuplicatePartner(PartnerId),

    #[error("partner {partner_id} cannot sit below {upline_id}: it would become its own upline")]
    InvalidUpline {
        partner_id: PartnerId,
        upline_id: PartnerId,
    },

    #[error("partner {partner_id} already has upline {current}, cannot move under {requested}")]
    UplineConflict {
        partner_id: PartnerId,
        current: PartnerId,
        requested: PartnerId,
    },

    #[error("commission not found: {0}")]
    CommissionNotFound(u64),

    #[error("invalid commission transition: {from} -> {to}")]
    InvalidTransition {
        from: CommissionStatus,
        to: CommissionStatus,
    },

    #[error("invalid commission plan: {message}")]
    InvalidPlan { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
