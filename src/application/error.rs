//! Application-level errors (wraps domain errors)

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{DomainError, PartnerId};

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("invalid purchase by partner {buyer}: amount {amount} must be positive")]
    InvalidPurchase { buyer: PartnerId, amount: Decimal },

    #[error("invalid scenario {path}: {message}")]
    Scenario { path: PathBuf, message: String },

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
