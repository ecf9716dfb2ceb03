//! Error types for the canonical model.

use crate::ids::IdError;
use crate::session::SessionStatus;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors raised by canonical model invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// A price violates the recurring/one-time field rules.
    #[error("invalid price {external_id}: {reason}")]
    InvalidPrice {
        /// External id of the offending price.
        external_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A subscription violates its structural invariants.
    #[error("invalid subscription {external_id}: {reason}")]
    InvalidSubscription {
        /// External id of the offending subscription.
        external_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A sync session was asked to move to a status it cannot reach.
    #[error("invalid session transition from {from} to {to}")]
    InvalidSessionTransition {
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// An entity type name that the engine does not know.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
