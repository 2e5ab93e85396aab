use std::fmt::Display;

use thiserror::Error;

use crate::db_types::{OfferStatus, TransactionStatus};

/// The error taxonomy of the engine.
///
/// * `Validation`: malformed input or a precondition that does not hold (offer not accepted, price not
///   positive, self-offer).
/// * `Unauthorized`: the caller lacks the required relationship to the entity.
/// * `NotFound`: an entity id does not resolve.
/// * `Conflict`: the request is well-formed but the current state forbids the transition. This is the guard
///   against double-accept and double-release; retried financial operations land here with a message stating
///   which status was expected and which was found.
/// * `Gateway`: the payment gateway declined, errored, or timed out. Always recorded on the transaction before
///   being raised.
/// * `Database`: the storage backend failed.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment gateway failure: {0}")]
    Gateway(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl EngineError {
    pub fn db<E: Display>(e: E) -> Self {
        Self::Database(e.to_string())
    }

    /// A financial operation was attempted against a transaction in the wrong state. These are the calls a
    /// confused client is most likely to retry, so the message spells out expected versus found.
    pub fn wrong_transaction_status(expected: TransactionStatus, found: TransactionStatus) -> Self {
        Self::Conflict(format!("transaction status is {found}, but {expected} is required"))
    }

    pub fn wrong_offer_status(expected: OfferStatus, found: OfferStatus) -> Self {
        Self::Conflict(format!("offer status is {found}, but {expected} is required"))
    }
}
