use crate::db_types::{OfferStatus, Transaction};

/// Outcome of a compare-and-swap status update.
///
/// The update statement is conditioned on the row still holding the expected status, so a lost race shows up as
/// `Conflict` rather than a silent double-apply. The conflicting row is returned so callers can report which
/// status was actually found.
#[derive(Debug, Clone)]
pub enum CasOutcome<T> {
    /// The row matched the expected status and the transition was applied.
    Applied(T),
    /// The row exists, but its status no longer matches the expectation.
    Conflict(T),
    /// No row with that id exists.
    NotFound,
}

/// Outcome of creating an escrow transaction against an offer.
///
/// The checks run inside the same storage transaction as the insert, so the result reflects the state the insert
/// actually saw, not a stale pre-read.
#[derive(Debug, Clone)]
pub enum InsertTransactionResult {
    Inserted(Transaction),
    /// The offer is not in `Accepted` status. Carries the status that was found.
    OfferNotAccepted(OfferStatus),
    /// Another non-terminal transaction already references this offer. Carries its id.
    DuplicateActive(i64),
}
