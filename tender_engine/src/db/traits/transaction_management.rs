use chrono::{DateTime, Utc};

use crate::{
    db::traits::{CasOutcome, InsertTransactionResult},
    db_types::{NewTransaction, Transaction, TransactionStats},
};

/// Backend contract for escrow transaction records.
///
/// This is the only path that ever mutates a transaction. Every operation here executes its read-check-write
/// sequence inside a single storage transaction, and every status change is a compare-and-swap, so at most one
/// terminal transition away from `Completed` can ever succeed for a given record.
#[allow(async_fn_in_trait)]
pub trait TransactionManagement: Clone {
    type Error: std::error::Error;

    /// Creates a `Pending` transaction against an accepted offer.
    ///
    /// In a single atomic transaction:
    /// * re-reads the offer and verifies it is `Accepted`,
    /// * verifies no other non-terminal transaction references the offer (a partial unique index backs this up
    ///   against races the read misses),
    /// * inserts the record with amount and currency copied from the offer.
    async fn create_transaction_for_offer(
        &self,
        txn: NewTransaction,
    ) -> Result<InsertTransactionResult, Self::Error>;

    /// Fetches a transaction by id. Returns `None` if the id does not resolve.
    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, Self::Error>;

    /// Fetches a transaction by the gateway's correlation id.
    async fn fetch_transaction_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Transaction>, Self::Error>;

    /// Records the gateway correlation id and moves `Pending → Processing`. A callback that already settled the
    /// record surfaces as [`CasOutcome::Conflict`] carrying the settled row.
    async fn mark_transaction_processing(
        &self,
        transaction_id: i64,
        gateway_ref: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error>;

    /// Moves a `Pending`/`Processing` transaction to `Completed` (the escrow-hold point), stamps `completed_at`,
    /// and moves the underlying need `Active → InProgress` in the same storage transaction.
    async fn complete_transaction(&self, transaction_id: i64) -> Result<CasOutcome<Transaction>, Self::Error>;

    /// Moves a `Pending`/`Processing` transaction to `Failed` and records the gateway's error message.
    async fn fail_transaction(
        &self,
        transaction_id: i64,
        error_message: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error>;

    /// Moves `Completed → Released`, stamps `released_at`, records the buyer's notes in metadata, and moves the
    /// underlying need to `Completed`, all in one storage transaction.
    async fn release_transaction(
        &self,
        transaction_id: i64,
        notes: Option<&str>,
    ) -> Result<CasOutcome<Transaction>, Self::Error>;

    /// Moves `Completed → Refunded`, stamps `refunded_at`, appends the refund reason to metadata, and moves the
    /// underlying need to `Cancelled`, all in one storage transaction.
    async fn refund_transaction(
        &self,
        transaction_id: i64,
        reason: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error>;

    /// Aggregates over all transactions where the user appears as buyer or provider. See
    /// [`TransactionStats`](crate::db_types::TransactionStats) for the exact semantics of each field.
    async fn fetch_user_transaction_stats(&self, user_id: i64) -> Result<TransactionStats, Self::Error>;

    /// Marks transactions that have sat in `Pending`/`Processing` since before `cutoff` as `Cancelled`. This is
    /// the reconciliation entry point for challenges the payer never completed. Returns the swept records.
    async fn sweep_stale_transactions(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
