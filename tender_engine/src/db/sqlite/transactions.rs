use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{Row, SqliteConnection};
use tender_common::Money;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewTransaction, Transaction, TransactionStats},
};

const TXN_COLUMNS: &str = "id, offer_id, buyer_id, provider_id, amount, currency, status, gateway_ref, \
                           error_message, metadata, created_at, updated_at, completed_at, released_at, refunded_at";

/// Inserts a new `Pending` transaction. The caller is responsible for running this inside the same storage
/// transaction as the offer-status and active-transaction checks; the partial unique index on
/// `transactions(offer_id)` over non-terminal statuses is the last line of defence against a double insert.
pub async fn insert_transaction(
    txn: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO transactions (offer_id, buyer_id, provider_id, amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id;
        "#,
    )
    .bind(txn.offer_id)
    .bind(txn.buyer_id)
    .bind(txn.provider_id)
    .bind(txn.amount)
    .bind(&txn.currency)
    .fetch_one(&mut *conn)
    .await?;
    trace!("🗃️ Transaction #{id} created for offer #{}", txn.offer_id);
    fetch_transaction(id, conn).await?.ok_or(SqliteDatabaseError::TransactionNotFound(id))
}

/// Fetches the transaction with the given id, or `None` if it does not exist.
pub async fn fetch_transaction(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let txn = sqlx::query_as::<_, Transaction>(&format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = $1"))
        .bind(transaction_id)
        .fetch_one(&mut *conn)
        .await;
    match txn {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(t) => Ok(Some(t)),
    }
}

/// Fetches the transaction carrying the given gateway correlation id.
pub async fn fetch_transaction_by_gateway_ref(
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let txn =
        sqlx::query_as::<_, Transaction>(&format!("SELECT {TXN_COLUMNS} FROM transactions WHERE gateway_ref = $1"))
            .bind(gateway_ref)
            .fetch_one(&mut *conn)
            .await;
    match txn {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(t) => Ok(Some(t)),
    }
}

/// The non-terminal (`Pending`/`Processing`/`Completed`) transaction referencing the given offer, if any.
pub async fn fetch_active_transaction_for_offer(
    offer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SqliteDatabaseError> {
    let txn = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions \
         WHERE offer_id = $1 AND status IN ('Pending','Processing','Completed')"
    ))
    .bind(offer_id)
    .fetch_one(&mut *conn)
    .await;
    match txn {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(t) => Ok(Some(t)),
    }
}

/// `Pending → Processing`, recording the gateway correlation id. Returns rows changed (0 or 1).
pub(crate) async fn mark_processing(
    transaction_id: i64,
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Processing', gateway_ref = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 AND status = 'Pending'",
    )
    .bind(gateway_ref)
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// `Pending/Processing → Completed`, stamping the escrow-hold time. Returns rows changed (0 or 1).
pub(crate) async fn complete(transaction_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Completed', completed_at = CURRENT_TIMESTAMP, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status IN ('Pending','Processing')",
    )
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// `Pending/Processing → Failed`, recording what the gateway reported. Returns rows changed (0 or 1).
pub(crate) async fn fail(
    transaction_id: i64,
    error_message: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Failed', error_message = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 AND status IN ('Pending','Processing')",
    )
    .bind(error_message)
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// `Pending/Processing → Cancelled`. Used by the reconciliation sweep for abandoned challenges.
pub(crate) async fn cancel(
    transaction_id: i64,
    message: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Cancelled', error_message = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 AND status IN ('Pending','Processing')",
    )
    .bind(message)
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// `Completed → Released`, stamping the release time and replacing the metadata column. Returns rows changed.
pub(crate) async fn release(
    transaction_id: i64,
    metadata: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Released', released_at = CURRENT_TIMESTAMP, \
         updated_at = CURRENT_TIMESTAMP, metadata = COALESCE($1, metadata) \
         WHERE id = $2 AND status = 'Completed'",
    )
    .bind(metadata)
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// `Completed → Refunded`, stamping the refund time and replacing the metadata column. Returns rows changed.
pub(crate) async fn refund(
    transaction_id: i64,
    metadata: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE transactions SET status = 'Refunded', refunded_at = CURRENT_TIMESTAMP, \
         updated_at = CURRENT_TIMESTAMP, metadata = $1 \
         WHERE id = $2 AND status = 'Completed'",
    )
    .bind(metadata)
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// Transactions that have sat in `Pending`/`Processing` since before `cutoff`, oldest first.
pub async fn fetch_stale_transactions(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, SqliteDatabaseError> {
    let txns = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions \
         WHERE status IN ('Pending','Processing') AND datetime(updated_at) < datetime($1) \
         ORDER BY updated_at ASC"
    ))
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(txns)
}

/// Aggregates for a user over both roles. Counts span every transaction the user appears on; the monetary sums
/// are role-scoped and only ever count released funds.
pub async fn fetch_stats_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<TransactionStats, SqliteDatabaseError> {
    let row = sqlx::query(
        r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'Released' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'Pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN status = 'Refunded' THEN 1 ELSE 0 END), 0) AS refunded,
                COALESCE(SUM(CASE WHEN buyer_id = $1 AND status = 'Released' THEN amount ELSE 0 END), 0) AS spent,
                COALESCE(SUM(CASE WHEN provider_id = $1 AND status = 'Released' THEN amount ELSE 0 END), 0) AS earned
            FROM transactions
            WHERE buyer_id = $1 OR provider_id = $1;
        "#,
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(TransactionStats {
        total_transactions: row.get::<i64, _>("total"),
        completed_transactions: row.get::<i64, _>("completed"),
        pending_transactions: row.get::<i64, _>("pending"),
        refunded_transactions: row.get::<i64, _>("refunded"),
        total_spent: Money::from(row.get::<i64, _>("spent")),
        total_earned: Money::from(row.get::<i64, _>("earned")),
    })
}
