use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Need, NeedStatus, NewNeed},
};

const NEED_COLUMNS: &str = "id, buyer_id, category, budget_min, budget_max, currency, status, \
                            created_at, updated_at, expires_at";

/// Inserts a new need into the database using the given connection. This is not atomic on its own. You can embed
/// this call inside a transaction if you need atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_need(need: NewNeed, conn: &mut SqliteConnection) -> Result<Need, SqliteDatabaseError> {
    let row = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO needs (buyer_id, category, budget_min, budget_max, currency, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id;
        "#,
    )
    .bind(need.buyer_id)
    .bind(&need.category)
    .bind(need.budget_min)
    .bind(need.budget_max)
    .bind(&need.currency)
    .bind(need.expires_at)
    .fetch_one(&mut *conn)
    .await?;
    trace!("🗃️ Need #{row} saved for buyer {}", need.buyer_id);
    fetch_need(row, conn).await?.ok_or(SqliteDatabaseError::NeedNotFound(row))
}

/// Fetches the need with the given id, or `None` if it does not exist.
pub async fn fetch_need(need_id: i64, conn: &mut SqliteConnection) -> Result<Option<Need>, SqliteDatabaseError> {
    let need = sqlx::query_as::<_, Need>(&format!("SELECT {NEED_COLUMNS} FROM needs WHERE id = $1"))
        .bind(need_id)
        .fetch_one(&mut *conn)
        .await;
    match need {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(n) => Ok(Some(n)),
    }
}

/// Needs that are still open for offers but whose expiry date has passed, oldest first.
pub async fn fetch_overdue_needs(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Need>, SqliteDatabaseError> {
    let needs = sqlx::query_as::<_, Need>(&format!(
        "SELECT {NEED_COLUMNS} FROM needs \
         WHERE status = 'Active' AND expires_at IS NOT NULL AND datetime(expires_at) < datetime($1) \
         ORDER BY expires_at ASC"
    ))
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(needs)
}

/// Compare-and-swap status update for the need that owns the given offer. Used when settling an escrow
/// transaction moves its need along, inside the same storage transaction as the settlement itself.
pub(crate) async fn update_need_status_for_offer(
    offer_id: i64,
    from: &[NeedStatus],
    to: NeedStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let status_clause = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE needs SET status = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = (SELECT need_id FROM offers WHERE id = $2) AND status IN ({status_clause})"
    );
    let res = sqlx::query(&sql).bind(to.to_string()).bind(offer_id).execute(conn).await?;
    trace!("🗃️ Need for offer #{offer_id} status update to {to}: {} row(s) changed", res.rows_affected());
    Ok(res.rows_affected())
}

/// Compare-and-swap status update for a need. The row is only updated if its current status is one of `from`.
/// Returns the number of rows changed (0 or 1).
pub(crate) async fn update_need_status(
    need_id: i64,
    from: &[NeedStatus],
    to: NeedStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let status_clause = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE needs SET status = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 AND status IN ({status_clause})"
    );
    let res = sqlx::query(&sql).bind(to.to_string()).bind(need_id).execute(conn).await?;
    trace!("🗃️ Need #{need_id} status update to {to}: {} row(s) changed", res.rows_affected());
    Ok(res.rows_affected())
}
