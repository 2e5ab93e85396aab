use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewOffer, Offer, OfferStatus},
};

const OFFER_COLUMNS: &str = "id, need_id, provider_id, price, currency, delivery_days, description, status, \
                             created_at, updated_at";

/// Inserts a new offer with `Pending` status. Validation of the offer against its need happens in the lifecycle
/// manager before this is called.
pub async fn insert_offer(offer: NewOffer, conn: &mut SqliteConnection) -> Result<Offer, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO offers (need_id, provider_id, price, currency, delivery_days, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id;
        "#,
    )
    .bind(offer.need_id)
    .bind(offer.provider_id)
    .bind(offer.price)
    .bind(&offer.currency)
    .bind(offer.delivery_days)
    .bind(&offer.description)
    .fetch_one(&mut *conn)
    .await?;
    trace!("🗃️ Offer #{id} saved against need #{}", offer.need_id);
    fetch_offer(id, conn).await?.ok_or(SqliteDatabaseError::OfferNotFound(id))
}

/// Fetches the offer with the given id, or `None` if it does not exist.
pub async fn fetch_offer(offer_id: i64, conn: &mut SqliteConnection) -> Result<Option<Offer>, SqliteDatabaseError> {
    let offer = sqlx::query_as::<_, Offer>(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1"))
        .bind(offer_id)
        .fetch_one(&mut *conn)
        .await;
    match offer {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(o) => Ok(Some(o)),
    }
}

/// All offers against the given need, in submission order.
pub async fn fetch_offers_for_need(
    need_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Offer>, SqliteDatabaseError> {
    let offers = sqlx::query_as::<_, Offer>(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE need_id = $1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(need_id)
    .fetch_all(conn)
    .await?;
    Ok(offers)
}

/// Compare-and-swap status update for an offer. Returns the number of rows changed (0 or 1); 0 means the offer
/// either does not exist or no longer holds status `from`.
pub(crate) async fn update_offer_status(
    offer_id: i64,
    from: OfferStatus,
    to: OfferStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE offers SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3",
    )
    .bind(to.to_string())
    .bind(offer_id)
    .bind(from.to_string())
    .execute(conn)
    .await?;
    trace!("🗃️ Offer #{offer_id} status update {from} → {to}: {} row(s) changed", res.rows_affected());
    Ok(res.rows_affected())
}
