use chrono::{DateTime, Utc};

use crate::{
    db::traits::CasOutcome,
    db_types::{Need, NeedStatus, NewNeed},
};

/// Backend contract for need records.
///
/// Needs are created by buyers and only ever mutated through the offer lifecycle manager and the escrow engine
/// (which closes a need as a side effect of releasing or refunding its payment).
#[allow(async_fn_in_trait)]
pub trait NeedManagement: Clone {
    type Error: std::error::Error;

    /// Stores a new need with `Active` status and returns the stored record.
    async fn insert_need(&self, need: NewNeed) -> Result<Need, Self::Error>;

    /// Fetches a need by id. Returns `None` if the id does not resolve.
    async fn fetch_need(&self, need_id: i64) -> Result<Option<Need>, Self::Error>;

    /// Compare-and-swap status update: the need moves to `to` only if its current status is one of `from`.
    async fn update_need_status(
        &self,
        need_id: i64,
        from: &[NeedStatus],
        to: NeedStatus,
    ) -> Result<CasOutcome<Need>, Self::Error>;

    /// Marks `Active` needs whose expiry date lies before `now` as `Expired`, and returns the expired records.
    async fn expire_overdue_needs(&self, now: DateTime<Utc>) -> Result<Vec<Need>, Self::Error>;
}
