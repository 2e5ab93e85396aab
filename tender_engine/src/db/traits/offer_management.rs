use crate::{
    db::traits::CasOutcome,
    db_types::{NewOffer, Offer, OfferStatus},
};

/// Backend contract for offer records.
#[allow(async_fn_in_trait)]
pub trait OfferManagement: Clone {
    type Error: std::error::Error;

    /// Stores a new offer with `Pending` status and returns the stored record. Input validation (price, self-offer,
    /// description bounds) happens in the lifecycle manager before this is called.
    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer, Self::Error>;

    /// Fetches an offer by id. Returns `None` if the id does not resolve.
    async fn fetch_offer(&self, offer_id: i64) -> Result<Option<Offer>, Self::Error>;

    /// All offers submitted against the given need, oldest first.
    async fn fetch_offers_for_need(&self, need_id: i64) -> Result<Vec<Offer>, Self::Error>;

    /// Compare-and-swap status update. The offer moves from `from` to `to` only if it still holds status `from`
    /// at write time; a racing decision surfaces as [`CasOutcome::Conflict`].
    async fn update_offer_status(
        &self,
        offer_id: i64,
        from: OfferStatus,
        to: OfferStatus,
    ) -> Result<CasOutcome<Offer>, Self::Error>;
}
