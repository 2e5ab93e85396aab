use std::fmt::Debug;

use log::*;

use crate::{
    api::{access, errors::EngineError},
    db::traits::{CasOutcome, NeedManagement, OfferManagement},
    db_types::{Need, NeedStatus, NewNeed, NewOffer, Offer, OfferStatus, MAX_OFFER_DESCRIPTION_LENGTH},
    events::{EventProducers, NewOfferEvent, OfferDecidedEvent},
};

/// `OfferFlowApi` is the offer lifecycle manager: it owns every status transition a need or an offer can make in
/// response to user actions, and enforces the cross-entity invariants (no self-offers, decisions only by the
/// right party, decisions only on pending offers).
///
/// Escrow settlement also moves needs along, but that path lives in
/// [`EscrowApi`](crate::api::escrow_api::EscrowApi); the two never race on the same transition because every
/// status change is a compare-and-swap at the storage layer.
pub struct OfferFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OfferFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OfferFlowApi")
    }
}

impl<B> OfferFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OfferFlowApi<B>
where B: NeedManagement + OfferManagement
{
    /// Posts a new need on behalf of a buyer. Needs are otherwise conventional records; the engine only cares
    /// that budget bounds make sense before offers start arriving against them.
    pub async fn create_need(&self, need: NewNeed) -> Result<Need, EngineError> {
        if need.category.trim().is_empty() {
            return Err(EngineError::Validation("a need must have a category".to_string()));
        }
        if let Some(min) = need.budget_min {
            if !min.is_positive() {
                return Err(EngineError::Validation("budget_min must be positive".to_string()));
            }
        }
        if let Some(max) = need.budget_max {
            if !max.is_positive() {
                return Err(EngineError::Validation("budget_max must be positive".to_string()));
            }
        }
        if let (Some(min), Some(max)) = (need.budget_min, need.budget_max) {
            if min > max {
                return Err(EngineError::Validation(format!(
                    "budget_min ({min}) exceeds budget_max ({max})"
                )));
            }
        }
        let need = self.db.insert_need(need).await.map_err(EngineError::db)?;
        debug!("🧾️ Need #{} posted by buyer {}", need.id, need.buyer_id);
        Ok(need)
    }

    pub async fn need_by_id(&self, need_id: i64) -> Result<Option<Need>, EngineError> {
        self.db.fetch_need(need_id).await.map_err(EngineError::db)
    }

    /// Submits a new offer against an active need.
    ///
    /// Fails with `Validation` if the need is not accepting offers, the provider owns the need, the price is not
    /// positive, the currency does not match the need's, or the description is out of bounds. On success the
    /// offer is stored as `Pending` and a new-offer event is published for the buyer.
    pub async fn create_offer(&self, offer: NewOffer) -> Result<Offer, EngineError> {
        let need = self
            .db
            .fetch_need(offer.need_id)
            .await
            .map_err(EngineError::db)?
            .ok_or_else(|| EngineError::NotFound(format!("Need #{}", offer.need_id)))?;
        if need.status != NeedStatus::Active {
            return Err(EngineError::Validation(format!(
                "need #{} is not accepting offers (status: {})",
                need.id, need.status
            )));
        }
        if !access::can_provider_create_offer(&need, offer.provider_id) {
            return Err(EngineError::Validation("a buyer may not offer on their own need".to_string()));
        }
        if !offer.price.is_positive() {
            return Err(EngineError::Validation(format!("offer price must be positive, got {}", offer.price)));
        }
        if offer.currency != need.currency {
            return Err(EngineError::Validation(format!(
                "offer currency {} does not match the need's currency {}",
                offer.currency, need.currency
            )));
        }
        if offer.description.trim().is_empty() {
            return Err(EngineError::Validation("an offer needs a description".to_string()));
        }
        if offer.description.len() > MAX_OFFER_DESCRIPTION_LENGTH {
            return Err(EngineError::Validation(format!(
                "offer description exceeds {MAX_OFFER_DESCRIPTION_LENGTH} characters"
            )));
        }
        let offer = self.db.insert_offer(offer).await.map_err(EngineError::db)?;
        debug!("🧾️ Offer #{} submitted against need #{} by provider {}", offer.id, offer.need_id, offer.provider_id);
        self.call_new_offer_hook(need.buyer_id, &offer).await;
        Ok(offer)
    }

    /// The buyer accepts a pending offer.
    ///
    /// Sibling offers on the same need stay `Pending`; payment initialization is what pins the winner down, so
    /// there is nothing to auto-reject here.
    pub async fn accept_offer(&self, offer_id: i64, buyer_id: i64) -> Result<Offer, EngineError> {
        let (offer, need) = self.offer_with_need(offer_id).await?;
        if !access::can_buyer_manage_offer(&need, buyer_id) {
            return Err(EngineError::Unauthorized(
                "only the buyer who posted the need can accept an offer".to_string(),
            ));
        }
        let offer = self.decide(offer, OfferStatus::Accepted, None).await?;
        info!("🧾️ Offer #{} accepted by buyer {buyer_id}", offer.id);
        Ok(offer)
    }

    /// The buyer rejects a pending offer, with an optional reason passed along to the provider.
    pub async fn reject_offer(
        &self,
        offer_id: i64,
        buyer_id: i64,
        reason: Option<String>,
    ) -> Result<Offer, EngineError> {
        let (offer, need) = self.offer_with_need(offer_id).await?;
        if !access::can_buyer_manage_offer(&need, buyer_id) {
            return Err(EngineError::Unauthorized(
                "only the buyer who posted the need can reject an offer".to_string(),
            ));
        }
        let offer = self.decide(offer, OfferStatus::Rejected, reason).await?;
        info!("🧾️ Offer #{} rejected by buyer {buyer_id}", offer.id);
        Ok(offer)
    }

    /// The provider withdraws a pending offer. An accepted offer cannot be withdrawn: once a buyer has committed
    /// (and possibly paid into escrow), backing out is a refund flow, not an offer transition.
    pub async fn withdraw_offer(&self, offer_id: i64, provider_id: i64) -> Result<Offer, EngineError> {
        let (offer, _need) = self.offer_with_need(offer_id).await?;
        if !access::can_provider_manage_offer(&offer, provider_id) {
            return Err(EngineError::Unauthorized(
                "only the provider who made the offer can withdraw it".to_string(),
            ));
        }
        let offer = self.decide(offer, OfferStatus::Withdrawn, None).await?;
        info!("🧾️ Offer #{} withdrawn by provider {provider_id}", offer.id);
        Ok(offer)
    }

    /// Expires needs whose expiry date has passed without being fulfilled. Run periodically by the
    /// reconciliation worker; pending offers against an expired need simply stop being acceptable, since every
    /// decision re-checks the need first.
    pub async fn expire_overdue_needs(&self) -> Result<Vec<Need>, EngineError> {
        let expired = self.db.expire_overdue_needs(chrono::Utc::now()).await.map_err(EngineError::db)?;
        for need in &expired {
            debug!("🧾️ Need #{} expired (deadline was {:?})", need.id, need.expires_at);
        }
        Ok(expired)
    }

    pub async fn offer_by_id(&self, offer_id: i64) -> Result<Option<Offer>, EngineError> {
        self.db.fetch_offer(offer_id).await.map_err(EngineError::db)
    }

    pub async fn offers_for_need(&self, need_id: i64) -> Result<Vec<Offer>, EngineError> {
        self.db.fetch_offers_for_need(need_id).await.map_err(EngineError::db)
    }

    /// Applies a decision to a pending offer via compare-and-swap and publishes the offer-decided event. A lost
    /// race (or a decision on an already-decided offer) surfaces as `Conflict` with the status that was found.
    async fn decide(
        &self,
        offer: Offer,
        decision: OfferStatus,
        reason: Option<String>,
    ) -> Result<Offer, EngineError> {
        if offer.status != OfferStatus::Pending {
            return Err(EngineError::wrong_offer_status(OfferStatus::Pending, offer.status));
        }
        let outcome = self
            .db
            .update_offer_status(offer.id, OfferStatus::Pending, decision)
            .await
            .map_err(EngineError::db)?;
        match outcome {
            CasOutcome::Applied(offer) => {
                self.call_offer_decided_hook(&offer, reason).await;
                Ok(offer)
            },
            CasOutcome::Conflict(found) => {
                Err(EngineError::wrong_offer_status(OfferStatus::Pending, found.status))
            },
            CasOutcome::NotFound => Err(EngineError::NotFound(format!("Offer #{}", offer.id))),
        }
    }

    async fn offer_with_need(&self, offer_id: i64) -> Result<(Offer, Need), EngineError> {
        let offer = self
            .db
            .fetch_offer(offer_id)
            .await
            .map_err(EngineError::db)?
            .ok_or_else(|| EngineError::NotFound(format!("Offer #{offer_id}")))?;
        let need = self
            .db
            .fetch_need(offer.need_id)
            .await
            .map_err(EngineError::db)?
            .ok_or_else(|| {
                EngineError::Database(format!("offer #{offer_id} references missing need #{}", offer.need_id))
            })?;
        Ok((offer, need))
    }

    async fn call_new_offer_hook(&self, buyer_id: i64, offer: &Offer) {
        for emitter in &self.producers.new_offer_producer {
            debug!("🧾️📬️ Notifying new-offer hook subscribers");
            let event = NewOfferEvent::new(buyer_id, offer.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_offer_decided_hook(&self, offer: &Offer, reason: Option<String>) {
        for emitter in &self.producers.offer_decided_producer {
            debug!("🧾️📬️ Notifying offer-decided hook subscribers");
            let event = OfferDecidedEvent::new(offer.clone(), reason.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
