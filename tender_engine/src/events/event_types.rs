use serde::{Deserialize, Serialize};

use crate::db_types::{Offer, OfferStatus, Transaction};

/// A provider has submitted a new offer against a buyer's need. Addressed to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOfferEvent {
    pub buyer_id: i64,
    pub offer: Offer,
}

impl NewOfferEvent {
    pub fn new(buyer_id: i64, offer: Offer) -> Self {
        Self { buyer_id, offer }
    }
}

/// A pending offer received its decision: accepted or rejected by the buyer, or withdrawn by the provider.
/// Addressed to the provider; `reason` carries the buyer's optional rejection note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDecidedEvent {
    pub provider_id: i64,
    pub offer: Offer,
    pub decision: OfferStatus,
    pub reason: Option<String>,
}

impl OfferDecidedEvent {
    pub fn new(offer: Offer, reason: Option<String>) -> Self {
        let provider_id = offer.provider_id;
        let decision = offer.status;
        Self { provider_id, offer, decision, reason }
    }
}

/// Escrowed funds were released to the provider. Addressed to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReleasedEvent {
    pub provider_id: i64,
    pub transaction: Transaction,
}

impl PaymentReleasedEvent {
    pub fn new(transaction: Transaction) -> Self {
        let provider_id = transaction.provider_id;
        Self { provider_id, transaction }
    }
}

/// Escrowed funds were returned to the buyer and the need cancelled. Addressed to both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub buyer_id: i64,
    pub provider_id: i64,
    pub transaction: Transaction,
    pub reason: String,
}

impl PaymentRefundedEvent {
    pub fn new(transaction: Transaction, reason: String) -> Self {
        let buyer_id = transaction.buyer_id;
        let provider_id = transaction.provider_id;
        Self { buyer_id, provider_id, transaction, reason }
    }
}
