use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use tender_common::Money;
use thiserror::Error;

/// Upper bound on the free-form description a provider attaches to an offer.
pub const MAX_OFFER_DESCRIPTION_LENGTH: usize = 2000;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------     NeedStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum NeedStatus {
    /// The need is open and accepting offers.
    Active,
    /// An offer has been paid into escrow and the provider is delivering.
    InProgress,
    /// The escrowed payment was released and the need is fulfilled.
    Completed,
    /// The need was cancelled, either directly or by refunding its payment.
    Cancelled,
    /// The need passed its expiry date without being fulfilled.
    Expired,
}

impl NeedStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NeedStatus::Completed | NeedStatus::Cancelled | NeedStatus::Expired)
    }

    /// The need lifecycle is monotonic: Active → (InProgress) → Completed, or out via Cancelled/Expired.
    pub fn can_transition_to(self, next: NeedStatus) -> bool {
        use NeedStatus::*;
        matches!(
            (self, next),
            (Active, InProgress) | (Active, Completed) | (Active, Cancelled) | (Active, Expired) |
            (InProgress, Completed) | (InProgress, Cancelled)
        )
    }
}

impl Display for NeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NeedStatus::Active => write!(f, "Active"),
            NeedStatus::InProgress => write!(f, "InProgress"),
            NeedStatus::Completed => write!(f, "Completed"),
            NeedStatus::Cancelled => write!(f, "Cancelled"),
            NeedStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for NeedStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid need status: {s}"))),
        }
    }
}

impl From<String> for NeedStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid need status: {value}. But this conversion cannot fail. Defaulting to Active");
            NeedStatus::Active
        })
    }
}

//--------------------------------------     OfferStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OfferStatus {
    /// The offer has been submitted and awaits a decision from the buyer.
    Pending,
    /// The buyer accepted the offer. Payment can now be initialized against it.
    Accepted,
    /// The buyer rejected the offer.
    Rejected,
    /// The provider withdrew the offer before a decision was made.
    Withdrawn,
}

impl OfferStatus {
    /// All decisions are terminal from the lifecycle manager's perspective.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }

    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!((self, next), (Pending, Accepted) | (Pending, Rejected) | (Pending, Withdrawn))
    }
}

impl Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "Pending"),
            OfferStatus::Accepted => write!(f, "Accepted"),
            OfferStatus::Rejected => write!(f, "Rejected"),
            OfferStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

impl FromStr for OfferStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            "Withdrawn" => Ok(Self::Withdrawn),
            s => Err(ConversionError(format!("Invalid offer status: {s}"))),
        }
    }
}

impl From<String> for OfferStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid offer status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OfferStatus::Pending
        })
    }
}

//-----------------------------------     TransactionStatus     ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The transaction record exists but the gateway has not been called yet.
    Pending,
    /// The gateway authorization is in flight, typically waiting on a challenge to be completed.
    Processing,
    /// Funds are captured and held in escrow. The buyer has not yet released them.
    Completed,
    /// Escrowed funds were transferred to the provider.
    Released,
    /// Escrowed funds were returned to the buyer.
    Refunded,
    /// The gateway declined, errored, or timed out.
    Failed,
    /// The transaction was abandoned and swept by reconciliation.
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Released |
                TransactionStatus::Refunded |
                TransactionStatus::Failed |
                TransactionStatus::Cancelled
        )
    }

    /// The transaction state machine. `Pending → Completed/Failed` admits gateway callbacks that arrive before
    /// the local `Processing` write; `Cancelled` is only ever entered by the reconciliation sweep.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) |
                (Pending, Completed) |
                (Pending, Failed) |
                (Pending, Cancelled) |
                (Processing, Completed) |
                (Processing, Failed) |
                (Processing, Cancelled) |
                (Completed, Released) |
                (Completed, Refunded)
        )
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Processing => write!(f, "Processing"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Released => write!(f, "Released"),
            TransactionStatus::Refunded => write!(f, "Refunded"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Released" => Ok(Self::Released),
            "Refunded" => Ok(Self::Refunded),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to Pending");
            TransactionStatus::Pending
        })
    }
}

//--------------------------------------        Need         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Need {
    pub id: i64,
    pub buyer_id: i64,
    pub category: String,
    pub budget_min: Option<Money>,
    pub budget_max: Option<Money>,
    pub currency: String,
    pub status: NeedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------       NewNeed       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNeed {
    /// The buyer posting the need
    pub buyer_id: i64,
    /// Free-form category label
    pub category: String,
    /// Optional lower bound of the buyer's budget
    pub budget_min: Option<Money>,
    /// Optional upper bound of the buyer's budget
    pub budget_max: Option<Money>,
    /// The currency all offers against this need must be priced in
    pub currency: String,
    /// The time after which the need expires, if any
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewNeed {
    pub fn new(buyer_id: i64, category: impl Into<String>) -> Self {
        Self {
            buyer_id,
            category: category.into(),
            budget_min: None,
            budget_max: None,
            currency: tender_common::DEFAULT_CURRENCY_CODE.to_string(),
            expires_at: None,
        }
    }

    pub fn with_budget(mut self, min: Money, max: Money) -> Self {
        self.budget_min = Some(min);
        self.budget_max = Some(max);
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

//--------------------------------------        Offer        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub need_id: i64,
    pub provider_id: i64,
    pub price: Money,
    pub currency: String,
    pub delivery_days: i64,
    pub description: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOffer      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
    /// The need this offer bids against
    pub need_id: i64,
    /// The provider making the offer. May not be the need's buyer.
    pub provider_id: i64,
    /// The offered price. Must be positive.
    pub price: Money,
    /// Must match the need's currency
    pub currency: String,
    /// Promised delivery time in days
    pub delivery_days: i64,
    /// What the provider is offering to deliver
    pub description: String,
}

impl NewOffer {
    pub fn new(need_id: i64, provider_id: i64, price: Money, description: impl Into<String>) -> Self {
        Self {
            need_id,
            provider_id,
            price,
            currency: tender_common::DEFAULT_CURRENCY_CODE.to_string(),
            delivery_days: 7,
            description: description.into(),
        }
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// The single source of truth for money movement. Only the escrow engine ever mutates these records, and a record
/// only moves forward through its state machine. Amount and currency are copied from the offer at initialization
/// and never change afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub offer_id: i64,
    pub buyer_id: i64,
    /// Denormalized from the offer so that authorization checks don't need a join
    pub provider_id: i64,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    /// Correlation id assigned by the payment gateway at authorization time
    pub gateway_ref: Option<String>,
    pub error_message: Option<String>,
    /// Free-form JSON. Records refund reasons and release notes.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// The metadata column parsed as a JSON object. Malformed or absent metadata yields an empty map.
    pub fn metadata_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
    }
}

//--------------------------------------   NewTransaction    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub offer_id: i64,
    pub buyer_id: i64,
    pub provider_id: i64,
    pub amount: Money,
    pub currency: String,
}

impl NewTransaction {
    /// Builds the insert record for an accepted offer, copying amount and currency from the offer.
    pub fn for_offer(offer: &Offer, buyer_id: i64) -> Self {
        Self {
            offer_id: offer.id,
            buyer_id,
            provider_id: offer.provider_id,
            amount: offer.price,
            currency: offer.currency.clone(),
        }
    }
}

//--------------------------------------  TransactionStats   ---------------------------------------------------------
/// Aggregates over a user's transactions, in either role. Counts span both roles; the monetary sums are
/// role-scoped: `total_spent` covers released transactions where the user is the buyer, `total_earned` those where
/// the user is the provider. A transaction only counts as completed once funds are actually released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total_transactions: i64,
    pub completed_transactions: i64,
    pub pending_transactions: i64,
    pub refunded_transactions: i64,
    pub total_spent: Money,
    pub total_earned: Money,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offer_transitions() {
        use OfferStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Withdrawn));
        for terminal in [Accepted, Rejected, Withdrawn] {
            assert!(terminal.is_terminal());
            for next in [Pending, Accepted, Rejected, Withdrawn] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn transaction_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Released));
        assert!(Completed.can_transition_to(Refunded));
        // early callbacks and the reconciliation sweep
        assert!(Pending.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));
        // no resurrection of a terminal transaction
        for terminal in [Released, Refunded, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Completed, Released, Refunded, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        // escrow can't be skipped
        assert!(!Pending.can_transition_to(Released));
        assert!(!Processing.can_transition_to(Released));
        assert!(!Processing.can_transition_to(Refunded));
    }

    #[test]
    fn need_transitions() {
        use NeedStatus::*;
        assert!(Active.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Expired));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Expired.can_transition_to(InProgress));
    }

    #[test]
    fn status_round_trips() {
        for s in ["Pending", "Processing", "Completed", "Released", "Refunded", "Failed", "Cancelled"] {
            assert_eq!(s.parse::<TransactionStatus>().unwrap().to_string(), s);
        }
        assert!("Paid".parse::<TransactionStatus>().is_err());
    }
}
