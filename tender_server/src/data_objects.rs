//! Request and response DTOs for the HTTP surface.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tender_common::{Money, Secret, DEFAULT_CURRENCY_CODE};
use tender_engine::{
    db_types::{NewNeed, NewOffer},
    gateway::{BillingAddress, CardDetails, PaymentDetails},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNeedRequest {
    pub category: String,
    #[serde(default)]
    pub budget_min: Option<Money>,
    #[serde(default)]
    pub budget_max: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateNeedRequest {
    pub fn into_new_need(self, buyer_id: i64) -> NewNeed {
        NewNeed {
            buyer_id,
            category: self.category,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            currency: self.currency.unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferRequest {
    pub need_id: i64,
    pub price: Money,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub delivery_days: Option<i64>,
    pub description: String,
}

impl CreateOfferRequest {
    pub fn into_new_offer(self, provider_id: i64) -> NewOffer {
        NewOffer {
            need_id: self.need_id,
            provider_id,
            price: self.price,
            currency: self.currency.unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()),
            delivery_days: self.delivery_days.unwrap_or(7),
            description: self.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectOfferRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Card data as it arrives on the wire. Converted into the engine's [`CardDetails`] immediately so the PAN and
/// CVV are behind [`Secret`] before anything can log them.
#[derive(Clone, Deserialize)]
pub struct CardPayload {
    pub number: String,
    pub expiry_month: u16,
    pub expiry_year: u16,
    pub cvv: String,
    pub holder_name: String,
}

impl std::fmt::Debug for CardPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CardPayload(**** exp {}/{})", self.expiry_month, self.expiry_year)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializePaymentRequest {
    pub offer_id: i64,
    pub card: CardPayload,
    pub billing_address: BillingAddress,
}

impl InitializePaymentRequest {
    pub fn payment_details(&self) -> PaymentDetails {
        PaymentDetails {
            card: CardDetails {
                number: Secret::new(self.card.number.clone()),
                expiry_month: self.card.expiry_month,
                expiry_year: self.card.expiry_year,
                cvv: Secret::new(self.card.cvv.clone()),
                holder_name: self.card.holder_name.clone(),
            },
            billing_address: self.billing_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePaymentRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPaymentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}
