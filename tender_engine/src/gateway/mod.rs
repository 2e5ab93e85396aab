//! Payment gateway adapter contract.
//!
//! The escrow engine is gateway-agnostic: it only needs a way to authorize a card charge (which may come back
//! immediately, require a 3-D-Secure-style challenge, or be declined) and a way to interpret the asynchronous
//! callback the gateway later delivers. Concrete integrations implement [`PaymentGateway`]; the engine never
//! sees a gateway wire format.
use serde::{Deserialize, Serialize};
use tender_common::{Money, Secret};
use thiserror::Error;

/// The adapter contract for a card payment gateway.
///
/// `authorize` is the one blocking external I/O point in the payment flow. Implementations should not apply
/// their own retry loops; the escrow engine wraps the call in a bounded timeout and records failures on the
/// transaction record.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone + Send + Sync {
    /// Asks the gateway to authorize a charge. A `Declined` response is a normal business outcome; transport
    /// failures and malformed responses surface as [`GatewayError`].
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError>;

    /// Interprets a raw callback body delivered by the gateway into the engine's terms.
    fn parse_callback(&self, payload: &str) -> Result<GatewayCallback, GatewayError>;
}

//--------------------------------------   AuthorizeRequest   --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub amount: Money,
    pub currency: String,
    pub card: CardDetails,
    pub billing_address: BillingAddress,
}

/// Card data supplied by the payer. The PAN and CVV are wrapped in [`Secret`] so they cannot leak into logs.
#[derive(Debug, Clone, Default)]
pub struct CardDetails {
    pub number: Secret<String>,
    pub expiry_month: u16,
    pub expiry_year: u16,
    pub cvv: Secret<String>,
    pub holder_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Everything the buyer submits when initializing a payment.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    pub card: CardDetails,
    pub billing_address: BillingAddress,
}

//--------------------------------------   AuthorizeResponse  --------------------------------------------------------
#[derive(Debug, Clone)]
pub enum AuthorizeResponse {
    /// The charge was authorized without further interaction.
    Approved { gateway_ref: String },
    /// The payer must complete an additional authentication step. `challenge` is an opaque payload (typically a
    /// redirect document) to hand back to the client.
    ChallengeRequired { gateway_ref: String, challenge: String },
    /// The gateway refused the charge.
    Declined { gateway_ref: Option<String>, reason: String },
}

//--------------------------------------    GatewayCallback   --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCallback {
    /// The correlation id the gateway assigned at authorization time.
    pub gateway_ref: String,
    pub outcome: CallbackOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "reason")]
pub enum CallbackOutcome {
    Success,
    Failure(String),
}

//--------------------------------------     GatewayError     --------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway transport error: {0}")]
    Transport(String),
    #[error("Gateway authorization timed out after {0} seconds")]
    Timeout(u64),
    #[error("Could not interpret gateway callback: {0}")]
    InvalidCallback(String),
}
