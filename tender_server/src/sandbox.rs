//! A sandbox payment gateway.
//!
//! Stands in for a real PSP integration: every authorization is accepted (optionally via a challenge round
//! trip), and callbacks use the engine's own JSON shape. Swap this for a concrete adapter by implementing
//! [`PaymentGateway`] against the PSP's API and wiring it up in `server.rs`.
use log::debug;
use tender_engine::gateway::{
    AuthorizeRequest,
    AuthorizeResponse,
    GatewayCallback,
    GatewayError,
    PaymentGateway,
};

#[derive(Debug, Clone)]
pub struct SandboxGateway {
    challenge: bool,
}

impl SandboxGateway {
    pub fn new(challenge: bool) -> Self {
        Self { challenge }
    }
}

impl PaymentGateway for SandboxGateway {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError> {
        let gateway_ref = format!("sandbox-{:016x}", rand::random::<u64>());
        debug!(
            "🏦️ Sandbox gateway authorizing {} {} for {} as {gateway_ref}",
            request.amount, request.currency, request.card.holder_name
        );
        if self.challenge {
            Ok(AuthorizeResponse::ChallengeRequired {
                challenge: format!("<form action=\"/payments/callback\" data-ref=\"{gateway_ref}\"></form>"),
                gateway_ref,
            })
        } else {
            Ok(AuthorizeResponse::Approved { gateway_ref })
        }
    }

    fn parse_callback(&self, payload: &str) -> Result<GatewayCallback, GatewayError> {
        serde_json::from_str(payload).map_err(|e| GatewayError::InvalidCallback(e.to_string()))
    }
}
