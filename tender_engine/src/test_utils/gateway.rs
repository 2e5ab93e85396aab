//! A scripted payment gateway for tests.
//!
//! The mode can be flipped between calls, so one test can drive a happy authorize followed by a declined retry
//! without rebuilding the API object.
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use crate::gateway::{
    AuthorizeRequest,
    AuthorizeResponse,
    CallbackOutcome,
    GatewayCallback,
    GatewayError,
    PaymentGateway,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestGatewayMode {
    /// Authorize immediately, no challenge.
    Approve,
    /// Demand a challenge before completing.
    Challenge,
    /// Refuse the charge.
    Decline,
    /// Fail with a transport error.
    Error,
    /// Never respond. Exercises the engine's authorize timeout.
    Hang,
}

#[derive(Clone)]
pub struct TestGateway {
    mode: Arc<Mutex<TestGatewayMode>>,
    counter: Arc<AtomicU64>,
    requests: Arc<Mutex<Vec<AuthorizeRequest>>>,
}

impl TestGateway {
    pub fn new(mode: TestGatewayMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            counter: Arc::new(AtomicU64::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn approving() -> Self {
        Self::new(TestGatewayMode::Approve)
    }

    pub fn challenging() -> Self {
        Self::new(TestGatewayMode::Challenge)
    }

    pub fn declining() -> Self {
        Self::new(TestGatewayMode::Decline)
    }

    pub fn set_mode(&self, mode: TestGatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// How many authorize calls the gateway has seen.
    pub fn authorize_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// The requests received so far, in order.
    pub fn requests(&self) -> Vec<AuthorizeRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Builds the raw callback body the gateway would deliver for the given outcome.
    pub fn callback_payload(gateway_ref: &str, outcome: CallbackOutcome) -> String {
        let callback = GatewayCallback { gateway_ref: gateway_ref.to_string(), outcome };
        serde_json::to_string(&callback).expect("callback serialization cannot fail")
    }
}

impl PaymentGateway for TestGateway {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request);
        let mode = *self.mode.lock().unwrap();
        match mode {
            TestGatewayMode::Approve => Ok(AuthorizeResponse::Approved { gateway_ref: format!("test-ref-{n}") }),
            TestGatewayMode::Challenge => Ok(AuthorizeResponse::ChallengeRequired {
                gateway_ref: format!("test-ref-{n}"),
                challenge: format!("<form action=\"https://acs.example/challenge/{n}\"></form>"),
            }),
            TestGatewayMode::Decline => Ok(AuthorizeResponse::Declined {
                gateway_ref: Some(format!("test-ref-{n}")),
                reason: "insufficient funds".to_string(),
            }),
            TestGatewayMode::Error => Err(GatewayError::Transport("connection reset by peer".to_string())),
            TestGatewayMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Transport("gateway never responded".to_string()))
            },
        }
    }

    fn parse_callback(&self, payload: &str) -> Result<GatewayCallback, GatewayError> {
        serde_json::from_str(payload).map_err(|e| GatewayError::InvalidCallback(e.to_string()))
    }
}
