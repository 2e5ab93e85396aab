use serde::{Deserialize, Serialize};

use crate::db_types::Transaction;

/// What `initialize_payment` hands back to the caller: the transaction record (now `Processing`) and, when the
/// gateway demands an additional authentication step, the opaque challenge payload to forward to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitResult {
    pub transaction: Transaction,
    pub challenge: Option<String>,
}

impl PaymentInitResult {
    pub fn new(transaction: Transaction, challenge: Option<String>) -> Self {
        Self { transaction, challenge }
    }

    pub fn requires_challenge(&self) -> bool {
        self.challenge.is_some()
    }
}
