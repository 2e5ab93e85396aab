use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    api::{access, errors::EngineError, payment_objects::PaymentInitResult},
    db::traits::{
        CasOutcome,
        InsertTransactionResult,
        NeedManagement,
        OfferManagement,
        TransactionManagement,
    },
    db_types::{NewTransaction, OfferStatus, Transaction, TransactionStats, TransactionStatus},
    events::{EventProducers, PaymentRefundedEvent, PaymentReleasedEvent},
    gateway::{AuthorizeRequest, AuthorizeResponse, CallbackOutcome, GatewayError, PaymentDetails, PaymentGateway},
};

pub const DEFAULT_AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// `EscrowApi` is the escrow transaction engine. It owns the full payment cycle against an accepted offer:
/// initialize → (challenge) → complete (escrow hold) → release | refund, with the failure and cancellation
/// branches in between.
///
/// Transactions are the single source of truth for money movement, and this API is the only path that mutates
/// them. Every transition re-reads current state and applies a compare-and-swap at the storage layer, so a
/// double release (or a release racing a refund) loses cleanly with a conflict error.
pub struct EscrowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    authorize_timeout: Duration,
}

impl<B, G> Debug for EscrowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowApi")
    }
}

impl<B, G> EscrowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, authorize_timeout: DEFAULT_AUTHORIZE_TIMEOUT }
    }

    /// Caps how long the engine waits on the gateway's authorize call. On expiry the transaction is marked
    /// `Failed` rather than left dangling in `Pending`.
    pub fn with_authorize_timeout(mut self, timeout: Duration) -> Self {
        self.authorize_timeout = timeout;
        self
    }
}

impl<B, G> EscrowApi<B, G>
where
    B: NeedManagement + OfferManagement + TransactionManagement,
    G: PaymentGateway,
{
    /// Opens the escrow cycle for an accepted offer.
    ///
    /// Preconditions (checked before any record is written, and re-checked inside the insert's storage
    /// transaction): the offer exists, the caller is the buyer of the offer's need, the offer is `Accepted`, and
    /// no non-terminal transaction already references the offer. This is the mechanism that prevents paying for
    /// a non-accepted or already-paid offer.
    ///
    /// On success the transaction is created `Pending`, the gateway is asked to authorize the charge under a
    /// bounded timeout, and the record moves to `Processing` with the gateway's correlation id. The caller gets
    /// the record plus the challenge payload when the gateway demands one. A declined charge, a transport error,
    /// or a timeout marks the record `Failed` with the reason captured, and is re-raised as a gateway error so
    /// the client can offer a retry.
    pub async fn initialize_payment(
        &self,
        offer_id: i64,
        buyer_id: i64,
        details: PaymentDetails,
    ) -> Result<PaymentInitResult, EngineError> {
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
        if !access::can_buyer_manage_offer(&need, buyer_id) {
            return Err(EngineError::Unauthorized("only the need's buyer can pay for an offer".to_string()));
        }
        if offer.status != OfferStatus::Accepted {
            return Err(EngineError::Validation(format!("offer is not accepted (status: {})", offer.status)));
        }
        let txn = match self
            .db
            .create_transaction_for_offer(NewTransaction::for_offer(&offer, buyer_id))
            .await
            .map_err(EngineError::db)?
        {
            InsertTransactionResult::Inserted(txn) => txn,
            InsertTransactionResult::OfferNotAccepted(found) => {
                return Err(EngineError::Validation(format!("offer is not accepted (status: {found})")));
            },
            InsertTransactionResult::DuplicateActive(existing) => {
                return Err(EngineError::Validation(format!(
                    "offer #{offer_id} already has an active transaction (#{existing})"
                )));
            },
        };
        debug!("💳️ Transaction #{} initialized for offer #{offer_id}; authorizing {}", txn.id, txn.amount);

        let request = AuthorizeRequest {
            amount: txn.amount,
            currency: txn.currency.clone(),
            card: details.card,
            billing_address: details.billing_address,
        };
        let timeout_secs = self.authorize_timeout.as_secs();
        let response = match tokio::time::timeout(self.authorize_timeout, self.gateway.authorize(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return self.fail_and_raise(txn.id, e.to_string()).await,
            Err(_) => return self.fail_and_raise(txn.id, GatewayError::Timeout(timeout_secs).to_string()).await,
        };
        match response {
            AuthorizeResponse::Approved { gateway_ref } => {
                let txn = self.mark_processing(txn.id, &gateway_ref).await?;
                Ok(PaymentInitResult::new(txn, None))
            },
            AuthorizeResponse::ChallengeRequired { gateway_ref, challenge } => {
                let txn = self.mark_processing(txn.id, &gateway_ref).await?;
                debug!("💳️ Transaction #{} requires a challenge", txn.id);
                Ok(PaymentInitResult::new(txn, Some(challenge)))
            },
            AuthorizeResponse::Declined { reason, .. } => {
                self.fail_and_raise(txn.id, format!("authorization declined: {reason}")).await
            },
        }
    }

    /// Applies a gateway callback. This is an independent asynchronous entry point: the gateway may retry a
    /// delivery or send it before `initialize_payment` has finished its own bookkeeping, so the handler is
    /// idempotent. A callback for a transaction that is already settled is a logged no-op, not a duplicate
    /// state change.
    ///
    /// A successful outcome is the escrow-hold point: funds are captured but not yet owed to the provider. The
    /// underlying need moves along to reflect that work can start.
    pub async fn handle_payment_callback(&self, payload: &str) -> Result<Transaction, EngineError> {
        let callback = self.gateway.parse_callback(payload).map_err(|e| EngineError::Gateway(e.to_string()))?;
        let txn = self
            .db
            .fetch_transaction_by_gateway_ref(&callback.gateway_ref)
            .await
            .map_err(EngineError::db)?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Transaction for gateway reference {}", callback.gateway_ref))
            })?;
        if !matches!(txn.status, TransactionStatus::Pending | TransactionStatus::Processing) {
            info!(
                "💳️ Callback for transaction #{} redelivered (status: {}). Nothing to do.",
                txn.id, txn.status
            );
            return Ok(txn);
        }
        match callback.outcome {
            CallbackOutcome::Success => {
                match self.db.complete_transaction(txn.id).await.map_err(EngineError::db)? {
                    CasOutcome::Applied(txn) => {
                        info!("💳️ Transaction #{} completed. {} is held in escrow.", txn.id, txn.amount);
                        Ok(txn)
                    },
                    CasOutcome::Conflict(txn) => {
                        debug!("💳️ Transaction #{} was settled concurrently (status: {})", txn.id, txn.status);
                        Ok(txn)
                    },
                    CasOutcome::NotFound => {
                        Err(EngineError::Database(format!("transaction #{} vanished mid-callback", txn.id)))
                    },
                }
            },
            CallbackOutcome::Failure(reason) => {
                match self.db.fail_transaction(txn.id, &reason).await.map_err(EngineError::db)? {
                    CasOutcome::Applied(txn) => {
                        warn!("💳️ Transaction #{} failed at the gateway: {reason}", txn.id);
                        Ok(txn)
                    },
                    CasOutcome::Conflict(txn) => {
                        debug!("💳️ Transaction #{} was settled concurrently (status: {})", txn.id, txn.status);
                        Ok(txn)
                    },
                    CasOutcome::NotFound => {
                        Err(EngineError::Database(format!("transaction #{} vanished mid-callback", txn.id)))
                    },
                }
            },
        }
    }

    /// The buyer releases escrowed funds to the provider. Requires `Completed`; anything else (including a
    /// repeat of a successful release) is a conflict stating which status was expected and which was found.
    /// Releasing also closes the underlying need as fulfilled and notifies the provider.
    pub async fn release_payment(
        &self,
        transaction_id: i64,
        buyer_id: i64,
        notes: Option<String>,
    ) -> Result<Transaction, EngineError> {
        let txn = self.fetch_transaction(transaction_id).await?;
        if !access::can_buyer_settle_transaction(&txn, buyer_id) {
            return Err(EngineError::Unauthorized(
                "only the buyer can release an escrowed payment".to_string(),
            ));
        }
        if txn.status != TransactionStatus::Completed {
            return Err(EngineError::wrong_transaction_status(TransactionStatus::Completed, txn.status));
        }
        match self.db.release_transaction(transaction_id, notes.as_deref()).await.map_err(EngineError::db)? {
            CasOutcome::Applied(txn) => {
                info!("💳️ Transaction #{} released. {} goes to provider {}", txn.id, txn.amount, txn.provider_id);
                self.call_payment_released_hook(&txn).await;
                Ok(txn)
            },
            CasOutcome::Conflict(found) => {
                Err(EngineError::wrong_transaction_status(TransactionStatus::Completed, found.status))
            },
            CasOutcome::NotFound => Err(EngineError::NotFound(format!("Transaction #{transaction_id}"))),
        }
    }

    /// The buyer claws escrowed funds back. Requires `Completed`; the reason is mandatory and recorded in the
    /// transaction's metadata. Refunding cancels the underlying need and notifies both parties.
    pub async fn refund_payment(
        &self,
        transaction_id: i64,
        user_id: i64,
        reason: &str,
    ) -> Result<Transaction, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation("a refund reason is required".to_string()));
        }
        let txn = self.fetch_transaction(transaction_id).await?;
        if !access::can_buyer_settle_transaction(&txn, user_id) {
            return Err(EngineError::Unauthorized("only the buyer can request a refund".to_string()));
        }
        if txn.status != TransactionStatus::Completed {
            return Err(EngineError::wrong_transaction_status(TransactionStatus::Completed, txn.status));
        }
        match self.db.refund_transaction(transaction_id, reason).await.map_err(EngineError::db)? {
            CasOutcome::Applied(txn) => {
                info!("💳️ Transaction #{} refunded. {} returns to buyer {}", txn.id, txn.amount, txn.buyer_id);
                self.call_payment_refunded_hook(&txn, reason).await;
                Ok(txn)
            },
            CasOutcome::Conflict(found) => {
                Err(EngineError::wrong_transaction_status(TransactionStatus::Completed, found.status))
            },
            CasOutcome::NotFound => Err(EngineError::NotFound(format!("Transaction #{transaction_id}"))),
        }
    }

    /// True iff the user is the transaction's buyer or provider. An id that does not resolve is simply not
    /// accessible.
    pub async fn can_user_access_transaction(
        &self,
        transaction_id: i64,
        user_id: i64,
    ) -> Result<bool, EngineError> {
        let txn = self.db.fetch_transaction(transaction_id).await.map_err(EngineError::db)?;
        Ok(txn.map(|t| access::can_user_access_transaction(&t, user_id)).unwrap_or(false))
    }

    /// Fetches a transaction on behalf of a user, enforcing party-only visibility.
    pub async fn transaction_for_user(
        &self,
        transaction_id: i64,
        user_id: i64,
    ) -> Result<Transaction, EngineError> {
        let txn = self.fetch_transaction(transaction_id).await?;
        if !access::can_user_access_transaction(&txn, user_id) {
            return Err(EngineError::Unauthorized("you are not a party to this transaction".to_string()));
        }
        Ok(txn)
    }

    /// Aggregates for the user's dashboard. See [`TransactionStats`] for field semantics.
    pub async fn user_transaction_stats(&self, user_id: i64) -> Result<TransactionStats, EngineError> {
        self.db.fetch_user_transaction_stats(user_id).await.map_err(EngineError::db)
    }

    /// Marks transactions stuck in `Pending`/`Processing` for longer than `older_than` as `Cancelled`. Run
    /// periodically by the reconciliation worker; payers who abandon a challenge land here.
    pub async fn sweep_stale_payments(
        &self,
        older_than: chrono::Duration,
    ) -> Result<Vec<Transaction>, EngineError> {
        let cutoff = Utc::now() - older_than;
        self.db.sweep_stale_transactions(cutoff).await.map_err(EngineError::db)
    }

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Transaction, EngineError> {
        self.db
            .fetch_transaction(transaction_id)
            .await
            .map_err(EngineError::db)?
            .ok_or_else(|| EngineError::NotFound(format!("Transaction #{transaction_id}")))
    }

    /// Records the gateway reference and moves the record to `Processing`. If the gateway's callback has already
    /// settled the record in the meantime, the settled row wins and is returned as-is.
    async fn mark_processing(&self, transaction_id: i64, gateway_ref: &str) -> Result<Transaction, EngineError> {
        match self.db.mark_transaction_processing(transaction_id, gateway_ref).await.map_err(EngineError::db)? {
            CasOutcome::Applied(txn) => Ok(txn),
            CasOutcome::Conflict(txn) => {
                debug!(
                    "💳️ Transaction #{} was already {} when the authorize result landed",
                    txn.id, txn.status
                );
                Ok(txn)
            },
            CasOutcome::NotFound => {
                Err(EngineError::Database(format!("transaction #{transaction_id} vanished mid-authorization")))
            },
        }
    }

    /// Records a gateway failure on the transaction and re-raises it. The failure is never swallowed: the record
    /// carries the error message, and the caller gets a gateway error it can surface with a retry path.
    async fn fail_and_raise<T>(&self, transaction_id: i64, message: String) -> Result<T, EngineError> {
        warn!("💳️ Transaction #{transaction_id} failed: {message}");
        if let Err(e) = self.db.fail_transaction(transaction_id, &message).await {
            error!("💳️ Could not record failure on transaction #{transaction_id}: {e}");
        }
        Err(EngineError::Gateway(message))
    }

    async fn call_payment_released_hook(&self, txn: &Transaction) {
        for emitter in &self.producers.payment_released_producer {
            debug!("💳️📬️ Notifying payment-released hook subscribers");
            let event = PaymentReleasedEvent::new(txn.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_refunded_hook(&self, txn: &Transaction, reason: &str) {
        for emitter in &self.producers.payment_refunded_producer {
            debug!("💳️📬️ Notifying payment-refunded hook subscribers");
            let event = PaymentRefundedEvent::new(txn.clone(), reason.to_string());
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
