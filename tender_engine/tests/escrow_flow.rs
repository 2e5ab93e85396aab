//! Integration tests for the escrow transaction engine: initialization guards, the gateway round trip, callback
//! idempotency, and the release/refund settlement paths.
mod support;

use std::time::Duration;

use support::*;
use tender_common::Money;
use tender_engine::{
    db_types::{NeedStatus, TransactionStatus},
    gateway::{CallbackOutcome, PaymentDetails},
    test_utils::{TestGateway, TestGatewayMode},
    traits::{NeedManagement, TransactionManagement},
    EngineError,
};

#[tokio::test]
async fn payment_can_only_be_initialized_against_an_accepted_offer() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let need = seed_need(&offers, BUYER).await;
    let first = seed_offer(&offers, &need, PROVIDER, Money::from_whole(300)).await;
    let second = seed_offer(&offers, &need, 8, Money::from_whole(250)).await;
    offers.accept_offer(first.id, BUYER).await.unwrap();

    // the pending sibling cannot be paid for
    let err = escrow.initialize_payment(second.id, BUYER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "expected a validation error, got {err:?}");

    // the accepted one can
    let init = escrow.initialize_payment(first.id, BUYER, PaymentDetails::default()).await.unwrap();
    assert_eq!(init.transaction.status, TransactionStatus::Processing);
    assert_eq!(init.transaction.amount, first.price);
    assert_eq!(init.transaction.currency, first.currency);
    assert!(init.transaction.gateway_ref.is_some());
    assert!(init.challenge.is_none());
}

#[tokio::test]
async fn only_the_needs_buyer_may_initialize_payment() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let err = escrow.initialize_payment(offer.id, PROVIDER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = escrow.initialize_payment(9999, BUYER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn a_challenge_is_returned_to_the_caller() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::challenging(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    assert!(init.requires_challenge());
    assert_eq!(init.transaction.status, TransactionStatus::Processing);
}

#[tokio::test]
async fn an_offer_with_an_active_transaction_cannot_be_paid_twice() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();

    let err = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "expected a validation error, got {err:?}");
}

#[tokio::test]
async fn a_successful_callback_is_the_escrow_hold_point() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::challenging(), &producers);

    let (need, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    let gateway_ref = init.transaction.gateway_ref.clone().unwrap();

    let payload = TestGateway::callback_payload(&gateway_ref, CallbackOutcome::Success);
    let txn = escrow.handle_payment_callback(&payload).await.unwrap();
    assert_eq!(txn.status, TransactionStatus::Completed);
    assert!(txn.completed_at.is_some());
    // amount and currency are untouched by settlement
    assert_eq!(txn.amount, offer.price);
    assert_eq!(txn.currency, offer.currency);

    let need = db.fetch_need(need.id).await.unwrap().unwrap();
    assert_eq!(need.status, NeedStatus::InProgress);

    // a redelivered callback is a no-op, not a second state change
    let again = escrow.handle_payment_callback(&payload).await.unwrap();
    assert_eq!(again.status, TransactionStatus::Completed);
    assert_eq!(again.completed_at, txn.completed_at);
}

#[tokio::test]
async fn a_failure_callback_records_the_gateways_reason() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::challenging(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    let gateway_ref = init.transaction.gateway_ref.clone().unwrap();

    let payload =
        TestGateway::callback_payload(&gateway_ref, CallbackOutcome::Failure("challenge abandoned".to_string()));
    let txn = escrow.handle_payment_callback(&payload).await.unwrap();
    assert_eq!(txn.status, TransactionStatus::Failed);
    assert_eq!(txn.error_message.as_deref(), Some("challenge abandoned"));

    // a failed attempt does not block a fresh one
    let retry = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    assert_eq!(retry.transaction.status, TransactionStatus::Processing);
    assert_ne!(retry.transaction.id, txn.id);
}

#[tokio::test]
async fn a_declined_authorization_fails_the_transaction_and_is_reraised() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::declining(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let err = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::Gateway(_)), "expected a gateway error, got {err:?}");

    // the failure is on the record, not swallowed
    let txn = db.fetch_transaction(1).await.unwrap().expect("transaction record should exist");
    assert_eq!(txn.status, TransactionStatus::Failed);
    assert!(txn.error_message.as_deref().unwrap_or_default().contains("insufficient funds"));
}

#[tokio::test]
async fn a_hung_gateway_times_out_instead_of_leaving_the_record_pending() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::new(TestGatewayMode::Hang), &producers)
        .with_authorize_timeout(Duration::from_millis(100));

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let err = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::Gateway(_)));

    let txn = db.fetch_transaction(1).await.unwrap().expect("transaction record should exist");
    assert_eq!(txn.status, TransactionStatus::Failed);
    assert!(txn.error_message.as_deref().unwrap_or_default().contains("timed out"));
}

#[tokio::test]
async fn releasing_escrowed_funds_closes_the_need_and_notifies_the_provider_once() {
    let db = new_test_db().await;
    let (producers, recorded) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let (need, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    let gateway_ref = init.transaction.gateway_ref.clone().unwrap();
    escrow
        .handle_payment_callback(&TestGateway::callback_payload(&gateway_ref, CallbackOutcome::Success))
        .await
        .unwrap();

    // the provider can't release money to themselves
    let err = escrow.release_payment(init.transaction.id, PROVIDER, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let released = escrow
        .release_payment(init.transaction.id, BUYER, Some("great work, thanks".to_string()))
        .await
        .unwrap();
    assert_eq!(released.status, TransactionStatus::Released);
    assert!(released.released_at.is_some());
    assert_eq!(
        released.metadata_map().get("release_notes").and_then(|v| v.as_str()),
        Some("great work, thanks")
    );

    let need = db.fetch_need(need.id).await.unwrap().unwrap();
    assert_eq!(need.status, NeedStatus::Completed);

    // a repeat release is rejected and leaves the record unchanged
    let err = escrow.release_payment(released.id, BUYER, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let unchanged = db.fetch_transaction(released.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Released);
    assert_eq!(unchanged.released_at, released.released_at);

    settle().await;
    let events = recorded.released.lock().unwrap();
    assert_eq!(events.len(), 1, "the provider must be notified exactly once");
    assert_eq!(events[0].provider_id, PROVIDER);
}

#[tokio::test]
async fn releasing_requires_escrowed_funds() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::challenging(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();

    // still Processing: nothing captured, nothing to release
    let err = escrow.release_payment(init.transaction.id, BUYER, None).await.unwrap_err();
    match err {
        EngineError::Conflict(msg) => {
            assert!(msg.contains("Processing") && msg.contains("Completed"), "message should state expected vs found: {msg}");
        },
        other => panic!("expected a conflict error, got {other:?}"),
    }
}

#[tokio::test]
async fn refunding_cancels_the_need_and_notifies_both_parties() {
    let db = new_test_db().await;
    let (producers, recorded) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let (need, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    let gateway_ref = init.transaction.gateway_ref.clone().unwrap();
    escrow
        .handle_payment_callback(&TestGateway::callback_payload(&gateway_ref, CallbackOutcome::Success))
        .await
        .unwrap();

    // providers can't claw the money back, and a reason is mandatory
    let err = escrow.refund_payment(init.transaction.id, PROVIDER, "changed my mind").await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    let err = escrow.refund_payment(init.transaction.id, BUYER, "  ").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let refunded = escrow.refund_payment(init.transaction.id, BUYER, "service not delivered").await.unwrap();
    assert_eq!(refunded.status, TransactionStatus::Refunded);
    assert!(refunded.refunded_at.is_some());
    assert_eq!(
        refunded.metadata_map().get("refund_reason").and_then(|v| v.as_str()),
        Some("service not delivered")
    );

    let need = db.fetch_need(need.id).await.unwrap().unwrap();
    assert_eq!(need.status, NeedStatus::Cancelled);

    // releasing after a refund is a conflict; the escrow is gone
    let err = escrow.release_payment(refunded.id, BUYER, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    settle().await;
    let events = recorded.refunded.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].buyer_id, BUYER);
    assert_eq!(events[0].provider_id, PROVIDER);
    assert_eq!(events[0].reason, "service not delivered");
}

#[tokio::test]
async fn transaction_visibility_is_limited_to_its_parties() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    let id = init.transaction.id;

    assert!(escrow.can_user_access_transaction(id, BUYER).await.unwrap());
    assert!(escrow.can_user_access_transaction(id, PROVIDER).await.unwrap());
    assert!(!escrow.can_user_access_transaction(id, STRANGER).await.unwrap());
    assert!(!escrow.can_user_access_transaction(9999, BUYER).await.unwrap());

    let err = escrow.transaction_for_user(id, STRANGER).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    let txn = escrow.transaction_for_user(id, PROVIDER).await.unwrap();
    assert_eq!(txn.id, id);
}

#[tokio::test]
async fn the_reconciliation_sweep_cancels_abandoned_transactions() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::challenging(), &producers);

    let (_, offer) = seed_accepted_offer(&offers, BUYER, PROVIDER, Money::from_whole(300)).await;
    let init = escrow.initialize_payment(offer.id, BUYER, PaymentDetails::default()).await.unwrap();
    assert_eq!(init.transaction.status, TransactionStatus::Processing);

    // a cutoff in the future sweeps everything that is still in flight
    let swept = escrow.sweep_stale_payments(chrono::Duration::seconds(-60)).await.unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].id, init.transaction.id);
    assert_eq!(swept[0].status, TransactionStatus::Cancelled);

    // settled records are left alone on the next sweep
    let swept = escrow.sweep_stale_payments(chrono::Duration::seconds(-60)).await.unwrap();
    assert!(swept.is_empty());
}
