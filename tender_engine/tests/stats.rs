//! The transaction stats aggregates, exercised across both roles of the same user.
mod support;

use support::*;
use tender_common::Money;
use tender_engine::{
    db_types::{NewTransaction, TransactionStatus},
    gateway::{CallbackOutcome, PaymentDetails},
    test_utils::TestGateway,
    traits::{InsertTransactionResult, TransactionManagement},
    EscrowApi,
    OfferFlowApi,
    SqliteDatabase,
};

const OTHER_BUYER: i64 = 50;

/// Runs an offer for `price` from `provider` against a fresh need of `buyer` all the way to escrow hold, and
/// returns the transaction id.
async fn escrowed_transaction(
    offers: &OfferFlowApi<SqliteDatabase>,
    escrow: &EscrowApi<SqliteDatabase, TestGateway>,
    buyer: i64,
    provider: i64,
    price: Money,
) -> i64 {
    let need = offers
        .create_need(tender_engine::db_types::NewNeed::new(buyer, "electrics"))
        .await
        .unwrap();
    let offer = offers
        .create_offer(tender_engine::db_types::NewOffer::new(need.id, provider, price, "Rewire the garage"))
        .await
        .unwrap();
    let offer = offers.accept_offer(offer.id, buyer).await.unwrap();
    let init = escrow.initialize_payment(offer.id, buyer, PaymentDetails::default()).await.unwrap();
    let gateway_ref = init.transaction.gateway_ref.clone().unwrap();
    escrow
        .handle_payment_callback(&TestGateway::callback_payload(&gateway_ref, CallbackOutcome::Success))
        .await
        .unwrap();
    init.transaction.id
}

#[tokio::test]
async fn stats_aggregate_across_both_roles() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    // As buyer: 1000 released
    let released = escrowed_transaction(&offers, &escrow, BUYER, PROVIDER, Money::from_cents(1_000)).await;
    escrow.release_payment(released, BUYER, None).await.unwrap();

    // As buyer: 2000 still pending (the gateway has not been called yet)
    let need = offers.create_need(tender_engine::db_types::NewNeed::new(BUYER, "roofing")).await.unwrap();
    let offer = offers
        .create_offer(tender_engine::db_types::NewOffer::new(
            need.id,
            8,
            Money::from_cents(2_000),
            "Replace the broken tiles",
        ))
        .await
        .unwrap();
    let offer = offers.accept_offer(offer.id, BUYER).await.unwrap();
    let pending = match db.create_transaction_for_offer(NewTransaction::for_offer(&offer, BUYER)).await.unwrap() {
        InsertTransactionResult::Inserted(t) => t,
        other => panic!("expected an inserted transaction, got {other:?}"),
    };
    assert_eq!(pending.status, TransactionStatus::Pending);

    // As buyer: 500 refunded
    let refunded = escrowed_transaction(&offers, &escrow, BUYER, 9, Money::from_cents(500)).await;
    escrow.refund_payment(refunded, BUYER, "service not delivered").await.unwrap();

    // As provider: 3000 released by another buyer
    let earned = escrowed_transaction(&offers, &escrow, OTHER_BUYER, BUYER, Money::from_cents(3_000)).await;
    escrow.release_payment(earned, OTHER_BUYER, None).await.unwrap();

    let stats = escrow.user_transaction_stats(BUYER).await.unwrap();
    assert_eq!(stats.total_transactions, 4);
    assert_eq!(stats.completed_transactions, 2);
    assert_eq!(stats.pending_transactions, 1);
    assert_eq!(stats.refunded_transactions, 1);
    assert_eq!(stats.total_spent, Money::from_cents(1_000));
    assert_eq!(stats.total_earned, Money::from_cents(3_000));
}

#[tokio::test]
async fn stats_for_an_uninvolved_user_are_empty() {
    let db = new_test_db().await;
    let (producers, _) = recording_producers().await;
    let offers = offer_api(&db, &producers);
    let escrow = escrow_api(&db, TestGateway::approving(), &producers);

    let released = escrowed_transaction(&offers, &escrow, BUYER, PROVIDER, Money::from_cents(1_000)).await;
    escrow.release_payment(released, BUYER, None).await.unwrap();

    let stats = escrow.user_transaction_stats(STRANGER).await.unwrap();
    assert_eq!(stats, Default::default());
}
