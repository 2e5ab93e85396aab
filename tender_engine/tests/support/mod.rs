//! Shared scaffolding for the engine integration tests: a migrated throwaway database, APIs wired to the
//! scripted test gateway, and event hooks that record what the notifier would have been told.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tender_common::Money;
use tender_engine::{
    db_types::{Need, NewNeed, NewOffer, Offer},
    events::{
        EventHandlers,
        EventHooks,
        EventProducers,
        NewOfferEvent,
        OfferDecidedEvent,
        PaymentRefundedEvent,
        PaymentReleasedEvent,
    },
    test_utils::{prepare_env::prepare_test_env, prepare_env::random_db_path, TestGateway},
    EscrowApi,
    OfferFlowApi,
    SqliteDatabase,
};

pub const BUYER: i64 = 42;
pub const PROVIDER: i64 = 7;
pub const STRANGER: i64 = 99;

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

/// Everything the notifier hooks saw, in arrival order.
#[derive(Default, Clone)]
pub struct RecordedEvents {
    pub new_offers: Arc<Mutex<Vec<NewOfferEvent>>>,
    pub decided: Arc<Mutex<Vec<OfferDecidedEvent>>>,
    pub released: Arc<Mutex<Vec<PaymentReleasedEvent>>>,
    pub refunded: Arc<Mutex<Vec<PaymentRefundedEvent>>>,
}

/// Wires recording hooks into a fresh handler set and starts the handler tasks. Delivery is async; tests should
/// call [`settle`] before asserting on the recordings.
pub async fn recording_producers() -> (EventProducers, RecordedEvents) {
    let recorded = RecordedEvents::default();
    let mut hooks = EventHooks::default();
    let sink = recorded.new_offers.clone();
    hooks.on_new_offer(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        })
    });
    let sink = recorded.decided.clone();
    hooks.on_offer_decided(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        })
    });
    let sink = recorded.released.clone();
    hooks.on_payment_released(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        })
    });
    let sink = recorded.refunded.clone();
    hooks.on_payment_refunded(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    (producers, recorded)
}

/// Gives the spawned event handler tasks a beat to drain their queues.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}

pub fn offer_api(db: &SqliteDatabase, producers: &EventProducers) -> OfferFlowApi<SqliteDatabase> {
    OfferFlowApi::new(db.clone(), producers.clone())
}

pub fn escrow_api(
    db: &SqliteDatabase,
    gateway: TestGateway,
    producers: &EventProducers,
) -> EscrowApi<SqliteDatabase, TestGateway> {
    EscrowApi::new(db.clone(), gateway, producers.clone())
}

pub async fn seed_need(api: &OfferFlowApi<SqliteDatabase>, buyer_id: i64) -> Need {
    api.create_need(
        NewNeed::new(buyer_id, "plumbing").with_budget(Money::from_whole(50), Money::from_whole(800)),
    )
    .await
    .expect("Error seeding need")
}

pub async fn seed_offer(
    api: &OfferFlowApi<SqliteDatabase>,
    need: &Need,
    provider_id: i64,
    price: Money,
) -> Offer {
    api.create_offer(NewOffer::new(need.id, provider_id, price, "Fix the kitchen sink and retile"))
        .await
        .expect("Error seeding offer")
}

/// Seeds a need and an offer, and has the buyer accept it. The usual starting point for escrow tests.
pub async fn seed_accepted_offer(
    api: &OfferFlowApi<SqliteDatabase>,
    buyer_id: i64,
    provider_id: i64,
    price: Money,
) -> (Need, Offer) {
    let need = seed_need(api, buyer_id).await;
    let offer = seed_offer(api, &need, provider_id, price).await;
    let offer = api.accept_offer(offer.id, buyer_id).await.expect("Error accepting seeded offer");
    (need, offer)
}
