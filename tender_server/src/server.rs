use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use tender_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    run_migrations,
    EscrowApi,
    OfferFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    reconciler::start_reconciliation_worker,
    routes,
    sandbox::SandboxGateway,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    run_migrations(db.pool()).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(32, notifier_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _reconciler = start_reconciliation_worker(db.clone(), producers.clone(), &config);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let gateway = SandboxGateway::new(config.sandbox_challenge);
        let offers_api = OfferFlowApi::new(db.clone(), producers.clone());
        let payments_api = EscrowApi::new(db.clone(), gateway, producers.clone())
            .with_authorize_timeout(config.authorize_timeout);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tender::access_log"))
            .app_data(web::Data::new(offers_api))
            .app_data(web::Data::new(payments_api))
            .configure(configure_routes)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers every route. `/payments/stats` must come before `/payments/{id}` so the literal segment wins.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::health)
        .service(routes::create_need)
        .service(routes::get_need)
        .service(routes::offers_for_need)
        .service(routes::create_offer)
        .service(routes::get_offer)
        .service(routes::accept_offer)
        .service(routes::reject_offer)
        .service(routes::withdraw_offer)
        .service(routes::initialize_payment)
        .service(routes::payment_callback)
        .service(routes::my_stats)
        .service(routes::get_payment)
        .service(routes::release_payment)
        .service(routes::refund_payment);
}

/// Wires the delivery stubs for user-facing notifications. Delivery mechanics (push, email, SMS) belong to the
/// notification service; these hooks are where its client gets called, and for now they log what it would send.
pub fn notifier_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_new_offer(|ev| {
        Box::pin(async move {
            info!("🔔️ Notify buyer {}: new offer #{} on need #{}", ev.buyer_id, ev.offer.id, ev.offer.need_id);
        })
    });
    hooks.on_offer_decided(|ev| {
        Box::pin(async move {
            let reason = ev.reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
            info!(
                "🔔️ Notify provider {}: offer #{} is now {}{reason}",
                ev.provider_id, ev.offer.id, ev.decision
            );
        })
    });
    hooks.on_payment_released(|ev| {
        Box::pin(async move {
            info!(
                "🔔️ Notify provider {}: payment of {} {} released on transaction #{}",
                ev.provider_id, ev.transaction.amount, ev.transaction.currency, ev.transaction.id
            );
        })
    });
    hooks.on_payment_refunded(|ev| {
        Box::pin(async move {
            info!(
                "🔔️ Notify buyer {} and provider {}: transaction #{} refunded ({})",
                ev.buyer_id, ev.provider_id, ev.transaction.id, ev.reason
            );
        })
    });
    hooks
}
