use log::*;
use tender_engine::{db_types::Transaction, events::EventProducers, EscrowApi, OfferFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::{config::ServerConfig, sandbox::SandboxGateway};

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Payments whose challenge the buyer never completed would otherwise sit in `Processing` forever; the sweep
/// cancels anything that has been in flight longer than the configured window. The same pass expires needs
/// whose deadline lapsed without being fulfilled.
pub fn start_reconciliation_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    config: &ServerConfig,
) -> JoinHandle<()> {
    let stale_timeout = config.stale_payment_timeout;
    let interval = config.sweep_interval;
    let gateway = SandboxGateway::new(config.sandbox_challenge);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let offers_api = OfferFlowApi::new(db.clone(), producers.clone());
        let api = EscrowApi::new(db, gateway, producers);
        info!("🕰️ Stale payment reconciliation worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running stale payment sweep");
            match api.sweep_stale_payments(stale_timeout).await {
                Ok(swept) if swept.is_empty() => debug!("🕰️ No stale payments to sweep"),
                Ok(swept) => {
                    info!("🕰️ {} stale payment(s) cancelled", swept.len());
                    debug!("🕰️ Swept: {}", txn_list(&swept));
                },
                Err(e) => {
                    error!("🕰️ Error running stale payment sweep: {e}");
                },
            }
            match offers_api.expire_overdue_needs().await {
                Ok(expired) if expired.is_empty() => debug!("🕰️ No overdue needs to expire"),
                Ok(expired) => info!("🕰️ {} overdue need(s) expired", expired.len()),
                Err(e) => {
                    error!("🕰️ Error expiring overdue needs: {e}");
                },
            }
        }
    })
}

fn txn_list(txns: &[Transaction]) -> String {
    txns.iter()
        .map(|t| format!("[{}] offer #{} {} {}", t.id, t.offer_id, t.amount, t.currency))
        .collect::<Vec<String>>()
        .join(", ")
}
