use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{db_url, needs, new_pool, offers, transactions, SqliteDatabaseError};
use crate::{
    db::traits::{
        CasOutcome,
        InsertTransactionResult,
        NeedManagement,
        OfferManagement,
        TransactionManagement,
    },
    db_types::{
        Need,
        NeedStatus,
        NewNeed,
        NewOffer,
        NewTransaction,
        Offer,
        OfferStatus,
        Transaction,
        TransactionStats,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the url from the environment (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e.as_database_error().map(|db| db.kind()), Some(sqlx::error::ErrorKind::UniqueViolation))
}

impl NeedManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_need(&self, need: NewNeed) -> Result<Need, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let need = needs::insert_need(need, &mut conn).await?;
        debug!("🗃️ Need #{} has been saved in the DB", need.id);
        Ok(need)
    }

    async fn fetch_need(&self, need_id: i64) -> Result<Option<Need>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        needs::fetch_need(need_id, &mut conn).await
    }

    async fn update_need_status(
        &self,
        need_id: i64,
        from: &[NeedStatus],
        to: NeedStatus,
    ) -> Result<CasOutcome<Need>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let changed = needs::update_need_status(need_id, from, to, &mut tx).await?;
        let need = needs::fetch_need(need_id, &mut tx).await?;
        tx.commit().await?;
        match (changed, need) {
            (_, None) => Ok(CasOutcome::NotFound),
            (0, Some(n)) => Ok(CasOutcome::Conflict(n)),
            (_, Some(n)) => Ok(CasOutcome::Applied(n)),
        }
    }

    async fn expire_overdue_needs(&self, now: DateTime<Utc>) -> Result<Vec<Need>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let overdue = needs::fetch_overdue_needs(now, &mut tx).await?;
        let mut expired = Vec::with_capacity(overdue.len());
        for need in overdue {
            let changed =
                needs::update_need_status(need.id, &[NeedStatus::Active], NeedStatus::Expired, &mut tx).await?;
            if changed > 0 {
                if let Some(n) = needs::fetch_need(need.id, &mut tx).await? {
                    expired.push(n);
                }
            }
        }
        tx.commit().await?;
        if !expired.is_empty() {
            info!("🗃️ {} overdue need(s) expired", expired.len());
        }
        Ok(expired)
    }
}

impl OfferManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let offer = offers::insert_offer(offer, &mut conn).await?;
        debug!("🗃️ Offer #{} has been saved in the DB", offer.id);
        Ok(offer)
    }

    async fn fetch_offer(&self, offer_id: i64) -> Result<Option<Offer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        offers::fetch_offer(offer_id, &mut conn).await
    }

    async fn fetch_offers_for_need(&self, need_id: i64) -> Result<Vec<Offer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        offers::fetch_offers_for_need(need_id, &mut conn).await
    }

    async fn update_offer_status(
        &self,
        offer_id: i64,
        from: OfferStatus,
        to: OfferStatus,
    ) -> Result<CasOutcome<Offer>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let changed = offers::update_offer_status(offer_id, from, to, &mut tx).await?;
        let offer = offers::fetch_offer(offer_id, &mut tx).await?;
        tx.commit().await?;
        match (changed, offer) {
            (_, None) => Ok(CasOutcome::NotFound),
            (0, Some(o)) => Ok(CasOutcome::Conflict(o)),
            (_, Some(o)) => Ok(CasOutcome::Applied(o)),
        }
    }
}

impl TransactionManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn create_transaction_for_offer(
        &self,
        txn: NewTransaction,
    ) -> Result<InsertTransactionResult, Self::Error> {
        let offer_id = txn.offer_id;
        let mut tx = self.pool.begin().await?;
        let offer = offers::fetch_offer(offer_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::OfferNotFound(offer_id))?;
        if offer.status != OfferStatus::Accepted {
            return Ok(InsertTransactionResult::OfferNotAccepted(offer.status));
        }
        if let Some(existing) = transactions::fetch_active_transaction_for_offer(offer_id, &mut tx).await? {
            return Ok(InsertTransactionResult::DuplicateActive(existing.id));
        }
        let inserted = match transactions::insert_transaction(txn, &mut tx).await {
            Ok(t) => t,
            // The partial unique index caught a writer that slipped in between our check and the insert
            Err(SqliteDatabaseError::DriverError(e)) if is_unique_violation(&e) => {
                drop(tx);
                let mut conn = self.pool.acquire().await?;
                return match transactions::fetch_active_transaction_for_offer(offer_id, &mut conn).await? {
                    Some(existing) => Ok(InsertTransactionResult::DuplicateActive(existing.id)),
                    None => Err(SqliteDatabaseError::DriverError(e)),
                };
            },
            Err(e) => return Err(e),
        };
        tx.commit().await?;
        debug!("🗃️ Transaction #{} opened for offer #{offer_id}", inserted.id);
        Ok(InsertTransactionResult::Inserted(inserted))
    }

    async fn fetch_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction(transaction_id, &mut conn).await
    }

    async fn fetch_transaction_by_gateway_ref(
        &self,
        gateway_ref: &str,
    ) -> Result<Option<Transaction>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction_by_gateway_ref(gateway_ref, &mut conn).await
    }

    async fn mark_transaction_processing(
        &self,
        transaction_id: i64,
        gateway_ref: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let changed = transactions::mark_processing(transaction_id, gateway_ref, &mut tx).await?;
        let txn = transactions::fetch_transaction(transaction_id, &mut tx).await?;
        tx.commit().await?;
        match (changed, txn) {
            (_, None) => Ok(CasOutcome::NotFound),
            (0, Some(t)) => Ok(CasOutcome::Conflict(t)),
            (_, Some(t)) => Ok(CasOutcome::Applied(t)),
        }
    }

    async fn complete_transaction(&self, transaction_id: i64) -> Result<CasOutcome<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(txn) = transactions::fetch_transaction(transaction_id, &mut tx).await? else {
            return Ok(CasOutcome::NotFound);
        };
        let changed = transactions::complete(transaction_id, &mut tx).await?;
        if changed == 0 {
            return Ok(CasOutcome::Conflict(txn));
        }
        // Escrow hold reached: the need moves out of the open-for-offers state
        needs::update_need_status_for_offer(txn.offer_id, &[NeedStatus::Active], NeedStatus::InProgress, &mut tx)
            .await?;
        let txn = transactions::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::TransactionNotFound(transaction_id))?;
        tx.commit().await?;
        debug!("🗃️ Transaction #{transaction_id} is now Completed. Funds are held in escrow.");
        Ok(CasOutcome::Applied(txn))
    }

    async fn fail_transaction(
        &self,
        transaction_id: i64,
        error_message: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let changed = transactions::fail(transaction_id, error_message, &mut tx).await?;
        let txn = transactions::fetch_transaction(transaction_id, &mut tx).await?;
        tx.commit().await?;
        match (changed, txn) {
            (_, None) => Ok(CasOutcome::NotFound),
            (0, Some(t)) => Ok(CasOutcome::Conflict(t)),
            (_, Some(t)) => {
                warn!("🗃️ Transaction #{transaction_id} marked as Failed: {error_message}");
                Ok(CasOutcome::Applied(t))
            },
        }
    }

    async fn release_transaction(
        &self,
        transaction_id: i64,
        notes: Option<&str>,
    ) -> Result<CasOutcome<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(txn) = transactions::fetch_transaction(transaction_id, &mut tx).await? else {
            return Ok(CasOutcome::NotFound);
        };
        let metadata = notes.map(|n| {
            let mut map = txn.metadata_map();
            map.insert("release_notes".to_string(), serde_json::Value::String(n.to_string()));
            serde_json::Value::Object(map).to_string()
        });
        let changed = transactions::release(transaction_id, metadata.as_deref(), &mut tx).await?;
        if changed == 0 {
            return Ok(CasOutcome::Conflict(txn));
        }
        needs::update_need_status_for_offer(
            txn.offer_id,
            &[NeedStatus::Active, NeedStatus::InProgress],
            NeedStatus::Completed,
            &mut tx,
        )
        .await?;
        let txn = transactions::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::TransactionNotFound(transaction_id))?;
        tx.commit().await?;
        debug!("🗃️ Transaction #{transaction_id} released. {} goes to provider {}", txn.amount, txn.provider_id);
        Ok(CasOutcome::Applied(txn))
    }

    async fn refund_transaction(
        &self,
        transaction_id: i64,
        reason: &str,
    ) -> Result<CasOutcome<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(txn) = transactions::fetch_transaction(transaction_id, &mut tx).await? else {
            return Ok(CasOutcome::NotFound);
        };
        let mut map = txn.metadata_map();
        map.insert("refund_reason".to_string(), serde_json::Value::String(reason.to_string()));
        let metadata = serde_json::Value::Object(map).to_string();
        let changed = transactions::refund(transaction_id, &metadata, &mut tx).await?;
        if changed == 0 {
            return Ok(CasOutcome::Conflict(txn));
        }
        needs::update_need_status_for_offer(
            txn.offer_id,
            &[NeedStatus::Active, NeedStatus::InProgress],
            NeedStatus::Cancelled,
            &mut tx,
        )
        .await?;
        let txn = transactions::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::TransactionNotFound(transaction_id))?;
        tx.commit().await?;
        debug!("🗃️ Transaction #{transaction_id} refunded. {} returns to buyer {}", txn.amount, txn.buyer_id);
        Ok(CasOutcome::Applied(txn))
    }

    async fn fetch_user_transaction_stats(&self, user_id: i64) -> Result<TransactionStats, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_stats_for_user(user_id, &mut conn).await
    }

    async fn sweep_stale_transactions(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let stale = transactions::fetch_stale_transactions(cutoff, &mut tx).await?;
        let mut swept = Vec::with_capacity(stale.len());
        for txn in stale {
            let changed =
                transactions::cancel(txn.id, "Abandoned by payer; cancelled by reconciliation", &mut tx).await?;
            if changed > 0 {
                if let Some(t) = transactions::fetch_transaction(txn.id, &mut tx).await? {
                    swept.push(t);
                }
            }
        }
        tx.commit().await?;
        if !swept.is_empty() {
            info!("🗃️ Reconciliation swept {} stale transaction(s)", swept.len());
        }
        Ok(swept)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}
