//! Authorization predicates.
//!
//! Pure functions resolving "does user X have role Y with respect to entity Z". No I/O and no mutation, so the
//! rules can be unit-tested without a database and reused by both the engine APIs and external controllers.

use crate::db_types::{Need, NeedStatus, Offer, Transaction};

/// A provider may offer on a need that is open for offers and that they don't own themselves.
pub fn can_provider_create_offer(need: &Need, provider_id: i64) -> bool {
    need.buyer_id != provider_id && need.status == NeedStatus::Active
}

/// Accepting and rejecting an offer belongs to the buyer who owns the need it was made against.
pub fn can_buyer_manage_offer(need: &Need, user_id: i64) -> bool {
    need.buyer_id == user_id
}

/// Withdrawing an offer belongs to the provider who made it.
pub fn can_provider_manage_offer(offer: &Offer, user_id: i64) -> bool {
    offer.provider_id == user_id
}

/// A transaction is visible to exactly its buyer and its provider.
pub fn can_user_access_transaction(txn: &Transaction, user_id: i64) -> bool {
    txn.buyer_id == user_id || txn.provider_id == user_id
}

/// Releasing or refunding escrowed funds belongs to the buyer who paid them in.
pub fn can_buyer_settle_transaction(txn: &Transaction, user_id: i64) -> bool {
    txn.buyer_id == user_id
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use tender_common::Money;

    use super::*;
    use crate::db_types::{OfferStatus, TransactionStatus};

    fn need(buyer_id: i64, status: NeedStatus) -> Need {
        Need {
            id: 1,
            buyer_id,
            category: "plumbing".to_string(),
            budget_min: None,
            budget_max: Some(Money::from_whole(500)),
            currency: "USD".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
        }
    }

    fn offer(provider_id: i64) -> Offer {
        Offer {
            id: 10,
            need_id: 1,
            provider_id,
            price: Money::from_whole(300),
            currency: "USD".to_string(),
            delivery_days: 5,
            description: "Fix the lot".to_string(),
            status: OfferStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn txn(buyer_id: i64, provider_id: i64) -> Transaction {
        Transaction {
            id: 100,
            offer_id: 10,
            buyer_id,
            provider_id,
            amount: Money::from_whole(300),
            currency: "USD".to_string(),
            status: TransactionStatus::Completed,
            gateway_ref: None,
            error_message: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            released_at: None,
            refunded_at: None,
        }
    }

    #[test]
    fn buyers_may_not_offer_on_their_own_needs() {
        let n = need(42, NeedStatus::Active);
        assert!(!can_provider_create_offer(&n, 42));
        assert!(can_provider_create_offer(&n, 7));
    }

    #[test]
    fn closed_needs_accept_no_offers() {
        for status in [NeedStatus::InProgress, NeedStatus::Completed, NeedStatus::Cancelled, NeedStatus::Expired] {
            assert!(!can_provider_create_offer(&need(42, status), 7));
        }
    }

    #[test]
    fn only_the_need_owner_manages_its_offers() {
        let n = need(42, NeedStatus::Active);
        assert!(can_buyer_manage_offer(&n, 42));
        assert!(!can_buyer_manage_offer(&n, 7));
    }

    #[test]
    fn only_the_offer_owner_withdraws() {
        let o = offer(7);
        assert!(can_provider_manage_offer(&o, 7));
        assert!(!can_provider_manage_offer(&o, 42));
    }

    #[test]
    fn transaction_access_is_limited_to_its_parties() {
        let t = txn(42, 7);
        assert!(can_user_access_transaction(&t, 42));
        assert!(can_user_access_transaction(&t, 7));
        assert!(!can_user_access_transaction(&t, 99));
    }

    #[test]
    fn settlement_is_buyer_only() {
        let t = txn(42, 7);
        assert!(can_buyer_settle_transaction(&t, 42));
        assert!(!can_buyer_settle_transaction(&t, 7));
    }
}
