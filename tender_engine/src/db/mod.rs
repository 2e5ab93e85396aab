//! # Ledger storage management and control.
//!
//! This module provides the interfaces that define the contracts of the marketplace ledger *backends*.
//!
//! ## Records
//! The ledger stores three record types: needs, offers, and transactions. Needs and offers are mutated only
//! through the offer lifecycle manager; transactions only through the escrow engine. Every status change goes
//! through a compare-and-swap update so that two racing requests can never both win the same transition.
//!
//! ## Traits
//! * [`traits::NeedManagement`] covers need records and their status transitions.
//! * [`traits::OfferManagement`] covers offer records and their status transitions.
//! * [`traits::TransactionManagement`] covers the escrow transaction records, the per-offer active-transaction
//!   constraint, settlement, and aggregate queries.
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
