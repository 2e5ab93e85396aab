//! # Marketplace engine public API
//!
//! The `api` module exposes the programmatic API for the offer and escrow engine. The API is modular:
//!
//! * [`offer_flow_api`] is the offer lifecycle manager: submitting offers against a need and deciding them
//!   (accept / reject / withdraw).
//! * [`escrow_api`] is the escrow transaction engine: initializing a payment against an accepted offer, handling
//!   the gateway callback, and releasing or refunding escrowed funds.
//! * [`access`] holds the pure authorization predicates shared by both managers and by external controllers.
//!
//! The pattern for using the APIs is the same throughout: an API instance is created by supplying a database
//! backend that implements the backend traits the API requires (and, for the escrow engine, a payment gateway
//! adapter).
//!
//! ```rust,ignore
//! use tender_engine::{EscrowApi, OfferFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/tender.db", 10).await?;
//! let offers = OfferFlowApi::new(db.clone(), producers.clone());
//! let escrow = EscrowApi::new(db, my_gateway, producers);
//! ```

pub mod access;
pub mod errors;
pub mod escrow_api;
pub mod offer_flow_api;
pub mod payment_objects;
