//! Tender Engine
//!
//! Tender is a reverse marketplace: buyers publish *needs*, providers bid on them with *offers*, one offer is
//! accepted, and payment moves through an escrow cycle before the need is closed. This library contains the core
//! logic for the offer lifecycle and the escrow payment engine. It is storage- and gateway-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Ledger management and control ([`mod@db`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public API instead. The exception is the data types used in the
//!    ledger, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@api`]): the offer lifecycle manager ([`OfferFlowApi`]) and the escrow
//!    transaction engine ([`EscrowApi`]). Backends need to implement the traits in [`traits`] to support these
//!    APIs; payment gateway integrations implement [`gateway::PaymentGateway`].
//! 3. A set of events that can be subscribed to ([`mod@events`]). Events are emitted when offers arrive or are
//!    decided and when escrowed funds are released or refunded. A simple hook framework lets the notification
//!    service react to these events without the engine ever depending on delivery succeeding.
mod api;
mod db;

pub mod db_types;
pub mod events;
pub mod gateway;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{run_migrations, SqliteDatabase, SqliteDatabaseError};
pub use api::{
    access,
    errors::EngineError,
    escrow_api::{EscrowApi, DEFAULT_AUTHORIZE_TIMEOUT},
    offer_flow_api::OfferFlowApi,
    payment_objects::PaymentInitResult,
};
pub use db::traits;
