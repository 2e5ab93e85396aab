//! The Tender marketplace server.
//!
//! A thin actix-web surface over [`tender_engine`]: request handlers map one-to-one onto the engine's offer
//! lifecycle and escrow operations, identity arrives as a gateway-injected header (authentication itself is
//! handled upstream), and engine errors are translated onto HTTP statuses. The server also runs the
//! reconciliation worker that sweeps abandoned payments.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod reconciler;
pub mod routes;
pub mod sandbox;
pub mod server;
