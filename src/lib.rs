//! Blossom Honey API gateway.
//!
//! Configures the HTTP surface of the web store: origin admission, body
//! and cookie decoding, the liveness probe, and the route table that
//! hands each `/api/...` prefix to its business-domain collaborator.

pub mod body;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
