//! HTTP gateway layer for the tri-tier routing core.
//!
//! Wires [`triroute`] (fingerprinting, caching, classification, provider
//! adapters, usage aggregation) into an `axum` server: one routing entry
//! point at `POST /v1/chat/completions` plus three read-only status routes,
//! all behind a shared bearer-token gate.

pub mod auth;
pub mod error;
pub mod handler;
pub mod router;
pub mod state;

pub use error::RouterError;
pub use router::create_router;
pub use state::AppState;
