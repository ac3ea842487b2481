//! # credvault-server
//!
//! HTTP API over the credvault credential store.

pub mod api;
mod server;

pub use api::{router, AppState};
pub use server::ApiServer;
