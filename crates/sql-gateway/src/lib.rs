//! SQL gateway — accepts a JSON statement over HTTP, gates it through a
//! keyword allow-list / deny-list, and runs it against a named database
//! binding.
//!
//! # Modules
//!
//! - [`routes`] — HTTP endpoints (query pipeline, health, metrics)
//! - [`gate`] — statement gating rules
//! - [`payload`] — request body parsing
//! - [`db`] — the [`QueryExecutor`](db::QueryExecutor) seam and its SQLite implementation
//! - [`bindings`] — name → executor table resolved per request
//! - [`cors`] — CORS header policy
//! - [`config`] — environment configuration

pub mod bindings;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod payload;
pub mod routes;
pub mod security;
pub mod state;

pub use bindings::BindingTable;
pub use config::GatewayConfig;
pub use db::{QueryExecutor, SqliteExecutor};
pub use error::{ErrorKind, GatewayError};
pub use state::AppState;
