//! # Configuration
//!
//! Operator settings read from the environment at startup.
//!
//! - `controller.rs` - reconciliation, backoff, watch and GCS endpoint settings
//! - `server.rs` - metrics/probe HTTP server settings

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
