//! GCS client implementation
//!
//! - **REST Client**: GCS JSON API v1 over reqwest

pub mod common;
pub mod rest;

pub use rest::{GcsAuth, GcsREST};
