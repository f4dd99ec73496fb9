//! # Runtime
//!
//! - `initialization`: process setup and dependency wiring
//! - `watch_loop`: the kube-runtime controller loop
//! - `error_policy`: backoff for failed reconciliations and watch errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
