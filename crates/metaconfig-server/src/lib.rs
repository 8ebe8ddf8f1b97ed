//! Metaconfig server
//!
//! REST front end for a config repository: configuration loading, logging,
//! TLS and the HTTP routes. The binary in `main.rs` wires them together.

pub mod api;
pub mod model;
pub mod startup;
