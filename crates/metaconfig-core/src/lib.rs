//! Metaconfig Core - service layer on top of a config repository
//!
//! The [`ConfigService`] is what the HTTP layer and embedding applications
//! talk to. It delegates storage to any [`ConfigRepository`] backend and
//! fans out config state to registered consumers on request.

pub mod service;

pub use service::{ConfigConsumer, ConfigService};

pub use metaconfig_persistence::ConfigRepository;
