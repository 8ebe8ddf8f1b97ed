//! Metaconfig Client - config repository backed by a remote Metaconfig server
//!
//! [`WebConfigRepository`] implements the same repository contract as the
//! SQL and in-memory backends, so a `ConfigService` can run against a
//! remote server without any change.

pub mod http;
pub mod model;

pub use http::{WebClientConfig, WebConfigRepository};
pub use model::ApiResponse;
