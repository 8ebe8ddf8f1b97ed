//! Repository trait shared by every storage backend

use async_trait::async_trait;

use metaconfig_api::{Config, PageRequest, PageResponse};
use metaconfig_common::Result;

/// Storage of configs and their property trees
///
/// Failures are reported as `MetaConfigError::Operation` carrying the stable
/// message of the operation that failed.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Configs with the given names. Unknown names are skipped and an empty
    /// slice returns an empty result without touching storage.
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<Config>>;

    /// All config names in ascending order.
    async fn find_names(&self) -> Result<Vec<String>>;

    async fn find_by_page_request(&self, request: &PageRequest) -> Result<PageResponse>;

    /// Inserts configs with `id == 0` and updates the others.
    ///
    /// An update only applies when the incoming `updated` is newer than the
    /// stored one and the incoming version still matches; otherwise the config
    /// is left out of the result. Updated configs come first, then inserted
    /// ones, each in input order.
    async fn save_and_flush(&self, configs: Vec<Config>) -> Result<Vec<Config>>;

    /// Deletes configs by name with all their attributes and properties.
    /// Returns the number of deleted configs.
    async fn delete(&self, names: &[String]) -> Result<u64>;
}
