pub mod http;
pub mod logging;

use std::sync::Arc;

use tracing::info;

use metaconfig_persistence::{ConfigRepository, DbConfigRepository, MemoryConfigRepository};

use crate::model::config::{Configuration, StorageMode};

pub use http::config_server;
pub use logging::{LoggingConfig, LoggingGuard, init_logging};

/// The repository selected by `storage.mode`
pub async fn config_repository(
    configuration: &Configuration,
) -> anyhow::Result<Arc<dyn ConfigRepository>> {
    let mode = configuration.storage_mode()?;
    info!("Storage mode: {}", mode);

    let repository: Arc<dyn ConfigRepository> = match mode {
        StorageMode::Memory => Arc::new(MemoryConfigRepository::new()),
        StorageMode::Db => {
            let db = configuration.database_connection().await?;
            Arc::new(DbConfigRepository::with_mapping(db, configuration.table_mapping()).await?)
        }
    };

    Ok(repository)
}
