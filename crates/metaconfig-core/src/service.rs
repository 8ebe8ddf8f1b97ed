// Config service
// Thin facade over a repository plus the consumer registry used by `accept`

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use metaconfig_api::{Config, PageRequest, PageResponse};
use metaconfig_common::Result;
use metaconfig_persistence::ConfigRepository;

/// Callback notified with the current state of a config
pub type ConfigConsumer = Arc<dyn Fn(&Config) + Send + Sync>;

pub struct ConfigService {
    repository: Arc<dyn ConfigRepository>,
    consumers: RwLock<Vec<ConfigConsumer>>,
}

impl ConfigService {
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Self {
            repository,
            consumers: RwLock::new(Vec::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ConfigRepository> {
        &self.repository
    }

    /// Saves the configs; see [`ConfigRepository::save_and_flush`] for which
    /// of them come back.
    pub async fn update(&self, configs: Vec<Config>) -> Result<Vec<Config>> {
        let requested = configs.len();
        let saved = self.repository.save_and_flush(configs).await?;
        info!(requested, saved = saved.len(), "Updated configs");
        Ok(saved)
    }

    pub async fn names(&self) -> Result<Vec<String>> {
        self.repository.find_names().await
    }

    pub async fn names_by_page(&self, request: &PageRequest) -> Result<PageResponse> {
        self.repository.find_by_page_request(request).await
    }

    /// Every stored config.
    pub async fn get_all(&self) -> Result<Vec<Config>> {
        let names = self.repository.find_names().await?;
        self.repository.find_by_names(&names).await
    }

    pub async fn get(&self, names: &[String]) -> Result<Vec<Config>> {
        self.repository.find_by_names(names).await
    }

    pub async fn get_one(&self, name: &str) -> Result<Option<Config>> {
        let mut configs = self.repository.find_by_names(&[name.to_string()]).await?;
        Ok(configs.pop())
    }

    pub async fn remove(&self, names: &[String]) -> Result<u64> {
        let deleted = self.repository.delete(names).await?;
        info!(deleted, "Removed configs");
        Ok(deleted)
    }

    /// Hands the current state of each named config to every consumer.
    ///
    /// Unknown names are skipped. Returns the number of configs delivered.
    pub async fn accept(&self, names: &[String]) -> Result<usize> {
        let consumers = self.consumers.read().clone();
        if consumers.is_empty() {
            debug!("No config consumers registered");
            return Ok(0);
        }

        let configs = self.repository.find_by_names(names).await?;
        for config in &configs {
            for consumer in &consumers {
                consumer(config);
            }
        }

        debug!(
            configs = configs.len(),
            consumers = consumers.len(),
            "Accepted configs"
        );
        Ok(configs.len())
    }

    pub fn add_consumer<F>(&self, consumer: F)
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        self.consumers.write().push(Arc::new(consumer));
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }
}
