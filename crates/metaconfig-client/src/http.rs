//! HTTP config repository
//!
//! Calls the Metaconfig REST API and unwraps its `{code, message, data}`
//! envelope. Transport failures, non-2xx statuses and non-zero codes
//! surface as `MetaConfigError::Remote`; an undecodable body as
//! `MetaConfigError::Serialization`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use metaconfig_api::{Config, PageRequest, PageResponse};
use metaconfig_common::{
    DELETE_CONFIGS, MetaConfigError, RECEIVE_CONFIG_NAMES, RECEIVE_CONFIGS, RECEIVE_PAGE_RESPONSE,
    Result, SAVE_CONFIGS, encode_names,
};
use metaconfig_persistence::ConfigRepository;

use crate::model::ApiResponse;

pub const DEFAULT_CONTEXT_PATH: &str = "/api/metacfg";

/// Configuration for the HTTP repository
#[derive(Clone, Debug)]
pub struct WebClientConfig {
    /// Server address, e.g. `https://127.0.0.1:8000`
    pub server_addr: String,
    pub context_path: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Skip certificate verification, for servers with self-signed certificates
    pub accept_invalid_certs: bool,
}

impl Default for WebClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "http://127.0.0.1:8000".to_string(),
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
            accept_invalid_certs: false,
        }
    }
}

impl WebClientConfig {
    pub fn new(server_addr: &str) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            ..Default::default()
        }
    }

    pub fn with_context_path(mut self, path: &str) -> Self {
        self.context_path = path.to_string();
        self
    }

    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Config repository talking to a remote Metaconfig server
pub struct WebConfigRepository {
    client: Client,
    config: WebClientConfig,
}

impl WebConfigRepository {
    pub fn new(config: WebClientConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!(
                server = %config.server_addr,
                "Certificate verification is disabled for the config server"
            );
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| MetaConfigError::Remote(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebClientConfig {
        &self.config
    }

    /// Notifies the server's consumers with the current state of the configs.
    pub async fn accept(&self, names: &[String]) -> Result<bool> {
        let url = self.build_url("/accept_config");
        self.send(self.client.post(&url).json(names)).await
    }

    /// Build full URL with context path
    fn build_url(&self, path: &str) -> String {
        let base_url = self.config.server_addr.trim_end_matches('/');
        let context_path = self.config.context_path.trim_matches('/');

        if context_path.is_empty() {
            format!("{}{}", base_url, path)
        } else {
            format!("{}/{}{}", base_url, context_path, path)
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| MetaConfigError::Remote(e.to_string()))?;

        let status = response.status();
        debug!(url = %response.url(), %status, "Config server responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .map(|r| r.message)
                .unwrap_or(body);
            return Err(MetaConfigError::Remote(format!(
                "request failed with status {}: {}",
                status, message
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MetaConfigError::Remote(e.to_string()))?;

        ApiResponse::<T>::from_slice(&body)?.into_data()
    }
}

#[async_trait]
impl ConfigRepository for WebConfigRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<Config>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let names =
            encode_names(names).map_err(|e| MetaConfigError::operation(RECEIVE_CONFIGS, e))?;
        let url = self.build_url("/configs");
        self.send(self.client.get(&url).query(&[("names", names)]))
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_CONFIGS, e))
    }

    async fn find_names(&self) -> Result<Vec<String>> {
        let url = self.build_url("/config_names");
        self.send(self.client.get(&url))
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_CONFIG_NAMES, e))
    }

    async fn find_by_page_request(&self, request: &PageRequest) -> Result<PageResponse> {
        let url = self.build_url("/config_names_by_page_request");
        self.send(self.client.post(&url).json(request))
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_PAGE_RESPONSE, e))
    }

    async fn save_and_flush(&self, configs: Vec<Config>) -> Result<Vec<Config>> {
        if configs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.build_url("/configs");
        self.send(self.client.put(&url).json(&configs))
            .await
            .map_err(|e| MetaConfigError::operation(SAVE_CONFIGS, e))
    }

    async fn delete(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let url = self.build_url("/configs");
        self.send(self.client.delete(&url).json(names))
            .await
            .map_err(|e| MetaConfigError::operation(DELETE_CONFIGS, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = WebClientConfig::default();
        assert_eq!(config.context_path, "/api/metacfg");
        assert_eq!(config.connect_timeout_ms, 5000);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_build_url() {
        let repository =
            WebConfigRepository::new(WebClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(
            repository.build_url("/configs"),
            "http://localhost:8000/api/metacfg/configs"
        );

        let repository = WebConfigRepository::new(
            WebClientConfig::new("http://localhost:8000").with_context_path(""),
        )
        .unwrap();
        assert_eq!(repository.build_url("/ping"), "http://localhost:8000/ping");
    }

    #[tokio::test]
    async fn test_empty_input_does_not_call_server() {
        let repository =
            WebConfigRepository::new(WebClientConfig::new("http://127.0.0.1:1")).unwrap();

        assert!(repository.find_by_names(&[]).await.unwrap().is_empty());
        assert!(repository.save_and_flush(Vec::new()).await.unwrap().is_empty());
        assert_eq!(repository.delete(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let repository = WebConfigRepository::new(
            WebClientConfig::new("http://127.0.0.1:1").with_timeouts(500, 500),
        )
        .unwrap();

        let error = repository.find_names().await.unwrap_err();
        assert!(error.to_string().starts_with("failed to receive config names"));
        assert!(matches!(error.root(), MetaConfigError::Remote(_)));
    }
}
