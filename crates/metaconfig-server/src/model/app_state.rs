//! Shared state handed to every HTTP handler

use std::sync::Arc;

use metaconfig_core::ConfigService;

pub struct AppState {
    pub config_service: Arc<ConfigService>,
}

impl AppState {
    pub fn new(config_service: Arc<ConfigService>) -> Self {
        Self { config_service }
    }
}
