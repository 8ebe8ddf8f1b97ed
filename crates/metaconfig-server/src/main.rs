//! Main entry point for the Metaconfig server.

use std::{net::TcpListener, sync::Arc};

use anyhow::Context;
use tracing::{error, info};

use metaconfig_core::ConfigService;
use metaconfig_server::{
    model::{app_state::AppState, config::Configuration, tls::validate_tls_config},
    startup,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let tls_config = configuration.tls_config();
    let tls = if tls_config.enabled {
        let validation = validate_tls_config(&tls_config);
        if !validation.valid {
            for message in &validation.errors {
                error!("{}", message);
            }
            anyhow::bail!("invalid TLS configuration");
        }
        Some(tls_config.server_config()?)
    } else {
        None
    };

    let repository = startup::config_repository(&configuration).await?;
    let config_service = Arc::new(ConfigService::new(repository));
    let app_state = Arc::new(AppState::new(config_service));

    let address = configuration.server_address();
    let port = configuration.server_port();
    let context_path = configuration.server_context_path();
    let listener = TcpListener::bind((address.as_str(), port))
        .with_context(|| format!("failed to bind {}:{}", address, port))?;

    info!(
        address = %address,
        port,
        context_path = %context_path,
        tls = tls.is_some(),
        "Starting Metaconfig server"
    );

    startup::config_server(app_state, context_path, listener, tls)?.await?;

    info!("Metaconfig server stopped");
    Ok(())
}
