//! HTTP server setup

use std::{net::TcpListener, sync::Arc};

use actix_web::{
    App, HttpServer,
    dev::Server,
    middleware::{Compress, Logger},
    web,
};
use rustls::ServerConfig;

use crate::{api, model::app_state::AppState};

/// Creates the config HTTP server on an already bound listener.
///
/// Serves HTTPS when a TLS configuration is given.
pub fn config_server(
    app_state: Arc<AppState>,
    context_path: String,
    listener: TcpListener,
    tls: Option<ServerConfig>,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Compress::default())
            .app_data(web::Data::from(app_state.clone()))
            .service(api::routes(&context_path))
    });

    let server = match tls {
        Some(tls) => server.listen_rustls_0_23(listener, tls)?,
        None => server.listen(listener)?,
    };

    Ok(server.run())
}
