//! REST API of the Metaconfig server

pub mod config;

use actix_web::{Scope, error::InternalError, web};

use crate::model::response::bad_request;

/// Maximum accepted JSON body
const JSON_LIMIT: usize = 4 * 1024 * 1024;

/// All endpoints below the given context path
pub fn routes(context_path: &str) -> Scope {
    web::scope(context_path)
        .app_data(json_config())
        .app_data(query_config())
        .service(config::ping)
        .service(config::config_names)
        .service(config::config_names_by_page_request)
        .service(config::get_configs)
        .service(config::update_configs)
        .service(config::delete_configs)
        .service(config::accept_config)
}

/// Malformed bodies are answered with the regular error envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let response = bad_request(err.to_string());
            InternalError::from_response(err, response).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        InternalError::from_response(err, response).into()
    })
}
