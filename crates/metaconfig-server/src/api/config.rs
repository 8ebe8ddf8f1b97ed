//! Config API handlers
//!
//! - GET    /ping
//! - GET    /config_names
//! - POST   /config_names_by_page_request
//! - GET    /configs?names=<Base64 JSON array>
//! - PUT    /configs
//! - DELETE /configs
//! - POST   /accept_config

use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use metaconfig_api::{Config, PageRequest};
use metaconfig_common::{MetaConfigError, RECEIVE_CONFIGS, decode_names};

use crate::model::{
    app_state::AppState,
    response::{Result, respond},
};

#[derive(Debug, Default, Deserialize)]
pub struct ConfigsParam {
    /// Base64 encoded JSON array of config names; absent means every config
    pub names: Option<String>,
}

#[get("/ping")]
pub async fn ping() -> impl Responder {
    Result::<()>::http_success(json!({ "status": "ok" }))
}

#[get("/config_names")]
pub async fn config_names(data: web::Data<AppState>) -> impl Responder {
    respond(data.config_service.names().await)
}

#[post("/config_names_by_page_request")]
pub async fn config_names_by_page_request(
    data: web::Data<AppState>,
    request: web::Json<PageRequest>,
) -> impl Responder {
    respond(data.config_service.names_by_page(&request).await)
}

#[get("/configs")]
pub async fn get_configs(
    data: web::Data<AppState>,
    params: web::Query<ConfigsParam>,
) -> impl Responder {
    let result = match params.names.as_deref().map(decode_names) {
        Some(Ok(names)) => data.config_service.get(&names).await,
        Some(Err(e)) => Err(MetaConfigError::operation(RECEIVE_CONFIGS, e)),
        None => data.config_service.get_all().await,
    };
    respond(result)
}

#[put("/configs")]
pub async fn update_configs(
    data: web::Data<AppState>,
    configs: web::Json<Vec<Config>>,
) -> impl Responder {
    let configs = configs.into_inner();
    info!(count = configs.len(), "Updating configs");
    respond(data.config_service.update(configs).await)
}

#[delete("/configs")]
pub async fn delete_configs(
    data: web::Data<AppState>,
    names: web::Json<Vec<String>>,
) -> impl Responder {
    info!(names = ?names, "Deleting configs");
    respond(data.config_service.remove(&names).await)
}

#[post("/accept_config")]
pub async fn accept_config(
    data: web::Data<AppState>,
    names: web::Json<Vec<String>>,
) -> HttpResponse {
    respond(data.config_service.accept(&names).await.map(|_| true))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use metaconfig_api::Property;
    use metaconfig_common::encode_names;
    use metaconfig_core::ConfigService;
    use metaconfig_persistence::MemoryConfigRepository;

    use super::*;
    use crate::api::routes;

    const CONTEXT_PATH: &str = "/api/metacfg";

    fn app_state() -> web::Data<AppState> {
        let service = ConfigService::new(Arc::new(MemoryConfigRepository::new()));
        web::Data::new(AppState::new(Arc::new(service)))
    }

    fn config(name: &str) -> Config {
        Config::new(name)
            .unwrap()
            .with_attribute("env", "dev")
            .with_property(Property::long("port", 8080).unwrap())
    }

    /// Percent-encodes the Base64 characters that are not query safe.
    fn encode_query(value: &str) -> String {
        value
            .replace('+', "%2B")
            .replace('/', "%2F")
            .replace('=', "%3D")
    }

    async fn seed(state: &web::Data<AppState>, names: &[&str]) {
        state
            .config_service
            .update(names.iter().map(|n| config(n)).collect())
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn test_ping() {
        let app = test::init_service(App::new().service(routes(CONTEXT_PATH))).await;

        let req = test::TestRequest::get()
            .uri("/api/metacfg/ping")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[actix_web::test]
    async fn test_config_names() {
        let state = app_state();
        seed(&state, &["b", "a"]).await;
        let app =
            test::init_service(App::new().app_data(state).service(routes(CONTEXT_PATH))).await;

        let req = test::TestRequest::get()
            .uri("/api/metacfg/config_names")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"], json!(["a", "b"]));
    }

    #[actix_web::test]
    async fn test_config_names_by_page_request() {
        let state = app_state();
        seed(&state, &["cfg-1", "cfg-2", "cfg-3", "other"]).await;
        let app =
            test::init_service(App::new().app_data(state).service(routes(CONTEXT_PATH))).await;

        let req = test::TestRequest::post()
            .uri("/api/metacfg/config_names_by_page_request")
            .set_json(json!({ "name": "cfg", "page": 1, "size": 2 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["names"], json!(["cfg-3"]));
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["page"], 1);
    }

    #[actix_web::test]
    async fn test_get_configs() {
        let state = app_state();
        seed(&state, &["a", "b", "c"]).await;
        let app =
            test::init_service(App::new().app_data(state).service(routes(CONTEXT_PATH))).await;

        let names = encode_names(&["a", "c", "missing"].map(String::from)).unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/api/metacfg/configs?names={}", encode_query(&names)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let configs: Vec<Config> = serde_json::from_value(body["data"].clone()).unwrap();
        let names = configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(configs[0].property(&["port"]).unwrap().as_long().unwrap(), 8080);

        let req = test::TestRequest::get()
            .uri("/api/metacfg/configs")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn test_get_configs_rejects_undecodable_names() {
        let app = test::init_service(
            App::new()
                .app_data(app_state())
                .service(routes(CONTEXT_PATH)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/metacfg/configs?names=a,b")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 20002);
        assert!(body["message"].as_str().unwrap().starts_with("failed to receive configs"));
    }

    #[actix_web::test]
    async fn test_update_and_delete_configs() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(routes(CONTEXT_PATH)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/metacfg/configs")
            .set_json(vec![config("a"), config("b")])
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert!(body["data"][0]["id"].as_i64().unwrap() > 0);

        let req = test::TestRequest::delete()
            .uri("/api/metacfg/configs")
            .set_json(vec!["a"])
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], 1);

        assert_eq!(
            state.config_service.names().await.unwrap(),
            vec!["b".to_string()]
        );
    }

    #[actix_web::test]
    async fn test_invalid_config_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(app_state())
                .service(routes(CONTEXT_PATH)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/metacfg/configs")
            .set_json(json!([{
                "name": "a",
                "properties": [{ "name": "port", "type": "LONG", "value": "eighty" }]
            }]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 20002);
        assert!(body["message"].as_str().unwrap().starts_with("failed to save configs"));
    }

    #[actix_web::test]
    async fn test_malformed_body_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(app_state())
                .service(routes(CONTEXT_PATH)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/metacfg/configs")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 20002);
    }

    #[actix_web::test]
    async fn test_accept_config() {
        let state = app_state();
        seed(&state, &["a"]).await;
        let accepted = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = accepted.clone();
        state
            .config_service
            .add_consumer(move |config| sink.lock().unwrap().push(config.name.clone()));
        let app =
            test::init_service(App::new().app_data(state).service(routes(CONTEXT_PATH))).await;

        let req = test::TestRequest::post()
            .uri("/api/metacfg/accept_config")
            .set_json(vec!["a"])
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"], true);
        assert_eq!(*accepted.lock().unwrap(), vec!["a".to_string()]);
    }
}
