//! HTTP response types for the Metaconfig server
//!
//! Every endpoint answers with the same `{code, message, data}` envelope.

use actix_web::{HttpResponse, HttpResponseBuilder, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use metaconfig_common::{
    MetaConfigError,
    error::{DATA_ACCESS_ERROR, PARAMETER_VALIDATE_ERROR, SUCCESS},
};

/// Generic result wrapper for API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn success(data: T) -> Result<T> {
        Result::<T> {
            code: SUCCESS.code,
            message: SUCCESS.message.to_string(),
            data,
        }
    }

    pub fn http_success(data: impl Serialize) -> HttpResponse {
        HttpResponse::Ok().json(Result::success(data))
    }

    pub fn http_response(
        status: u16,
        code: i32,
        message: String,
        data: impl Serialize,
    ) -> HttpResponse {
        HttpResponseBuilder::new(StatusCode::from_u16(status).unwrap_or_default())
            .json(Result::new(code, message, data))
    }
}

/// 400 with `PARAMETER_VALIDATE_ERROR`
pub fn bad_request(message: String) -> HttpResponse {
    warn!(%message, "Rejected invalid request");
    Result::<()>::http_response(400, PARAMETER_VALIDATE_ERROR.code, message, None::<()>)
}

/// Maps a service error: invalid input is a 400, anything else a 500
/// with `DATA_ACCESS_ERROR`.
pub fn error_response(err: &MetaConfigError) -> HttpResponse {
    if err.is_illegal_argument() {
        return bad_request(err.to_string());
    }

    error!(error = %err, "Config operation failed");
    Result::<()>::http_response(500, DATA_ACCESS_ERROR.code, err.to_string(), None::<()>)
}

/// Success envelope or the mapped error
pub fn respond<T: Serialize>(result: metaconfig_common::Result<T>) -> HttpResponse {
    match result {
        Ok(data) => Result::<T>::http_success(data),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    async fn body(response: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn test_success_envelope() {
        let response = respond(Ok(vec!["a"]));
        assert_eq!(response.status(), StatusCode::OK);

        let json = body(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(json["message"], "success");
        assert_eq!(json["data"][0], "a");
    }

    #[actix_web::test]
    async fn test_illegal_argument_is_bad_request() {
        let err = MetaConfigError::operation(
            metaconfig_common::SAVE_CONFIGS,
            MetaConfigError::IllegalArgument("bad".to_string()),
        );
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body(response).await;
        assert_eq!(json["code"], PARAMETER_VALIDATE_ERROR.code);
        assert!(json["data"].is_null());
    }

    #[actix_web::test]
    async fn test_storage_error_is_server_error() {
        let err = MetaConfigError::operation(
            metaconfig_common::DELETE_CONFIGS,
            MetaConfigError::Statement("boom".to_string()),
        );
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body(response).await;
        assert_eq!(json["code"], DATA_ACCESS_ERROR.code);
        assert_eq!(json["message"], "failed to delete configs: statement error: boom");
    }
}
