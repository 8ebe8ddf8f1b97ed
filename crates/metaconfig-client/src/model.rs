//! Wire types of the REST API

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use metaconfig_common::error::SUCCESS;
use metaconfig_common::{MetaConfigError, Result};

/// Envelope of every REST response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Parses a response body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

impl<T> ApiResponse<T> {
    /// The payload of a successful response.
    ///
    /// A non-zero code is turned into a `Remote` error carrying the server
    /// message; so is a success without data.
    pub fn into_data(self) -> Result<T> {
        if self.code != SUCCESS.code {
            return Err(MetaConfigError::Remote(format!(
                "server responded with code {}: {}",
                self.code, self.message
            )));
        }

        self.data
            .ok_or_else(|| MetaConfigError::Remote("server responded without data".to_string()))
    }
}
