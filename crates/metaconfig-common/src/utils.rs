//! Utility functions for Metaconfig

use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::{MetaConfigError, Result};

/// Physical table names are interpolated into DDL, so only plain identifiers pass.
static TABLE_NAME_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[A-Za-z0-9_]+$").expect("Invalid regex pattern"));

/// Validate a configured table name
///
/// # Examples
///
/// ```
/// use metaconfig_common::is_valid_table_name;
///
/// assert!(is_valid_table_name("CONFIGS"));
/// assert!(is_valid_table_name("app_configs_v2"));
/// assert!(!is_valid_table_name(""));
/// assert!(!is_valid_table_name("configs; DROP TABLE x"));
/// ```
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_PATTERN.is_match(name)
}

/// Encode config names for a query parameter.
///
/// Names are free text, so they travel as a Base64 encoded JSON array.
pub fn encode_names(names: &[String]) -> Result<String> {
    Ok(BASE64.encode(serde_json::to_vec(names)?))
}

/// Decode names produced by [`encode_names`]
pub fn decode_names(encoded: &str) -> Result<Vec<String>> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| MetaConfigError::IllegalArgument(format!("names are not Base64: {}", e)))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        MetaConfigError::IllegalArgument(format!("names are not a JSON string array: {}", e))
    })
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
