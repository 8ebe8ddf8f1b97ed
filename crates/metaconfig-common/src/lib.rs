//! Metaconfig Common - Shared error types, codes and constants
//!
//! This crate provides the foundational types used across all Metaconfig components:
//! - Error types and error codes
//! - Identifier validation
//! - Operation messages and default table names

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{ErrorCode, MetaConfigError, Result};
pub use utils::{decode_names, encode_names, is_valid_table_name, now_millis};

/// Default physical table names
pub const DEFAULT_CONFIGS_TABLE: &str = "CONFIGS";
pub const DEFAULT_CONFIG_ATTRIBUTES_TABLE: &str = "CONFIG_ATTRIBUTES";
pub const DEFAULT_PROPERTIES_TABLE: &str = "PROPERTIES";
pub const DEFAULT_PROPERTY_ATTRIBUTES_TABLE: &str = "PROPERTY_ATTRIBUTES";

/// Stable messages of the public repository operations
pub const RECEIVE_CONFIGS: &str = "failed to receive configs";
pub const RECEIVE_CONFIG_NAMES: &str = "failed to receive config names";
pub const RECEIVE_PAGE_RESPONSE: &str = "failed to receive a page response";
pub const SAVE_CONFIGS: &str = "failed to save configs";
pub const DELETE_CONFIGS: &str = "failed to delete configs";
pub const CREATE_CONFIG_TABLES: &str = "failed to create config tables";

/// Default paging values
pub const DEFAULT_PAGE: u32 = 0;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
