//! Physical table names

use serde::{Deserialize, Serialize};

use metaconfig_common::{
    DEFAULT_CONFIG_ATTRIBUTES_TABLE, DEFAULT_CONFIGS_TABLE, DEFAULT_PROPERTIES_TABLE,
    DEFAULT_PROPERTY_ATTRIBUTES_TABLE, MetaConfigError, Result, is_valid_table_name,
};

/// Table names used by `DbConfigRepository`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableMapping {
    pub configs: String,
    pub config_attributes: String,
    pub properties: String,
    pub property_attributes: String,
}

impl Default for TableMapping {
    fn default() -> Self {
        Self {
            configs: DEFAULT_CONFIGS_TABLE.to_string(),
            config_attributes: DEFAULT_CONFIG_ATTRIBUTES_TABLE.to_string(),
            properties: DEFAULT_PROPERTIES_TABLE.to_string(),
            property_attributes: DEFAULT_PROPERTY_ATTRIBUTES_TABLE.to_string(),
        }
    }
}

impl TableMapping {
    /// Same defaults with every table name prefixed, e.g. `APP_CONFIGS`.
    pub fn with_prefix(prefix: &str) -> Self {
        let defaults = Self::default();
        Self {
            configs: format!("{}{}", prefix, defaults.configs),
            config_attributes: format!("{}{}", prefix, defaults.config_attributes),
            properties: format!("{}{}", prefix, defaults.properties),
            property_attributes: format!("{}{}", prefix, defaults.property_attributes),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.configs,
            &self.config_attributes,
            &self.properties,
            &self.property_attributes,
        ] {
            if !is_valid_table_name(name) {
                return Err(MetaConfigError::IllegalArgument(format!(
                    "invalid table name '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}
