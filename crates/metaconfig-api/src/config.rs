use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use metaconfig_common::{MetaConfigError, Result, now_millis};

use crate::property::{self, Property};

fn default_version() -> i32 {
    1
}

/// A named, versioned configuration owning a tree of properties
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: i32,
    #[serde(default = "now_millis")]
    pub updated: i64,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Config {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MetaConfigError::IllegalArgument(
                "config name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: 0,
            name,
            description: None,
            version: default_version(),
            updated: now_millis(),
            attributes: HashMap::new(),
            properties: Vec::new(),
        })
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_updated(mut self, updated: i64) -> Self {
        self.updated = updated;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Places `property` under `path`, creating empty `STRING` parents where
    /// a segment does not exist yet. An empty path adds a top-level property.
    pub fn with_property_at(mut self, path: &[&str], property: Property) -> Result<Self> {
        property::insert_at(&mut self.properties, path, property)?;
        Ok(self)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Looks a property up by the names along its path from the top level.
    pub fn property(&self, path: &[&str]) -> Option<&Property> {
        let (head, rest) = path.split_first()?;
        self.properties
            .iter()
            .find(|p| p.name == *head)
            .and_then(|p| p.property(rest))
    }

    /// Compares everything except id and version.
    pub fn same_content(&self, other: &Config) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.updated == other.updated
            && self.attributes == other.attributes
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .zip(other.properties.iter())
                .all(|(a, b)| a.same_content(b))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MetaConfigError::IllegalArgument(
                "config name must not be empty".to_string(),
            ));
        }

        self.properties.iter().try_for_each(Property::validate)
    }

    /// Number of properties in the whole tree.
    pub fn property_count(&self) -> usize {
        self.properties.iter().map(Property::count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyType;

    #[test]
    fn test_create_config() {
        let config = Config::new("Meta Config").unwrap();

        assert_eq!(config.id, 0);
        assert_eq!(config.version, 1);
        assert!(config.updated > 0);
        assert!(config.description.is_none());
        assert!(config.properties.is_empty());
        assert!(Config::new(" ").is_err());
    }

    #[test]
    fn test_with_property_at_creates_parents() {
        let config = Config::new("app")
            .unwrap()
            .with_property_at(&["server", "http"], Property::long("port", 8080).unwrap())
            .unwrap()
            .with_property_at(&["server"], Property::bool("tls", false).unwrap())
            .unwrap();

        assert_eq!(config.properties.len(), 1);
        let server = config.property(&["server"]).unwrap();
        assert_eq!(server.property_type, PropertyType::String);
        assert_eq!(server.value, "");
        assert_eq!(server.properties.len(), 2);
        assert_eq!(
            config
                .property(&["server", "http", "port"])
                .unwrap()
                .as_long()
                .unwrap(),
            8080
        );
        assert_eq!(config.property_count(), 4);
    }

    #[test]
    fn test_with_property_at_rejects_empty_segment() {
        let result = Config::new("app")
            .unwrap()
            .with_property_at(&[""], Property::long("port", 1).unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_property_lookup_empty_path() {
        let config = Config::new("app")
            .unwrap()
            .with_property(Property::string("a", "1").unwrap());
        assert!(config.property(&[]).is_none());
        assert!(config.property(&["a"]).is_some());
    }

    #[test]
    fn test_same_content_ignores_identity() {
        let config = Config::new("app")
            .unwrap()
            .with_updated(5)
            .with_attribute("env", "dev")
            .with_property(Property::string("a", "1").unwrap().with_updated(5));
        let persisted = config.clone().with_id(3).with_version(4);

        assert!(config.same_content(&persisted));
        assert!(!config.same_content(&persisted.with_updated(6)));
    }

    #[test]
    fn test_config_json_defaults() {
        let json = r#"{
            "name": "app",
            "attributes": { "env": "dev" },
            "properties": [{ "name": "a", "type": "LONG", "value": "1" }]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.id, 0);
        assert_eq!(config.version, 1);
        assert_eq!(config.attribute("env"), Some("dev"));
        assert_eq!(config.properties[0].as_long().unwrap(), 1);
        assert!(config.validate().is_ok());
    }
}
