use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use metaconfig_common::{MetaConfigError, Result, now_millis};

const ARRAY_DELIMITER: char = ',';
const ARRAY_ESCAPE: char = '\\';

/// Declared type of a property value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Bool,
    Double,
    Long,
    #[default]
    String,
    StringArray,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Bool => "BOOL",
            PropertyType::Double => "DOUBLE",
            PropertyType::Long => "LONG",
            PropertyType::String => "STRING",
            PropertyType::StringArray => "STRING_ARRAY",
        }
    }

    pub fn all() -> [PropertyType; 5] {
        [
            PropertyType::Bool,
            PropertyType::Double,
            PropertyType::Long,
            PropertyType::String,
            PropertyType::StringArray,
        ]
    }

    /// Checks that a raw value can be read back as this type.
    pub fn check(self, value: &str) -> Result<()> {
        let valid = match self {
            PropertyType::Bool => value == "true" || value == "false",
            PropertyType::Double => value.parse::<f64>().is_ok(),
            PropertyType::Long => value.parse::<i64>().is_ok(),
            PropertyType::String | PropertyType::StringArray => true,
        };

        if valid {
            Ok(())
        } else {
            Err(MetaConfigError::IllegalArgument(format!(
                "value '{}' is not a valid {}",
                value, self
            )))
        }
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = MetaConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PropertyType::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                MetaConfigError::IllegalArgument(format!("unknown property type '{}'", s))
            })
    }
}

/// A typed, named value that may contain nested properties
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub value: String,
    #[serde(default = "now_millis")]
    pub updated: i64,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Property {
    pub fn new(
        name: impl Into<String>,
        property_type: PropertyType,
        value: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        if name.trim().is_empty() {
            return Err(MetaConfigError::IllegalArgument(
                "property name must not be empty".to_string(),
            ));
        }
        property_type.check(&value)?;

        Ok(Self {
            id: 0,
            name,
            caption: None,
            description: None,
            property_type,
            value,
            updated: now_millis(),
            attributes: HashMap::new(),
            properties: Vec::new(),
        })
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Result<Self> {
        Self::new(name, PropertyType::Bool, value.to_string())
    }

    pub fn double(name: impl Into<String>, value: f64) -> Result<Self> {
        Self::new(name, PropertyType::Double, value.to_string())
    }

    pub fn long(name: impl Into<String>, value: i64) -> Result<Self> {
        Self::new(name, PropertyType::Long, value.to_string())
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::new(name, PropertyType::String, value)
    }

    pub fn string_array<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Result<Self> {
        Self::new(name, PropertyType::StringArray, encode_array(values))
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
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

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Walks nested children by name; an empty path yields `self`.
    pub fn property(&self, path: &[&str]) -> Option<&Property> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .properties
                .iter()
                .find(|p| p.name == *head)
                .and_then(|p| p.property(rest)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.expect_type(PropertyType::Bool)?;
        self.value.parse::<bool>().map_err(|e| self.unreadable(e))
    }

    pub fn as_double(&self) -> Result<f64> {
        self.expect_type(PropertyType::Double)?;
        self.value.parse::<f64>().map_err(|e| self.unreadable(e))
    }

    pub fn as_long(&self) -> Result<i64> {
        self.expect_type(PropertyType::Long)?;
        self.value.parse::<i64>().map_err(|e| self.unreadable(e))
    }

    pub fn as_string_array(&self) -> Result<Vec<String>> {
        self.expect_type(PropertyType::StringArray)?;
        Ok(decode_array(&self.value))
    }

    /// Compares everything except identity.
    pub fn same_content(&self, other: &Property) -> bool {
        self.name == other.name
            && self.caption == other.caption
            && self.description == other.description
            && self.property_type == other.property_type
            && self.value == other.value
            && self.updated == other.updated
            && self.attributes == other.attributes
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .zip(other.properties.iter())
                .all(|(a, b)| a.same_content(b))
    }

    /// Validates this property and its whole subtree.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MetaConfigError::IllegalArgument(
                "property name must not be empty".to_string(),
            ));
        }
        self.property_type.check(&self.value)?;

        self.properties.iter().try_for_each(Property::validate)
    }

    /// Total number of properties in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.properties.iter().map(Property::count).sum::<usize>()
    }

    fn expect_type(&self, expected: PropertyType) -> Result<()> {
        if self.property_type == expected {
            Ok(())
        } else {
            Err(MetaConfigError::IllegalArgument(format!(
                "property '{}' is {}, not {}",
                self.name, self.property_type, expected
            )))
        }
    }

    fn unreadable(&self, e: impl Display) -> MetaConfigError {
        MetaConfigError::IllegalArgument(format!(
            "property '{}' has an unreadable value: {}",
            self.name, e
        ))
    }
}

/// Inserts `property` below the children named by `path`, creating empty
/// `STRING` properties for missing segments.
pub(crate) fn insert_at(
    properties: &mut Vec<Property>,
    path: &[&str],
    property: Property,
) -> Result<()> {
    let Some((head, rest)) = path.split_first() else {
        properties.push(property);
        return Ok(());
    };

    let index = match properties.iter().position(|p| p.name == *head) {
        Some(index) => index,
        None => {
            properties.push(Property::string(*head, "")?);
            properties.len() - 1
        }
    };

    insert_at(&mut properties[index].properties, rest, property)
}

/// Joins array elements with `,`, escaping `\` and `,` inside elements.
pub fn encode_array<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| {
            let mut escaped = String::with_capacity(v.as_ref().len());
            for c in v.as_ref().chars() {
                if c == ARRAY_ESCAPE || c == ARRAY_DELIMITER {
                    escaped.push(ARRAY_ESCAPE);
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Reverses [`encode_array`]. The empty string decodes to no elements.
pub fn decode_array(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == ARRAY_ESCAPE {
            escaped = true;
        } else if c == ARRAY_DELIMITER {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    // dangling escape
    if escaped {
        current.push(ARRAY_ESCAPE);
    }
    values.push(current);

    values
}
