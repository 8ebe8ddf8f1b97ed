use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use metaconfig_common::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_ascending() -> bool {
    true
}

/// Filter for a page of config names
///
/// `name` and every attribute key/value are substring filters. A config
/// matches the attribute part when any of its attributes matches any pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            ascending: true,
            attributes: HashMap::new(),
        }
    }
}

impl PageRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of config names plus the total number of matches
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub names: Vec<String>,
    pub page: u32,
    pub total: u64,
}

impl PageResponse {
    pub fn new(names: Vec<String>, page: u32, total: u64) -> Self {
        Self { names, page, total }
    }

    pub fn empty(page: u32) -> Self {
        Self {
            names: Vec::new(),
            page,
            total: 0,
        }
    }
}
