// In-memory persistence backend
// Keeps configs in a lock-protected map with the same write semantics as the SQL backend

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use metaconfig_api::{Config, PageRequest, PageResponse, Property};
use metaconfig_common::{MetaConfigError, Result, SAVE_CONFIGS};

use crate::traits::ConfigRepository;

#[derive(Default)]
struct State {
    last_config_id: i64,
    last_property_id: i64,
    configs: BTreeMap<i64, Config>,
}

/// Process-local config repository
///
/// Suitable for tests and single-node deployments without a database.
/// A batch is applied under one write lock, so readers never observe a
/// partially saved batch.
#[derive(Default)]
pub struct MemoryConfigRepository {
    state: RwLock<State>,
}

impl MemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfigRepository for MemoryConfigRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<Config>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let names = names.iter().map(String::as_str).collect::<HashSet<_>>();
        let state = self.state.read();

        Ok(state
            .configs
            .values()
            .filter(|c| names.contains(c.name.as_str()))
            .cloned()
            .collect())
    }

    async fn find_names(&self) -> Result<Vec<String>> {
        let state = self.state.read();

        Ok(state
            .configs
            .values()
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn find_by_page_request(&self, request: &PageRequest) -> Result<PageResponse> {
        let state = self.state.read();

        let mut names = state
            .configs
            .values()
            .filter(|c| matches(c, request))
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        if !request.ascending {
            names.reverse();
        }

        let total = names.len() as u64;
        let page = names
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();

        Ok(PageResponse::new(page, request.page, total))
    }

    async fn save_and_flush(&self, configs: Vec<Config>) -> Result<Vec<Config>> {
        configs
            .iter()
            .try_for_each(Config::validate)
            .map_err(|e| MetaConfigError::operation(SAVE_CONFIGS, e))?;

        let (to_update, to_insert): (Vec<Config>, Vec<Config>) =
            configs.into_iter().partition(|c| c.id > 0);

        let mut state = self.state.write();
        let mut saved = Vec::with_capacity(to_update.len() + to_insert.len());

        for config in to_update {
            if let Some(config) = state.update(config) {
                saved.push(config);
            }
        }
        for config in to_insert {
            saved.push(state.insert(config));
        }

        Ok(saved)
    }

    async fn delete(&self, names: &[String]) -> Result<u64> {
        let names = names.iter().map(String::as_str).collect::<HashSet<_>>();
        let mut state = self.state.write();

        let before = state.configs.len();
        state.configs.retain(|_, c| !names.contains(c.name.as_str()));

        Ok((before - state.configs.len()) as u64)
    }
}

impl State {
    fn insert(&mut self, mut config: Config) -> Config {
        self.last_config_id += 1;
        config.id = self.last_config_id;
        config.version = 1;

        let properties = std::mem::take(&mut config.properties);
        config.properties = properties
            .into_iter()
            .map(|p| self.assign_ids(p))
            .collect();

        debug!(id = config.id, name = %config.name, "Inserted config");
        self.configs.insert(config.id, config.clone());
        config
    }

    fn update(&mut self, mut config: Config) -> Option<Config> {
        let stored = self.configs.get(&config.id)?;
        if config.updated <= stored.updated || config.version != stored.version {
            debug!(id = config.id, "Config is stale, skipped");
            return None;
        }

        let mut known = HashMap::new();
        index(&stored.properties, &mut known);

        let incoming = std::mem::take(&mut config.properties);
        let (returned, kept) = reconcile(incoming, &mut known, &mut self.last_property_id);

        config.version += 1;
        let mut persisted = config.clone();
        persisted.properties = kept;
        config.properties = returned;

        debug!(id = config.id, version = config.version, "Updated config");
        self.configs.insert(config.id, persisted);
        Some(config)
    }

    fn assign_ids(&mut self, property: Property) -> Property {
        assign_ids(property, &mut self.last_property_id)
    }
}

fn assign_ids(mut property: Property, last_id: &mut i64) -> Property {
    *last_id += 1;
    property.id = *last_id;

    let children = std::mem::take(&mut property.properties);
    property.properties = children
        .into_iter()
        .map(|p| assign_ids(p, last_id))
        .collect();
    property
}

fn index<'a>(properties: &'a [Property], known: &mut HashMap<i64, &'a Property>) {
    for property in properties {
        known.insert(property.id, property);
        index(&property.properties, known);
    }
}

/// Returns the tree handed back to the caller and the tree to keep.
///
/// Known properties that are not newer keep their stored fields; unknown
/// ones get fresh ids for their whole subtree. Known ids that are never
/// visited simply do not make it into the kept tree.
fn reconcile(
    incoming: Vec<Property>,
    known: &mut HashMap<i64, &Property>,
    last_id: &mut i64,
) -> (Vec<Property>, Vec<Property>) {
    let mut returned = Vec::with_capacity(incoming.len());
    let mut kept = Vec::with_capacity(incoming.len());

    for mut property in incoming {
        match known.remove(&property.id) {
            Some(stored) => {
                let children = std::mem::take(&mut property.properties);
                let (returned_children, kept_children) = reconcile(children, known, last_id);

                let mut keep = if property.updated > stored.updated {
                    property.clone()
                } else {
                    Property {
                        properties: Vec::new(),
                        ..stored.clone()
                    }
                };
                keep.properties = kept_children;
                property.properties = returned_children;

                kept.push(keep);
                returned.push(property);
            }
            None => {
                let inserted = assign_ids(property, last_id);
                kept.push(inserted.clone());
                returned.push(inserted);
            }
        }
    }

    (returned, kept)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(config: &Config, request: &PageRequest) -> bool {
    if !contains(&config.name, &request.name) {
        return false;
    }
    if request.attributes.is_empty() {
        return true;
    }

    config.attributes.iter().any(|(key, value)| {
        request
            .attributes
            .iter()
            .any(|(k, v)| contains(key, k) && contains(value, v))
    })
}
