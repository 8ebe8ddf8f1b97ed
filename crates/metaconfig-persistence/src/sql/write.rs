//! Write path: insert/update partitioning and property tree reconciliation
//!
//! Everything here runs inside the caller's transaction. Statement failures
//! abort immediately; attribute failures are collected and reported together
//! once the whole batch has been processed.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction,
    sea_query::{Expr, Query},
};
use tracing::debug;

use metaconfig_api::{Config, Property};
use metaconfig_common::{MetaConfigError, Result};

use super::column::*;
use super::{exec, ident, insert_returning_id, query_all};
use crate::mapping::TableMapping;

pub(crate) async fn save(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    configs: Vec<Config>,
) -> Result<Vec<Config>> {
    let (to_update, to_insert): (Vec<Config>, Vec<Config>) =
        configs.into_iter().partition(|c| c.id > 0);

    let mut failures = Vec::new();
    let mut saved = update_configs(txn, mapping, to_update, &mut failures).await?;
    saved.extend(insert_configs(txn, mapping, to_insert, &mut failures).await?);

    if !failures.is_empty() {
        return Err(MetaConfigError::attributes(failures));
    }

    Ok(saved)
}

pub(crate) async fn delete(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    names: &[String],
) -> Result<u64> {
    let stmt = Query::delete()
        .from_table(ident(&mapping.configs))
        .and_where(Expr::col(ident(NAME)).is_in(names.iter().cloned()))
        .to_owned();

    let deleted = exec(txn, &stmt).await?.rows_affected();
    debug!(deleted, "Deleted configs");

    Ok(deleted)
}

async fn insert_configs(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    configs: Vec<Config>,
    failures: &mut Vec<String>,
) -> Result<Vec<Config>> {
    let mut inserted = Vec::with_capacity(configs.len());

    for mut config in configs {
        let stmt = Query::insert()
            .into_table(ident(&mapping.configs))
            .columns([NAME, DESCRIPTION, VERSION, UPDATED].map(ident))
            .values_panic([
                config.name.clone().into(),
                config.description.clone().into(),
                1i32.into(),
                config.updated.into(),
            ])
            .to_owned();

        config.id = insert_returning_id(txn, stmt).await?;
        config.version = 1;

        let owner = AttributeTable::config(mapping, config.id);
        for (key, value) in sorted(&config.attributes) {
            if let Some(failure) = owner.insert(txn, key, value).await {
                failures.push(failure);
            }
        }

        let mut properties = Vec::with_capacity(config.properties.len());
        for property in &config.properties {
            properties
                .push(insert_property(txn, mapping, config.id, None, property, failures).await?);
        }
        config.properties = properties;

        debug!(id = config.id, name = %config.name, "Inserted config");
        inserted.push(config);
    }

    Ok(inserted)
}

async fn update_configs(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    configs: Vec<Config>,
    failures: &mut Vec<String>,
) -> Result<Vec<Config>> {
    if configs.is_empty() {
        return Ok(Vec::new());
    }

    let stored = stored_configs(txn, mapping, configs.iter().map(|c| c.id)).await?;
    let mut updated = Vec::with_capacity(configs.len());

    for mut config in configs {
        let Some(&(version, stamp)) = stored.get(&config.id) else {
            debug!(id = config.id, "Config to update does not exist, skipped");
            continue;
        };
        if config.updated <= stamp {
            debug!(
                id = config.id,
                updated = config.updated,
                stored = stamp,
                "Config is not newer, skipped"
            );
            continue;
        }

        let stmt = Query::update()
            .table(ident(&mapping.configs))
            .values([
                (ident(NAME), config.name.clone().into()),
                (ident(DESCRIPTION), config.description.clone().into()),
                (ident(VERSION), (config.version + 1).into()),
                (ident(UPDATED), config.updated.into()),
            ])
            .and_where(Expr::col(ident(ID)).eq(config.id))
            .and_where(Expr::col(ident(VERSION)).eq(config.version))
            .to_owned();

        if exec(txn, &stmt).await?.rows_affected() == 0 {
            debug!(
                id = config.id,
                version = config.version,
                stored = version,
                "Config version changed, skipped"
            );
            continue;
        }
        config.version += 1;

        let owner = AttributeTable::config(mapping, config.id);
        failures.extend(owner.reconcile(txn, &config.attributes).await?);

        let properties = std::mem::take(&mut config.properties);
        config.properties =
            reconcile_properties(txn, mapping, config.id, properties, failures).await?;

        debug!(id = config.id, version = config.version, "Updated config");
        updated.push(config);
    }

    Ok(updated)
}

/// `id -> (version, updated)` for the given configs.
async fn stored_configs(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    ids: impl Iterator<Item = i64>,
) -> Result<HashMap<i64, (i32, i64)>> {
    let stmt = Query::select()
        .columns([ID, VERSION, UPDATED].map(ident))
        .from(ident(&mapping.configs))
        .and_where(Expr::col(ident(ID)).is_in(ids))
        .to_owned();

    query_all(txn, &stmt)
        .await?
        .iter()
        .map(|row| {
            Ok((
                row.try_get::<i64>("", ID)?,
                (row.try_get::<i32>("", VERSION)?, row.try_get::<i64>("", UPDATED)?),
            ))
        })
        .collect()
}

/// `id -> updated` for every property of a config.
async fn stored_properties(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    config_id: i64,
) -> Result<HashMap<i64, i64>> {
    let stmt = Query::select()
        .columns([ID, UPDATED].map(ident))
        .from(ident(&mapping.properties))
        .and_where(Expr::col(ident(CONFIG_ID)).eq(config_id))
        .to_owned();

    query_all(txn, &stmt)
        .await?
        .iter()
        .map(|row| Ok((row.try_get::<i64>("", ID)?, row.try_get::<i64>("", UPDATED)?)))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Keep,
    Insert,
}

/// Decisions for one incoming property tree, in pre-order.
#[derive(Default)]
struct Plan<'a> {
    actions: Vec<Action>,
    updates: Vec<&'a Property>,
    inserts: Vec<(Option<i64>, &'a Property)>,
}

impl<'a> Plan<'a> {
    /// Visits known properties, removing them from `stored`; whatever is left
    /// there afterwards is no longer part of the tree.
    fn walk(
        &mut self,
        properties: &'a [Property],
        parent: Option<i64>,
        stored: &mut HashMap<i64, i64>,
    ) {
        for property in properties {
            match stored.remove(&property.id) {
                Some(updated) => {
                    self.actions.push(Action::Keep);
                    if property.updated > updated {
                        self.updates.push(property);
                    }
                    self.walk(&property.properties, Some(property.id), stored);
                }
                None => {
                    // new, or an id this config does not own
                    self.actions.push(Action::Insert);
                    self.inserts.push((parent, property));
                }
            }
        }
    }
}

/// Replaces every planned insert with its persisted subtree.
fn assemble<A, I>(properties: Vec<Property>, actions: &mut A, inserted: &mut I) -> Vec<Property>
where
    A: Iterator<Item = Action>,
    I: Iterator<Item = Property>,
{
    let mut assembled = Vec::with_capacity(properties.len());
    for mut property in properties {
        match actions.next() {
            Some(Action::Keep) => {
                let children = std::mem::take(&mut property.properties);
                property.properties = assemble(children, actions, inserted);
                assembled.push(property);
            }
            Some(Action::Insert) => assembled.extend(inserted.next()),
            None => {}
        }
    }
    assembled
}

async fn reconcile_properties(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    config_id: i64,
    incoming: Vec<Property>,
    failures: &mut Vec<String>,
) -> Result<Vec<Property>> {
    let mut stored = stored_properties(txn, mapping, config_id).await?;

    let mut plan = Plan::default();
    plan.walk(&incoming, None, &mut stored);
    let Plan {
        actions,
        updates,
        inserts,
    } = plan;

    let mut stale = stored.into_keys().collect::<Vec<_>>();
    if !stale.is_empty() {
        stale.sort_unstable();
        // children go with their parents through the cascade
        let stmt = Query::delete()
            .from_table(ident(&mapping.properties))
            .and_where(Expr::col(ident(ID)).is_in(stale.iter().copied()))
            .to_owned();
        exec(txn, &stmt).await?;
        debug!(config_id, deleted = ?stale, "Deleted properties");
    }

    for property in updates {
        update_property(txn, mapping, property).await?;
        let owner = AttributeTable::property(mapping, property.id);
        failures.extend(owner.reconcile(txn, &property.attributes).await?);
    }

    let mut inserted = Vec::with_capacity(inserts.len());
    for (parent, property) in inserts {
        inserted.push(
            insert_property(txn, mapping, config_id, parent, property, failures).await?,
        );
    }

    Ok(assemble(
        incoming,
        &mut actions.into_iter(),
        &mut inserted.into_iter(),
    ))
}

async fn update_property(
    txn: &DatabaseTransaction,
    mapping: &TableMapping,
    property: &Property,
) -> Result<()> {
    let stmt = Query::update()
        .table(ident(&mapping.properties))
        .values([
            (ident(NAME), property.name.clone().into()),
            (ident(CAPTION), property.caption.clone().into()),
            (ident(DESCRIPTION), property.description.clone().into()),
            (ident(TYPE), property.property_type.as_str().into()),
            (ident(VALUE), property.value.clone().into()),
            (ident(UPDATED), property.updated.into()),
        ])
        .and_where(Expr::col(ident(ID)).eq(property.id))
        .to_owned();

    let affected = exec(txn, &stmt).await?.rows_affected();
    if affected != 1 {
        return Err(MetaConfigError::Statement(format!(
            "update of property {} affected {} rows",
            property.id, affected
        )));
    }
    Ok(())
}

/// Inserts a property with its whole subtree; ids of the incoming nodes are ignored.
fn insert_property<'a>(
    txn: &'a DatabaseTransaction,
    mapping: &'a TableMapping,
    config_id: i64,
    parent_id: Option<i64>,
    property: &'a Property,
    failures: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<Property>> {
    async move {
        let stmt = Query::insert()
            .into_table(ident(&mapping.properties))
            .columns(
                [PROPERTY_ID, CONFIG_ID, NAME, CAPTION, DESCRIPTION, TYPE, VALUE, UPDATED]
                    .map(ident),
            )
            .values_panic([
                parent_id.into(),
                config_id.into(),
                property.name.clone().into(),
                property.caption.clone().into(),
                property.description.clone().into(),
                property.property_type.as_str().into(),
                property.value.clone().into(),
                property.updated.into(),
            ])
            .to_owned();
        let id = insert_returning_id(txn, stmt).await?;

        let owner = AttributeTable::property(mapping, id);
        for (key, value) in sorted(&property.attributes) {
            if let Some(failure) = owner.insert(txn, key, value).await {
                failures.push(failure);
            }
        }

        let mut children = Vec::with_capacity(property.properties.len());
        for child in &property.properties {
            children.push(
                insert_property(txn, mapping, config_id, Some(id), child, failures).await?,
            );
        }

        Ok(Property {
            id,
            name: property.name.clone(),
            caption: property.caption.clone(),
            description: property.description.clone(),
            property_type: property.property_type,
            value: property.value.clone(),
            updated: property.updated,
            attributes: property.attributes.clone(),
            properties: children,
        })
    }
    .boxed()
}

fn sorted(attributes: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut pairs = attributes.iter().collect::<Vec<_>>();
    pairs.sort_unstable();
    pairs
}

/// Attribute rows of one config or one property
#[derive(Clone, Copy)]
struct AttributeTable<'a> {
    table: &'a str,
    owner_column: &'static str,
    owner_id: i64,
}

impl<'a> AttributeTable<'a> {
    fn config(mapping: &'a TableMapping, config_id: i64) -> Self {
        Self {
            table: &mapping.config_attributes,
            owner_column: CONFIG_ID,
            owner_id: config_id,
        }
    }

    fn property(mapping: &'a TableMapping, property_id: i64) -> Self {
        Self {
            table: &mapping.property_attributes,
            owner_column: PROPERTY_ID,
            owner_id: property_id,
        }
    }

    /// Three-way diff against the stored attributes; unchanged pairs are not touched.
    async fn reconcile(
        &self,
        txn: &DatabaseTransaction,
        incoming: &HashMap<String, String>,
    ) -> Result<Vec<String>> {
        let stmt = Query::select()
            .columns([KEY, VALUE].map(ident))
            .from(ident(self.table))
            .and_where(Expr::col(ident(self.owner_column)).eq(self.owner_id))
            .to_owned();
        let stored = query_all(txn, &stmt)
            .await?
            .iter()
            .map(|row| {
                Ok((
                    row.try_get::<String>("", KEY)?,
                    row.try_get::<Option<String>>("", VALUE)?,
                ))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let mut failures = Vec::new();
        for (key, value) in sorted(incoming) {
            let failure = match stored.get(key) {
                None => self.insert(txn, key, value).await,
                Some(current) if current.as_deref() != Some(value.as_str()) => {
                    self.update(txn, key, value).await
                }
                Some(_) => None,
            };
            failures.extend(failure);
        }

        let mut removed = stored
            .keys()
            .filter(|key| !incoming.contains_key(*key))
            .collect::<Vec<_>>();
        removed.sort_unstable();
        for key in removed {
            failures.extend(self.delete(txn, key).await);
        }

        Ok(failures)
    }

    async fn insert(&self, txn: &DatabaseTransaction, key: &str, value: &str) -> Option<String> {
        let stmt = Query::insert()
            .into_table(ident(self.table))
            .columns([self.owner_column, KEY, VALUE].map(ident))
            .values_panic([self.owner_id.into(), key.into(), value.into()])
            .to_owned();
        self.check(exec(txn, &stmt).await, "insert", key)
    }

    async fn update(&self, txn: &DatabaseTransaction, key: &str, value: &str) -> Option<String> {
        let stmt = Query::update()
            .table(ident(self.table))
            .values([(ident(VALUE), value.into())])
            .and_where(Expr::col(ident(self.owner_column)).eq(self.owner_id))
            .and_where(Expr::col(ident(KEY)).eq(key))
            .to_owned();
        self.check(exec(txn, &stmt).await, "update", key)
    }

    async fn delete(&self, txn: &DatabaseTransaction, key: &str) -> Option<String> {
        let stmt = Query::delete()
            .from_table(ident(self.table))
            .and_where(Expr::col(ident(self.owner_column)).eq(self.owner_id))
            .and_where(Expr::col(ident(KEY)).eq(key))
            .to_owned();
        self.check(exec(txn, &stmt).await, "delete", key)
    }

    /// A failure message unless exactly one row was affected.
    fn check(
        &self,
        result: Result<sea_orm::ExecResult>,
        action: &str,
        key: &str,
    ) -> Option<String> {
        match result {
            Ok(r) if r.rows_affected() == 1 => None,
            Ok(r) => Some(format!(
                "failed to {} attribute '{}' of {} {}: {} rows affected",
                action,
                key,
                self.table,
                self.owner_id,
                r.rows_affected()
            )),
            Err(e) => Some(format!(
                "failed to {} attribute '{}' of {} {}: {}",
                action, key, self.table, self.owner_id, e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(id: i64, updated: i64, name: &str) -> Property {
        Property::string(name, "v")
            .unwrap()
            .with_id(id)
            .with_updated(updated)
    }

    #[test]
    fn test_plan_partitions_tree() {
        let incoming = vec![
            property(1, 200, "newer").with_property(property(0, 1, "added-child")),
            property(2, 100, "same").with_property(property(3, 100, "kept-child")),
            property(0, 1, "added").with_property(property(0, 1, "added-grandchild")),
            property(42, 1, "foreign"),
        ];
        let mut stored = HashMap::from([(1, 100), (2, 100), (3, 100), (4, 100), (5, 100)]);

        let mut plan = Plan::default();
        plan.walk(&incoming, None, &mut stored);

        assert_eq!(
            plan.actions,
            vec![
                Action::Keep,
                Action::Insert,
                Action::Keep,
                Action::Keep,
                Action::Insert,
                Action::Insert
            ]
        );
        assert_eq!(
            plan.updates.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(
            plan.inserts
                .iter()
                .map(|(parent, p)| (*parent, p.name.as_str()))
                .collect::<Vec<_>>(),
            vec![(Some(1), "added-child"), (None, "added"), (None, "foreign")]
        );

        let mut stale = stored.into_keys().collect::<Vec<_>>();
        stale.sort_unstable();
        assert_eq!(stale, vec![4, 5]);
    }

    #[test]
    fn test_assemble_substitutes_inserted_subtrees() {
        let incoming = vec![
            property(1, 1, "kept").with_property(property(0, 1, "new-child")),
            property(0, 1, "new"),
        ];
        let actions = vec![Action::Keep, Action::Insert, Action::Insert];
        let inserted = vec![property(7, 1, "new-child"), property(8, 1, "new")];

        let assembled = assemble(
            incoming,
            &mut actions.into_iter(),
            &mut inserted.into_iter(),
        );

        assert_eq!(assembled.len(), 2);
        assert_eq!(assembled[0].id, 1);
        assert_eq!(assembled[0].properties[0].id, 7);
        assert_eq!(assembled[1].id, 8);
    }

    #[test]
    fn test_sorted_attributes() {
        let attributes = HashMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        let keys = sorted(&attributes)
            .into_iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
