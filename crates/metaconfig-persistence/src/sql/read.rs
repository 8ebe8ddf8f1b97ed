//! Read path: one joined query per batch of names, folded back into trees

use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::{
    ConnectionTrait, QueryResult,
    sea_query::{Expr, JoinType, Order, Query, SelectStatement},
};

use metaconfig_api::{Config, Property, PropertyType};
use metaconfig_common::Result;

use super::column::*;
use super::{ident, query_all};
use crate::mapping::TableMapping;

const C: &str = "C";
const CA: &str = "CA";
const P: &str = "P";
const PA: &str = "PA";

pub(crate) async fn find_by_names<Db: ConnectionTrait>(
    conn: &Db,
    mapping: &TableMapping,
    names: &[String],
) -> Result<Vec<Config>> {
    let mut seen = HashSet::new();
    let names = names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let rows = query_all(conn, &select_trees(mapping, names)).await?;

    let mut assembler = TreeAssembler::default();
    for row in &rows {
        assembler.push(JoinedRow::from_query_result(row)?);
    }

    Ok(assembler.finish())
}

/// One row per config x property x config attribute x property attribute.
fn select_trees(mapping: &TableMapping, names: Vec<String>) -> SelectStatement {
    let col = |table: &str, column: &str| Expr::col((ident(table), ident(column)));

    Query::select()
        .expr_as(col(C, ID), ident("config_id"))
        .expr_as(col(C, NAME), ident("config_name"))
        .expr_as(col(C, DESCRIPTION), ident("config_description"))
        .expr_as(col(C, VERSION), ident("config_version"))
        .expr_as(col(C, UPDATED), ident("config_updated"))
        .expr_as(col(CA, KEY), ident("config_attribute_key"))
        .expr_as(col(CA, VALUE), ident("config_attribute_value"))
        .expr_as(col(P, ID), ident("property_id"))
        .expr_as(col(P, PROPERTY_ID), ident("property_parent_id"))
        .expr_as(col(P, NAME), ident("property_name"))
        .expr_as(col(P, CAPTION), ident("property_caption"))
        .expr_as(col(P, DESCRIPTION), ident("property_description"))
        .expr_as(col(P, TYPE), ident("property_type"))
        .expr_as(col(P, VALUE), ident("property_value"))
        .expr_as(col(P, UPDATED), ident("property_updated"))
        .expr_as(col(PA, KEY), ident("property_attribute_key"))
        .expr_as(col(PA, VALUE), ident("property_attribute_value"))
        .from_as(ident(&mapping.configs), ident(C))
        .join_as(
            JoinType::LeftJoin,
            ident(&mapping.properties),
            ident(P),
            col(C, ID).equals((ident(P), ident(CONFIG_ID))),
        )
        .join_as(
            JoinType::LeftJoin,
            ident(&mapping.config_attributes),
            ident(CA),
            col(C, ID).equals((ident(CA), ident(CONFIG_ID))),
        )
        .join_as(
            JoinType::LeftJoin,
            ident(&mapping.property_attributes),
            ident(PA),
            col(P, ID).equals((ident(PA), ident(PROPERTY_ID))),
        )
        .and_where(col(C, NAME).is_in(names))
        .order_by((ident(C), ident(ID)), Order::Asc)
        .order_by((ident(P), ident(ID)), Order::Asc)
        .to_owned()
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ConfigRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub updated: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PropertyRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub property_type: PropertyType,
    pub value: String,
    pub updated: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct JoinedRow {
    pub config: ConfigRow,
    pub config_attribute: Option<(String, String)>,
    pub property: Option<PropertyRow>,
    pub property_attribute: Option<(String, String)>,
}

impl JoinedRow {
    fn from_query_result(row: &QueryResult) -> Result<Self> {
        let config = ConfigRow {
            id: row.try_get("", "config_id")?,
            name: row.try_get("", "config_name")?,
            description: row.try_get("", "config_description")?,
            version: row.try_get("", "config_version")?,
            updated: row.try_get("", "config_updated")?,
        };

        let config_attribute = attribute(
            row.try_get("", "config_attribute_key")?,
            row.try_get("", "config_attribute_value")?,
        );

        let property = match row.try_get::<Option<i64>>("", "property_id")? {
            Some(id) => Some(PropertyRow {
                id,
                parent_id: row.try_get("", "property_parent_id")?,
                name: row.try_get("", "property_name")?,
                caption: row.try_get("", "property_caption")?,
                description: row.try_get("", "property_description")?,
                property_type: row.try_get::<String>("", "property_type")?.parse()?,
                value: row.try_get("", "property_value")?,
                updated: row.try_get("", "property_updated")?,
            }),
            None => None,
        };

        let property_attribute = attribute(
            row.try_get("", "property_attribute_key")?,
            row.try_get("", "property_attribute_value")?,
        );

        Ok(Self {
            config,
            config_attribute,
            property,
            property_attribute,
        })
    }
}

fn attribute(key: Option<String>, value: Option<String>) -> Option<(String, String)> {
    key.map(|k| (k, value.unwrap_or_default()))
}

struct PropertyNode {
    config_id: i64,
    parent_id: Option<i64>,
    property: Property,
}

/// Folds joined rows into config trees.
///
/// Rows may arrive in any order: headers and attributes are collected into
/// id-keyed maps first and parent/child links are resolved in [`finish`].
///
/// [`finish`]: TreeAssembler::finish
#[derive(Default)]
pub(crate) struct TreeAssembler {
    configs: BTreeMap<i64, Config>,
    properties: BTreeMap<i64, PropertyNode>,
}

impl TreeAssembler {
    pub(crate) fn push(&mut self, row: JoinedRow) {
        let config_id = row.config.id;
        let config = self.configs.entry(config_id).or_insert_with(|| Config {
            id: row.config.id,
            name: row.config.name,
            description: row.config.description,
            version: row.config.version,
            updated: row.config.updated,
            attributes: HashMap::new(),
            properties: Vec::new(),
        });
        if let Some((key, value)) = row.config_attribute {
            config.attributes.entry(key).or_insert(value);
        }

        let Some(property) = row.property else {
            return;
        };
        let node = self
            .properties
            .entry(property.id)
            .or_insert_with(|| PropertyNode {
                config_id,
                parent_id: property.parent_id,
                property: Property {
                    id: property.id,
                    name: property.name,
                    caption: property.caption,
                    description: property.description,
                    property_type: property.property_type,
                    value: property.value,
                    updated: property.updated,
                    attributes: HashMap::new(),
                    properties: Vec::new(),
                },
            });
        if let Some((key, value)) = row.property_attribute {
            node.property.attributes.entry(key).or_insert(value);
        }
    }

    /// Configs ordered by id; children ordered by property id.
    pub(crate) fn finish(self) -> Vec<Config> {
        let TreeAssembler {
            configs,
            properties,
        } = self;

        let mut roots: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for (id, node) in &properties {
            let parent = node.parent_id.filter(|parent| {
                properties
                    .get(parent)
                    .is_some_and(|p| p.config_id == node.config_id)
            });
            match parent {
                Some(parent) => children.entry(parent).or_default().push(*id),
                None => roots.entry(node.config_id).or_default().push(*id),
            }
        }

        let mut nodes: HashMap<i64, Property> = properties
            .into_iter()
            .map(|(id, node)| (id, node.property))
            .collect();

        configs
            .into_iter()
            .map(|(id, mut config)| {
                config.properties = roots
                    .get(&id)
                    .map(|ids| build_children(ids, &mut nodes, &children))
                    .unwrap_or_default();
                config
            })
            .collect()
    }
}

fn build_children(
    ids: &[i64],
    nodes: &mut HashMap<i64, Property>,
    children: &HashMap<i64, Vec<i64>>,
) -> Vec<Property> {
    ids.iter()
        .filter_map(|id| {
            // removal makes every node attach at most once
            let mut property = nodes.remove(id)?;
            if let Some(child_ids) = children.get(id) {
                property.properties = build_children(child_ids, nodes, children);
            }
            Some(property)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config_row(id: i64, name: &str) -> ConfigRow {
        ConfigRow {
            id,
            name: name.to_string(),
            description: None,
            version: 1,
            updated: 100,
        }
    }

    fn property_row(id: i64, parent_id: Option<i64>, name: &str) -> PropertyRow {
        PropertyRow {
            id,
            parent_id,
            name: name.to_string(),
            caption: None,
            description: None,
            property_type: PropertyType::String,
            value: format!("{}-value", name),
            updated: 100,
        }
    }

    fn row(
        config: ConfigRow,
        config_attribute: Option<(&str, &str)>,
        property: Option<PropertyRow>,
        property_attribute: Option<(&str, &str)>,
    ) -> JoinedRow {
        let pair = |p: Option<(&str, &str)>| p.map(|(k, v)| (k.to_string(), v.to_string()));
        JoinedRow {
            config,
            config_attribute: pair(config_attribute),
            property,
            property_attribute: pair(property_attribute),
        }
    }

    /// Two configs; `app` has attributes on both levels and a three-level tree.
    fn sample_rows() -> Vec<JoinedRow> {
        let app = || config_row(1, "app");
        let property = |id, parent_id, name| Some(property_row(id, parent_id, name));
        let env = Some(("env", "dev"));
        let team = Some(("team", "core"));
        let kv = Some(("k", "v"));

        vec![
            row(app(), env, property(10, None, "server"), kv),
            row(app(), team, property(10, None, "server"), kv),
            row(app(), env, property(11, Some(10), "http"), None),
            row(app(), team, property(11, Some(10), "http"), None),
            row(app(), env, property(12, Some(11), "port"), None),
            row(app(), env, property(13, None, "db"), None),
            row(app(), env, property(14, Some(10), "tls"), None),
            row(config_row(2, "empty"), None, None, None),
        ]
    }

    fn assemble(rows: Vec<JoinedRow>) -> Vec<Config> {
        let mut assembler = TreeAssembler::default();
        rows.into_iter().for_each(|r| assembler.push(r));
        assembler.finish()
    }

    #[test]
    fn test_assemble_builds_nested_tree() {
        let configs = assemble(sample_rows());

        assert_eq!(configs.len(), 2);
        let app = &configs[0];
        assert_eq!(app.name, "app");
        assert_eq!(app.attributes.len(), 2);
        assert_eq!(app.attribute("team"), Some("core"));
        assert_eq!(
            app.properties.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["server", "db"]
        );

        let server = &app.properties[0];
        assert_eq!(server.attributes.len(), 1);
        assert_eq!(
            server.properties.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![11, 14]
        );
        assert_eq!(
            app.property(&["server", "http", "port"]).unwrap().value,
            "port-value"
        );
        assert_eq!(app.property_count(), 5);

        let empty = &configs[1];
        assert!(empty.attributes.is_empty());
        assert!(empty.properties.is_empty());
    }

    #[test]
    fn test_assemble_handles_children_before_parents() {
        let mut rows = sample_rows();
        rows.reverse();

        assert_eq!(assemble(rows), assemble(sample_rows()));
    }

    #[test]
    fn test_assemble_treats_missing_parent_as_root() {
        let rows = vec![row(
            config_row(1, "app"),
            None,
            Some(property_row(5, Some(99), "orphan")),
            None,
        )];

        let configs = assemble(rows);
        assert_eq!(configs[0].properties.len(), 1);
        assert_eq!(configs[0].properties[0].name, "orphan");
    }

    proptest! {
        #[test]
        fn test_assemble_is_order_independent(rows in Just(sample_rows()).prop_shuffle()) {
            prop_assert_eq!(assemble(rows), assemble(sample_rows()));
        }
    }
}
