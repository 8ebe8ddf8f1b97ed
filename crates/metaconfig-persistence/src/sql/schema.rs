//! Table creation for every supported backend

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};
use tracing::debug;

use metaconfig_api::PropertyType;
use metaconfig_common::Result;

use super::column::*;
use crate::mapping::TableMapping;

struct Dialect {
    quote: char,
    id_column: &'static str,
}

impl Dialect {
    fn of(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::MySql => Self {
                quote: '`',
                id_column: "BIGINT AUTO_INCREMENT NOT NULL PRIMARY KEY",
            },
            DatabaseBackend::Postgres => Self {
                quote: '"',
                id_column: "BIGSERIAL PRIMARY KEY",
            },
            DatabaseBackend::Sqlite => Self {
                quote: '"',
                id_column: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
        }
    }

    fn q(&self, name: &str) -> String {
        format!("{0}{1}{0}", self.quote, name)
    }
}

/// `CREATE TABLE IF NOT EXISTS` statements in dependency order.
pub(crate) fn create_statements(backend: DatabaseBackend, mapping: &TableMapping) -> [String; 4] {
    let d = Dialect::of(backend);
    let types = PropertyType::all()
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let configs = format!(
        "CREATE TABLE IF NOT EXISTS {table} ({id} {id_column}, {name} VARCHAR(255) NOT NULL, \
         {description} VARCHAR(1024), {version} INT NOT NULL, {updated} BIGINT NOT NULL)",
        table = d.q(&mapping.configs),
        id = d.q(ID),
        id_column = d.id_column,
        name = d.q(NAME),
        description = d.q(DESCRIPTION),
        version = d.q(VERSION),
        updated = d.q(UPDATED),
    );

    let config_attributes = format!(
        "CREATE TABLE IF NOT EXISTS {table} ({id} {id_column}, {config_id} BIGINT NOT NULL, \
         {key} VARCHAR(255) NOT NULL, {value} VARCHAR(1024), \
         FOREIGN KEY ({config_id}) REFERENCES {configs} ({id}) ON DELETE CASCADE)",
        table = d.q(&mapping.config_attributes),
        id = d.q(ID),
        id_column = d.id_column,
        config_id = d.q(CONFIG_ID),
        key = d.q(KEY),
        value = d.q(VALUE),
        configs = d.q(&mapping.configs),
    );

    let properties = format!(
        "CREATE TABLE IF NOT EXISTS {table} ({id} {id_column}, {property_id} BIGINT, \
         {config_id} BIGINT NOT NULL, {name} VARCHAR(255) NOT NULL, {caption} VARCHAR(255), \
         {description} VARCHAR(1024), {type_} VARCHAR(16) NOT NULL CHECK ({type_} IN ({types})), \
         {value} VARCHAR(4096) NOT NULL, {updated} BIGINT NOT NULL, \
         FOREIGN KEY ({config_id}) REFERENCES {configs} ({id}) ON DELETE CASCADE, \
         FOREIGN KEY ({property_id}) REFERENCES {table} ({id}) ON DELETE CASCADE)",
        table = d.q(&mapping.properties),
        id = d.q(ID),
        id_column = d.id_column,
        property_id = d.q(PROPERTY_ID),
        config_id = d.q(CONFIG_ID),
        name = d.q(NAME),
        caption = d.q(CAPTION),
        description = d.q(DESCRIPTION),
        type_ = d.q(TYPE),
        types = types,
        value = d.q(VALUE),
        updated = d.q(UPDATED),
        configs = d.q(&mapping.configs),
    );

    let property_attributes = format!(
        "CREATE TABLE IF NOT EXISTS {table} ({id} {id_column}, {property_id} BIGINT NOT NULL, \
         {key} VARCHAR(255) NOT NULL, {value} VARCHAR(1024), \
         FOREIGN KEY ({property_id}) REFERENCES {properties} ({id}) ON DELETE CASCADE)",
        table = d.q(&mapping.property_attributes),
        id = d.q(ID),
        id_column = d.id_column,
        property_id = d.q(PROPERTY_ID),
        key = d.q(KEY),
        value = d.q(VALUE),
        properties = d.q(&mapping.properties),
    );

    [configs, config_attributes, properties, property_attributes]
}

pub(crate) async fn create_tables(db: &DatabaseConnection, mapping: &TableMapping) -> Result<()> {
    let backend = db.get_database_backend();

    // cascades depend on it
    if backend == DatabaseBackend::Sqlite {
        db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
    }

    for ddl in create_statements(backend, mapping) {
        debug!(sql = %ddl, "Creating table");
        db.execute_unprepared(&ddl).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_statements_use_backticks() {
        let [configs, _, properties, _] =
            create_statements(DatabaseBackend::MySql, &TableMapping::default());

        assert!(configs.starts_with("CREATE TABLE IF NOT EXISTS `CONFIGS`"));
        assert!(configs.contains("`ID` BIGINT AUTO_INCREMENT NOT NULL PRIMARY KEY"));
        assert!(properties.contains(
            "FOREIGN KEY (`PROPERTY_ID`) REFERENCES `PROPERTIES` (`ID`) ON DELETE CASCADE"
        ));
        assert!(properties.contains("'STRING_ARRAY'"));
    }

    #[test]
    fn test_postgres_statements_use_mapping() {
        let mapping = TableMapping::with_prefix("APP_");
        let [_, config_attributes, _, property_attributes] =
            create_statements(DatabaseBackend::Postgres, &mapping);

        assert!(config_attributes.contains("\"APP_CONFIG_ATTRIBUTES\""));
        assert!(config_attributes.contains("REFERENCES \"APP_CONFIGS\" (\"ID\")"));
        assert!(property_attributes.contains("\"ID\" BIGSERIAL PRIMARY KEY"));
        assert!(property_attributes.contains("REFERENCES \"APP_PROPERTIES\""));
    }

    #[test]
    fn test_sqlite_statements_use_autoincrement() {
        let statements = create_statements(DatabaseBackend::Sqlite, &TableMapping::default());
        assert!(
            statements
                .iter()
                .all(|s| s.contains("\"ID\" INTEGER PRIMARY KEY AUTOINCREMENT"))
        );
    }
}
