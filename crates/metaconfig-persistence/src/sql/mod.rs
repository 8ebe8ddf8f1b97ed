//! SQL-based persistence backend (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Table names come from a [`TableMapping`], so statements are built with
//! `sea_query` against aliased identifiers instead of generated entities.
//! Every write runs in a single transaction that is rolled back as a whole
//! on any failure.

mod page;
mod read;
mod schema;
mod write;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, ExecResult,
    QueryResult, Statement, TransactionTrait,
    sea_query::{
        Alias, InsertStatement, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter,
        SqliteQueryBuilder,
    },
};
use tracing::{debug, info, warn};

use metaconfig_api::{Config, PageRequest, PageResponse};
use metaconfig_common::{
    CREATE_CONFIG_TABLES, DELETE_CONFIGS, MetaConfigError, RECEIVE_CONFIG_NAMES, RECEIVE_CONFIGS,
    RECEIVE_PAGE_RESPONSE, Result, SAVE_CONFIGS,
};

use crate::mapping::TableMapping;
use crate::traits::ConfigRepository;

pub(crate) mod column {
    pub const ID: &str = "ID";
    pub const CONFIG_ID: &str = "CONFIG_ID";
    pub const PROPERTY_ID: &str = "PROPERTY_ID";
    pub const NAME: &str = "NAME";
    pub const CAPTION: &str = "CAPTION";
    pub const DESCRIPTION: &str = "DESCRIPTION";
    pub const VERSION: &str = "VERSION";
    pub const UPDATED: &str = "UPDATED";
    pub const TYPE: &str = "TYPE";
    pub const KEY: &str = "KEY";
    pub const VALUE: &str = "VALUE";
}

/// Config repository backed by a relational database
///
/// Wraps a SeaORM `DatabaseConnection`; the four tables are created on
/// construction if they do not exist yet.
pub struct DbConfigRepository {
    db: DatabaseConnection,
    mapping: TableMapping,
}

impl DbConfigRepository {
    /// Create the repository and its tables using the default table names
    pub async fn new(db: DatabaseConnection) -> Result<Self> {
        Self::with_mapping(db, TableMapping::default()).await
    }

    /// Create the repository and its tables using custom table names
    pub async fn with_mapping(db: DatabaseConnection, mapping: TableMapping) -> Result<Self> {
        mapping
            .validate()
            .map_err(|e| MetaConfigError::operation(CREATE_CONFIG_TABLES, e))?;
        schema::create_tables(&db, &mapping)
            .await
            .map_err(|e| MetaConfigError::operation(CREATE_CONFIG_TABLES, e))?;

        info!(
            backend = ?db.get_database_backend(),
            configs = %mapping.configs,
            "Config tables are ready"
        );

        Ok(Self { db, mapping })
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    async fn begin(&self) -> Result<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| MetaConfigError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ConfigRepository for DbConfigRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<Config>> {
        read::find_by_names(&self.db, &self.mapping, names)
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_CONFIGS, e))
    }

    async fn find_names(&self) -> Result<Vec<String>> {
        page::find_names(&self.db, &self.mapping)
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_CONFIG_NAMES, e))
    }

    async fn find_by_page_request(&self, request: &PageRequest) -> Result<PageResponse> {
        page::find_page(&self.db, &self.mapping, request)
            .await
            .map_err(|e| MetaConfigError::operation(RECEIVE_PAGE_RESPONSE, e))
    }

    async fn save_and_flush(&self, configs: Vec<Config>) -> Result<Vec<Config>> {
        if configs.is_empty() {
            return Ok(Vec::new());
        }

        let result = async {
            configs.iter().try_for_each(Config::validate)?;
            let txn = self.begin().await?;
            let saved = write::save(&txn, &self.mapping, configs).await;
            finish(txn, saved).await
        }
        .await;

        result.map_err(|e| MetaConfigError::operation(SAVE_CONFIGS, e))
    }

    async fn delete(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let result = async {
            let txn = self.begin().await?;
            let deleted = write::delete(&txn, &self.mapping, names).await;
            finish(txn, deleted).await
        }
        .await;

        result.map_err(|e| MetaConfigError::operation(DELETE_CONFIGS, e))
    }
}

/// Commits on success, otherwise rolls back keeping the original error.
async fn finish<T>(txn: DatabaseTransaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(error) => {
            warn!(error = %error, "Rolling back config transaction");
            match txn.rollback().await {
                Ok(()) => Err(error),
                Err(rollback) => Err(MetaConfigError::Rollback {
                    original: error.to_string(),
                    rollback: rollback.to_string(),
                }),
            }
        }
    }
}

pub(crate) fn ident(name: &str) -> Alias {
    Alias::new(name)
}

fn build_stmt<S: QueryStatementWriter>(backend: DatabaseBackend, stmt: &S) -> Statement {
    let (sql, values) = match backend {
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
    };
    Statement::from_sql_and_values(backend, sql, values)
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> Result<ExecResult>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let statement = build_stmt(conn.get_database_backend(), stmt);
    debug!(sql = %statement.sql, "Executing statement");
    Ok(conn.execute(statement).await?)
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let statement = build_stmt(conn.get_database_backend(), stmt);
    debug!(sql = %statement.sql, "Executing query");
    Ok(conn.query_all(statement).await?)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let statement = build_stmt(conn.get_database_backend(), stmt);
    debug!(sql = %statement.sql, "Executing query");
    Ok(conn.query_one(statement).await?)
}

/// Runs an insert of a single row and returns its generated id.
pub(crate) async fn insert_returning_id<C: ConnectionTrait>(
    conn: &C,
    mut stmt: InsertStatement,
) -> Result<i64> {
    if conn.get_database_backend().support_returning() {
        stmt.returning_col(ident(column::ID));
        let row = query_one(conn, &stmt).await?.ok_or_else(|| {
            MetaConfigError::Statement("insert returned no generated id".to_string())
        })?;
        return Ok(row.try_get::<i64>("", column::ID)?);
    }

    let result = exec(conn, &stmt).await?;
    if result.rows_affected() != 1 {
        return Err(MetaConfigError::Statement(format!(
            "insert affected {} rows instead of 1",
            result.rows_affected()
        )));
    }
    Ok(result.last_insert_id() as i64)
}
