//! PostgreSQL document backend.
//!
//! Each store database maps to a PostgreSQL schema and each collection to a
//! table holding JSONB documents. Schema shapes are recorded in a per-database
//! catalog table so re-provisioning can detect mismatches.

use super::{
    validate_identifier, ClientOptions, CollectionRef, Connector, DocumentStore, Filter,
    InsertOneResult, StoreError, MAX_IDENTIFIER_LEN,
};
use crate::model::SchemaShape;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Catalog table recording each collection's schema shape
const CATALOG_TABLE: &str = "_collection_schemas";

const DEFAULT_PORT: u16 = 5432;

/// Connects to the first reachable host in order
#[derive(Debug, Clone)]
pub struct PgConnector {
    max_connections: u32,
}

impl PgConnector {
    pub fn new(max_connections: u32) -> Self {
        Self { max_connections }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        options: &ClientOptions,
    ) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let store = PgDocumentStore::connect(options, self.max_connections).await?;
        Ok(Arc::new(store))
    }
}

/// Document store over a PostgreSQL connection pool
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Try each host in order; the first successful pool wins
    pub async fn connect(
        options: &ClientOptions,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let mut last_error = StoreError::NoHosts;

        for host in &options.hosts {
            let (hostname, port) = match parse_host(host) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(host = %host, error = %e, "Skipping malformed PostgreSQL host");
                    last_error = e;
                    continue;
                }
            };
            let connect_options = PgConnectOptions::new()
                .host(hostname)
                .port(port)
                .username(&options.username)
                .password(&options.password);

            let pool_options = PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(options.timeout);

            match pool_options.connect_with(connect_options).await {
                Ok(pool) => {
                    info!(host = %host, "Connected to PostgreSQL document store");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "Failed to connect to PostgreSQL host");
                    last_error = StoreError::Database(e);
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip_all, fields(collection = %collection))]
    async fn ensure_collection(
        &self,
        collection: &CollectionRef,
        schema: &SchemaShape,
    ) -> Result<(), StoreError> {
        collection.validate()?;
        if collection.name == CATALOG_TABLE {
            return Err(StoreError::InvalidIdentifier(collection.name.clone()));
        }

        let database = quote_identifier(&collection.database)?;
        let schema_json = serde_json::to_value(schema)?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", database))
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {}.{} (
                name TEXT PRIMARY KEY,
                schema JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            database,
            quote_identifier(CATALOG_TABLE)?
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO {}.{} (name, schema) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            database,
            quote_identifier(CATALOG_TABLE)?
        ))
        .bind(&collection.name)
        .bind(&schema_json)
        .execute(&self.pool)
        .await?;

        let registered: Value = sqlx::query_scalar(&format!(
            "SELECT schema FROM {}.{} WHERE name = $1",
            database,
            quote_identifier(CATALOG_TABLE)?
        ))
        .bind(&collection.name)
        .fetch_one(&self.pool)
        .await?;

        if registered != schema_json {
            return Err(StoreError::SchemaMismatch {
                collection: collection.to_string(),
            });
        }

        sqlx::query(&create_table_sql(collection)?)
            .execute(&self.pool)
            .await?;

        for field in &schema.indexes {
            sqlx::query(&create_index_sql(collection, schema, field)?)
                .execute(&self.pool)
                .await?;
        }

        debug!(indexes = schema.indexes.len(), "Collection ensured");
        Ok(())
    }

    async fn insert_one(
        &self,
        collection: &CollectionRef,
        document: Value,
    ) -> Result<InsertOneResult, StoreError> {
        let inserted_id = Uuid::new_v4();

        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2)",
            qualified_table(collection)?
        ))
        .bind(inserted_id)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(InsertOneResult { inserted_id })
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        let sql = find_sql(collection, filter)?;
        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        for condition in filter.conditions() {
            query = query.bind(condition.value);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Split `host[:port]`, defaulting to 5432
fn parse_host(host: &str) -> Result<(&str, u16), StoreError> {
    match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse()
                .map_err(|_| StoreError::Backend(format!("Invalid port in host {:?}", host)))?;
            Ok((name, port))
        }
        None => Ok((host, DEFAULT_PORT)),
    }
}

fn quote_identifier(name: &str) -> Result<String, StoreError> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

fn qualified_table(collection: &CollectionRef) -> Result<String, StoreError> {
    Ok(format!(
        "{}.{}",
        quote_identifier(&collection.database)?,
        quote_identifier(&collection.name)?
    ))
}

/// Field accessor; numeric fields are cast so comparisons and indexes agree.
/// Non-numeric JSON values read as NULL and never match a comparison.
fn field_expression(field: &str, numeric: bool) -> Result<String, StoreError> {
    validate_identifier(field)?;
    if numeric {
        Ok(format!(
            "(CASE WHEN jsonb_typeof(doc->'{0}') = 'number' THEN (doc->>'{0}')::float8 END)",
            field
        ))
    } else {
        Ok(format!("(doc->>'{}')", field))
    }
}

fn create_table_sql(collection: &CollectionRef) -> Result<String, StoreError> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         seq BIGSERIAL, \
         id UUID PRIMARY KEY, \
         doc JSONB NOT NULL, \
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
        qualified_table(collection)?
    ))
}

fn create_index_sql(
    collection: &CollectionRef,
    schema: &SchemaShape,
    field: &str,
) -> Result<String, StoreError> {
    let numeric = schema.kind_of(field).map(|k| k.is_numeric()).unwrap_or(false);
    let index_name = quote_identifier(&index_name(collection, field))?;

    Ok(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} (({}))",
        index_name,
        qualified_table(collection)?,
        field_expression(field, numeric)?
    ))
}

/// `<collection>_<field>_idx`, or a digest of it when that exceeds the
/// identifier limit
fn index_name(collection: &CollectionRef, field: &str) -> String {
    let name = format!("{}_{}_idx", collection.name, field);
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name;
    }

    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes());
    format!("idx_{}", digest.simple())
}

/// Parameterized SELECT; values bind as `$1..$n` in condition order
fn find_sql(collection: &CollectionRef, filter: &Filter) -> Result<String, StoreError> {
    let mut sql = format!("SELECT doc FROM {} WHERE 1=1", qualified_table(collection)?);

    for (i, condition) in filter.conditions().iter().enumerate() {
        sql.push_str(&format!(
            " AND {} {} ${}",
            field_expression(&condition.field, true)?,
            condition.comparison.sql_operator(),
            i + 1
        ));
    }

    sql.push_str(" ORDER BY seq ASC");
    Ok(sql)
}
