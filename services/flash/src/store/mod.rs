//! Document store seam.
//!
//! The service talks to its backing store only through [`Connector`] and
//! [`DocumentStore`]. Documents travel as `serde_json::Value`; collections are
//! addressed by database and name, mirroring a Mongo-style layout.

mod filter;
mod memory;
mod postgres;

use crate::model::SchemaShape;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub use filter::{Comparison, Condition, Filter};
pub use memory::InMemoryStore;
pub use postgres::{PgConnector, PgDocumentStore};

/// Longest identifier accepted for databases, collections and fields
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Errors raised by store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No hosts configured")]
    NoHosts,

    #[error("Authentication failed for user {0}")]
    Unauthorized(String),

    #[error("Invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("Collection {collection} already exists with a different schema")]
    SchemaMismatch { collection: String },

    #[error("Collection {0} does not exist")]
    UnknownCollection(String),

    #[error("Failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Database plus collection name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    pub database: String,
    pub name: String,
}

impl CollectionRef {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    /// Check both parts are plain identifiers
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_identifier(&self.database)?;
        validate_identifier(&self.name)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

/// Acknowledgement for a single inserted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertOneResult {
    pub inserted_id: Uuid,
}

/// Connection parameters handed to a [`Connector`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub hosts: Vec<String>,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

/// Collection-level operations on a connected store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the collection with `schema` if absent. Idempotent.
    async fn ensure_collection(
        &self,
        collection: &CollectionRef,
        schema: &SchemaShape,
    ) -> Result<(), StoreError>;

    async fn insert_one(
        &self,
        collection: &CollectionRef,
        document: Value,
    ) -> Result<InsertOneResult, StoreError>;

    /// Documents matching `filter`, in store order
    async fn find(
        &self,
        collection: &CollectionRef,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError>;

    /// Round-trip to the store, for readiness checks
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Opens store clients
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ClientOptions)
        -> Result<Arc<dyn DocumentStore>, StoreError>;
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` up to [`MAX_IDENTIFIER_LEN`] bytes
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start
        || name.len() > MAX_IDENTIFIER_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}
