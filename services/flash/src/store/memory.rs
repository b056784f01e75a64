//! HashMap-backed document store for tests and local runs.

use super::{
    ClientOptions, CollectionRef, Connector, DocumentStore, Filter, InsertOneResult, StoreError,
};
use crate::model::SchemaShape;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

struct StoredCollection {
    schema: SchemaShape,
    documents: Vec<(Uuid, Value)>,
}

/// In-memory store. Clones share the same collections.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<CollectionRef, StoredCollection>>>,
    credentials: Option<(String, String)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept connections presenting these credentials
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((username.into(), password.into())),
            ..Self::default()
        }
    }

    /// Snapshot of a collection's documents in insertion order
    pub fn documents(&self, collection: &CollectionRef) -> Vec<Value> {
        self.collections
            .read()
            .map(|collections| {
                collections
                    .get(collection)
                    .map(|c| c.documents.iter().map(|(_, doc)| doc.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.read().map(|c| c.len()).unwrap_or(0)
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait]
impl Connector for InMemoryStore {
    async fn connect(
        &self,
        options: &ClientOptions,
    ) -> Result<Arc<dyn DocumentStore>, StoreError> {
        if options.hosts.is_empty() {
            return Err(StoreError::NoHosts);
        }

        if let Some((username, password)) = &self.credentials {
            if &options.username != username || &options.password != password {
                return Err(StoreError::Unauthorized(options.username.clone()));
            }
        }

        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn ensure_collection(
        &self,
        collection: &CollectionRef,
        schema: &SchemaShape,
    ) -> Result<(), StoreError> {
        collection.validate()?;

        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        match collections.get(collection) {
            Some(existing) if &existing.schema != schema => Err(StoreError::SchemaMismatch {
                collection: collection.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                debug!(collection = %collection, "Creating in-memory collection");
                collections.insert(
                    collection.clone(),
                    StoredCollection {
                        schema: schema.clone(),
                        documents: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn insert_one(
        &self,
        collection: &CollectionRef,
        document: Value,
    ) -> Result<InsertOneResult, StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let inserted_id = Uuid::new_v4();
        stored.documents.push((inserted_id, document));

        Ok(InsertOneResult { inserted_id })
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;

        let stored = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        Ok(stored
            .documents
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldKind;
    use serde_json::json;
    use std::time::Duration;

    fn options(username: &str, password: &str) -> ClientOptions {
        ClientOptions {
            hosts: vec!["localhost:27017".to_string()],
            username: username.to_string(),
            password: password.to_string(),
            timeout: Duration::from_millis(1000),
        }
    }

    fn shape() -> SchemaShape {
        SchemaShape::new("metric").field("ethylene", FieldKind::Number)
    }

    #[tokio::test]
    async fn test_connect_checks_credentials() {
        let store = InMemoryStore::with_credentials("root", "secret");

        assert!(store.connect(&options("root", "secret")).await.is_ok());
        assert!(matches!(
            store.connect(&options("root", "wrong")).await,
            Err(StoreError::Unauthorized(user)) if user == "root"
        ));

        let mut no_hosts = options("root", "secret");
        no_hosts.hosts.clear();
        assert!(matches!(
            store.connect(&no_hosts).await,
            Err(StoreError::NoHosts)
        ));
    }

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let store = InMemoryStore::new();
        let collection = CollectionRef::new("retail", "metric");

        store.ensure_collection(&collection, &shape()).await.unwrap();
        store
            .insert_one(&collection, json!({"ethylene": 1.0}))
            .await
            .unwrap();
        store.ensure_collection(&collection, &shape()).await.unwrap();

        assert_eq!(store.collection_count(), 1);
        assert_eq!(store.documents(&collection).len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_collection_rejects_other_schema() {
        let store = InMemoryStore::new();
        let collection = CollectionRef::new("retail", "metric");

        store.ensure_collection(&collection, &shape()).await.unwrap();
        let result = store
            .ensure_collection(&collection, &SchemaShape::new("inventory"))
            .await;

        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_insert_into_unknown_collection() {
        let store = InMemoryStore::new();
        let result = store
            .insert_one(&CollectionRef::new("retail", "flash"), json!({}))
            .await;

        assert!(matches!(result, Err(StoreError::UnknownCollection(_))));
    }

    #[tokio::test]
    async fn test_find_preserves_insertion_order() {
        let store = InMemoryStore::new();
        let collection = CollectionRef::new("retail", "metric");
        store.ensure_collection(&collection, &shape()).await.unwrap();

        for ethylene in [0.9, 0.1, 0.6] {
            store
                .insert_one(&collection, json!({ "ethylene": ethylene }))
                .await
                .unwrap();
        }

        let found = store
            .find(&collection, &Filter::new().gte("ethylene", 0.5))
            .await
            .unwrap();

        assert_eq!(found, vec![json!({"ethylene": 0.9}), json!({"ethylene": 0.6})]);
    }
}
