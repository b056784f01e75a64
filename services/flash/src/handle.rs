use crate::config::DbConfig;
use crate::error::FlashError;
use crate::model::Document;
use crate::store::{CollectionRef, Connector, DocumentStore, Filter, InsertOneResult, StoreError};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, instrument};

/// Provisioned reference to a single store collection holding `D` documents
pub struct StoreHandle<D> {
    client: Arc<dyn DocumentStore>,
    collection: CollectionRef,
    _document: PhantomData<fn() -> D>,
}

impl<D> Clone for StoreHandle<D> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            collection: self.collection.clone(),
            _document: PhantomData,
        }
    }
}

impl<D: Document> StoreHandle<D> {
    /// Connect with `config` and ensure its collection exists with `D`'s schema
    #[instrument(skip_all, fields(database = %config.database, collection = %config.collection))]
    pub async fn provision(connector: &dyn Connector, config: &DbConfig) -> Result<Self, FlashError> {
        let client = connector
            .connect(&config.client_options())
            .await
            .map_err(FlashError::Connection)?;

        Self::attach(client, &config.database, &config.collection).await
    }

    /// Ensure a collection on an already connected client
    pub async fn attach(
        client: Arc<dyn DocumentStore>,
        database: &str,
        collection: &str,
    ) -> Result<Self, FlashError> {
        let collection = CollectionRef::new(database, collection);
        let schema = D::schema();

        client
            .ensure_collection(&collection, &schema)
            .await
            .map_err(|source| FlashError::Provisioning {
                collection: collection.to_string(),
                source,
            })?;

        info!(collection = %collection, schema = %schema.name, "Collection ready");

        Ok(Self {
            client,
            collection,
            _document: PhantomData,
        })
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn client(&self) -> &Arc<dyn DocumentStore> {
        &self.client
    }

    pub async fn insert_one(&self, document: &D) -> Result<InsertOneResult, StoreError> {
        let value = serde_json::to_value(document)?;
        self.client.insert_one(&self.collection, value).await
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        self.client
            .find(&self.collection, filter)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }
}
