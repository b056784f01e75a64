use crate::error::FlashError;
use crate::handle::StoreHandle;
use crate::identity::{IdGenerator, UuidV4Generator};
use crate::model::Flash;
use crate::store::InsertOneResult;
use crate::validation::validate_flash;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Outcome of a fully stored flash sale batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReceipt {
    /// ID shared by every record in the batch
    pub flash_id: Uuid,
    /// One acknowledgement per record, in input order
    pub inserted: Vec<InsertOneResult>,
}

/// Validates and stores flash sale batches.
///
/// Records are written one at a time in input order. A batch is not atomic:
/// when a record fails validation or insertion the batch stops there and the
/// records before it stay stored. The failing position is reported in the
/// error so callers can reconcile.
pub struct FlashSaleWriter {
    handle: StoreHandle<Flash>,
    ids: Arc<dyn IdGenerator>,
}

impl FlashSaleWriter {
    pub fn new(handle: StoreHandle<Flash>) -> Self {
        Self::with_id_generator(handle, Arc::new(UuidV4Generator))
    }

    pub fn with_id_generator(handle: StoreHandle<Flash>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { handle, ids }
    }

    pub fn handle(&self) -> &StoreHandle<Flash> {
        &self.handle
    }

    /// Store a batch, returning one acknowledgement per record
    pub async fn add_flash_sale(
        &self,
        records: Vec<Flash>,
    ) -> Result<Vec<InsertOneResult>, FlashError> {
        self.write_batch(records).await.map(|receipt| receipt.inserted)
    }

    /// Store a batch and report the flash ID it was stamped with
    #[instrument(skip_all, fields(collection = %self.handle.collection(), batch_size = records.len()))]
    pub async fn write_batch(&self, records: Vec<Flash>) -> Result<BatchReceipt, FlashError> {
        let flash_id = self.ids.generate().map_err(|e| {
            error!(error = %e, "Unable to generate flash ID");
            metrics::counter!("flash.batches.failed").increment(1);
            FlashError::IdentityGeneration(e)
        })?;

        let mut inserted = Vec::with_capacity(records.len());

        for (index, mut record) in records.into_iter().enumerate() {
            stamp(&mut record, flash_id, Utc::now().timestamp());

            if let Err(field) = validate_flash(&record) {
                warn!(flash_id = %flash_id, index, field = %field, "Rejected flash sale record");
                metrics::counter!("flash.records.rejected").increment(1);
                metrics::counter!("flash.batches.failed").increment(1);
                return Err(FlashError::Validation { field, index });
            }

            let result = self.handle.insert_one(&record).await.map_err(|source| {
                error!(flash_id = %flash_id, index, error = %source, "Unable to insert flash sale record");
                metrics::counter!("flash.batches.failed").increment(1);
                FlashError::Insertion { index, source }
            })?;

            debug!(inserted_id = %result.inserted_id, index, "Inserted flash sale record");
            metrics::counter!("flash.records.inserted").increment(1);
            inserted.push(result);
        }

        info!(flash_id = %flash_id, inserted = inserted.len(), "Flash sale batch stored");

        Ok(BatchReceipt { flash_id, inserted })
    }
}

/// Overwrite the writer-owned fields
fn stamp(record: &mut Flash, flash_id: Uuid, timestamp: i64) {
    record.flash_id = flash_id;
    record.timestamp = timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdGenerationError, MockIdGenerator};
    use crate::model::sample_flash;
    use crate::store::{CollectionRef, InMemoryStore, MockDocumentStore, StoreError};
    use crate::validation::FlashField;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    async fn memory_writer(store: &InMemoryStore) -> FlashSaleWriter {
        let handle = StoreHandle::<Flash>::attach(Arc::new(store.clone()), "retail", "flash")
            .await
            .unwrap();
        FlashSaleWriter::new(handle)
    }

    fn stored(store: &InMemoryStore) -> Vec<Flash> {
        store
            .documents(&CollectionRef::new("retail", "flash"))
            .into_iter()
            .map(|doc| serde_json::from_value(doc).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_valid_batch_is_stored_in_order() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;
        let before = Utc::now().timestamp();

        let mut batch = vec![sample_flash(), sample_flash(), sample_flash()];
        batch[0].name = "Apple".to_string();
        batch[1].name = "Banana".to_string();
        batch[2].name = "Pear".to_string();

        let receipt = assert_ok!(writer.write_batch(batch).await);
        assert_eq!(receipt.inserted.len(), 3);
        assert!(!receipt.flash_id.is_nil());

        let records = stored(&store);
        let names: Vec<_> = records.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Banana", "Pear"]);
        for record in &records {
            assert_eq!(record.flash_id, receipt.flash_id);
            assert!(record.timestamp >= before);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_stores_nothing() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;

        let inserted = assert_ok!(writer.add_flash_sale(Vec::new()).await);
        assert!(inserted.is_empty());
        assert!(stored(&store).is_empty());
    }

    #[tokio::test]
    async fn test_batch_halts_at_invalid_upc() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;

        let mut bad = sample_flash();
        bad.upc = 0;
        let batch = vec![sample_flash(), bad, sample_flash()];

        let err = assert_err!(writer.add_flash_sale(batch).await);
        assert_eq!(err.to_string(), "UPC not found");
        assert!(matches!(
            err,
            FlashError::Validation {
                field: FlashField::Upc,
                index: 1
            }
        ));

        // First record stays stored, the third is never attempted
        assert_eq!(stored(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_each_rejection_stops_before_insert() {
        let breakers: [(FlashField, fn(&mut Flash)); 8] = [
            (FlashField::ItemId, |f: &mut Flash| f.item_id = Uuid::nil()),
            (FlashField::Sku, |f: &mut Flash| f.sku = 0),
            (FlashField::Name, |f: &mut Flash| f.name.clear()),
            (FlashField::Origin, |f: &mut Flash| f.origin.clear()),
            (FlashField::DeviceId, |f: &mut Flash| f.device_id = Uuid::nil()),
            (FlashField::Price, |f: &mut Flash| f.price = 0.0),
            (FlashField::SalePrice, |f: &mut Flash| f.sale_price = -1.0),
            (FlashField::Ethylene, |f: &mut Flash| f.ethylene = 0.0),
        ];

        for (expected, break_field) in breakers {
            let store = InMemoryStore::new();
            let writer = memory_writer(&store).await;
            let mut bad = sample_flash();
            break_field(&mut bad);

            let err = assert_err!(writer.add_flash_sale(vec![bad, sample_flash()]).await);
            assert!(
                matches!(err, FlashError::Validation { field, index: 0 } if field == expected),
                "unexpected error for {}: {}",
                expected,
                err
            );
            assert!(stored(&store).is_empty());
        }
    }

    #[tokio::test]
    async fn test_non_finite_numbers_are_never_stored() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;

        let mut nan_price = sample_flash();
        nan_price.price = f64::NAN;
        let err = assert_err!(writer.add_flash_sale(vec![nan_price]).await);
        assert_eq!(err.to_string(), "Price not found");

        let mut inf_ethylene = sample_flash();
        inf_ethylene.price = -5.0;
        inf_ethylene.ethylene = f64::INFINITY;
        let err = assert_err!(writer.add_flash_sale(vec![inf_ethylene]).await);
        assert_eq!(err.to_string(), "Ethylene not found");

        assert!(store
            .documents(&CollectionRef::new("retail", "flash"))
            .is_empty());
    }

    #[tokio::test]
    async fn test_zero_sale_price_is_accepted() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;
        let mut free = sample_flash();
        free.sale_price = 0.0;

        assert_ok!(writer.add_flash_sale(vec![free]).await);
        assert_eq!(stored(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_caller_flash_id_and_timestamp_are_overwritten() {
        let store = InMemoryStore::new();
        let writer = memory_writer(&store).await;
        let mut record = sample_flash();
        record.flash_id = Uuid::new_v4();
        record.timestamp = 42;

        let receipt = assert_ok!(writer.write_batch(vec![record.clone()]).await);
        let saved = &stored(&store)[0];
        assert_eq!(saved.flash_id, receipt.flash_id);
        assert_ne!(saved.flash_id, record.flash_id);
        assert_ne!(saved.timestamp, 42);
    }

    #[tokio::test]
    async fn test_identity_failure_aborts_before_insert() {
        let store = InMemoryStore::new();
        let handle = StoreHandle::<Flash>::attach(Arc::new(store.clone()), "retail", "flash")
            .await
            .unwrap();

        let mut ids = MockIdGenerator::new();
        ids.expect_generate()
            .times(1)
            .returning(|| Err(IdGenerationError("entropy unavailable".to_string())));
        let writer = FlashSaleWriter::with_id_generator(handle, Arc::new(ids));

        let err = assert_err!(writer.add_flash_sale(vec![sample_flash()]).await);
        assert!(matches!(err, FlashError::IdentityGeneration(_)));
        assert!(stored(&store).is_empty());
    }

    #[tokio::test]
    async fn test_nil_flash_id_fails_validation() {
        let store = InMemoryStore::new();
        let handle = StoreHandle::<Flash>::attach(Arc::new(store.clone()), "retail", "flash")
            .await
            .unwrap();

        let mut ids = MockIdGenerator::new();
        ids.expect_generate().returning(|| Ok(Uuid::nil()));
        let writer = FlashSaleWriter::with_id_generator(handle, Arc::new(ids));

        let err = assert_err!(writer.add_flash_sale(vec![sample_flash()]).await);
        assert_eq!(err.to_string(), "FlashID not found");
        assert!(stored(&store).is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_halts_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut store = MockDocumentStore::new();
        store.expect_ensure_collection().returning(|_, _| Ok(()));
        store.expect_insert_one().times(2).returning(move |_, _| {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(InsertOneResult {
                    inserted_id: Uuid::new_v4(),
                }),
                _ => Err(StoreError::Backend("connection reset".to_string())),
            }
        });

        let handle = StoreHandle::<Flash>::attach(Arc::new(store), "retail", "flash")
            .await
            .unwrap();
        let writer = FlashSaleWriter::new(handle);

        let batch = vec![sample_flash(), sample_flash(), sample_flash()];
        let err = assert_err!(writer.add_flash_sale(batch).await);

        assert!(matches!(err, FlashError::Insertion { index: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
