use crate::error::FlashError;
use crate::handle::StoreHandle;
use crate::model::Metric;
use crate::store::Filter;
use tracing::{debug, error, instrument};

/// Field the threshold search compares against
pub const ETHYLENE_FIELD: &str = "ethylene";

/// How a search with no matches is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyResultPolicy {
    /// Zero matches is a [`FlashError::NotFound`]
    #[default]
    NotFound,
    /// Zero matches is an empty success
    Empty,
}

/// `{"ethylene": {"$gte": threshold}}`
pub fn threshold_filter(threshold: f64) -> Filter {
    Filter::new().gte(ETHYLENE_FIELD, threshold)
}

/// Threshold queries over the metric collection
pub struct MetricReader {
    handle: StoreHandle<Metric>,
    empty_policy: EmptyResultPolicy,
}

impl MetricReader {
    pub fn new(handle: StoreHandle<Metric>) -> Self {
        Self::with_policy(handle, EmptyResultPolicy::default())
    }

    pub fn with_policy(handle: StoreHandle<Metric>, empty_policy: EmptyResultPolicy) -> Self {
        Self {
            handle,
            empty_policy,
        }
    }

    pub fn handle(&self) -> &StoreHandle<Metric> {
        &self.handle
    }

    /// Metrics with `ethylene >= threshold`, in store order
    #[instrument(skip(self), fields(collection = %self.handle.collection()))]
    pub async fn search_met_threshold(&self, threshold: f64) -> Result<Vec<Metric>, FlashError> {
        metrics::counter!("metric.threshold.searches").increment(1);
        let filter = threshold_filter(threshold);

        let found = self.handle.find(&filter).await.map_err(|source| {
            error!(error = %source, filter = %filter.to_document(), "Error while searching metrics");
            FlashError::Query {
                collection: self.handle.collection().to_string(),
                source,
            }
        })?;

        debug!(matches = found.len(), "Threshold search complete");

        if found.is_empty() && self.empty_policy == EmptyResultPolicy::NotFound {
            return Err(FlashError::NotFound {
                collection: self.handle.collection().to_string(),
                threshold,
            });
        }

        Ok(found)
    }
}
