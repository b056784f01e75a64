use crate::identity::IdGenerationError;
use crate::store::StoreError;
use crate::validation::FlashField;
use thiserror::Error;

/// Errors surfaced by provisioning, batch writes and threshold searches
#[derive(Error, Debug)]
pub enum FlashError {
    #[error("Error creating DB client: {0}")]
    Connection(#[source] StoreError),

    #[error("Error ensuring collection {collection}: {source}")]
    Provisioning {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to generate flash ID: {0}")]
    IdentityGeneration(#[from] IdGenerationError),

    /// A record failed validation; records before `index` are already stored
    #[error("{field} not found")]
    Validation { field: FlashField, index: usize },

    /// The store rejected a record; records before `index` are already stored
    #[error("Unable to insert flash sale record {index}: {source}")]
    Insertion {
        index: usize,
        #[source]
        source: StoreError,
    },

    #[error("Error while searching {collection}: {source}")]
    Query {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("No results found in {collection} for ethylene >= {threshold}")]
    NotFound { collection: String, threshold: f64 },
}

impl FlashError {
    /// Stable machine-readable code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            FlashError::Connection(_) => "CONNECTION_ERROR",
            FlashError::Provisioning { .. } => "PROVISIONING_ERROR",
            FlashError::IdentityGeneration(_) => "IDENTITY_ERROR",
            FlashError::Validation { .. } => "VALIDATION_ERROR",
            FlashError::Insertion { .. } => "INSERTION_ERROR",
            FlashError::Query { .. } => "QUERY_ERROR",
            FlashError::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// Position in the submitted batch where processing stopped, if any
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            FlashError::Validation { index, .. } | FlashError::Insertion { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = FlashError::Validation {
            field: FlashField::Upc,
            index: 1,
        };
        assert_eq!(err.to_string(), "UPC not found");
        assert_eq!(err.batch_index(), Some(1));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_insertion_keeps_source() {
        let err = FlashError::Insertion {
            index: 3,
            source: StoreError::UnknownCollection("retail.flash".to_string()),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.batch_index(), Some(3));
    }

    #[test]
    fn test_not_found_has_no_batch_index() {
        let err = FlashError::NotFound {
            collection: "retail.metric".to_string(),
            threshold: 0.8,
        };
        assert_eq!(err.batch_index(), None);
        assert!(err.to_string().contains("ethylene >= 0.8"));
    }
}
