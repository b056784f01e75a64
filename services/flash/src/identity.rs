use thiserror::Error;
use uuid::Uuid;

/// Failure to produce a fresh identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct IdGenerationError(pub String);

/// Source of batch identifiers for flash sales
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<Uuid, IdGenerationError>;
}

/// Random (version 4) UUID generator
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn generate(&self) -> Result<Uuid, IdGenerationError> {
        Ok(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_ids_are_fresh() {
        let generator = UuidV4Generator;
        let a = generator.generate().unwrap();
        let b = generator.generate().unwrap();

        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert_eq!(a.get_version_num(), 4);
    }
}
