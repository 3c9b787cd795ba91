//! Error types for Mlo

use thiserror::Error;

use crate::stage::Slot;

/// Main error type for Mlo operations
#[derive(Error, Debug)]
pub enum MloError {
    /// No implementation registered under the requested name
    #[error("Unknown processor: {name}. Available processors: {}", available.join(", "))]
    UnknownProcessor { name: String, available: Vec<String> },

    /// Implementation exists but is not legal for the requested slot
    #[error("Invalid {slot} implementation: {name}. Valid options: {}", allowed.join(", "))]
    InvalidSlot {
        slot: Slot,
        name: String,
        allowed: Vec<String>,
    },

    /// Configuration errors (parse failures, bad component payloads)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Processor construction or execution errors
    #[error("Processor error: {0}")]
    Processor(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MloError {
    /// True for errors raised while building pipelines from configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MloError::UnknownProcessor { .. } | MloError::InvalidSlot { .. } | MloError::Config(_)
        )
    }
}

/// Result type alias for Mlo operations
pub type Result<T> = std::result::Result<T, MloError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_processor_lists_names() {
        let err = MloError::UnknownProcessor {
            name: "Nope".to_string(),
            available: vec!["PassThrough".to_string(), "LengthFilter".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown processor: Nope. Available processors: PassThrough, LengthFilter"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_slot_names_the_slot() {
        let err = MloError::InvalidSlot {
            slot: Slot::Filter,
            name: "KeywordAttention".to_string(),
            allowed: vec!["PassThrough".to_string(), "LengthFilter".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid filter implementation: KeywordAttention. Valid options: PassThrough, LengthFilter"
        );
    }

    #[test]
    fn test_processor_error_is_not_configuration() {
        assert!(!MloError::Processor("boom".to_string()).is_configuration());
    }
}
