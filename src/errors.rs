//! Error types for rapid_discourse
//!
//! This module defines the error types used throughout the library.
//! Malformed scores are clamped rather than reported; everything that
//! reaches this enum is either a caller mistake or a broken invariant.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Main error type for rapid_discourse
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A decoder or recombination step needed score arrays the pack lacks
    #[error("Missing scores: {message}")]
    MissingScores { message: String },

    /// Parallel sequences of a pack (or fit inputs) disagree in length
    #[error("Shape mismatch: {what} has length {actual}, expected {expected}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A label string is not part of the vocabulary
    #[error("Unknown label: {label}")]
    UnknownLabel { label: String },

    /// The arborescence collaborator could not reach part of the graph
    #[error("Unreachable: {message}")]
    Unreachable { message: String },

    /// Configuration validation failed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DecodeError {
    /// Create a missing scores error
    pub fn missing_scores(message: impl Into<String>) -> Self {
        Self::MissingScores {
            message: message.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create an unknown label error
    pub fn unknown_label(label: impl Into<String>) -> Self {
        Self::UnknownLabel {
            label: label.into(),
        }
    }

    /// Create an unreachable node error
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error reports a broken internal invariant
    /// (as opposed to bad input or configuration)
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::missing_scores("pack has no attachment scores");
        assert!(err.to_string().contains("Missing scores"));
        assert!(err.to_string().contains("no attachment scores"));

        let err = DecodeError::shape_mismatch("target", 4, 3);
        assert_eq!(
            err.to_string(),
            "Shape mismatch: target has length 3, expected 4"
        );
    }

    #[test]
    fn test_is_internal() {
        let err = DecodeError::internal("no weight for edge (a, b)");
        assert!(err.is_internal());

        let err = DecodeError::unknown_label("elaboration");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_from_serde_json() {
        let err: DecodeError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, DecodeError::Serialization { .. }));
    }
}
