//! Error type shared by validation, persistence, registry and configuration.
//!
//! Shape and temporary-space mismatches are caller bugs and panic instead of
//! returning one of these.

use thiserror::Error;

pub type LayerResult<T> = Result<T, LayerError>;

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("layer '{layer}' failed validation: {reason}")]
    Validation { layer: String, reason: String },

    #[error("malformed store at offset {offset}: {reason}")]
    Format { offset: usize, reason: String },

    #[error("unknown layer type '{0}'")]
    UnknownType(String),

    #[error("layer type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LayerError {
    pub(crate) fn validation(layer: &str, reason: impl Into<String>) -> Self {
        LayerError::Validation {
            layer: layer.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        LayerError::Format {
            offset,
            reason: reason.into(),
        }
    }

    /// True for errors caused by a truncated or inconsistent store.
    pub fn is_format(&self) -> bool {
        matches!(self, LayerError::Format { .. })
    }
}
