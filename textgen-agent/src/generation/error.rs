//! Errors raised while a generation call is in flight.

use textgen_common::{ErrorCategory, TextgenError};
use thiserror::Error;

use crate::backend::BackendError;

/// Generation failed after validation passed.
///
/// Upstream tokenizer/model failures are carried unmodified: the core never
/// retries them, and a stream that yields one of these ends immediately
/// with no terminal marker.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Upstream backend failure: {0}")]
    Upstream(#[from] BackendError),
}

impl TextgenError for GenerationError {
    fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::Upstream(_) => ErrorCategory::External,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            GenerationError::Upstream(_) => "GENERATION_UPSTREAM",
        }
    }
}
