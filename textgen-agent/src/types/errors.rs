//! Error types for the generation engine.
//!
//! This module contains the top-level error taxonomy used throughout the
//! textgen-agent system, with error categorization and user-friendly
//! messages.

use textgen_common::{ErrorCategory, TextgenError};
use thiserror::Error;

use crate::generation::GenerationError;

/// Top-level errors that can occur when driving a generation session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}\n💡 Check the sampling parameters and request fields against their documented ranges")]
    Validation(#[from] ValidationError),

    #[error("{0}\n💡 Attach a tokenizer and model backend before calling predict")]
    ModelNotLoaded(#[from] ModelNotLoadedError),

    #[error("Generation error: {0}\n💡 Check the model backend logs; a partially advanced cache is discarded on the next call")]
    Generation(#[from] GenerationError),
}

/// A sampling parameter or request field was out of its declared domain.
///
/// Raised synchronously before any token is produced; a request that fails
/// validation yields zero fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation error: {message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Generation was attempted before the session was set up.
///
/// Fatal to the call and not retried: the session has no tokenizer or model
/// backend to generate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Model not loaded: generation attempted before session setup")]
pub struct ModelNotLoadedError;

impl TextgenError for EngineError {
    fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Validation(_) => ErrorCategory::User,
            EngineError::ModelNotLoaded(_) => ErrorCategory::System,
            EngineError::Generation(generation_error) => generation_error.category(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "ENGINE_VALIDATION",
            EngineError::ModelNotLoaded(_) => "ENGINE_MODEL_NOT_LOADED",
            EngineError::Generation(_) => "ENGINE_GENERATION",
        }
    }
}
