//! Core types for the generation engine.

pub mod errors;
pub mod generation;
pub mod ids;
pub mod streaming;

pub use errors::{EngineError, ModelNotLoadedError, ValidationError};
pub use generation::{
    DecodeState, FinishReason, GenerationRequest, GenerationResponse, TokenId,
};
pub use ids::RequestId;
pub use streaming::StreamChunk;
