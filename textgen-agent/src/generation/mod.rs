//! Decode loops and their configuration.
//!
//! Two loops produce text from the same collaborators (tokenizer, model
//! backend, optional adapter):
//!
//! - [`stream::TokenStream`]: lazy single-hypothesis sampling, one chunk
//!   per token. Selected when `num_beams` is 1.
//! - [`beam::BeamSearchDecoder`]: parallel hypothesis search returning one
//!   final response. Selected when `num_beams` is greater than 1.
//!
//! Both run their output through the same stop-condition evaluator and
//! both implement [`DecodeLoop`], so callers that only want the final
//! response can drive either uniformly.

use crate::types::GenerationResponse;

pub mod beam;
pub mod config;
pub mod error;
pub mod stream;

pub use beam::BeamSearchDecoder;
pub use config::{
    DecodeMode, EngineConfig, SamplingConfig, DEFAULT_GENERATION_SEED, DEFAULT_MAX_SEQ_LEN,
};
pub use error::GenerationError;
pub use stream::TokenStream;

/// Growth factor for the accumulated-text buffer, which receives many
/// small per-token fragments.
pub(crate) const STRING_CAPACITY_MULTIPLIER: usize = 2;

/// A decode loop driven to completion.
pub trait DecodeLoop {
    /// Run the loop until a stopping condition triggers and return the
    /// final response.
    fn produce(self) -> Result<GenerationResponse, GenerationError>;
}
