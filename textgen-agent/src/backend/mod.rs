//! Collaborator seam for the external model-loading layer.
//!
//! The generation core never loads weights, walks model directories, or
//! discovers adapters. Whatever does (a loader binary, a server bootstrap)
//! hands the session three things through this module's traits:
//!
//! - a [`PromptTokenizer`] that can encode/decode and knows its
//!   end-of-sequence token,
//! - a [`ModelBackend`]: a model+cache pair that produces next-token logits
//!   for a token history, resettable per call,
//! - an optional [`AdapterHandle`] passed through to every generation call
//!   uniformly.
//!
//! The [`scripted`] backend plays back deterministic fixtures so the decode
//! loops can be exercised in tests without loading a model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TokenId;

pub mod scripted;

pub use scripted::{Script, ScriptedBackend, ScriptedFixture, ScriptedTokenizer};

/// Errors raised by the tokenizer or model collaborator.
///
/// These are upstream failures: the core propagates them to the caller
/// unmodified (wrapped in [`crate::generation::GenerationError`]) and never
/// retries, since retrying against a partially advanced cache risks
/// corrupted continuations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model evaluation error: {0}")]
    Model(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

/// Tokenizer capability required by the decode loops.
pub trait PromptTokenizer: Send + Sync {
    /// Encode text into a token sequence.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, BackendError>;

    /// Decode a token sequence into text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, BackendError>;

    /// The tokenizer's end-of-sequence token id.
    fn eos_token(&self) -> TokenId;
}

/// Model+cache capability required by the decode loops.
///
/// The cache behind this trait holds positional decode state for exactly
/// one token sequence. Implementations may serve `next_token_logits` from
/// the cache when `history` extends the history of the previous call;
/// callers must invoke [`ModelBackend::reset`] whenever that is not the
/// case. The session resets once per predict call, and the beam loop resets
/// before every scoring call because sibling beams do not extend each
/// other.
pub trait ModelBackend: Send {
    /// Produce logits for the next token given the full token history
    /// (prompt plus generated so far).
    fn next_token_logits(
        &mut self,
        history: &[TokenId],
        adapter: Option<&AdapterHandle>,
    ) -> Result<Vec<f32>, BackendError>;

    /// Drop any cached decode state. The next `next_token_logits` call is
    /// treated as the start of a fresh sequence.
    fn reset(&mut self);
}

/// Handle to an optional low-rank adapter applied atop the base model.
///
/// Opaque to the core: it is passed through to the model backend on every
/// logits call and the backend decides what to do with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterHandle {
    pub name: String,
    pub scale: f32,
}

impl AdapterHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}
