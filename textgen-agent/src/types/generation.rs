//! Text generation request and response types.
//!
//! This module contains the request shape callers hand to a
//! [`crate::session::GenerationSession`], the response shape they get back,
//! and the transient per-call decode state shared by both decode loops.

use std::time::Duration;

use crate::generation::{EngineConfig, SamplingConfig, STRING_CAPACITY_MULTIPLIER};
use crate::types::errors::ValidationError;

/// The atomic unit the model consumes and produces (a sub-word id).
pub type TokenId = u32;

/// Maximum number of stop sequences accepted on one request.
const MAX_STOP_SEQUENCES: usize = 10;

/// Maximum length in characters of a single stop sequence.
const MAX_STOP_SEQUENCE_LEN: usize = 50;

/// Request for text generation from a language model.
///
/// Immutable for the duration of one generation call. Stop sequences are
/// matched case-insensitively against the suffix of the generated text, in
/// the order they appear here (first declared match wins, not longest).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_new_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub sampling: SamplingConfig,
}

impl GenerationRequest {
    /// Create a new request with default sampling configuration.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_new_tokens: 512,
            stop_sequences: Vec::new(),
            sampling: SamplingConfig::default(),
        }
    }

    /// Set max_new_tokens using builder pattern
    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    /// Set stop_sequences using builder pattern
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    /// Set the sampling configuration using builder pattern
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Validate the request against the engine configuration.
    ///
    /// Runs synchronously before any token is produced; a failing request
    /// yields zero fragments.
    pub fn validate(&self, engine: &EngineConfig) -> Result<(), ValidationError> {
        self.sampling.validate()?;

        if self.max_new_tokens == 0 {
            return Err(ValidationError::new(
                "max_new_tokens must be greater than 0",
            ));
        }
        if self.max_new_tokens as usize > engine.max_seq_len {
            return Err(ValidationError::new(format!(
                "max_new_tokens ({}) cannot exceed the model context size ({})",
                self.max_new_tokens, engine.max_seq_len
            )));
        }

        if self.stop_sequences.len() > MAX_STOP_SEQUENCES {
            return Err(ValidationError::new(format!(
                "cannot specify more than {} stop sequences",
                MAX_STOP_SEQUENCES
            )));
        }
        for sequence in &self.stop_sequences {
            if sequence.is_empty() {
                return Err(ValidationError::new("stop sequences cannot be empty"));
            }
            if sequence.chars().count() > MAX_STOP_SEQUENCE_LEN {
                return Err(ValidationError::new(format!(
                    "stop sequences cannot exceed {} characters",
                    MAX_STOP_SEQUENCE_LEN
                )));
            }
        }

        Ok(())
    }
}

/// Response from one text generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Generated text with the prompt stripped and any matched stop
    /// sequence trimmed off the end.
    pub generated_text: String,
    pub tokens_generated: u32,
    pub generation_time: Duration,
    pub finish_reason: FinishReason,
}

/// Reason why text generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FinishReason {
    /// The model produced its end-of-sequence token.
    EndOfSequence,
    /// The max_new_tokens budget was exhausted.
    MaxTokens,
    /// The generated text ended with this stop sequence.
    StopSequence(String),
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::EndOfSequence => write!(f, "end of sequence"),
            FinishReason::MaxTokens => write!(f, "max tokens"),
            FinishReason::StopSequence(sequence) => {
                write!(f, "stop sequence {:?}", sequence)
            }
        }
    }
}

/// Transient per-call decode state.
///
/// Created at the start of a generation call and discarded at its end;
/// never shared across calls. Holds the full token history (prompt plus
/// generated) and the accumulated generated text the stop evaluator matches
/// against.
#[derive(Debug, Clone)]
pub struct DecodeState {
    tokens: Vec<TokenId>,
    prompt_len: usize,
    generated_text: String,
}

impl DecodeState {
    /// Start a fresh state from the encoded prompt.
    pub fn new(prompt_tokens: Vec<TokenId>) -> Self {
        let prompt_len = prompt_tokens.len();
        Self {
            tokens: prompt_tokens,
            prompt_len,
            generated_text: String::new(),
        }
    }

    /// Rebuild a state from an already-materialized continuation, as the
    /// beam loop does after re-decoding its best hypothesis each step.
    pub fn with_generated(
        prompt_tokens: &[TokenId],
        generated_tokens: &[TokenId],
        generated_text: String,
    ) -> Self {
        let mut tokens = Vec::with_capacity(prompt_tokens.len() + generated_tokens.len());
        tokens.extend_from_slice(prompt_tokens);
        tokens.extend_from_slice(generated_tokens);
        Self {
            tokens,
            prompt_len: prompt_tokens.len(),
            generated_text,
        }
    }

    /// Append one generated token and its decoded text fragment.
    pub fn push(&mut self, token: TokenId, fragment: &str) {
        self.tokens.push(token);
        // Amortize growth: fragments arrive one token at a time.
        if self.generated_text.capacity() - self.generated_text.len() < fragment.len() {
            self.generated_text
                .reserve(fragment.len() * STRING_CAPACITY_MULTIPLIER);
        }
        self.generated_text.push_str(fragment);
    }

    /// Full token history: prompt followed by generated tokens.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Text generated beyond the prompt.
    pub fn generated_text(&self) -> &str {
        &self.generated_text
    }

    /// Number of tokens generated so far (excludes the prompt).
    pub fn generated_count(&self) -> usize {
        self.tokens.len() - self.prompt_len
    }

    /// Number of tokens in the encoded prompt.
    pub fn prompt_len(&self) -> usize {
        self.prompt_len
    }
}
