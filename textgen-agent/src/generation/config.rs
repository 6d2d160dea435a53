//! Sampling and engine configuration.
//!
//! A [`SamplingConfig`] is populated per request and is immutable for the
//! duration of one generation call. It deserializes in strict mode: option
//! maps with unknown keys are rejected rather than ignored, so typos like
//! `temprature` surface as validation errors instead of silently falling
//! back to defaults.

use serde::{Deserialize, Serialize};
use tracing::debug;

use textgen_common::ValidatedConfig;

use crate::types::errors::ValidationError;

/// Default RNG seed used when a request does not specify one.
pub const DEFAULT_GENERATION_SEED: u64 = 1234;

/// Default model context size, in tokens.
pub const DEFAULT_MAX_SEQ_LEN: usize = 4096;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Softmax temperature. Must be greater than 0; lower values sharpen
    /// the distribution.
    pub temperature: f32,
    /// Nucleus sampling threshold in [0, 1]. 1.0 disables the filter.
    pub top_p: f32,
    /// Keep only the k most likely tokens. 0 disables the filter.
    pub top_k: u32,
    /// Penalty applied to tokens already present in the history. 1.0
    /// disables it.
    pub repetition_penalty: f32,
    /// How many most-recent history tokens the penalty considers. 0 means
    /// the whole history.
    pub repetition_penalty_range: u32,
    /// Exponential decay of the penalty with token age. 0.0 means no
    /// decay.
    pub repetition_penalty_decay: f32,
    /// Locally typical sampling threshold in [0, 1]. Disabled when absent.
    pub typical_p: Option<f32>,
    /// Number of beam hypotheses. 1 selects the streaming decode loop,
    /// anything higher the beam loop.
    pub num_beams: u32,
    /// Length penalty exponent for ranking finished beams.
    pub beam_length_penalty: f32,
    /// RNG seed for the sampler chain's random draws.
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repetition_penalty: 1.05,
            repetition_penalty_range: 0,
            repetition_penalty_decay: 0.0,
            typical_p: None,
            num_beams: 1,
            beam_length_penalty: 1.0,
            seed: DEFAULT_GENERATION_SEED,
        }
    }
}

impl SamplingConfig {
    /// Deterministic preset: keep only the most likely token each step.
    pub fn greedy() -> Self {
        Self {
            top_k: 1,
            top_p: 1.0,
            ..Self::default()
        }
    }

    /// Parse a configuration from a JSON option map.
    ///
    /// Strict: unknown keys are rejected, and the parsed configuration is
    /// validated before it is returned.
    pub fn from_options(options: serde_json::Value) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_value(options)
            .map_err(|e| ValidationError::new(format!("invalid sampling options: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Which decode loop this configuration selects.
    pub fn decode_mode(&self) -> DecodeMode {
        if self.num_beams > 1 {
            DecodeMode::BeamSearch {
                num_beams: self.num_beams,
            }
        } else {
            DecodeMode::Streaming
        }
    }

    /// Check every parameter against its declared domain.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.temperature <= 0.0 {
            return Err(ValidationError::new(format!(
                "temperature must be greater than 0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ValidationError::new(format!(
                "top_p must be in [0, 1], got {}",
                self.top_p
            )));
        }
        if self.repetition_penalty < 1.0 {
            return Err(ValidationError::new(format!(
                "repetition_penalty must be at least 1, got {}",
                self.repetition_penalty
            )));
        }
        if self.repetition_penalty_decay < 0.0 {
            return Err(ValidationError::new(format!(
                "repetition_penalty_decay must not be negative, got {}",
                self.repetition_penalty_decay
            )));
        }
        if let Some(typical_p) = self.typical_p {
            if !(0.0..=1.0).contains(&typical_p) {
                return Err(ValidationError::new(format!(
                    "typical_p must be in [0, 1], got {}",
                    typical_p
                )));
            }
        }
        if self.num_beams == 0 {
            return Err(ValidationError::new("num_beams must be at least 1"));
        }
        if self.beam_length_penalty < 0.0 {
            return Err(ValidationError::new(format!(
                "beam_length_penalty must not be negative, got {}",
                self.beam_length_penalty
            )));
        }
        debug!(mode = ?self.decode_mode(), "sampling configuration validated");
        Ok(())
    }
}

impl ValidatedConfig for SamplingConfig {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        SamplingConfig::validate(self)
    }

    fn description() -> &'static str {
        "sampling parameters for one generation call"
    }
}

/// Which decode loop a request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// One sampled continuation, yielded token by token.
    Streaming,
    /// Parallel hypothesis search; produces a single final response.
    BeamSearch { num_beams: u32 },
}

/// Engine-level limits, fixed when the session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Model context size: encoded prompt plus max_new_tokens must fit.
    pub max_seq_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }
}

impl ValidatedConfig for EngineConfig {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.max_seq_len == 0 {
            return Err(ValidationError::new("max_seq_len must be greater than 0"));
        }
        Ok(())
    }

    fn description() -> &'static str {
        "engine-level generation limits"
    }
}
