//! Scripted backend for deterministic playback in tests.
//!
//! Plays back a pre-recorded script instead of evaluating a model, so the
//! decode loops and stop conditions can be tested quickly and repeatably.
//! Two script shapes are supported:
//!
//! - [`Script::Sequence`]: a fixed token sequence, emitted one token per
//!   step regardless of what was sampled before. Drives the streaming
//!   tests.
//! - [`Script::Transitions`]: a map from the most recent token to scored
//!   successor candidates. Gives the beam loop real branches to explore.
//!
//! Fixtures can be loaded from JSON files via [`ScriptedFixture::from_file`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{AdapterHandle, BackendError, ModelBackend, PromptTokenizer};
use crate::types::TokenId;

/// Logit assigned to scheduled tokens; everything else gets its negation.
const SCRIPTED_LOGIT: f32 = 100.0;

/// Tokenizer over a fixed word list.
///
/// Encoding greedily matches the longest vocabulary entry at each position;
/// decoding concatenates entries verbatim, so vocabulary entries carry
/// their own leading whitespace (" world", not "world").
#[derive(Debug, Clone)]
pub struct ScriptedTokenizer {
    vocab: Vec<String>,
    eos: TokenId,
}

impl ScriptedTokenizer {
    pub fn new(vocab: Vec<String>, eos: TokenId) -> Self {
        Self { vocab, eos }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

impl PromptTokenizer for ScriptedTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, BackendError> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let best = self
                .vocab
                .iter()
                .enumerate()
                .filter(|(_, entry)| !entry.is_empty() && rest.starts_with(entry.as_str()))
                .max_by_key(|(_, entry)| entry.len());
            match best {
                Some((id, entry)) => {
                    tokens.push(id as TokenId);
                    rest = &rest[entry.len()..];
                }
                None => {
                    return Err(BackendError::Tokenizer(format!(
                        "no vocabulary entry matches input at {:?}",
                        rest.chars().take(16).collect::<String>()
                    )));
                }
            }
        }
        Ok(tokens)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, BackendError> {
        let mut text = String::new();
        for &token in tokens {
            let entry = self.vocab.get(token as usize).ok_or_else(|| {
                BackendError::Tokenizer(format!("token {} out of vocabulary range", token))
            })?;
            text.push_str(entry);
        }
        Ok(text)
    }

    fn eos_token(&self) -> TokenId {
        self.eos
    }
}

/// What the scripted backend plays back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    /// Emit these tokens in order, one per step since the last reset.
    Sequence(Vec<TokenId>),
    /// Score successors of the most recent history token. Tokens without
    /// an entry fall through to a backend error, which surfaces fixture
    /// gaps instead of silently looping.
    Transitions(HashMap<TokenId, Vec<(TokenId, f32)>>),
}

/// Model backend that plays back a [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    vocab_size: usize,
    script: Script,
    /// Fail the nth logits call since construction with a model error.
    fail_at: Option<usize>,
    calls: usize,
    resets: usize,
    /// History length seen on the first call after a reset; step numbering
    /// for Script::Sequence is relative to it.
    first_len: Option<usize>,
}

impl ScriptedBackend {
    pub fn new(vocab_size: usize, script: Script) -> Self {
        Self {
            vocab_size,
            script,
            fail_at: None,
            calls: 0,
            resets: 0,
            first_len: None,
        }
    }

    /// Make the nth logits call (zero-based, counted since construction)
    /// return a model error. Used to test mid-stream abort behavior.
    pub fn with_failure_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Number of times [`ModelBackend::reset`] has been called.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    fn logits_favoring(&self, scored: &[(TokenId, f32)]) -> Vec<f32> {
        let mut logits = vec![-SCRIPTED_LOGIT; self.vocab_size];
        for &(token, score) in scored {
            if let Some(slot) = logits.get_mut(token as usize) {
                *slot = score;
            }
        }
        logits
    }
}

impl ModelBackend for ScriptedBackend {
    fn next_token_logits(
        &mut self,
        history: &[TokenId],
        _adapter: Option<&AdapterHandle>,
    ) -> Result<Vec<f32>, BackendError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(BackendError::Model(format!(
                "scripted failure at call {}",
                call
            )));
        }

        match &self.script {
            Script::Sequence(tokens) => {
                let first_len = *self.first_len.get_or_insert(history.len());
                let step = history.len().saturating_sub(first_len);
                let token = tokens.get(step).copied().ok_or_else(|| {
                    BackendError::Fixture(format!("script exhausted at step {}", step))
                })?;
                debug!(step, token, "scripted sequence step");
                Ok(self.logits_favoring(&[(token, SCRIPTED_LOGIT)]))
            }
            Script::Transitions(map) => {
                let last = history.last().copied().ok_or_else(|| {
                    BackendError::Fixture("transitions script requires a non-empty history".into())
                })?;
                let scored = map.get(&last).ok_or_else(|| {
                    BackendError::Fixture(format!("no transition recorded for token {}", last))
                })?;
                Ok(self.logits_favoring(scored))
            }
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.first_len = None;
    }
}

/// A serialized tokenizer+script pair, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedFixture {
    pub vocab: Vec<String>,
    pub eos: TokenId,
    pub script: Script,
}

impl ScriptedFixture {
    /// Load a fixture from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackendError::Fixture(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BackendError::Fixture(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Split the fixture into its tokenizer and backend halves.
    pub fn into_parts(self) -> (ScriptedTokenizer, ScriptedBackend) {
        let vocab_size = self.vocab.len();
        (
            ScriptedTokenizer::new(self.vocab, self.eos),
            ScriptedBackend::new(vocab_size, self.script),
        )
    }
}
