use tracing::debug;

use super::{StopOutcome, Stopper};
use crate::types::{DecodeState, FinishReason, TokenId};

/// Stopper that limits generation to a maximum number of new tokens.
///
/// Counts generated tokens only; prompt tokens never count against the
/// budget. The count is read from the [`DecodeState`] rather than tracked
/// internally, which keeps the stopper pure and safe to re-evaluate
/// against hypotheses the beam loop revisits.
#[derive(Debug)]
pub struct MaxTokensStopper {
    max_new_tokens: u32,
}

impl MaxTokensStopper {
    pub fn new(max_new_tokens: u32) -> Self {
        Self { max_new_tokens }
    }
}

impl Stopper for MaxTokensStopper {
    fn check(&self, state: &DecodeState, _newest_token: TokenId) -> Option<StopOutcome> {
        if state.generated_count() < self.max_new_tokens as usize {
            return None;
        }
        debug!(
            generated = state.generated_count(),
            limit = self.max_new_tokens,
            "token budget exhausted"
        );
        Some(StopOutcome {
            reason: FinishReason::MaxTokens,
            text: state.generated_text().to_string(),
        })
    }
}
