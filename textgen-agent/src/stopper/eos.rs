use tracing::debug;

use super::{StopOutcome, Stopper};
use crate::types::{DecodeState, FinishReason, TokenId};

/// Stopper that detects the model's end-of-sequence token.
///
/// Compares the newest generated token against the tokenizer's configured
/// EOS token id. This is the highest-priority stopping condition: an EOS
/// token ends generation even on the step that would also exhaust the
/// token budget or complete a stop sequence.
///
/// The EOS token itself is not part of the output; the accumulated text is
/// returned unchanged.
#[derive(Debug)]
pub struct EosStopper {
    eos_token: TokenId,
}

impl EosStopper {
    pub fn new(eos_token: TokenId) -> Self {
        Self { eos_token }
    }
}

impl Stopper for EosStopper {
    fn check(&self, state: &DecodeState, newest_token: TokenId) -> Option<StopOutcome> {
        if newest_token != self.eos_token {
            return None;
        }
        debug!(
            token = newest_token,
            generated = state.generated_count(),
            "EOS token detected"
        );
        Some(StopOutcome {
            reason: FinishReason::EndOfSequence,
            text: state.generated_text().to_string(),
        })
    }
}
