use tracing::debug;

use super::{StopOutcome, Stopper};
use crate::types::{DecodeState, FinishReason, TokenId};

/// Stopper that matches caller-supplied stop sequences.
///
/// After every token, the accumulated generated text is checked for each
/// sequence as a case-insensitive suffix. Sequences are tried in the order
/// the caller declared them, and the first that matches wins even if a
/// later sequence would match a longer suffix. The matched suffix is
/// trimmed from the returned text; the reported finish reason carries the
/// sequence as declared, not as it appeared in the output.
///
/// Only suffixes are considered. A stop sequence completed mid-text by a
/// multi-character fragment and then extended past is not detected; this
/// matches a decode loop that checks once per token.
#[derive(Debug)]
pub struct StopSequenceStopper {
    sequences: Vec<String>,
}

impl StopSequenceStopper {
    pub fn new(sequences: Vec<String>) -> Self {
        Self { sequences }
    }

    /// Byte index where `sequence` starts if the text ends with it
    /// case-insensitively.
    fn suffix_start(text: &str, sequence: &str) -> Option<usize> {
        let sequence_chars = sequence.chars().count();
        if sequence_chars == 0 {
            return None;
        }
        let mut remaining = sequence_chars;
        let mut start = None;
        for (index, _) in text.char_indices().rev() {
            start = Some(index);
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if remaining > 0 {
            return None;
        }
        let start = start?;
        if text[start..].to_lowercase() == sequence.to_lowercase() {
            Some(start)
        } else {
            None
        }
    }
}

impl Stopper for StopSequenceStopper {
    fn check(&self, state: &DecodeState, _newest_token: TokenId) -> Option<StopOutcome> {
        let text = state.generated_text();
        for sequence in &self.sequences {
            if let Some(start) = Self::suffix_start(text, sequence) {
                debug!(sequence = %sequence, "stop sequence matched");
                return Some(StopOutcome {
                    reason: FinishReason::StopSequence(sequence.clone()),
                    text: text[..start].to_string(),
                });
            }
        }
        None
    }
}
