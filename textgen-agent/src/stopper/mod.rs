//! # Generation Stoppers Module
//!
//! This module decides when a decode loop should stop producing tokens.
//! Each stopping condition is its own [`Stopper`] implementation, and a
//! [`StopEvaluator`] runs them in a fixed priority order after every
//! generated token:
//!
//! 1. **End-of-Sequence Detection**: the model produced its EOS token
//! 2. **Maximum Token Limiting**: the `max_new_tokens` budget is exhausted
//! 3. **Stop Sequence Matching**: the generated text ends with a
//!    caller-supplied stop sequence
//!
//! The ordering is observable: when several conditions become true on the
//! same token, the finish reason reported is the highest-priority one.
//!
//! ## Purity
//!
//! Stoppers inspect the [`DecodeState`] and the newest token but never
//! mutate anything, so evaluating the same state twice returns the same
//! outcome. Both decode loops share one evaluator through this property;
//! the beam loop re-checks hypotheses it already scored without side
//! effects.
//!
//! ## Output
//!
//! A triggered stopper returns a [`StopOutcome`] carrying the finish
//! reason and the final text. Only the stop-sequence stopper rewrites the
//! text (to trim the matched suffix); the others return it as accumulated.

use crate::types::{DecodeState, FinishReason, TokenId};

pub mod eos;
pub mod max_tokens;
pub mod stop_sequence;

pub use eos::EosStopper;
pub use max_tokens::MaxTokensStopper;
pub use stop_sequence::StopSequenceStopper;

/// The decision produced by a triggered stopper.
#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub reason: FinishReason,
    /// Final generated text. Equal to the accumulated text except for stop
    /// sequence matches, which trim the matched suffix.
    pub text: String,
}

/// A single stopping condition.
///
/// Implementations must be pure: `check` takes `&self` and may not mutate
/// shared state, so repeated evaluation of the same state is idempotent.
pub trait Stopper: Send {
    /// Evaluate the state after `newest_token` was appended to it.
    ///
    /// Returns `Some(outcome)` if generation should stop, `None` to
    /// continue.
    fn check(&self, state: &DecodeState, newest_token: TokenId) -> Option<StopOutcome>;
}

/// Runs the stopping conditions in priority order.
pub struct StopEvaluator {
    stoppers: Vec<Box<dyn Stopper>>,
}

impl StopEvaluator {
    /// Build the standard evaluator: EOS, then max tokens, then stop
    /// sequences in their declared order.
    pub fn new(eos_token: TokenId, max_new_tokens: u32, stop_sequences: &[String]) -> Self {
        Self {
            stoppers: vec![
                Box::new(EosStopper::new(eos_token)),
                Box::new(MaxTokensStopper::new(max_new_tokens)),
                Box::new(StopSequenceStopper::new(stop_sequences.to_vec())),
            ],
        }
    }

    /// Evaluate all conditions; the first triggered one wins.
    pub fn check(&self, state: &DecodeState, newest_token: TokenId) -> Option<StopOutcome> {
        self.stoppers
            .iter()
            .find_map(|stopper| stopper.check(state, newest_token))
    }
}
