//! Lazy streaming decode loop.

use std::time::Instant;

use tracing::trace;

use crate::backend::{AdapterHandle, ModelBackend, PromptTokenizer};
use crate::generation::{DecodeLoop, GenerationError};
use crate::sampling::SamplerChain;
use crate::stopper::{StopEvaluator, StopOutcome};
use crate::types::{DecodeState, GenerationRequest, GenerationResponse, StreamChunk, TokenId};

/// Lazily evaluated token stream over one generation call.
///
/// Nothing is generated until the iterator is pulled: each `next` call
/// evaluates the model once, samples one token, and yields one fragment
/// chunk. The stream is finite and non-restartable. It ends in one of two
/// ways:
///
/// - normally, with a terminal [`StreamChunk`] whose `is_complete` is true
///   and which carries the finish reason;
/// - on an upstream failure, with one `Err` item and no terminal marker.
///
/// The borrow on the model backend serializes session access for the
/// duration of the call. Dropping the stream mid-generation abandons the
/// call; the next predict resets the backend cache.
pub struct TokenStream<'a> {
    tokenizer: &'a dyn PromptTokenizer,
    model: &'a mut dyn ModelBackend,
    adapter: Option<&'a AdapterHandle>,
    sampler: SamplerChain,
    evaluator: StopEvaluator,
    state: DecodeState,
    eos_token: TokenId,
    started_at: Instant,
    /// Terminal marker waiting to be yielded after the fragment that
    /// triggered the stop.
    pending_terminal: Option<StreamChunk>,
    outcome: Option<StopOutcome>,
    finished: bool,
}

impl<'a> TokenStream<'a> {
    pub(crate) fn new(
        tokenizer: &'a dyn PromptTokenizer,
        model: &'a mut dyn ModelBackend,
        adapter: Option<&'a AdapterHandle>,
        request: &GenerationRequest,
        prompt_tokens: Vec<TokenId>,
    ) -> Self {
        let eos_token = tokenizer.eos_token();
        Self {
            tokenizer,
            model,
            adapter,
            sampler: SamplerChain::new(&request.sampling),
            evaluator: StopEvaluator::new(
                eos_token,
                request.max_new_tokens,
                &request.stop_sequences,
            ),
            state: DecodeState::new(prompt_tokens),
            eos_token,
            started_at: Instant::now(),
            pending_terminal: None,
            outcome: None,
            finished: false,
        }
    }

    /// Drain the stream and return the final response. Equivalent to
    /// [`DecodeLoop::produce`].
    pub fn complete(self) -> Result<GenerationResponse, GenerationError> {
        self.produce()
    }

    fn abort(&mut self, error: GenerationError) -> Option<Result<StreamChunk, GenerationError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl Iterator for TokenStream<'_> {
    type Item = Result<StreamChunk, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(terminal) = self.pending_terminal.take() {
            self.finished = true;
            return Some(Ok(terminal));
        }

        let logits = match self
            .model
            .next_token_logits(self.state.tokens(), self.adapter)
        {
            Ok(logits) => logits,
            Err(e) => return self.abort(e.into()),
        };
        let token = self.sampler.sample(logits, self.state.tokens());

        // The EOS token is a control token, not output text.
        let fragment = if token == self.eos_token {
            String::new()
        } else {
            match self.tokenizer.decode(&[token]) {
                Ok(fragment) => fragment,
                Err(e) => return self.abort(e.into()),
            }
        };
        self.state.push(token, &fragment);
        let token_count = self.state.generated_count() as u32;
        trace!(token, token_count, fragment = %fragment, "streamed token");

        match self.evaluator.check(&self.state, token) {
            Some(outcome) => {
                let terminal = StreamChunk::terminal(token_count, outcome.reason.clone());
                self.outcome = Some(outcome);
                if fragment.is_empty() {
                    self.finished = true;
                    Some(Ok(terminal))
                } else {
                    self.pending_terminal = Some(terminal);
                    Some(Ok(StreamChunk::fragment(fragment, token_count)))
                }
            }
            None => Some(Ok(StreamChunk::fragment(fragment, token_count))),
        }
    }
}

impl DecodeLoop for TokenStream<'_> {
    fn produce(mut self) -> Result<GenerationResponse, GenerationError> {
        while let Some(item) = self.next() {
            item?;
        }
        let outcome = match self.outcome {
            Some(outcome) => outcome,
            // Unreachable: the iterator only exhausts after an outcome or
            // an error, and errors returned above.
            None => {
                return Err(GenerationError::Upstream(
                    crate::backend::BackendError::Model(
                        "stream ended without a stop outcome".to_string(),
                    ),
                ))
            }
        };
        Ok(GenerationResponse {
            generated_text: outcome.text,
            tokens_generated: self.state.generated_count() as u32,
            generation_time: self.started_at.elapsed(),
            finish_reason: outcome.reason,
        })
    }
}
