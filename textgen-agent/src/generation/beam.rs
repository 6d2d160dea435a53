//! Beam-search decode loop.

use std::time::Instant;

use tracing::{debug, trace};

use crate::backend::{AdapterHandle, ModelBackend, PromptTokenizer};
use crate::generation::{DecodeLoop, GenerationError};
use crate::sampling::top_candidates;
use crate::stopper::StopEvaluator;
use crate::types::{DecodeState, GenerationRequest, GenerationResponse, TokenId};

/// One candidate continuation tracked by the beam loop.
#[derive(Debug, Clone)]
struct BeamHypothesis {
    /// Generated tokens only; ends with EOS once finished.
    tokens: Vec<TokenId>,
    /// Cumulative log probability of the generated tokens.
    score: f32,
    finished: bool,
}

impl BeamHypothesis {
    /// Length-normalized score used to pick the leading hypothesis, so
    /// short finished beams do not win on raw cumulative probability
    /// alone.
    fn ranking_score(&self, length_penalty: f32) -> f32 {
        let length = self.tokens.len().max(1) as f32;
        self.score / length.powf(length_penalty)
    }
}

/// Decode loop that tracks `num_beams` hypotheses in parallel.
///
/// Each step every live hypothesis is expanded to its `num_beams` most
/// probable continuations and the candidate set is pruned back to
/// `num_beams` by cumulative log probability. Finished hypotheses (those
/// that produced EOS) are retained and compete with live ones under the
/// length penalty. After every step the leading hypothesis is decoded and
/// run through the same stop-condition evaluator as the streaming loop.
///
/// Sibling hypotheses do not extend each other's token history, so the
/// model cache is reset before every scoring call. Output is not streamed;
/// the loop runs to completion and returns one response.
pub struct BeamSearchDecoder<'a> {
    tokenizer: &'a dyn PromptTokenizer,
    model: &'a mut dyn ModelBackend,
    adapter: Option<&'a AdapterHandle>,
    evaluator: StopEvaluator,
    prompt_tokens: Vec<TokenId>,
    num_beams: usize,
    length_penalty: f32,
    started_at: Instant,
}

impl<'a> BeamSearchDecoder<'a> {
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
            evaluator: StopEvaluator::new(
                eos_token,
                request.max_new_tokens,
                &request.stop_sequences,
            ),
            prompt_tokens,
            num_beams: request.sampling.num_beams as usize,
            length_penalty: request.sampling.beam_length_penalty,
            started_at: Instant::now(),
        }
    }

    fn leading<'b>(&self, beams: &'b [BeamHypothesis]) -> &'b BeamHypothesis {
        // beams is never empty: pruning keeps at least one hypothesis.
        beams
            .iter()
            .max_by(|a, b| {
                a.ranking_score(self.length_penalty)
                    .total_cmp(&b.ranking_score(self.length_penalty))
            })
            .unwrap_or(&beams[0])
    }
}

impl DecodeLoop for BeamSearchDecoder<'_> {
    fn produce(mut self) -> Result<GenerationResponse, GenerationError> {
        let eos_token = self.tokenizer.eos_token();
        let mut beams = vec![BeamHypothesis {
            tokens: Vec::new(),
            score: 0.0,
            finished: false,
        }];

        loop {
            let mut candidates: Vec<BeamHypothesis> = Vec::new();
            for beam in &beams {
                if beam.finished {
                    candidates.push(beam.clone());
                    continue;
                }

                // Sibling beams diverge, so each scoring call starts from
                // a cold cache.
                self.model.reset();
                let mut history =
                    Vec::with_capacity(self.prompt_tokens.len() + beam.tokens.len());
                history.extend_from_slice(&self.prompt_tokens);
                history.extend_from_slice(&beam.tokens);
                let logits = self.model.next_token_logits(&history, self.adapter)?;

                for (token, log_prob) in top_candidates(&logits, self.num_beams) {
                    let mut tokens = beam.tokens.clone();
                    tokens.push(token);
                    candidates.push(BeamHypothesis {
                        tokens,
                        score: beam.score + log_prob,
                        finished: token == eos_token,
                    });
                }
            }

            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
            candidates.truncate(self.num_beams);
            beams = candidates;
            trace!(
                beams = beams.len(),
                finished = beams.iter().filter(|b| b.finished).count(),
                "beam step"
            );

            let best = self.leading(&beams);
            let visible = match best.tokens.split_last() {
                Some((&last, rest)) if last == eos_token => rest,
                _ => &best.tokens[..],
            };
            let text = self.tokenizer.decode(visible)?;
            let state = DecodeState::with_generated(&self.prompt_tokens, &best.tokens, text);
            let newest = best.tokens.last().copied().unwrap_or(eos_token);

            if let Some(outcome) = self.evaluator.check(&state, newest) {
                debug!(
                    reason = %outcome.reason,
                    tokens = best.tokens.len(),
                    "beam search finished"
                );
                return Ok(GenerationResponse {
                    generated_text: outcome.text,
                    tokens_generated: best.tokens.len() as u32,
                    generation_time: self.started_at.elapsed(),
                    finish_reason: outcome.reason,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Script, ScriptedBackend, ScriptedTokenizer};
    use crate::generation::SamplingConfig;
    use crate::types::FinishReason;
    use std::collections::HashMap;

    const EOS: TokenId = 0;

    fn tokenizer() -> ScriptedTokenizer {
        ScriptedTokenizer::new(
            vec![
                "</s>".to_string(),
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
            ],
            EOS,
        )
    }

    /// From "A", token B narrowly beats C, but B leads nowhere while C
    /// continues confidently. Greedy takes B; a two-beam search keeps both
    /// and picks the C path on cumulative probability.
    fn branching_script() -> Script {
        let mut map = HashMap::new();
        map.insert(1, vec![(2, 2.0), (3, 1.9)]);
        map.insert(2, vec![(EOS, -3.0), (3, -3.1)]);
        map.insert(3, vec![(EOS, 3.0)]);
        Script::Transitions(map)
    }

    fn beam_request(num_beams: u32) -> GenerationRequest {
        GenerationRequest::new("A").with_sampling(SamplingConfig {
            num_beams,
            ..SamplingConfig::default()
        })
    }

    #[test]
    fn test_beam_search_beats_greedy_path() {
        let tok = tokenizer();
        let mut backend = ScriptedBackend::new(4, branching_script());
        let request = beam_request(2);
        let decoder = BeamSearchDecoder::new(&tok, &mut backend, None, &request, vec![1]);

        let response = decoder.produce().unwrap();
        assert_eq!(response.generated_text, "C");
        assert_eq!(response.finish_reason, FinishReason::EndOfSequence);
        assert_eq!(response.tokens_generated, 2);
    }

    #[test]
    fn test_beam_resets_cache_per_scoring_call() {
        let tok = tokenizer();
        let mut backend = ScriptedBackend::new(4, branching_script());
        let request = beam_request(2);
        let decoder = BeamSearchDecoder::new(&tok, &mut backend, None, &request, vec![1]);
        decoder.produce().unwrap();

        // One reset per live-beam scoring call: one at step one, two at
        // step two.
        assert!(backend.reset_count() >= 3);
    }

    #[test]
    fn test_beam_respects_max_new_tokens() {
        let tok = tokenizer();
        // B and C feed each other forever without ever producing EOS.
        let mut map = HashMap::new();
        map.insert(1, vec![(2, 1.0), (3, 0.5)]);
        map.insert(2, vec![(3, 1.0), (2, 0.5)]);
        map.insert(3, vec![(2, 1.0), (3, 0.5)]);
        let mut backend = ScriptedBackend::new(4, Script::Transitions(map));
        let request = beam_request(2).with_max_new_tokens(3);
        let decoder = BeamSearchDecoder::new(&tok, &mut backend, None, &request, vec![1]);

        let response = decoder.produce().unwrap();
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
        assert_eq!(response.tokens_generated, 3);
    }

    #[test]
    fn test_beam_stop_sequence_trims_best_text() {
        let tok = tokenizer();
        let mut map = HashMap::new();
        map.insert(1, vec![(2, 1.0), (3, 0.5)]);
        map.insert(2, vec![(3, 1.0), (2, 0.5)]);
        map.insert(3, vec![(2, 1.0), (3, 0.5)]);
        let mut backend = ScriptedBackend::new(4, Script::Transitions(map));
        let request = beam_request(2)
            .with_max_new_tokens(10)
            .with_stop_sequences(vec!["bc".to_string()]);
        let decoder = BeamSearchDecoder::new(&tok, &mut backend, None, &request, vec![1]);

        let response = decoder.produce().unwrap();
        assert_eq!(
            response.finish_reason,
            FinishReason::StopSequence("bc".to_string())
        );
        assert_eq!(response.generated_text, "");
    }

    #[test]
    fn test_upstream_error_propagates() {
        let tok = tokenizer();
        let mut backend =
            ScriptedBackend::new(4, branching_script()).with_failure_at(1);
        let request = beam_request(2);
        let decoder = BeamSearchDecoder::new(&tok, &mut backend, None, &request, vec![1]);

        assert!(decoder.produce().is_err());
    }
}
