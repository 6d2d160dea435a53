//! Token sampling from model logits.
//!
//! One [`SamplerChain`] is built per generation call from the request's
//! [`SamplingConfig`] and applies the filters in a fixed order:
//! repetition penalty, temperature scaling, top-k, softmax, top-p, typical
//! filtering, then a seeded random draw. The chain owns its RNG, so two
//! calls with the same seed and the same logits pick the same tokens.
//!
//! The beam loop bypasses the random draw and uses [`top_candidates`] to
//! rank continuations by log probability instead.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::generation::SamplingConfig;
use crate::types::TokenId;

/// A candidate token with its current score. The score starts as a logit
/// and becomes a probability once the chain runs softmax.
type Candidate = (TokenId, f32);

/// Stateful sampler for one generation call.
#[derive(Debug)]
pub struct SamplerChain {
    config: SamplingConfig,
    rng: StdRng,
}

impl SamplerChain {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Pick the next token from raw logits given the full token history.
    ///
    /// The candidate set is never filtered to empty: every filter keeps at
    /// least its top entry.
    pub fn sample(&mut self, mut logits: Vec<f32>, history: &[TokenId]) -> TokenId {
        apply_repetition_penalty(&mut logits, history, &self.config);

        for logit in &mut logits {
            *logit /= self.config.temperature;
        }

        let mut candidates: Vec<Candidate> = logits
            .into_iter()
            .enumerate()
            .map(|(token, logit)| (token as TokenId, logit))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        top_k_filter(&mut candidates, self.config.top_k);
        softmax(&mut candidates);
        top_p_filter(&mut candidates, self.config.top_p);
        if let Some(typical_p) = self.config.typical_p {
            typical_filter(&mut candidates, typical_p);
        }

        draw(&mut self.rng, &candidates)
    }
}

/// Penalize tokens that already occurred in the history.
///
/// Only the most recent `repetition_penalty_range` tokens are considered (zero
/// means the whole history). With a positive `repetition_penalty_decay`, the
/// penalty fades exponentially with a token's distance from the end of the
/// history; each token is penalized once, at its most recent occurrence.
pub fn apply_repetition_penalty(
    logits: &mut [f32],
    history: &[TokenId],
    config: &SamplingConfig,
) {
    if config.repetition_penalty == 1.0 || history.is_empty() {
        return;
    }

    let window = if config.repetition_penalty_range == 0 {
        history.len()
    } else {
        (config.repetition_penalty_range as usize).min(history.len())
    };

    let mut seen = std::collections::HashSet::new();
    for (age, &token) in history[history.len() - window..].iter().rev().enumerate() {
        if !seen.insert(token) {
            continue;
        }
        let strength = if config.repetition_penalty_decay > 0.0 {
            1.0 + (config.repetition_penalty - 1.0) * (-(age as f32) / config.repetition_penalty_decay).exp()
        } else {
            config.repetition_penalty
        };
        if let Some(logit) = logits.get_mut(token as usize) {
            if *logit > 0.0 {
                *logit /= strength;
            } else {
                *logit *= strength;
            }
        }
    }
}

/// Keep only the k highest-scored candidates. Zero disables the filter.
/// Candidates must already be sorted by descending score.
pub fn top_k_filter(candidates: &mut Vec<Candidate>, top_k: u32) {
    if top_k > 0 && candidates.len() > top_k as usize {
        candidates.truncate(top_k as usize);
    }
}

/// Replace scores with a normalized probability distribution.
pub fn softmax(candidates: &mut [Candidate]) {
    let max = candidates
        .iter()
        .map(|(_, score)| *score)
        .fold(f32::NEG_INFINITY, f32::max);
    let mut total = 0.0;
    for (_, score) in candidates.iter_mut() {
        *score = (*score - max).exp();
        total += *score;
    }
    for (_, score) in candidates.iter_mut() {
        *score /= total;
    }
}

/// Keep the smallest prefix of candidates whose cumulative probability
/// reaches `top_p`. Scores must be probabilities sorted descending. The
/// top candidate always survives.
pub fn top_p_filter(candidates: &mut Vec<Candidate>, top_p: f32) {
    if top_p >= 1.0 {
        return;
    }
    let mut cumulative = 0.0;
    let mut keep = 0;
    for (index, (_, probability)) in candidates.iter().enumerate() {
        cumulative += probability;
        keep = index + 1;
        if cumulative >= top_p {
            break;
        }
    }
    candidates.truncate(keep.max(1));
    renormalize(candidates);
}

/// Locally typical filtering: rank candidates by how close their surprisal
/// is to the distribution's entropy and keep the smallest such set whose
/// cumulative probability reaches `typical_p`.
pub fn typical_filter(candidates: &mut Vec<Candidate>, typical_p: f32) {
    if typical_p >= 1.0 || candidates.len() <= 1 {
        return;
    }

    let entropy: f32 = candidates
        .iter()
        .filter(|(_, p)| *p > 0.0)
        .map(|(_, p)| -p * p.ln())
        .sum();

    let mut by_typicality: Vec<Candidate> = candidates.clone();
    by_typicality.sort_by(|a, b| {
        let deviation_a = (-a.1.ln() - entropy).abs();
        let deviation_b = (-b.1.ln() - entropy).abs();
        deviation_a.total_cmp(&deviation_b)
    });

    let mut cumulative = 0.0;
    let mut kept = std::collections::HashSet::new();
    for (token, probability) in &by_typicality {
        kept.insert(*token);
        cumulative += probability;
        if cumulative >= typical_p {
            break;
        }
    }

    candidates.retain(|(token, _)| kept.contains(token));
    renormalize(candidates);
}

/// The `top_k` highest log-probability tokens with their log probabilities,
/// sorted descending. Used by the beam loop to expand hypotheses.
pub fn top_candidates(logits: &[f32], top_k: usize) -> Vec<(TokenId, f32)> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_total = logits.iter().map(|l| (l - max).exp()).sum::<f32>().ln();

    let mut scored: Vec<(TokenId, f32)> = logits
        .iter()
        .enumerate()
        .map(|(token, logit)| (token as TokenId, logit - max - log_total))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k.max(1));
    scored
}

fn renormalize(candidates: &mut [Candidate]) {
    let total: f32 = candidates.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for (_, probability) in candidates.iter_mut() {
            *probability /= total;
        }
    }
}

fn draw(rng: &mut StdRng, candidates: &[Candidate]) -> TokenId {
    let roll: f32 = rng.random();
    let mut cumulative = 0.0;
    for &(token, probability) in candidates {
        cumulative += probability;
        if roll < cumulative {
            return token;
        }
    }
    // Float rounding can leave the cumulative sum a hair under 1.0; an
    // empty candidate set (a backend returned no logits) degenerates to
    // token 0.
    candidates.last().map_or(0, |&(token, _)| token)
}
