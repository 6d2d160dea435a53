//! End-to-end beam-search tests over a scripted backend.

use std::collections::HashMap;

use textgen_agent::backend::{Script, ScriptedBackend, ScriptedTokenizer};
use textgen_agent::generation::SamplingConfig;
use textgen_agent::session::{EngineHandles, GenerationSession, PredictOutput};
use textgen_agent::types::{FinishReason, GenerationRequest, TokenId};

const EOS: TokenId = 0;

fn vocab() -> Vec<String> {
    vec![
        "</s>".to_string(),
        "A".to_string(),
        "B".to_string(),
        "C".to_string(),
        "D".to_string(),
    ]
}

fn session_with(script: Script) -> GenerationSession {
    let vocab = vocab();
    let backend = ScriptedBackend::new(vocab.len(), script);
    let tokenizer = ScriptedTokenizer::new(vocab, EOS);
    let mut session = GenerationSession::new(Default::default()).unwrap();
    session.attach(EngineHandles::new(Box::new(tokenizer), Box::new(backend)));
    session
}

fn request(num_beams: u32) -> GenerationRequest {
    GenerationRequest::new("A").with_sampling(SamplingConfig {
        num_beams,
        top_k: 1,
        top_p: 1.0,
        ..SamplingConfig::default()
    })
}

/// Every state has one clearly dominant continuation.
fn unambiguous_script() -> Script {
    let mut map = HashMap::new();
    map.insert(1, vec![(2, 5.0), (3, 0.0)]);
    map.insert(2, vec![(3, 5.0), (4, 0.0)]);
    map.insert(3, vec![(EOS, 5.0), (2, 0.0)]);
    map.insert(4, vec![(EOS, 5.0)]);
    Script::Transitions(map)
}

/// The locally best first step leads to a weak continuation; the globally
/// best path starts with the second choice.
fn deceptive_script() -> Script {
    let mut map = HashMap::new();
    map.insert(1, vec![(2, 2.0), (3, 1.9)]);
    map.insert(2, vec![(EOS, -3.0), (4, -3.1)]);
    map.insert(3, vec![(EOS, 3.0)]);
    Script::Transitions(map)
}

fn complete_text(session: &mut GenerationSession, request: &GenerationRequest) -> String {
    match session.predict(request).unwrap() {
        PredictOutput::Stream(stream) => stream.complete().unwrap().generated_text,
        PredictOutput::Complete(response) => response.generated_text,
    }
}

#[test]
fn test_single_beam_routes_to_streaming() {
    let mut session = session_with(unambiguous_script());
    assert!(matches!(
        session.predict(&request(1)).unwrap(),
        PredictOutput::Stream(_)
    ));
}

#[test]
fn test_multi_beam_routes_to_complete() {
    let mut session = session_with(unambiguous_script());
    assert!(matches!(
        session.predict(&request(2)).unwrap(),
        PredictOutput::Complete(_)
    ));
}

#[test]
fn test_beam_matches_greedy_when_path_is_unambiguous() {
    let mut streaming_session = session_with(unambiguous_script());
    let streamed = complete_text(&mut streaming_session, &request(1));

    let mut beam_session = session_with(unambiguous_script());
    let beamed = complete_text(&mut beam_session, &request(2));

    assert_eq!(streamed, "BC");
    assert_eq!(streamed, beamed);
}

#[test]
fn test_beam_recovers_globally_better_path() {
    let mut streaming_session = session_with(deceptive_script());
    let streamed = complete_text(&mut streaming_session, &request(1));
    assert_eq!(streamed, "B");

    let mut beam_session = session_with(deceptive_script());
    let beamed = complete_text(&mut beam_session, &request(2));
    assert_eq!(beamed, "C");
}

#[test]
fn test_beam_response_reports_finish_reason() {
    let mut session = session_with(unambiguous_script());
    match session.predict(&request(2)).unwrap() {
        PredictOutput::Complete(response) => {
            assert_eq!(response.finish_reason, FinishReason::EndOfSequence);
            // B, C, and the end-of-sequence token.
            assert_eq!(response.tokens_generated, 3);
        }
        PredictOutput::Stream(_) => panic!("expected a complete response"),
    }
}

#[test]
fn test_beam_result_forwarded_to_channel_as_two_chunks() {
    let mut session = session_with(unambiguous_script());
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

    session.predict_to_channel(&request(2), &sender).unwrap();

    let first = receiver.try_recv().unwrap();
    assert_eq!(first.text, "BC");
    assert!(!first.is_complete);

    let second = receiver.try_recv().unwrap();
    assert!(second.is_complete);
    assert_eq!(second.finish_reason, Some(FinishReason::EndOfSequence));
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_beam_stop_sequence_is_trimmed() {
    let mut session = session_with(unambiguous_script());
    let req = request(2).with_stop_sequences(vec!["c".to_string()]);
    match session.predict(&req).unwrap() {
        PredictOutput::Complete(response) => {
            assert_eq!(
                response.finish_reason,
                FinishReason::StopSequence("c".to_string())
            );
            assert_eq!(response.generated_text, "B");
        }
        PredictOutput::Stream(_) => panic!("expected a complete response"),
    }
}
