//! The attached adapter must reach the model backend on every logits call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use textgen_agent::backend::{
    AdapterHandle, BackendError, ModelBackend, Script, ScriptedBackend, ScriptedTokenizer,
};
use textgen_agent::generation::SamplingConfig;
use textgen_agent::session::{EngineHandles, GenerationSession, PredictOutput};
use textgen_agent::types::{GenerationRequest, TokenId};

const EOS: TokenId = 0;

/// Delegating backend that records the adapter it was handed on each
/// logits call, so the test can inspect the calls after the session has
/// taken ownership.
struct AdapterRecordingBackend {
    inner: ScriptedBackend,
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl ModelBackend for AdapterRecordingBackend {
    fn next_token_logits(
        &mut self,
        history: &[TokenId],
        adapter: Option<&AdapterHandle>,
    ) -> Result<Vec<f32>, BackendError> {
        self.seen
            .lock()
            .unwrap()
            .push(adapter.map(|a| a.name.clone()));
        self.inner.next_token_logits(history, adapter)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

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

fn session_with(
    script: Script,
    adapter: Option<AdapterHandle>,
) -> (GenerationSession, Arc<Mutex<Vec<Option<String>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend = AdapterRecordingBackend {
        inner: ScriptedBackend::new(4, script),
        seen: Arc::clone(&seen),
    };
    let mut handles = EngineHandles::new(Box::new(tokenizer()), Box::new(backend));
    if let Some(adapter) = adapter {
        handles = handles.with_adapter(adapter);
    }
    let mut session = GenerationSession::new(Default::default()).unwrap();
    session.attach(handles);
    (session, seen)
}

fn branching_script() -> Script {
    let mut map = HashMap::new();
    map.insert(1, vec![(2, 1.0), (3, 0.5)]);
    map.insert(2, vec![(3, 1.0), (EOS, 0.5)]);
    map.insert(3, vec![(EOS, 1.0), (2, 0.5)]);
    Script::Transitions(map)
}

fn request(num_beams: u32) -> GenerationRequest {
    GenerationRequest::new("A").with_sampling(SamplingConfig {
        num_beams,
        top_k: 1,
        top_p: 1.0,
        ..SamplingConfig::default()
    })
}

#[test]
fn test_streaming_loop_passes_adapter_on_every_call() {
    let (mut session, seen) = session_with(
        Script::Sequence(vec![2, 3, EOS]),
        Some(AdapterHandle::new("story-lora").with_scale(0.8)),
    );

    match session.predict(&request(1)).unwrap() {
        PredictOutput::Stream(stream) => {
            stream.complete().unwrap();
        }
        PredictOutput::Complete(_) => panic!("expected a stream"),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen
        .iter()
        .all(|name| name.as_deref() == Some("story-lora")));
}

#[test]
fn test_beam_loop_passes_adapter_on_every_call() {
    let (mut session, seen) = session_with(
        branching_script(),
        Some(AdapterHandle::new("story-lora")),
    );

    match session.predict(&request(2)).unwrap() {
        PredictOutput::Complete(_) => {}
        PredictOutput::Stream(_) => panic!("expected a complete response"),
    }

    let seen = seen.lock().unwrap();
    // Every per-beam scoring call carries the adapter.
    assert!(seen.len() >= 2);
    assert!(seen
        .iter()
        .all(|name| name.as_deref() == Some("story-lora")));
}

#[test]
fn test_no_adapter_means_none_on_every_call() {
    let (mut session, seen) = session_with(Script::Sequence(vec![2, EOS]), None);

    match session.predict(&request(1)).unwrap() {
        PredictOutput::Stream(stream) => {
            stream.complete().unwrap();
        }
        PredictOutput::Complete(_) => panic!("expected a stream"),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|name| name.is_none()));
}
