//! Generation session: one request at a time over attached collaborators.

use textgen_common::{DefaultConfig, ValidatedConfig};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::backend::{AdapterHandle, ModelBackend, PromptTokenizer};
use crate::generation::{
    BeamSearchDecoder, DecodeLoop, DecodeMode, EngineConfig, GenerationError, TokenStream,
};
use crate::types::{
    EngineError, GenerationRequest, GenerationResponse, ModelNotLoadedError, RequestId,
    StreamChunk, ValidationError,
};

/// The collaborators one session generates with, handed over by whatever
/// loaded the model.
pub struct EngineHandles {
    pub tokenizer: Box<dyn PromptTokenizer>,
    pub model: Box<dyn ModelBackend>,
    pub adapter: Option<AdapterHandle>,
}

impl EngineHandles {
    pub fn new(tokenizer: Box<dyn PromptTokenizer>, model: Box<dyn ModelBackend>) -> Self {
        Self {
            tokenizer,
            model,
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: AdapterHandle) -> Self {
        self.adapter = Some(adapter);
        self
    }
}

/// The two shapes a successful predict call can take.
pub enum PredictOutput<'a> {
    /// Streaming decode: pull chunks lazily. Borrows the session until
    /// dropped or drained.
    Stream(TokenStream<'a>),
    /// Beam-search decode: ran to completion eagerly.
    Complete(GenerationResponse),
}

impl std::fmt::Debug for PredictOutput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictOutput::Stream(_) => f.debug_tuple("Stream").finish(),
            PredictOutput::Complete(response) => {
                f.debug_tuple("Complete").field(response).finish()
            }
        }
    }
}

/// A generation session over one attached model.
///
/// Sessions are strictly sequential: `predict` borrows the session
/// mutably, and a streaming call keeps that borrow alive until the stream
/// is dropped or drained. Every call starts from a clean slate; the model
/// cache is reset before the prompt is evaluated, so state abandoned by a
/// dropped stream never leaks into the next call.
pub struct GenerationSession {
    config: EngineConfig,
    handles: Option<EngineHandles>,
}

impl std::fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSession")
            .field("config", &self.config)
            .field("attached", &self.handles.is_some())
            .finish()
    }
}

impl GenerationSession {
    /// Create a session over a validated engine configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        ValidatedConfig::validate(&config)?;
        Ok(Self {
            config,
            handles: None,
        })
    }

    /// Create a session with the default engine configuration.
    pub fn with_default_config() -> Result<Self, EngineError> {
        let config = EngineConfig::validated_default()?;
        Ok(Self {
            config,
            handles: None,
        })
    }

    /// Attach the tokenizer/model pair this session generates with.
    /// Predict calls before this fail with [`ModelNotLoadedError`].
    pub fn attach(&mut self, handles: EngineHandles) {
        info!(adapter = ?handles.adapter.as_ref().map(|a| a.name.as_str()), "model attached");
        self.handles = Some(handles);
    }

    /// Detach and return the collaborators, leaving the session unloaded.
    pub fn detach(&mut self) -> Option<EngineHandles> {
        self.handles.take()
    }

    pub fn is_loaded(&self) -> bool {
        self.handles.is_some()
    }

    /// Run one generation request.
    ///
    /// Validates synchronously (a failing request produces zero output),
    /// resets the model cache, then dispatches on the request's
    /// [`DecodeMode`]: streaming requests return a lazy [`TokenStream`],
    /// beam requests run to completion and return the response.
    pub fn predict(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<PredictOutput<'_>, EngineError> {
        request.validate(&self.config)?;
        let handles = self.handles.as_mut().ok_or(ModelNotLoadedError)?;

        let request_id = RequestId::new();
        info!(
            %request_id,
            mode = ?request.sampling.decode_mode(),
            max_new_tokens = request.max_new_tokens,
            "starting generation"
        );

        // Discard whatever the previous call (possibly an abandoned
        // stream) left in the cache.
        handles.model.reset();

        let prompt_tokens = handles
            .tokenizer
            .encode(&request.prompt)
            .map_err(GenerationError::from)?;
        if prompt_tokens.len() + request.max_new_tokens as usize > self.config.max_seq_len {
            return Err(ValidationError::new(format!(
                "prompt ({} tokens) plus max_new_tokens ({}) exceeds the model context size ({})",
                prompt_tokens.len(),
                request.max_new_tokens,
                self.config.max_seq_len
            ))
            .into());
        }
        debug!(%request_id, prompt_tokens = prompt_tokens.len(), "prompt encoded");

        match request.sampling.decode_mode() {
            DecodeMode::Streaming => Ok(PredictOutput::Stream(TokenStream::new(
                handles.tokenizer.as_ref(),
                handles.model.as_mut(),
                handles.adapter.as_ref(),
                request,
                prompt_tokens,
            ))),
            DecodeMode::BeamSearch { .. } => {
                let decoder = BeamSearchDecoder::new(
                    handles.tokenizer.as_ref(),
                    handles.model.as_mut(),
                    handles.adapter.as_ref(),
                    request,
                    prompt_tokens,
                );
                let response = decoder.produce()?;
                info!(
                    %request_id,
                    tokens = response.tokens_generated,
                    reason = %response.finish_reason,
                    "generation complete"
                );
                Ok(PredictOutput::Complete(response))
            }
        }
    }

    /// Run one request and forward its chunks into a channel.
    ///
    /// Streaming requests are pumped chunk by chunk; beam requests are
    /// forwarded as one text chunk followed by the terminal marker. When
    /// the receiver disconnects, generation stops and the call returns
    /// normally.
    pub fn predict_to_channel(
        &mut self,
        request: &GenerationRequest,
        sender: &UnboundedSender<StreamChunk>,
    ) -> Result<(), EngineError> {
        match self.predict(request)? {
            PredictOutput::Stream(stream) => {
                for item in stream {
                    let chunk = item?;
                    if sender.send(chunk).is_err() {
                        warn!("stream receiver disconnected, abandoning generation");
                        return Ok(());
                    }
                }
            }
            PredictOutput::Complete(response) => {
                let tokens = response.tokens_generated;
                let sent = sender
                    .send(StreamChunk::fragment(response.generated_text, tokens))
                    .and_then(|_| {
                        sender.send(StreamChunk::terminal(tokens, response.finish_reason))
                    });
                if sent.is_err() {
                    warn!("stream receiver disconnected before beam result was delivered");
                }
            }
        }
        Ok(())
    }
}
