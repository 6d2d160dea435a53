//! # Textgen Agent
//!
//! Text generation sessions over a pluggable model backend.
//!
//! This crate implements the generation core of a serving shim: it takes an
//! already-loaded tokenizer, model+cache pair, and optional low-rank adapter
//! (all supplied by an external model-loading collaborator through the
//! [`backend`] traits) and runs one generation request to completion, either
//! as a lazy token-by-token stream or as a single beam-search string.
//!
//! Model weight acquisition, filesystem layout, and request transport are
//! explicitly out of scope; the seam to those concerns is the trait surface
//! in [`backend`].
//!
//! ## Usage
//!
//! ```no_run
//! use textgen_agent::generation::{EngineConfig, SamplingConfig};
//! use textgen_agent::session::{GenerationSession, PredictOutput};
//! use textgen_agent::types::GenerationRequest;
//!
//! # fn load() -> textgen_agent::session::EngineHandles { unimplemented!() }
//! let mut session = GenerationSession::new(EngineConfig::default())?;
//! session.attach(load());
//!
//! let request = GenerationRequest::new("Once upon a time")
//!     .with_max_new_tokens(64)
//!     .with_stop_sequences(vec!["\nUser:".to_string()]);
//!
//! match session.predict(&request)? {
//!     PredictOutput::Stream(stream) => {
//!         for chunk in stream {
//!             print!("{}", chunk?.text);
//!         }
//!     }
//!     PredictOutput::Complete(response) => println!("{}", response.generated_text),
//! }
//! # Ok::<(), textgen_agent::types::EngineError>(())
//! ```

pub mod backend;
pub mod generation;
pub mod sampling;
pub mod session;
pub mod stopper;
pub mod types;

pub use backend::{AdapterHandle, BackendError, ModelBackend, PromptTokenizer};
pub use generation::{DecodeMode, EngineConfig, GenerationError, SamplingConfig};
pub use session::{EngineHandles, GenerationSession, PredictOutput};
pub use types::{
    EngineError, FinishReason, GenerationRequest, GenerationResponse, StreamChunk, ValidationError,
};
