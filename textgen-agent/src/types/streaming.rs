//! Streaming types for incremental generation output.

use crate::types::generation::FinishReason;

/// A chunk of streaming text response.
///
/// The stream ends with an explicit terminal marker: a chunk whose
/// `is_complete` is true, carrying the finish reason and no text. A stream
/// that ends with an error instead of a terminal marker was aborted
/// mid-generation; the two cases are distinguishable by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    pub is_complete: bool,
    pub token_count: u32,
    /// Finish reason, only present when is_complete is true
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// A regular per-token fragment.
    pub fn fragment(text: String, token_count: u32) -> Self {
        Self {
            text,
            is_complete: false,
            token_count,
            finish_reason: None,
        }
    }

    /// The terminal end-of-stream marker.
    pub fn terminal(token_count: u32, finish_reason: FinishReason) -> Self {
        Self {
            text: String::new(),
            is_complete: true,
            token_count,
            finish_reason: Some(finish_reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_chunk() {
        let chunk = StreamChunk::fragment("hi".to_string(), 3);
        assert!(!chunk.is_complete);
        assert!(chunk.finish_reason.is_none());
        assert_eq!(chunk.token_count, 3);
    }

    #[test]
    fn test_terminal_chunk() {
        let chunk = StreamChunk::terminal(5, FinishReason::MaxTokens);
        assert!(chunk.is_complete);
        assert!(chunk.text.is_empty());
        assert_eq!(chunk.finish_reason, Some(FinishReason::MaxTokens));
    }
}
