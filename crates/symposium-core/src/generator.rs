//! Generation collaborator seam
//!
//! The provider is opaque: given a request it produces a final string, a
//! lazy fragment stream, or a structured JSON value.

use crate::error::GenerationError;
use crate::stream::StreamChunk;
use crate::types::{Character, RequestId};
use futures::stream::BoxStream;
use serde_json::{json, Value};

/// Lazy, non-restartable fragment sequence for one request
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, GenerationError>>;

/// A single generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Request identifier for tracing
    pub id: RequestId,
    /// Fully rendered prompt
    pub prompt: String,
    /// Optional system instruction
    pub system_instruction: Option<String>,
    /// Ask the provider to ground output in web search
    pub web_search: bool,
}

impl GenerationRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            prompt: prompt.into(),
            system_instruction: None,
            web_search: false,
        }
    }

    /// With system instruction
    #[inline]
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// With web search grounding
    #[inline]
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }
}

/// Generative text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Single-shot text generation
    async fn generate_text(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// Streamed text generation
    async fn generate_text_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<ChunkStream, GenerationError>;

    /// JSON output constrained by `schema`
    async fn generate_structured(
        &self,
        request: GenerationRequest,
        schema: Value,
    ) -> Result<Value, GenerationError>;
}

/// Schema for the expert panel: an array of fully populated characters
#[must_use]
pub fn panel_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "profession": { "type": "string" },
                "background": { "type": "string" }
            },
            "required": ["name", "profession", "background"]
        }
    })
}

/// Parse a structured panel response
///
/// # Errors
/// `GenerationError::Malformed` if the value does not match [`panel_schema`]
pub fn parse_panel(value: Value) -> Result<Vec<Character>, GenerationError> {
    serde_json::from_value(value).map_err(|err| GenerationError::Malformed(err.to_string()))
}
