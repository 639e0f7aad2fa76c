//! Testing utilities for the Symposium workspace
//!
//! Shared test helpers, fixtures, and a scripted generator.

#![allow(missing_docs)]

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use symposium_core::{
    Character, ChunkStream, Citation, GenerationError, GenerationRequest, Generator,
    Orchestrator, StreamChunk, WorkflowConfig, WorkflowEvent, WorkflowStore,
};
use tokio::sync::mpsc;

/// One element of a scripted stream
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(StreamChunk),
    Fail(GenerationError),
}

/// Which collaborator call was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Text,
    Stream,
    Structured,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: GenerationRequest,
}

/// Generator that replays queued responses in order
///
/// An empty queue answers with a transport error so an unexpected call
/// surfaces as a failed step rather than a hang.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    texts: Mutex<VecDeque<Result<String, GenerationError>>>,
    streams: Mutex<VecDeque<Result<Vec<ScriptStep>, GenerationError>>>,
    structured: Mutex<VecDeque<Result<Value, GenerationError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.texts.lock().push_back(Ok(text.into()));
        self
    }

    pub fn push_text_error(&self, error: GenerationError) -> &Self {
        self.texts.lock().push_back(Err(error));
        self
    }

    pub fn push_stream(&self, steps: Vec<ScriptStep>) -> &Self {
        self.streams.lock().push_back(Ok(steps));
        self
    }

    /// Queue a stream made of plain text chunks
    pub fn push_chunks(&self, chunks: &[&str]) -> &Self {
        self.push_stream(chunks.iter().map(|text| ScriptStep::Chunk(chunk(text))).collect())
    }

    pub fn push_stream_error(&self, error: GenerationError) -> &Self {
        self.streams.lock().push_back(Err(error));
        self
    }

    pub fn push_structured(&self, value: Value) -> &Self {
        self.structured.lock().push_back(Ok(value));
        self
    }

    pub fn push_structured_error(&self, error: GenerationError) -> &Self {
        self.structured.lock().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.calls.lock().last().map(|call| call.request.clone())
    }

    fn record(&self, kind: CallKind, request: GenerationRequest) {
        self.calls.lock().push(RecordedCall { kind, request });
    }
}

fn exhausted(kind: &str) -> GenerationError {
    GenerationError::Transport(format!("no scripted {kind} response"))
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_text(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.record(CallKind::Text, request);
        self.texts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("text")))
    }

    async fn generate_text_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<ChunkStream, GenerationError> {
        self.record(CallKind::Stream, request);
        let steps = self
            .streams
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("stream")))?;
        let items = steps.into_iter().map(|step| match step {
            ScriptStep::Chunk(chunk) => Ok(chunk),
            ScriptStep::Fail(error) => Err(error),
        });
        Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
    }

    async fn generate_structured(
        &self,
        request: GenerationRequest,
        _schema: Value,
    ) -> Result<Value, GenerationError> {
        self.record(CallKind::Structured, request);
        self.structured
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("structured")))
    }
}

// --- fixtures ----------------------------------------------------------------

pub fn chunk(text: &str) -> StreamChunk {
    StreamChunk::text(text)
}

pub fn chunk_with(text: &str, citations: Vec<Citation>) -> StreamChunk {
    StreamChunk::text(text).with_citations(citations)
}

pub fn citation(n: usize) -> Citation {
    Citation::new(format!("Source {n}"), format!("https://example.org/{n}"))
}

pub fn character(n: usize) -> Character {
    Character::new(
        format!("Expert {n}"),
        format!("Profession {n}"),
        format!("Background {n}"),
    )
}

pub fn panel(n: usize) -> Vec<Character> {
    (1..=n).map(character).collect()
}

pub fn panel_json(n: usize) -> Value {
    Value::Array(
        panel(n)
            .into_iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "profession": c.profession,
                    "background": c.background,
                })
            })
            .collect(),
    )
}

/// Research text with exactly `len` non-whitespace characters
pub fn research_text(len: usize) -> String {
    ('a'..='z').cycle().take(len).collect()
}

/// Store with all five steps complete
pub fn populated_store() -> WorkflowStore {
    let mut store = WorkflowStore::new();
    store.set_topic_text("Tidal power").unwrap();
    store.confirm_topic().unwrap();
    store.set_research_data(research_text(120));
    store.merge_citations(&[citation(1), citation(2)]);
    store.set_characters(panel(3));
    store.set_transcript("Expert 1: opening\nExpert 2: rebuttal".to_string());
    store.set_final_article("# Tidal power\n\nSummary.".to_string());
    store
}

pub fn setup_orchestrator(generator: Arc<ScriptedGenerator>) -> Orchestrator {
    Orchestrator::new(generator, WorkflowConfig::new().with_autosave(false))
}

pub fn setup_orchestrator_with(generator: Arc<ScriptedGenerator>, store: WorkflowStore) -> Orchestrator {
    Orchestrator::with_store(generator, WorkflowConfig::new().with_autosave(false), store)
}

/// Collect every event queued so far
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
