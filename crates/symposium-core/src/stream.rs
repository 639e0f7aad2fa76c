//! Incremental consumption of streamed generator output
//!
//! [`StreamAggregator`] folds a lazy, non-restartable sequence of
//! [`StreamChunk`]s into a growing buffer and a running [`CitationSet`],
//! reporting each step of its lifecycle to a caller-supplied [`StreamSink`].
//!
//! ```text
//! Idle -> Starting -> Streaming -> Completed
//!            |            |
//!            +-> Failed <-+
//! ```
//!
//! Content forwarded to the sink before a failure is never rolled back.

use crate::citation::CitationSet;
use crate::error::{AggregatorError, GenerationError};
use crate::types::Citation;
use futures::{Stream, StreamExt};
use std::future::Future;

/// One fragment of streamed output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text fragment
    pub text: String,
    /// Grounding citations carried by this fragment
    pub citations: Vec<Citation>,
}

impl StreamChunk {
    /// Text-only chunk
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }

    /// Chunk carrying citations
    #[inline]
    #[must_use]
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Aggregator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// Not started
    Idle,
    /// Request sent, awaiting the first fragment
    Starting,
    /// At least one fragment received
    Streaming,
    /// Sequence exhausted normally
    Completed,
    /// Sequence raised an error
    Failed,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: AggregatorState) -> Vec<AggregatorState> {
    use AggregatorState::*;
    match from {
        Idle => vec![Starting],
        Starting => vec![Streaming, Completed, Failed],
        Streaming => vec![Streaming, Completed, Failed],
        Completed | Failed => vec![],
    }
}

/// Validate a lifecycle transition
///
/// # Errors
/// `AggregatorError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(
    from: AggregatorState,
    to: AggregatorState,
) -> Result<(), AggregatorError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AggregatorError::IllegalTransition { from, to })
    }
}

/// Receiver of aggregator lifecycle callbacks
///
/// Implementors mirror each callback onto durable state.
pub trait StreamSink {
    /// Reset or seed the target buffer before any fragment arrives
    fn on_start(&mut self);

    /// First fragment arrived; the request is no longer "preparing"
    fn on_first_chunk(&mut self) {}

    /// Apply one fragment; `merged` already includes its citations
    fn on_chunk(&mut self, chunk: &StreamChunk, merged: &CitationSet);

    /// Sequence exhausted; final merged citations
    fn on_complete(&mut self, _citations: &CitationSet) {}
}

/// Summary of a completed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Accumulated text
    pub text: String,
    /// Final merged citations
    pub citations: CitationSet,
    /// Number of fragments consumed
    pub chunks: usize,
}

/// Fold state for a single streamed request
#[derive(Debug)]
pub struct StreamAggregator {
    state: AggregatorState,
    buffer: String,
    citations: CitationSet,
    chunks: usize,
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAggregator {
    /// Create idle aggregator with empty citations
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(CitationSet::new())
    }

    /// Create idle aggregator whose citation merge starts from `citations`
    #[inline]
    #[must_use]
    pub fn seeded(citations: CitationSet) -> Self {
        Self {
            state: AggregatorState::Idle,
            buffer: String::new(),
            citations,
            chunks: 0,
        }
    }

    fn transition(&mut self, to: AggregatorState) -> Result<(), AggregatorError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// Idle -> Starting; lets the sink reset or seed its buffer
    ///
    /// # Errors
    /// `AggregatorError` if already started
    pub fn begin<S: StreamSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), AggregatorError> {
        self.transition(AggregatorState::Starting)?;
        sink.on_start();
        Ok(())
    }

    /// Accept one fragment; returns `true` for the first fragment
    ///
    /// # Errors
    /// `AggregatorError` if not started or already finished
    pub fn consume<S: StreamSink + ?Sized>(
        &mut self,
        chunk: StreamChunk,
        sink: &mut S,
    ) -> Result<bool, AggregatorError> {
        let first = self.state == AggregatorState::Starting;
        self.transition(AggregatorState::Streaming)?;
        if first {
            sink.on_first_chunk();
        }

        self.buffer.push_str(&chunk.text);
        self.citations.extend_unique(chunk.citations.iter().cloned());
        self.chunks += 1;
        sink.on_chunk(&chunk, &self.citations);
        Ok(first)
    }

    /// Mark normal exhaustion and hand the final citations to the sink
    ///
    /// # Errors
    /// `AggregatorError` if not started or already finished
    pub fn complete<S: StreamSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<CitationSet, AggregatorError> {
        self.transition(AggregatorState::Completed)?;
        sink.on_complete(&self.citations);
        Ok(self.citations.clone())
    }

    /// Mark failure; accumulated content is retained
    pub fn fail(&mut self) {
        if self.transition(AggregatorState::Failed).is_err() {
            tracing::debug!(state = ?self.state, "aggregator already terminal");
        }
    }

    /// Consume an already opened fragment sequence
    ///
    /// # Errors
    /// See [`StreamAggregator::run`]
    pub async fn drive<St, S>(
        &mut self,
        stream: St,
        sink: &mut S,
    ) -> Result<StreamSummary, GenerationError>
    where
        St: Stream<Item = Result<StreamChunk, GenerationError>>,
        S: StreamSink + ?Sized,
    {
        self.run(async { Ok(stream) }, sink).await
    }

    /// Seed the sink, open the sequence, then fold every fragment
    ///
    /// Suspends only while awaiting the initial response and each
    /// following fragment.
    ///
    /// # Errors
    /// The open error or the first error yielded by the sequence; the
    /// aggregator is left `Failed` with its partial buffer intact.
    pub async fn run<F, St, S>(
        &mut self,
        open: F,
        sink: &mut S,
    ) -> Result<StreamSummary, GenerationError>
    where
        F: Future<Output = Result<St, GenerationError>>,
        St: Stream<Item = Result<StreamChunk, GenerationError>>,
        S: StreamSink + ?Sized,
    {
        self.begin(sink).map_err(aggregator_fault)?;

        let stream = match open.await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "stream request failed");
                self.fail();
                return Err(err);
            }
        };

        let mut stream = std::pin::pin!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    self.consume(chunk, sink).map_err(aggregator_fault)?;
                }
                Err(err) => {
                    tracing::warn!(chunks = self.chunks, error = %err, "stream failed");
                    self.fail();
                    return Err(err);
                }
            }
        }

        let citations = self.complete(sink).map_err(aggregator_fault)?;
        Ok(StreamSummary {
            text: self.buffer.clone(),
            citations,
            chunks: self.chunks,
        })
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Text accumulated so far
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Citations merged so far
    #[inline]
    #[must_use]
    pub fn citations(&self) -> &CitationSet {
        &self.citations
    }

    /// Fragments consumed so far
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }
}

fn aggregator_fault(err: AggregatorError) -> GenerationError {
    GenerationError::Transport(err.to_string())
}
