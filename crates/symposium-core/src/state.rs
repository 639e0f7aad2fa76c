//! Workflow state tree and its action API
//!
//! [`WorkflowStore`] exclusively owns the [`WorkflowState`]. Every mutation
//! goes through a `&mut self` action, so exactly one mutation happens at a
//! time and each one reads the state as it is right now.

use crate::cascade;
use crate::citation::CitationSet;
use crate::completion::StepCompletionPolicy;
use crate::error::WorkflowError;
use crate::persistence::WorkflowSnapshot;
use crate::prompts::{PromptSet, PromptSlot};
use crate::types::{Character, Citation, Step, Topic};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// The five step entities plus transient UI state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    /// Step 1
    pub topic: Topic,
    /// Step 2 research notes
    pub research_data: String,
    /// Step 2 follow-up query input
    pub supplemental_query: String,
    /// Step 2 grounding citations
    pub citations: CitationSet,
    /// Step 3 panel, in debate order
    pub characters: Vec<Character>,
    /// Step 4 debate transcript
    pub transcript: String,
    /// Step 5 article
    pub final_article: String,
    /// Editable templates
    pub prompts: PromptSet,
    /// Displayed step
    pub current_step: Step,
    /// Requests in flight per step
    pub loading: BTreeMap<Step, bool>,
    /// Request sent but no fragment received yet
    pub preparing_step: Option<Step>,
    /// Single global error slot
    pub last_error: Option<String>,
}

impl WorkflowState {
    /// Whether a request for `step` is in flight
    #[inline]
    #[must_use]
    pub fn is_loading(&self, step: Step) -> bool {
        self.loading.get(&step).copied().unwrap_or(false)
    }

    /// Whether any request is in flight
    #[inline]
    #[must_use]
    pub fn any_loading(&self) -> bool {
        self.loading.values().any(|loading| *loading)
    }
}

/// State change notifications for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Loading flag flipped
    LoadingChanged {
        /// Affected step
        step: Step,
        /// New value
        loading: bool,
    },
    /// Preparing marker changed
    Preparing {
        /// Step awaiting its first fragment, if any
        step: Option<Step>,
    },
    /// Fragment appended to a step's buffer
    Chunk {
        /// Target step
        step: Step,
        /// Fragment text
        text: String,
    },
    /// Downstream state cleared
    Invalidated {
        /// First cleared step
        from: Step,
    },
    /// Active step changed
    StepChanged {
        /// New active step
        step: Step,
    },
    /// Last error set
    Error {
        /// Display message
        message: String,
    },
}

macro_rules! field_actions {
    ($($field:ident: $ty:ty => $set:ident, $update:ident;)*) => {
        $(
            #[doc = concat!("Replace `", stringify!($field), "`")]
            pub fn $set(&mut self, value: $ty) {
                resolve(&mut self.state.$field, move |_| value);
            }

            #[doc = concat!("Derive `", stringify!($field), "` from its current value")]
            pub fn $update(&mut self, next: impl FnOnce(&$ty) -> $ty) {
                resolve(&mut self.state.$field, next);
            }
        )*
    };
}

/// Single path through which value and updater setters resolve new state
fn resolve<T>(slot: &mut T, next: impl FnOnce(&T) -> T) {
    let value = next(slot);
    *slot = value;
}

/// Owner of the workflow state
#[derive(Debug, Default)]
pub struct WorkflowStore {
    state: WorkflowState,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl WorkflowStore {
    /// Create store with default state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store around an existing state
    #[inline]
    #[must_use]
    pub fn with_state(state: WorkflowState) -> Self {
        Self {
            state,
            events: None,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Take the state out of the store
    #[inline]
    #[must_use]
    pub fn into_state(self) -> WorkflowState {
        self.state
    }

    /// Receive state change events; replaces any previous subscriber
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&mut self, event: WorkflowEvent) {
        let closed = self
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_err());
        if closed {
            tracing::debug!("event subscriber dropped");
            self.events = None;
        }
    }

    field_actions! {
        research_data: String => set_research_data, update_research_data;
        supplemental_query: String => set_supplemental_query, update_supplemental_query;
        citations: CitationSet => set_citations, update_citations;
        characters: Vec<Character> => set_characters, update_characters;
        transcript: String => set_transcript, update_transcript;
        final_article: String => set_final_article, update_final_article;
    }

    // --- topic -------------------------------------------------------------

    /// Replace the topic text
    ///
    /// # Errors
    /// `WorkflowError::TopicLocked` once the topic is confirmed
    pub fn set_topic_text(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        if self.state.topic.confirmed {
            return Err(WorkflowError::TopicLocked);
        }
        let text = text.into();
        resolve(&mut self.state.topic.text, move |_| text);
        Ok(())
    }

    /// Confirm the topic and advance to research in one step
    ///
    /// No-op when the topic is already confirmed.
    ///
    /// # Errors
    /// `WorkflowError::EmptyTopic` if the text is blank
    pub fn confirm_topic(&mut self) -> Result<(), WorkflowError> {
        if self.state.topic.confirmed {
            return Ok(());
        }
        let trimmed = self.state.topic.text.trim().to_string();
        if trimmed.is_empty() {
            return Err(WorkflowError::EmptyTopic);
        }
        self.state.topic = Topic {
            text: trimmed,
            confirmed: true,
        };
        tracing::info!(topic = %self.state.topic.text, "topic confirmed");
        self.set_current_step(Step::Research);
        Ok(())
    }

    /// Unconfirm the topic for editing; clears every later step
    pub fn reset_topic(&mut self) {
        self.state.topic.confirmed = false;
        self.invalidate_from(Step::Research);
        self.set_current_step(Step::Topic);
    }

    /// Start over from an empty workflow; prompt edits are kept
    pub fn reset_workflow(&mut self) {
        self.invalidate_from(Step::Topic);
        self.set_current_step(Step::Topic);
    }

    // --- panel -------------------------------------------------------------

    /// Append a manually entered character; clears discussion and article
    pub fn add_character(&mut self, character: Character) {
        self.update_characters(|current| {
            let mut next = current.clone();
            next.push(character);
            next
        });
        self.invalidate_from(Step::Discussion);
    }

    /// Remove the character at `index`; clears discussion and article
    ///
    /// # Errors
    /// `WorkflowError::CharacterOutOfRange` for a bad index
    pub fn remove_character(&mut self, index: usize) -> Result<Character, WorkflowError> {
        let len = self.state.characters.len();
        if index >= len {
            return Err(WorkflowError::CharacterOutOfRange { index, len });
        }
        let removed = self.state.characters.remove(index);
        self.invalidate_from(Step::Discussion);
        Ok(removed)
    }

    // --- research ----------------------------------------------------------

    /// Merge citations into the durable set; returns how many were new
    pub fn merge_citations(&mut self, incoming: &[Citation]) -> usize {
        let before = self.state.citations.len();
        self.update_citations(|current| crate::citation::merge(current, incoming));
        self.state.citations.len() - before
    }

    // --- article -----------------------------------------------------------

    /// Acknowledge an article save; content is already in place
    pub fn save_article(&self) {
        tracing::info!(
            chars = self.state.final_article.chars().count(),
            "article saved"
        );
    }

    // --- navigation --------------------------------------------------------

    fn set_current_step(&mut self, step: Step) {
        if self.state.current_step != step {
            self.state.current_step = step;
            self.emit(WorkflowEvent::StepChanged { step });
        }
    }

    /// Navigate to a reachable step
    ///
    /// # Errors
    /// `WorkflowError::StepLocked` if the step is ahead and incomplete
    pub fn go_to_step(&mut self, step: Step) -> Result<(), WorkflowError> {
        if !StepCompletionPolicy::is_reachable(&self.state, step) {
            return Err(WorkflowError::StepLocked(step));
        }
        self.set_current_step(step);
        Ok(())
    }

    /// Advance past the active step once it is logically complete
    ///
    /// Stays on the article step when already there.
    ///
    /// # Errors
    /// `WorkflowError::StepIncomplete` if the active step has no content
    pub fn proceed(&mut self) -> Result<Step, WorkflowError> {
        let current = self.state.current_step;
        if !StepCompletionPolicy::is_complete(&self.state, current) {
            return Err(WorkflowError::StepIncomplete(current));
        }
        if let Some(next) = current.next() {
            self.set_current_step(next);
        }
        Ok(self.state.current_step)
    }

    /// Clear `from` and everything after it
    pub fn invalidate_from(&mut self, from: Step) {
        let step_before = self.state.current_step;
        cascade::invalidate_from(&mut self.state, from);
        self.emit(WorkflowEvent::Invalidated { from });
        if self.state.current_step != step_before {
            let step = self.state.current_step;
            self.emit(WorkflowEvent::StepChanged { step });
        }
    }

    // --- transient flags ---------------------------------------------------

    /// Mark a request for `step` in flight; `preparing` for streamed calls
    pub fn begin_loading(&mut self, step: Step, preparing: bool) {
        self.state.loading.insert(step, true);
        self.emit(WorkflowEvent::LoadingChanged {
            step,
            loading: true,
        });
        if preparing {
            self.state.preparing_step = Some(step);
            self.emit(WorkflowEvent::Preparing { step: Some(step) });
        }
    }

    /// Clear the preparing marker if it points at `step`
    pub fn clear_preparing(&mut self, step: Step) {
        if self.state.preparing_step == Some(step) {
            self.state.preparing_step = None;
            self.emit(WorkflowEvent::Preparing { step: None });
        }
    }

    /// Clear loading and preparing for `step`
    pub fn finish_loading(&mut self, step: Step) {
        self.state.loading.insert(step, false);
        self.emit(WorkflowEvent::LoadingChanged {
            step,
            loading: false,
        });
        self.clear_preparing(step);
    }

    /// Report a streamed fragment to observers
    pub fn notify_chunk(&mut self, step: Step, text: &str) {
        self.emit(WorkflowEvent::Chunk {
            step,
            text: text.to_string(),
        });
    }

    /// Overwrite the global error slot
    pub fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state.last_error = Some(message.clone());
        self.emit(WorkflowEvent::Error { message });
    }

    /// Clear the global error slot
    #[inline]
    pub fn clear_error(&mut self) {
        self.state.last_error = None;
    }

    // --- prompts -----------------------------------------------------------

    /// Edit one prompt template
    pub fn set_prompt(&mut self, slot: PromptSlot, template: impl Into<String>) {
        self.state.prompts.set(slot, template);
    }

    /// Restore one prompt template
    pub fn reset_prompt(&mut self, slot: PromptSlot) {
        self.state.prompts.reset_slot(slot);
    }

    /// Restore all prompt templates
    pub fn reset_prompts(&mut self) {
        self.state.prompts.reset();
    }

    /// Record the rendered text sent for a slot
    pub fn record_resolved_prompt(&mut self, slot: PromptSlot, text: impl Into<String>) {
        self.state.prompts.record_resolved(slot, text);
    }

    // --- persistence -------------------------------------------------------

    /// Durable subset of the state
    #[must_use]
    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot::from(&self.state)
    }

    /// Rebuild a store from a snapshot
    ///
    /// Transient flags start cleared; the active step is the first one
    /// without content.
    #[must_use]
    pub fn restore(snapshot: WorkflowSnapshot) -> Self {
        let mut state = WorkflowState {
            topic: Topic {
                text: snapshot.topic,
                confirmed: snapshot.topic_confirmed,
            },
            research_data: snapshot.research_data,
            citations: snapshot.citations,
            characters: snapshot.characters,
            transcript: snapshot.transcript,
            final_article: snapshot.final_article,
            prompts: snapshot.prompts,
            ..WorkflowState::default()
        };
        state.current_step = Step::ALL
            .into_iter()
            .find(|step| !StepCompletionPolicy::is_complete(&state, *step))
            .unwrap_or(Step::Article);
        Self::with_state(state)
    }
}
