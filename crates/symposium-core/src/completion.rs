//! Per-step logical completion and navigation gating
//!
//! Completion is content-based and independent of which step is active.
//! It gates forward navigation and decides whether rerunning a step needs
//! destructive confirmation.

use crate::state::WorkflowState;
use crate::types::Step;
use serde::Serialize;

/// Research counts as complete above this many non-whitespace characters
pub const RESEARCH_MIN_CHARS: usize = 50;

/// Pure completion predicates over [`WorkflowState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StepCompletionPolicy;

impl StepCompletionPolicy {
    /// Whether `step` has usable content
    #[must_use]
    pub fn is_complete(state: &WorkflowState, step: Step) -> bool {
        match step {
            Step::Topic => state.topic.confirmed,
            Step::Research => {
                research_chars(&state.research_data) > RESEARCH_MIN_CHARS
                    || !state.citations.is_empty()
            }
            Step::Panel => !state.characters.is_empty(),
            Step::Discussion => !state.transcript.trim().is_empty(),
            Step::Article => !state.final_article.trim().is_empty(),
        }
    }

    /// Whether the user may navigate to `step`
    ///
    /// Steps at or behind the active one are always reachable; later steps
    /// only once logically complete.
    #[must_use]
    pub fn is_reachable(state: &WorkflowState, step: Step) -> bool {
        step <= state.current_step || Self::is_complete(state, step)
    }

    /// Whether every step before `step` is complete
    #[must_use]
    pub fn prerequisites_met(state: &WorkflowState, step: Step) -> bool {
        Step::ALL
            .into_iter()
            .take_while(|s| *s < step)
            .all(|s| Self::is_complete(state, s))
    }

    /// Status of every step
    #[must_use]
    pub fn statuses(state: &WorkflowState) -> [StepStatus; 5] {
        Step::ALL.map(|step| StepStatus {
            step,
            complete: Self::is_complete(state, step),
            reachable: Self::is_reachable(state, step),
            active: step == state.current_step,
            loading: state.is_loading(step),
        })
    }
}

fn research_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Snapshot of one step's gating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    /// The step
    pub step: Step,
    /// Logically complete
    pub complete: bool,
    /// Navigable
    pub reachable: bool,
    /// Currently displayed
    pub active: bool,
    /// Request in flight
    pub loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Character, Citation};

    #[test]
    fn research_threshold_counts_non_whitespace() {
        let mut state = WorkflowState::default();
        state.research_data = "   ".to_string();
        assert!(!StepCompletionPolicy::is_complete(&state, Step::Research));

        state.research_data = format!("{} {}", "a".repeat(25), "b".repeat(25));
        assert!(!StepCompletionPolicy::is_complete(&state, Step::Research));

        state.research_data = format!("{}\n{}", "a".repeat(25), "b".repeat(26));
        assert!(StepCompletionPolicy::is_complete(&state, Step::Research));
    }

    #[test]
    fn research_complete_with_citations_only() {
        let mut state = WorkflowState::default();
        state.citations.insert(Citation::new("T", "https://t"));
        assert!(StepCompletionPolicy::is_complete(&state, Step::Research));
    }

    #[test]
    fn text_steps_ignore_whitespace() {
        let mut state = WorkflowState::default();
        state.transcript = "\n\t ".to_string();
        state.final_article = " ".to_string();
        assert!(!StepCompletionPolicy::is_complete(&state, Step::Discussion));
        assert!(!StepCompletionPolicy::is_complete(&state, Step::Article));

        state.transcript = "Ada: hi".to_string();
        assert!(StepCompletionPolicy::is_complete(&state, Step::Discussion));
    }

    #[test]
    fn later_steps_locked_until_complete() {
        let mut state = WorkflowState::default();
        assert!(StepCompletionPolicy::is_reachable(&state, Step::Topic));
        assert!(!StepCompletionPolicy::is_reachable(&state, Step::Research));

        state.characters.push(Character::new("A", "B", "C"));
        assert!(StepCompletionPolicy::is_reachable(&state, Step::Panel));
        assert!(!StepCompletionPolicy::prerequisites_met(&state, Step::Panel));

        state.current_step = Step::Discussion;
        assert!(StepCompletionPolicy::is_reachable(&state, Step::Research));
    }

    #[test]
    fn statuses_mark_active_step() {
        let state = WorkflowState::default();
        let statuses = StepCompletionPolicy::statuses(&state);
        assert!(statuses[0].active);
        assert!(statuses.iter().skip(1).all(|s| !s.active && !s.complete));
    }
}
