//! Downstream invalidation
//!
//! When step N changes, everything owned by steps `>= N` is reset to its
//! empty default, together with the transient flags of those steps.

use crate::state::WorkflowState;
use crate::types::Step;

/// Clear all state belonging to `from` and every later step
///
/// Also drops loading flags for those steps, the preparing marker if it
/// points at one of them, and the last error. The active step is pulled
/// back to `from` if it was further ahead.
pub fn invalidate_from(state: &mut WorkflowState, from: Step) {
    for step in Step::ALL.into_iter().filter(|s| *s >= from) {
        clear_step(state, step);
    }

    state.loading.retain(|step, _| *step < from);
    if state.preparing_step.is_some_and(|step| step >= from) {
        state.preparing_step = None;
    }
    state.last_error = None;
    if state.current_step > from {
        state.current_step = from;
    }

    tracing::debug!(from = %from, "invalidated downstream state");
}

fn clear_step(state: &mut WorkflowState, step: Step) {
    match step {
        Step::Topic => {
            state.topic.text.clear();
            state.topic.confirmed = false;
        }
        Step::Research => {
            state.research_data.clear();
            state.supplemental_query.clear();
            state.citations.clear();
        }
        Step::Panel => state.characters.clear(),
        Step::Discussion => state.transcript.clear(),
        Step::Article => state.final_article.clear(),
    }
}
