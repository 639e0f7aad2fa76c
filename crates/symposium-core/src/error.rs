//! Error types for the Symposium workflow
//!
//! Provides error handling for:
//! - Generation failures (quota, malformed output, generic)
//! - Step gating and navigation violations
//! - Invalid user input (topic, characters, queries)
//! - Snapshot persistence

use crate::stream::AggregatorState;
use crate::types::Step;

/// Main workflow error type
///
/// Every variant is recoverable: the workflow stays interactive after any of
/// them and the user reissues the action manually.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// Provider signalled HTTP 429 or resource exhaustion
    #[error("step {step}: generation quota exceeded, try again shortly")]
    QuotaExceeded {
        /// Step whose request was throttled
        step: Step,
    },

    /// Structured output failed to parse
    #[error("step {step}: invalid format, please retry ({detail})")]
    MalformedResponse {
        /// Step whose output was malformed
        step: Step,
        /// Parser message
        detail: String,
    },

    /// Any other generation failure
    #[error("step {step} failed: {message}")]
    GenerationFailed {
        /// Step whose request failed
        step: Step,
        /// Underlying message
        message: String,
    },

    /// Step prerequisites are not complete
    #[error("step {0} is locked")]
    StepLocked(Step),

    /// Step must be logically complete for this action
    #[error("step {0} is not complete")]
    StepIncomplete(Step),

    /// Topic text cannot change once confirmed
    #[error("topic is confirmed; reset it before editing")]
    TopicLocked,

    /// Topic text is blank
    #[error("topic is empty")]
    EmptyTopic,

    /// Supplemental research query is blank
    #[error("supplemental research query is empty")]
    EmptyQuery,

    /// Discussion extension needs an existing transcript
    #[error("no transcript to extend; start the discussion first")]
    EmptyTranscript,

    /// Manually entered character is incomplete
    #[error("invalid character: {0}")]
    InvalidCharacter(String),

    /// Character index does not exist
    #[error("character index {index} out of range (panel size {len})")]
    CharacterOutOfRange {
        /// Requested index
        index: usize,
        /// Panel size
        len: usize,
    },

    /// Step number outside 1..=5
    #[error("invalid step number: {0}")]
    InvalidStep(u8),

    /// Snapshot store failure
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl WorkflowError {
    /// Classify a collaborator failure for the given step
    #[must_use]
    pub fn classify(step: Step, error: GenerationError) -> Self {
        if error.is_quota() {
            return Self::QuotaExceeded { step };
        }
        match error {
            GenerationError::Malformed(detail) => Self::MalformedResponse { step, detail },
            other => Self::GenerationFailed {
                step,
                message: other.to_string(),
            },
        }
    }

    /// Coarse classification for presentation
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuotaExceeded { .. } => ErrorKind::Quota,
            Self::MalformedResponse { .. } => ErrorKind::Malformed,
            Self::GenerationFailed { .. } => ErrorKind::Generation,
            Self::StepLocked(_) | Self::StepIncomplete(_) | Self::TopicLocked => {
                ErrorKind::Navigation
            }
            Self::EmptyTopic
            | Self::EmptyQuery
            | Self::EmptyTranscript
            | Self::InvalidCharacter(_)
            | Self::CharacterOutOfRange { .. }
            | Self::InvalidStep(_) => ErrorKind::Input,
            Self::Persistence(_) | Self::Config(_) => ErrorKind::System,
        }
    }

    /// Whether reissuing the same action may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Quota | ErrorKind::Malformed | ErrorKind::Generation
        )
    }

    /// Step the error refers to, if any
    #[must_use]
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::QuotaExceeded { step }
            | Self::MalformedResponse { step, .. }
            | Self::GenerationFailed { step, .. } => Some(*step),
            Self::StepLocked(step) | Self::StepIncomplete(step) => Some(*step),
            _ => None,
        }
    }
}

/// Error kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limited by the provider
    Quota,
    /// Unparseable structured output
    Malformed,
    /// Other provider failure
    Generation,
    /// Locked or incomplete step
    Navigation,
    /// Rejected user input
    Input,
    /// Storage or configuration
    System,
}

/// Failures reported by the generation collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Non-success HTTP status
    #[error("request failed with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Provider reported exhausted quota
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Output did not match the requested shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Connection or stream failure
    #[error("{0}")]
    Transport(String),
}

const QUOTA_MARKER: &str = "RESOURCE_EXHAUSTED";

impl GenerationError {
    /// Whether the failure signals rate limiting
    #[must_use]
    pub fn is_quota(&self) -> bool {
        match self {
            Self::ResourceExhausted(_) => true,
            Self::Status { status, message } => {
                *status == 429 || message.contains(QUOTA_MARKER)
            }
            Self::Transport(message) => {
                message.contains(QUOTA_MARKER)
                    || message
                        .split(|c: char| !c.is_ascii_alphanumeric())
                        .any(|token| token == "429")
            }
            Self::Malformed(_) => false,
        }
    }
}

/// Illegal stream aggregator transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AggregatorError {
    /// Transition not in the lifecycle table
    #[error("illegal aggregator transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: AggregatorState,
        /// Requested state
        to: AggregatorState,
    },
}

/// Snapshot store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("io error: {0}")]
    Io(String),

    /// Stored record could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key contains characters that cannot map to a file name
    #[error("invalid snapshot key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
