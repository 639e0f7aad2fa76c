//! Symposium Core - step-gated research and debate workflow
//!
//! The engine behind a five-step pipeline:
//! topic, research, expert panel, discussion, article.
//!
//! - Tracks per-step content and derives completion and reachability
//! - Cascades invalidation downstream when an upstream step changes
//! - Gates destructive reruns behind explicit confirmation
//! - Folds streamed fragments and citations into durable state
//! - Snapshots the durable subset through a pluggable store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use symposium_core::{
//!     Dispatch, FileSnapshotStore, Orchestrator, StepAction, WorkflowConfig,
//! };
//!
//! # async fn example(generator: Arc<dyn symposium_core::Generator>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkflowConfig::new();
//! let snapshots = Arc::new(FileSnapshotStore::new("./state"));
//! let mut orchestrator = Orchestrator::open(generator, config, snapshots).await?;
//!
//! orchestrator.set_topic_text("Tidal power").await?;
//! orchestrator.confirm_topic().await?;
//!
//! if let Dispatch::ConfirmationRequired(pending) =
//!     orchestrator.dispatch(StepAction::Research).await?
//! {
//!     println!("{}", pending.message());
//!     orchestrator.resolve(pending, true).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod citation;
pub mod completion;
pub mod config;
pub mod confirm;
pub mod controller;
pub mod error;
pub mod generator;
pub mod persistence;
pub mod prompts;
pub mod state;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use citation::CitationSet;
pub use completion::{StepCompletionPolicy, StepStatus, RESEARCH_MIN_CHARS};
pub use config::WorkflowConfig;
pub use confirm::Confirmation;
pub use controller::{Dispatch, Orchestrator, Resolution, StepAction};
pub use error::{AggregatorError, ErrorKind, GenerationError, PersistenceError, WorkflowError};
pub use generator::{panel_schema, parse_panel, ChunkStream, GenerationRequest, Generator};
pub use persistence::{
    load_snapshot, save_snapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
    WorkflowSnapshot, DEFAULT_APP_KEY,
};
pub use prompts::{PromptSet, PromptSlot, PromptVars};
pub use state::{WorkflowEvent, WorkflowState, WorkflowStore};
pub use stream::{AggregatorState, StreamAggregator, StreamChunk, StreamSink, StreamSummary};
pub use types::{Character, Citation, RequestId, Step, Topic};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a workflow
    pub use crate::{
        Character, Citation, Confirmation, Dispatch, GenerationError, GenerationRequest,
        Generator, Orchestrator, PromptSlot, Resolution, Step, StepAction, StreamChunk,
        WorkflowConfig, WorkflowError, WorkflowState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
