//! Snapshotting to a local key-value store
//!
//! A single record per application key holds the five step entities, the
//! topic confirmation flag, the citation set and the prompt templates.
//! Loading flags, the preparing marker and the last error are never stored.

use crate::citation::CitationSet;
use crate::error::PersistenceError;
use crate::prompts::PromptSet;
use crate::state::WorkflowState;
use crate::types::Character;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default record key
pub const DEFAULT_APP_KEY: &str = "symposium-workflow";

/// Durable subset of [`WorkflowState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSnapshot {
    /// Topic text
    pub topic: String,
    /// Topic confirmation flag
    pub topic_confirmed: bool,
    /// Research notes
    pub research_data: String,
    /// Grounding citations
    pub citations: CitationSet,
    /// Panel
    pub characters: Vec<Character>,
    /// Debate transcript
    pub transcript: String,
    /// Article
    pub final_article: String,
    /// Prompt templates
    pub prompts: PromptSet,
}

impl From<&WorkflowState> for WorkflowSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            topic: state.topic.text.clone(),
            topic_confirmed: state.topic.confirmed,
            research_data: state.research_data.clone(),
            citations: state.citations.clone(),
            characters: state.characters.clone(),
            transcript: state.transcript.clone(),
            final_article: state.final_article.clone(),
            prompts: state.prompts.clone(),
        }
    }
}

/// String-valued key-value store for snapshots
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read a record; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write a record, replacing any previous value
    async fn put(&self, key: &str, value: String) -> Result<(), PersistenceError>;

    /// Delete a record; absent keys are not an error
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Load the snapshot stored under `key`
///
/// # Errors
/// Store failures or an unparseable record; a missing record is `Ok(None)`.
pub async fn load_snapshot(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<WorkflowSnapshot>, PersistenceError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => {
            tracing::debug!(key, "no stored snapshot, using defaults");
            Ok(None)
        }
    }
}

/// Store a snapshot under `key`
///
/// # Errors
/// Serialization or store failures
pub async fn save_snapshot(
    store: &dyn SnapshotStore,
    key: &str,
    snapshot: &WorkflowSnapshot,
) -> Result<(), PersistenceError> {
    let raw = serde_json::to_string_pretty(snapshot)?;
    store.put(key, raw).await?;
    tracing::debug!(key, "snapshot saved");
    Ok(())
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Store rooted at `dir`; created on first write
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // write-then-rename so readers never see a torn record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    records: DashMap<String, String>,
}

impl MemorySnapshotStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.records.remove(key);
        Ok(())
    }
}
