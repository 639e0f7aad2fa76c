//! Workflow configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::WorkflowError;
use crate::persistence::DEFAULT_APP_KEY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Banner appended to research notes before supplemental findings
pub const DEFAULT_SUPPLEMENT_BANNER: &str = "\n\n---\n\n## Supplemental research: {{query}}\n\n";

/// Separator appended to the transcript before each extension
pub const DEFAULT_EXTENSION_BANNER: &str = "\n\n---\n\n";

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Snapshot record key
    pub app_key: String,
    /// Write a snapshot after each orchestrator action
    pub autosave: bool,
    /// Request web-search grounding for research calls
    pub web_search: bool,
    /// Directory for the file snapshot store
    pub snapshot_dir: Option<PathBuf>,
    /// Research separator; `{{query}}` is substituted
    pub supplement_banner: String,
    /// Transcript separator before an extension
    pub extension_banner: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            app_key: DEFAULT_APP_KEY.to_string(),
            autosave: true,
            web_search: true,
            snapshot_dir: None,
            supplement_banner: DEFAULT_SUPPLEMENT_BANNER.to_string(),
            extension_banner: DEFAULT_EXTENSION_BANNER.to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set snapshot key
    #[inline]
    #[must_use]
    pub fn with_app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = key.into();
        self
    }

    /// Enable or disable autosave
    #[inline]
    #[must_use]
    pub fn with_autosave(mut self, enabled: bool) -> Self {
        self.autosave = enabled;
        self
    }

    /// Enable or disable web-search grounding
    #[inline]
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Set snapshot directory
    #[inline]
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `WorkflowError::Config` on invalid TOML or an empty app key
    pub fn from_toml_str(raw: &str) -> Result<Self, WorkflowError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| WorkflowError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `WorkflowError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| WorkflowError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check invariants
    ///
    /// # Errors
    /// `WorkflowError::Config` for an empty app key
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.app_key.trim().is_empty() {
            return Err(WorkflowError::Config("app_key must not be empty".to_string()));
        }
        Ok(())
    }
}
