//! Core types for the workflow
//!
//! Defines:
//! - The five workflow steps
//! - Topic, citation and character entities
//! - Request identifiers

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// One of the five sequential workflow stages
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Step {
    /// Pick and confirm a topic
    #[default]
    Topic = 1,
    /// Web-grounded research
    Research = 2,
    /// Expert persona panel
    Panel = 3,
    /// Simulated debate transcript
    Discussion = 4,
    /// Long-form article
    Article = 5,
}

impl Step {
    /// All steps in order
    pub const ALL: [Step; 5] = [
        Step::Topic,
        Step::Research,
        Step::Panel,
        Step::Discussion,
        Step::Article,
    ];

    /// 1-based step number
    #[inline]
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Following step, `None` after the article
    #[must_use]
    pub fn next(self) -> Option<Step> {
        Step::try_from(self.number() + 1).ok()
    }

    /// Steps strictly after this one
    pub fn downstream(self) -> impl Iterator<Item = Step> {
        Step::ALL.into_iter().filter(move |s| *s > self)
    }

    /// Short label for logs and the CLI
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Step::Topic => "topic",
            Step::Research => "research",
            Step::Panel => "panel",
            Step::Discussion => "discussion",
            Step::Article => "article",
        }
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.number()
    }
}

impl TryFrom<u8> for Step {
    type Error = WorkflowError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Step::Topic),
            2 => Ok(Step::Research),
            3 => Ok(Step::Panel),
            4 => Ok(Step::Discussion),
            5 => Ok(Step::Article),
            other => Err(WorkflowError::InvalidStep(other)),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Workflow topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Free text
    pub text: String,
    /// Set by explicit confirmation, cleared only by a reset
    pub confirmed: bool,
}

/// Grounding citation returned with search-augmented output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    /// Source title
    pub title: String,
    /// Source URI, unique within a set
    pub uri: String,
}

impl Citation {
    /// Create new citation
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// Fictional expert persona on the debate panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Display name
    pub name: String,
    /// Field of expertise
    pub profession: String,
    /// Short biography
    pub background: String,
}

impl Character {
    /// Create character without validation (generated panels are trusted)
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        profession: impl Into<String>,
        background: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            profession: profession.into(),
            background: background.into(),
        }
    }

    /// Create a manually entered character, requiring every field
    ///
    /// # Errors
    /// `WorkflowError::InvalidCharacter` naming the first blank field
    pub fn manual(
        name: impl Into<String>,
        profession: impl Into<String>,
        background: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let (name, profession, background): (String, String, String) =
            (name.into(), profession.into(), background.into());
        let character = Self::new(name.trim(), profession.trim(), background.trim());
        for (field, value) in [
            ("name", &character.name),
            ("profession", &character.profession),
            ("background", &character.background),
        ] {
            if value.is_empty() {
                return Err(WorkflowError::InvalidCharacter(format!("{field} is required")));
            }
        }
        Ok(character)
    }
}

/// Unique generation request identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Generate new request ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_numbers_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::try_from(step.number()).unwrap(), step);
        }
        assert!(matches!(Step::try_from(0), Err(WorkflowError::InvalidStep(0))));
        assert!(matches!(Step::try_from(6), Err(WorkflowError::InvalidStep(6))));
    }

    #[test]
    fn step_next_and_downstream() {
        assert_eq!(Step::Topic.next(), Some(Step::Research));
        assert_eq!(Step::Article.next(), None);
        let after_panel: Vec<_> = Step::Panel.downstream().collect();
        assert_eq!(after_panel, vec![Step::Discussion, Step::Article]);
    }

    #[test]
    fn step_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Step::Panel).unwrap(), "3");
        let step: Step = serde_json::from_str("4").unwrap();
        assert_eq!(step, Step::Discussion);
        assert!(serde_json::from_str::<Step>("9").is_err());
    }

    #[test]
    fn manual_character_requires_all_fields() {
        let ok = Character::manual(" Ada ", "Engineer", "Wrote notes").unwrap();
        assert_eq!(ok.name, "Ada");

        let err = Character::manual("Ada", "  ", "Wrote notes").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidCharacter(msg) if msg.contains("profession")));
    }
}
