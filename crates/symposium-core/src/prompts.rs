//! Editable prompt templates
//!
//! Templates contain `{{name}}` tokens substituted at call time. User edits
//! persist with the workflow snapshot until explicitly reset.

use crate::types::Character;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}\}").expect("token pattern is valid")
});

/// Fixed prompt slot names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PromptSlot {
    /// Suggest a debate topic
    TopicGen,
    /// Initial web-grounded research
    Research,
    /// Follow-up research on a user query
    ResearchSupplement,
    /// Expert panel generation
    PanelGen,
    /// First discussion rounds
    DiscussionStart,
    /// Further discussion rounds
    DiscussionExtend,
    /// Article synthesis
    ArticleGen,
    /// System instruction for discussion calls
    DiscussionSystemInstruction,
    /// System instruction for article calls
    ArticleSystemInstruction,
}

impl PromptSlot {
    /// All slots in a stable order
    pub const ALL: [PromptSlot; 9] = [
        PromptSlot::TopicGen,
        PromptSlot::Research,
        PromptSlot::ResearchSupplement,
        PromptSlot::PanelGen,
        PromptSlot::DiscussionStart,
        PromptSlot::DiscussionExtend,
        PromptSlot::ArticleGen,
        PromptSlot::DiscussionSystemInstruction,
        PromptSlot::ArticleSystemInstruction,
    ];

    /// Persisted slot name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PromptSlot::TopicGen => "topic-gen",
            PromptSlot::Research => "research",
            PromptSlot::ResearchSupplement => "research-supplement",
            PromptSlot::PanelGen => "panel-gen",
            PromptSlot::DiscussionStart => "discussion-start",
            PromptSlot::DiscussionExtend => "discussion-extend",
            PromptSlot::ArticleGen => "article-gen",
            PromptSlot::DiscussionSystemInstruction => "discussion-system-instruction",
            PromptSlot::ArticleSystemInstruction => "article-system-instruction",
        }
    }

    /// Built-in template
    #[must_use]
    pub fn default_template(self) -> &'static str {
        match self {
            PromptSlot::TopicGen => DEFAULT_TOPIC_GEN,
            PromptSlot::Research => DEFAULT_RESEARCH,
            PromptSlot::ResearchSupplement => DEFAULT_RESEARCH_SUPPLEMENT,
            PromptSlot::PanelGen => DEFAULT_PANEL_GEN,
            PromptSlot::DiscussionStart => DEFAULT_DISCUSSION_START,
            PromptSlot::DiscussionExtend => DEFAULT_DISCUSSION_EXTEND,
            PromptSlot::ArticleGen => DEFAULT_ARTICLE_GEN,
            PromptSlot::DiscussionSystemInstruction => DEFAULT_DISCUSSION_SYSTEM,
            PromptSlot::ArticleSystemInstruction => DEFAULT_ARTICLE_SYSTEM,
        }
    }
}

impl std::fmt::Display for PromptSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptSlot::ALL
            .into_iter()
            .find(|slot| slot.name() == s)
            .ok_or_else(|| format!("unknown prompt slot: {s}"))
    }
}

const DEFAULT_TOPIC_GEN: &str = "Suggest one specific, debatable topic suitable for a panel of experts. \
Reply with the topic only, on a single line, without quotes.";

const DEFAULT_RESEARCH: &str = "Research the topic \"{{topic}}\" using current web sources. \
Summarise the key facts, open controversies, notable positions and recent developments \
as structured markdown notes.";

const DEFAULT_RESEARCH_SUPPLEMENT: &str = "We are researching \"{{topic}}\". Existing notes:\n\n\
{{researchData}}\n\nInvestigate this follow-up question and report only new findings as \
markdown notes: {{query}}";

const DEFAULT_PANEL_GEN: &str = "Based on the topic \"{{topic}}\" and the research below, \
create a panel of six fictional experts with diverse and conflicting viewpoints. \
For each give a name, profession and a short background.\n\nResearch:\n{{researchData}}";

const DEFAULT_DISCUSSION_START: &str = "Simulate the opening rounds of a debate on \
\"{{topic}}\" between these panelists:\n{{characters}}\n\nGround their arguments in this \
research:\n{{researchData}}\n\nWrite the transcript as `Name: statement` lines.";

const DEFAULT_DISCUSSION_EXTEND: &str = "Continue the debate on \"{{topic}}\" for further \
rounds. Panelists:\n{{characters}}\n\nTranscript so far:\n{{transcript}}\n\nPick up where \
it left off; do not repeat earlier points.";

const DEFAULT_ARTICLE_GEN: &str = "Write a long-form article on \"{{topic}}\" that \
synthesises the debate below, attributing positions to the panelists.\n\nPanelists:\n\
{{characters}}\n\nResearch:\n{{researchData}}\n\nTranscript:\n{{transcript}}";

const DEFAULT_DISCUSSION_SYSTEM: &str = "You are a debate moderator staging a lively, \
well-informed discussion. Keep each panelist in character.";

const DEFAULT_ARTICLE_SYSTEM: &str = "You are a senior editor writing balanced, \
well-structured long-form journalism in markdown.";

/// Mapping from slot to editable template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct PromptSet {
    templates: BTreeMap<PromptSlot, String>,
    last_resolved: BTreeMap<PromptSlot, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            templates: PromptSlot::ALL
                .into_iter()
                .map(|slot| (slot, slot.default_template().to_string()))
                .collect(),
            last_resolved: BTreeMap::new(),
        }
    }
}

impl PromptSet {
    /// Create prompt set with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current template for a slot
    #[must_use]
    pub fn get(&self, slot: PromptSlot) -> &str {
        self.templates
            .get(&slot)
            .map_or_else(|| slot.default_template(), String::as_str)
    }

    /// Replace a slot's template
    pub fn set(&mut self, slot: PromptSlot, template: impl Into<String>) {
        self.templates.insert(slot, template.into());
    }

    /// Restore one slot's default
    pub fn reset_slot(&mut self, slot: PromptSlot) {
        self.templates.insert(slot, slot.default_template().to_string());
    }

    /// Restore every default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether a slot differs from its default
    #[must_use]
    pub fn is_customized(&self, slot: PromptSlot) -> bool {
        self.get(slot) != slot.default_template()
    }

    /// Render a slot's template
    #[must_use]
    pub fn render(&self, slot: PromptSlot, vars: &PromptVars) -> String {
        render(self.get(slot), vars)
    }

    /// Record the fully rendered text last sent for a slot
    pub fn record_resolved(&mut self, slot: PromptSlot, text: impl Into<String>) {
        self.last_resolved.insert(slot, text.into());
    }

    /// Text last sent for a slot
    #[must_use]
    pub fn last_resolved(&self, slot: PromptSlot) -> Option<&str> {
        self.last_resolved.get(&slot).map(String::as_str)
    }

    /// Iterate slots with their templates
    pub fn iter(&self) -> impl Iterator<Item = (PromptSlot, &str)> {
        PromptSlot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }
}

impl From<BTreeMap<String, String>> for PromptSet {
    fn from(stored: BTreeMap<String, String>) -> Self {
        let mut set = Self::default();
        for (name, template) in stored {
            match name.parse::<PromptSlot>() {
                Ok(slot) => set.set(slot, template),
                Err(err) => tracing::warn!(%err, "ignoring stored prompt"),
            }
        }
        set
    }
}

impl From<PromptSet> for BTreeMap<String, String> {
    fn from(set: PromptSet) -> Self {
        set.templates
            .into_iter()
            .map(|(slot, template)| (slot.name().to_string(), template))
            .collect()
    }
}

/// Values substituted into templates
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<&'static str, String>,
}

impl PromptVars {
    /// Create empty variable set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    /// Add the `characters` variable as a bullet list
    #[must_use]
    pub fn with_characters(self, characters: &[Character]) -> Self {
        self.with("characters", format_characters(characters))
    }

    /// Look up a variable
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Substitute `{{name}}` tokens; unknown tokens are left in place
#[must_use]
pub fn render(template: &str, vars: &PromptVars) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            vars.get(&caps[1])
                .map_or_else(|| caps[0].to_string(), str::to_string)
        })
        .into_owned()
}

/// One `- Name (Profession): background` line per character
#[must_use]
pub fn format_characters(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| format!("- {} ({}): {}", c.name, c.profession, c.background))
        .collect::<Vec<_>>()
        .join("\n")
}
