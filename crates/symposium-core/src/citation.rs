//! Deduplicating citation container
//!
//! Citations are keyed by URI; the first title seen for a URI wins and
//! insertion order is display order.

use crate::types::Citation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Order-preserving, URI-keyed citation set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Citation>", into = "Vec<Citation>")]
pub struct CitationSet {
    entries: IndexMap<String, Citation>,
}

impl CitationSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the URI is already present; returns whether it was added
    pub fn insert(&mut self, citation: Citation) -> bool {
        if self.entries.contains_key(&citation.uri) {
            return false;
        }
        self.entries.insert(citation.uri.clone(), citation);
        true
    }

    /// In-place merge; returns the number of new entries
    pub fn extend_unique<I>(&mut self, incoming: I) -> usize
    where
        I: IntoIterator<Item = Citation>,
    {
        incoming
            .into_iter()
            .filter(|citation| self.insert(citation.clone()))
            .count()
    }

    /// Whether a URI is present
    #[inline]
    #[must_use]
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    /// Number of distinct URIs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.entries.values()
    }

    /// Remove all entries
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Owned copy as a vector
    #[must_use]
    pub fn to_vec(&self) -> Vec<Citation> {
        self.entries.values().cloned().collect()
    }
}

/// Merge `incoming` into a copy of `existing`
///
/// Existing entries keep their position; new URIs follow in incoming order.
#[must_use]
pub fn merge(existing: &CitationSet, incoming: &[Citation]) -> CitationSet {
    let mut merged = existing.clone();
    merged.extend_unique(incoming.iter().cloned());
    merged
}

impl From<Vec<Citation>> for CitationSet {
    fn from(citations: Vec<Citation>) -> Self {
        let mut set = Self::new();
        set.extend_unique(citations);
        set
    }
}

impl From<CitationSet> for Vec<Citation> {
    fn from(set: CitationSet) -> Self {
        set.entries.into_values().collect()
    }
}

impl FromIterator<Citation> for CitationSet {
    fn from_iter<T: IntoIterator<Item = Citation>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend_unique(iter);
        set
    }
}

impl<'a> IntoIterator for &'a CitationSet {
    type Item = &'a Citation;
    type IntoIter = indexmap::map::Values<'a, String, Citation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
