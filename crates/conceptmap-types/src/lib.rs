//! Shared types for mapping dictionary entries onto a concept vocabulary.
//!
//! The cascade works on owned [`CorpusEntry`] rows read from a table, splits
//! their definitions into [`CandidateDefinition`]s, and reports one
//! [`MatchResult`] per entry. Concept assignments are always carried as a
//! [`ConceptSet`], which cannot be empty: an entry either maps to at least one
//! concept at a known [`MatchStage`], or it is [`Assignment::Unmatched`].
//!
//! ```rust
//! use conceptmap_types::{ConceptId, ConceptSet, Stage};
//!
//! let mut set = ConceptSet::new(ConceptId::from("Getraenk.Bier"));
//! set.insert(ConceptId::from("Getraenk"));
//! assert_eq!(set.to_string(), "Getraenk; Getraenk.Bier");
//! assert_eq!("short_def".parse::<Stage>(), Ok(Stage::ShortDef));
//! ```

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a vocabulary concept (e.g. `Trinken.Alkohol.Bier`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConceptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ConceptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-empty, ordered set of concept ids.
///
/// There is no `Default` and no way to remove ids, so every value holds at
/// least one concept. Use [`ConceptSet::from_ids`] when the
/// input may be empty.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConceptSet(BTreeSet<ConceptId>);

impl ConceptSet {
    pub fn new(first: ConceptId) -> Self {
        Self(BTreeSet::from([first]))
    }

    /// Collect ids into a set, returning `None` for an empty iterator.
    pub fn from_ids<I>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = ConceptId>,
    {
        let set: BTreeSet<ConceptId> = ids.into_iter().collect();
        if set.is_empty() { None } else { Some(Self(set)) }
    }

    pub fn insert(&mut self, id: ConceptId) -> bool {
        self.0.insert(id)
    }

    pub fn union_with(&mut self, other: &ConceptSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with std collections.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// More than one concept shares the matched term(s).
    pub fn is_ambiguous(&self) -> bool {
        self.0.len() > 1
    }

    pub fn iter(&self) -> btree_set::Iter<'_, ConceptId> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ConceptSet {
    type Item = &'a ConceptId;
    type IntoIter = btree_set::Iter<'a, ConceptId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ConceptSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, id) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            f.write_str(id.as_str())?;
        }
        Ok(())
    }
}

/// Source dictionary id of a corpus entry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the four matching stages, in cascade order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MatchStage {
    Lemma,
    ShortDef,
    LongDef,
    Root,
}

impl MatchStage {
    /// All stages in the order the cascade applies them.
    pub const ALL: [MatchStage; 4] = [
        MatchStage::Lemma,
        MatchStage::ShortDef,
        MatchStage::LongDef,
        MatchStage::Root,
    ];

    /// One-based position in the cascade, used to prefix stage file names.
    pub fn ordinal(self) -> usize {
        match self {
            MatchStage::Lemma => 1,
            MatchStage::ShortDef => 2,
            MatchStage::LongDef => 3,
            MatchStage::Root => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        Stage::from(self).as_str()
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag written to the output tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Stage {
    Lemma,
    ShortDef,
    LongDef,
    Root,
    Unmatched,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lemma => "lemma",
            Stage::ShortDef => "short_def",
            Stage::LongDef => "long_def",
            Stage::Root => "root",
            Stage::Unmatched => "unmatched",
        }
    }
}

impl From<MatchStage> for Stage {
    fn from(stage: MatchStage) -> Self {
        match stage {
            MatchStage::Lemma => Stage::Lemma,
            MatchStage::ShortDef => Stage::ShortDef,
            MatchStage::LongDef => Stage::LongDef,
            MatchStage::Root => Stage::Root,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stage tag: {}", self.0)
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lemma" => Ok(Stage::Lemma),
            "short_def" => Ok(Stage::ShortDef),
            "long_def" => Ok(Stage::LongDef),
            "root" => Ok(Stage::Root),
            "unmatched" => Ok(Stage::Unmatched),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// A dictionary sense-group as read from the corpus table.
#[derive(Clone, Debug)]
pub struct CorpusEntry {
    pub id: EntryId,
    pub headword: String,
    pub definition: String,
    pub pos: Option<String>,
    pub gold: Option<String>,
    /// Every input column in header order, echoed into the output tables.
    pub columns: Vec<String>,
}

/// One atomic sense string cut from an entry's definition field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CandidateDefinition {
    /// Index of the owning entry in the corpus.
    pub entry: usize,
    /// Position of this fragment within the entry's definition.
    pub ordinal: usize,
    /// Fragment text before normalization.
    pub raw: String,
    pub normalized: String,
}

impl CandidateDefinition {
    pub fn token_count(&self) -> usize {
        self.normalized.split_whitespace().count()
    }

    pub fn is_single_token(&self) -> bool {
        self.token_count() == 1
    }
}

/// The concept assignment for one entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Assignment {
    Mapped {
        stage: MatchStage,
        /// Matched vocabulary strings in first-hit order.
        terms: Vec<String>,
        concepts: ConceptSet,
    },
    Unmatched,
}

/// Final (or per-stage) outcome for one corpus entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatchResult {
    pub entry_id: EntryId,
    pub assignment: Assignment,
}

impl MatchResult {
    pub fn unmatched(entry_id: EntryId) -> Self {
        Self {
            entry_id,
            assignment: Assignment::Unmatched,
        }
    }

    pub fn stage(&self) -> Stage {
        match &self.assignment {
            Assignment::Mapped { stage, .. } => Stage::from(*stage),
            Assignment::Unmatched => Stage::Unmatched,
        }
    }

    pub fn concepts(&self) -> Option<&ConceptSet> {
        match &self.assignment {
            Assignment::Mapped { concepts, .. } => Some(concepts),
            Assignment::Unmatched => None,
        }
    }

    pub fn terms(&self) -> &[String] {
        match &self.assignment {
            Assignment::Mapped { terms, .. } => terms,
            Assignment::Unmatched => &[],
        }
    }
}
