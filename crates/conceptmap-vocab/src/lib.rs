//! Load a concept vocabulary and index its terms for exact lookup.
//!
//! A [`Vocabulary`] is an immutable, validated list of [`Concept`]s, each with
//! an id, labels, an optional parent and the terms that express it. Three
//! on-disk shapes are accepted:
//!
//! - a nested JSON tree whose keys form dotted concept paths and whose
//!   `"Begriffe"` / `"terms"` keys list the terms of a concept;
//! - a JSON array of `{"id", "terms", "parent", "labels"}` records;
//! - a TSV file with `concept`, `term`, and optional `variants` / `parent`
//!   columns.
//!
//! Malformed vocabularies (missing or duplicate ids, dangling or cyclic
//! parents) are rejected with a [`VocabError`] naming the offending concept.
//! [`VocabularyIndex`] then maps every normalized term to the non-empty set of
//! concepts that declare it; shared terms keep all their concepts.
//!
//! # Example
//! ```no_run
//! use conceptmap_vocab::{IndexOptions, LoadMode, Vocabulary, VocabularyIndex};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vocab = Vocabulary::load_with_mode("trinken_vokabular.json", LoadMode::Mmap)?;
//! let index = VocabularyIndex::build(&vocab, IndexOptions::default());
//! if let Some(hit) = index.resolve("Trinken") {
//!     println!("{} -> {}", hit.term, hit.concepts);
//! }
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p conceptmap-vocab --example stats -- <vocabulary>`.

mod index;
mod source;

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use conceptmap_types::ConceptId;
use memmap2::Mmap;
use thiserror::Error;

pub use index::{IndexOptions, IndexedTerm, VocabularyIndex};

/// Strategy for reading the vocabulary file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// Malformed vocabulary. Always fatal for a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VocabError {
    #[error("concept #{position} has no id")]
    MissingId { position: usize },
    #[error("duplicate concept id: {0}")]
    DuplicateId(ConceptId),
    #[error("concept {concept} names unknown parent {parent}")]
    UnknownParent { concept: ConceptId, parent: ConceptId },
    #[error("concept {concept} has conflicting parents {first} and {second}")]
    ConflictingParent {
        concept: ConceptId,
        first: ConceptId,
        second: ConceptId,
    },
    #[error("concept {0} is its own ancestor")]
    ParentCycle(ConceptId),
    #[error("concept {concept} has a non-string term: {found}")]
    InvalidTerm { concept: String, found: String },
    #[error("vocabulary table is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("vocabulary JSON must be an object (concept tree) or an array (concept records)")]
    UnsupportedShape,
}

/// A node of the controlled vocabulary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Concept {
    pub id: ConceptId,
    pub labels: Vec<String>,
    pub parent: Option<ConceptId>,
    pub terms: Vec<String>,
}

/// Validated, immutable concept vocabulary.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    concepts: Vec<Concept>,
    by_id: HashMap<ConceptId, usize>,
}

impl Vocabulary {
    /// Load a vocabulary, memory-mapping the file.
    ///
    /// Use [`load_with_mode`](Self::load_with_mode) to force an owned buffer.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(path, LoadMode::Mmap)
    }

    /// Load a vocabulary choosing between mmap and owned buffers at runtime.
    ///
    /// Files ending in `.tsv` / `.tab` are read as tables, everything else as
    /// JSON. Validation failures surface as a [`VocabError`] inside the
    /// returned `anyhow::Error`.
    pub fn load_with_mode(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref();
        let buffer = load_file(path, mode)?;
        let is_table = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab"));

        let concepts = if is_table {
            source::parse_tsv(buffer.as_slice())
                .with_context(|| format!("read vocabulary table {}", path.display()))?
        } else {
            source::parse_json(buffer.as_slice())
                .with_context(|| format!("read vocabulary json {}", path.display()))?
        };
        Self::from_concepts(concepts)
            .with_context(|| format!("invalid vocabulary {}", path.display()))
    }

    /// Validate concepts built in memory.
    pub fn from_concepts(concepts: Vec<Concept>) -> Result<Self, VocabError> {
        let mut by_id = HashMap::with_capacity(concepts.len());
        for (position, concept) in concepts.iter().enumerate() {
            if concept.id.as_str().trim().is_empty() {
                return Err(VocabError::MissingId { position });
            }
            if by_id.insert(concept.id.clone(), position).is_some() {
                return Err(VocabError::DuplicateId(concept.id.clone()));
            }
        }

        for concept in &concepts {
            if let Some(parent) = &concept.parent
                && !by_id.contains_key(parent)
            {
                return Err(VocabError::UnknownParent {
                    concept: concept.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let vocab = Self { concepts, by_id };
        for concept in &vocab.concepts {
            // A chain longer than the vocabulary must revisit a concept.
            if vocab.ancestors(concept.id.as_str()).nth(vocab.concepts.len()).is_some() {
                return Err(VocabError::ParentCycle(concept.id.clone()));
            }
        }
        Ok(vocab)
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn get(&self, id: &str) -> Option<&Concept> {
        self.by_id.get(id).map(|idx| &self.concepts[*idx])
    }

    pub fn parent(&self, id: &str) -> Option<&Concept> {
        self.get(id)
            .and_then(|c| c.parent.as_ref())
            .and_then(|p| self.get(p.as_str()))
    }

    /// Walk from a concept's parent up to the root.
    pub fn ancestors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Concept> + 'a {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let out = current?;
            current = self.parent(out.id.as_str());
            Some(out)
        })
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(id: &str, parent: Option<&str>, terms: &[&str]) -> Concept {
        Concept {
            id: ConceptId::from(id),
            labels: Vec::new(),
            parent: parent.map(ConceptId::from),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Vocabulary::from_concepts(vec![
            concept("C1", None, &["trinken"]),
            concept("C1", None, &["saufen"]),
        ])
        .unwrap_err();
        assert_eq!(err, VocabError::DuplicateId(ConceptId::from("C1")));
        assert!(err.to_string().contains("C1"));
    }

    #[test]
    fn rejects_missing_ids_and_unknown_parents() {
        let err = Vocabulary::from_concepts(vec![concept(" ", None, &["bier"])]).unwrap_err();
        assert_eq!(err, VocabError::MissingId { position: 0 });

        let err =
            Vocabulary::from_concepts(vec![concept("C2", Some("C9"), &["wein"])]).unwrap_err();
        assert!(matches!(err, VocabError::UnknownParent { .. }));
    }

    #[test]
    fn rejects_parent_cycles() {
        let err = Vocabulary::from_concepts(vec![
            concept("A", Some("B"), &[]),
            concept("B", Some("A"), &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, VocabError::ParentCycle(_)));
    }

    #[test]
    fn walks_ancestors() {
        let vocab = Vocabulary::from_concepts(vec![
            concept("Trinken", None, &["trinken"]),
            concept("Trinken.Alkohol", Some("Trinken"), &["saufen"]),
            concept("Trinken.Alkohol.Bier", Some("Trinken.Alkohol"), &["Bier"]),
        ])
        .unwrap();
        let chain: Vec<_> = vocab
            .ancestors("Trinken.Alkohol.Bier")
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(chain, ["Trinken.Alkohol", "Trinken"]);
        assert!(vocab.parent("Trinken").is_none());
    }
}
