use std::collections::HashMap;

use conceptmap_text::{normalize, strip_leading_determiners, token_count};
use conceptmap_types::{ConceptId, ConceptSet};
use tracing::{debug, info, warn};

use crate::Vocabulary;

/// Knobs for deriving index keys from vocabulary terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexOptions {
    /// Also index terms with leading `sich` and articles/determiners removed.
    pub strip_determiners: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            strip_determiners: true,
        }
    }
}

/// A normalized key together with everything that declares it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexedTerm {
    /// First vocabulary spelling that produced this key.
    pub term: String,
    pub concepts: ConceptSet,
}

/// Read-only normalized term → concept set lookup.
#[derive(Clone, Debug)]
pub struct VocabularyIndex {
    terms: HashMap<String, IndexedTerm>,
    concept_count: usize,
}

impl VocabularyIndex {
    /// Index every term of every concept.
    ///
    /// Concepts are visited in vocabulary order, so the recorded spelling of a
    /// shared key is deterministic. Terms that normalize to nothing are
    /// skipped.
    pub fn build(vocab: &Vocabulary, options: IndexOptions) -> Self {
        let mut terms: HashMap<String, IndexedTerm> = HashMap::new();
        let mut skipped = 0usize;

        for concept in vocab.concepts() {
            for term in &concept.terms {
                let mut added = false;
                let bare = options
                    .strip_determiners
                    .then(|| strip_leading_determiners(term))
                    .flatten();
                for surface in std::iter::once(term.as_str()).chain(bare) {
                    let key = normalize(surface);
                    if key.is_empty() {
                        continue;
                    }
                    added = true;
                    insert(&mut terms, key, surface, &concept.id);
                }
                if !added {
                    skipped += 1;
                    warn!("concept {}: term {:?} is empty after normalization", concept.id, term);
                }
            }
        }

        let index = Self {
            terms,
            concept_count: vocab.len(),
        };
        info!(
            "indexed {} keys for {} concepts ({} multi-word, {} ambiguous, {} skipped)",
            index.term_count(),
            index.concept_count,
            index.multiword_term_count(),
            index.ambiguous_terms().count(),
            skipped
        );
        for (key, hit) in index.ambiguous_terms() {
            debug!("ambiguous term {:?} -> {}", key, hit.concepts);
        }
        index
    }

    /// Exact lookup of an already normalized string.
    pub fn lookup(&self, normalized: &str) -> Option<&IndexedTerm> {
        self.terms.get(normalized)
    }

    /// Normalize `text`, then look it up.
    pub fn resolve(&self, text: &str) -> Option<&IndexedTerm> {
        self.lookup(&normalize(text))
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn concept_count(&self) -> usize {
        self.concept_count
    }

    pub fn multiword_term_count(&self) -> usize {
        self.terms.keys().filter(|key| token_count(key) > 1).count()
    }

    /// Keys shared by more than one concept, in arbitrary order.
    pub fn ambiguous_terms(&self) -> impl Iterator<Item = (&str, &IndexedTerm)> {
        self.terms
            .iter()
            .filter(|(_, hit)| hit.concepts.is_ambiguous())
            .map(|(key, hit)| (key.as_str(), hit))
    }
}

fn insert(terms: &mut HashMap<String, IndexedTerm>, key: String, surface: &str, id: &ConceptId) {
    match terms.get_mut(&key) {
        Some(hit) => {
            hit.concepts.insert(id.clone());
        }
        None => {
            terms.insert(
                key,
                IndexedTerm {
                    term: surface.to_string(),
                    concepts: ConceptSet::new(id.clone()),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Concept;

    fn vocab(concepts: &[(&str, &[&str])]) -> Vocabulary {
        Vocabulary::from_concepts(
            concepts
                .iter()
                .map(|(id, terms)| Concept {
                    id: ConceptId::from(*id),
                    labels: Vec::new(),
                    parent: None,
                    terms: terms.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn shared_terms_keep_every_concept() {
        let index = VocabularyIndex::build(
            &vocab(&[
                ("C1", &["trinken", "schlucken", "Durst haben"]),
                ("C3", &["durst  haben"]),
            ]),
            IndexOptions::default(),
        );
        let hit = index.lookup("durst haben").unwrap();
        assert_eq!(hit.concepts.to_string(), "C1; C3");
        assert_eq!(hit.term, "Durst haben");
        assert_eq!(index.ambiguous_terms().count(), 1);
        assert_eq!(index.multiword_term_count(), 1);
        assert_eq!(index.concept_count(), 2);
    }

    #[test]
    fn lookups_are_normalized() {
        let index = VocabularyIndex::build(&vocab(&[("C1", &["Trinken"])]), IndexOptions::default());
        assert!(index.lookup("Trinken").is_none());
        assert!(index.lookup("trinken").is_some());
        assert!(index.resolve(" TRINKEN ").is_some());
    }

    #[test]
    fn indexes_bare_forms_of_determiner_terms() {
        let v = vocab(&[("Bier", &["ein Bier"]), ("Rausch", &["sich betrinken"])]);
        let index = VocabularyIndex::build(&v, IndexOptions::default());
        assert!(index.lookup("ein bier").is_some());
        assert_eq!(index.lookup("bier").unwrap().term, "Bier");
        assert!(index.lookup("betrinken").is_some());

        let strict = VocabularyIndex::build(
            &v,
            IndexOptions {
                strip_determiners: false,
            },
        );
        assert!(strict.lookup("bier").is_none());
    }

    #[test]
    fn empty_terms_are_skipped() {
        let index = VocabularyIndex::build(&vocab(&[("C1", &["--", "trinken"])]), IndexOptions::default());
        assert_eq!(index.term_count(), 1);
    }
}
