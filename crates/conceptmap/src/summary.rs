use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use conceptmap_types::{MatchResult, Stage};
use conceptmap_vocab::VocabularyIndex;
use serde::{Deserialize, Serialize};

use crate::cascade::CascadeRun;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VocabularySummary {
    pub concepts: usize,
    pub terms: usize,
    pub ambiguous_terms: usize,
}

impl VocabularySummary {
    pub fn from_index(index: &VocabularyIndex) -> Self {
        Self {
            concepts: index.concept_count(),
            terms: index.term_count(),
            ambiguous_terms: index.ambiguous_terms().count(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub entered: usize,
    pub matched: usize,
    /// Entries still unmatched after this stage, including those that
    /// bypassed it for lack of candidates.
    pub residual: usize,
}

/// Counts for one processed corpus file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub input: String,
    pub vocabulary: VocabularySummary,
    pub entries: usize,
    pub rows_skipped: usize,
    pub entries_without_candidates: usize,
    pub stages: Vec<StageSummary>,
    pub unmatched: usize,
    pub ambiguous_matches: usize,
}

impl RunSummary {
    pub fn new(
        input: &Path,
        index: &VocabularyIndex,
        rows_skipped: usize,
        run: &CascadeRun,
        results: &[MatchResult],
    ) -> Self {
        let mut residual = results.len();
        let stages = run
            .stages
            .iter()
            .map(|output| {
                residual -= output.matched_count();
                StageSummary {
                    stage: output.stage.to_string(),
                    entered: output.entered.len(),
                    matched: output.matched_count(),
                    residual,
                }
            })
            .collect();

        Self {
            input: input.display().to_string(),
            vocabulary: VocabularySummary::from_index(index),
            entries: results.len(),
            rows_skipped,
            entries_without_candidates: run.candidates.iter().filter(|c| c.is_empty()).count(),
            stages,
            unmatched: results
                .iter()
                .filter(|r| r.stage() == Stage::Unmatched)
                .count(),
            ambiguous_matches: results
                .iter()
                .filter_map(|r| r.concepts())
                .filter(|c| c.is_ambiguous())
                .count(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("write summary {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flush {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_stage_counts() {
        let summary = RunSummary {
            input: "korpus.tsv".into(),
            vocabulary: VocabularySummary {
                concepts: 2,
                terms: 3,
                ambiguous_terms: 1,
            },
            entries: 4,
            rows_skipped: 0,
            entries_without_candidates: 1,
            stages: vec![StageSummary {
                stage: "lemma".into(),
                entered: 4,
                matched: 1,
                residual: 3,
            }],
            unmatched: 3,
            ambiguous_matches: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stages"][0]["stage"], "lemma");
        assert_eq!(json["vocabulary"]["ambiguous_terms"], 1);
        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
