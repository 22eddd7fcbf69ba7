use conceptmap_types::{Assignment, CorpusEntry, MatchResult, Stage};
use thiserror::Error;

use crate::cascade::CascadeRun;

/// The cascade broke the one-row-per-entry partition. Internal bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsolidateError {
    #[error("entry {id} assigned twice ({first} and {second})")]
    Duplicate {
        id: String,
        first: Stage,
        second: Stage,
    },
    #[error("entry {id} has no assignment")]
    Missing { id: String },
    #[error("stage {stage} refers to entry #{index}, corpus has {len}")]
    OutOfRange {
        stage: Stage,
        index: usize,
        len: usize,
    },
}

/// Merge stage outputs and the unmatched remainder into one result per
/// entry, in corpus order.
pub fn consolidate(
    entries: &[CorpusEntry],
    run: &CascadeRun,
) -> Result<Vec<MatchResult>, ConsolidateError> {
    let mut slots: Vec<Option<MatchResult>> = vec![None; entries.len()];

    let mapped = run.stages.iter().flat_map(|output| {
        output.matches.iter().map(move |(index, hit)| {
            (
                *index,
                Assignment::Mapped {
                    stage: output.stage,
                    terms: hit.terms.clone(),
                    concepts: hit.concepts.clone(),
                },
            )
        })
    });
    let unmatched = run
        .unmatched
        .iter()
        .map(|index| (*index, Assignment::Unmatched));

    for (index, assignment) in mapped.chain(unmatched) {
        let result = MatchResult {
            entry_id: match entries.get(index) {
                Some(entry) => entry.id.clone(),
                None => {
                    return Err(ConsolidateError::OutOfRange {
                        stage: stage_of(&assignment),
                        index,
                        len: entries.len(),
                    });
                }
            },
            assignment,
        };
        let slot = &mut slots[index];
        if let Some(first) = slot {
            return Err(ConsolidateError::Duplicate {
                id: result.entry_id.to_string(),
                first: first.stage(),
                second: result.stage(),
            });
        }
        *slot = Some(result);
    }

    slots
        .into_iter()
        .zip(entries)
        .map(|(slot, entry)| {
            slot.ok_or_else(|| ConsolidateError::Missing {
                id: entry.id.to_string(),
            })
        })
        .collect()
}

fn stage_of(assignment: &Assignment) -> Stage {
    match assignment {
        Assignment::Mapped { stage, .. } => Stage::from(*stage),
        Assignment::Unmatched => Stage::Unmatched,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use conceptmap_types::{ConceptId, ConceptSet, EntryId, MatchStage};

    use super::*;
    use crate::cascade::{Hit, StageOutput};

    fn entries(n: usize) -> Vec<CorpusEntry> {
        (0..n)
            .map(|i| CorpusEntry {
                id: EntryId::new(format!("E{i}")),
                headword: format!("w{i}"),
                definition: String::new(),
                pos: None,
                gold: None,
                columns: Vec::new(),
            })
            .collect()
    }

    fn output(stage: MatchStage, matched: &[usize]) -> StageOutput {
        StageOutput {
            stage,
            entered: matched.to_vec(),
            matches: matched
                .iter()
                .map(|i| {
                    (
                        *i,
                        Hit {
                            terms: vec!["trinken".into()],
                            concepts: ConceptSet::new(ConceptId::from("C1")),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn run(stages: Vec<StageOutput>, unmatched: Vec<usize>) -> CascadeRun {
        CascadeRun {
            candidates: Vec::new(),
            stages,
            without_candidates: Vec::new(),
            unmatched,
        }
    }

    #[test]
    fn one_row_per_entry_in_corpus_order() {
        let results = consolidate(
            &entries(3),
            &run(
                vec![output(MatchStage::Lemma, &[2]), output(MatchStage::Root, &[0])],
                vec![1],
            ),
        )
        .unwrap();
        let stages: Vec<_> = results.iter().map(|r| r.stage()).collect();
        assert_eq!(stages, [Stage::Root, Stage::Unmatched, Stage::Lemma]);
        assert_eq!(results[2].entry_id.as_str(), "E2");
    }

    #[test]
    fn reports_double_assignment() {
        let err = consolidate(
            &entries(2),
            &run(
                vec![output(MatchStage::Lemma, &[0]), output(MatchStage::ShortDef, &[0])],
                vec![1],
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConsolidateError::Duplicate {
                id: "E0".into(),
                first: Stage::Lemma,
                second: Stage::ShortDef,
            }
        );
    }

    #[test]
    fn reports_lost_and_unknown_entries() {
        let err = consolidate(&entries(2), &run(vec![output(MatchStage::Lemma, &[0])], vec![]))
            .unwrap_err();
        assert_eq!(err, ConsolidateError::Missing { id: "E1".into() });

        let err = consolidate(&entries(1), &run(Vec::new(), vec![0, 5])).unwrap_err();
        assert!(matches!(err, ConsolidateError::OutOfRange { index: 5, .. }));
    }
}
