use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conceptmap_types::{MatchResult, MatchStage};
use tracing::info;

use crate::cascade::{CascadeRun, StageOutput};
use crate::corpus::Corpus;
use crate::summary::RunSummary;

pub const CANDIDATES_COLUMN: &str = "candidates";
pub const STAGE_COLUMN: &str = "stage";
pub const MATCHED_TERM_COLUMN: &str = "matched_term";
pub const MATCHED_CONCEPTS_COLUMN: &str = "matched_concept_ids";

const CANDIDATE_SEPARATOR: &str = " | ";
const LIST_SEPARATOR: &str = "; ";

/// File names derived from one input's stem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputPaths {
    pub segmented: PathBuf,
    pub stages: Vec<(MatchStage, PathBuf)>,
    pub final_table: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            segmented: dir.join(format!("0_{stem}_segmented.tsv")),
            stages: MatchStage::ALL
                .iter()
                .map(|stage| {
                    (
                        *stage,
                        dir.join(format!("{}_{stem}_{}.tsv", stage.ordinal(), stage)),
                    )
                })
                .collect(),
            final_table: dir.join(format!("{stem}_final.tsv")),
            summary: dir.join(format!("{stem}_summary.json")),
        }
    }

    pub fn stage(&self, stage: MatchStage) -> Option<&Path> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, path)| path.as_path())
    }
}

/// Write the segmented, per-stage, final and summary files.
pub fn write_outputs(
    paths: &OutputPaths,
    corpus: &Corpus,
    run: &CascadeRun,
    results: &[MatchResult],
    summary: &RunSummary,
) -> Result<()> {
    if let Some(dir) = paths.final_table.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    write_segmented(&paths.segmented, corpus, run)?;
    for output in &run.stages {
        if let Some(path) = paths.stage(output.stage) {
            write_stage(path, corpus, output)?;
        }
    }
    write_final(&paths.final_table, corpus, results)?;
    summary.write_json(&paths.summary)?;
    info!("wrote {}", paths.final_table.display());
    Ok(())
}

fn writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))
}

fn header(corpus: &Corpus, extra: &[&str]) -> Vec<String> {
    corpus
        .headers
        .iter()
        .cloned()
        .chain(extra.iter().map(|c| c.to_string()))
        .collect()
}

fn write_rows(path: &Path, header: Vec<String>, rows: impl Iterator<Item = Vec<String>>) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(&header)
        .with_context(|| format!("write {}", path.display()))?;
    for row in rows {
        wtr.write_record(&row)
            .with_context(|| format!("write {}", path.display()))?;
    }
    wtr.flush().with_context(|| format!("flush {}", path.display()))
}

fn write_segmented(path: &Path, corpus: &Corpus, run: &CascadeRun) -> Result<()> {
    let rows = corpus.entries.iter().zip(&run.candidates).map(|(entry, candidates)| {
        let joined = candidates
            .iter()
            .map(|c| c.normalized.as_str())
            .collect::<Vec<_>>()
            .join(CANDIDATE_SEPARATOR);
        let mut row = entry.columns.clone();
        row.push(joined);
        row
    });
    write_rows(path, header(corpus, &[CANDIDATES_COLUMN]), rows)
}

fn write_stage(path: &Path, corpus: &Corpus, output: &StageOutput) -> Result<()> {
    let rows = output.entered.iter().map(|&idx| {
        let mut row = corpus.entries[idx].columns.clone();
        match output.matches.get(&idx) {
            Some(hit) => {
                row.push(output.stage.to_string());
                row.push(hit.terms.join(LIST_SEPARATOR));
                row.push(hit.concepts.to_string());
            }
            None => row.extend([String::new(), String::new(), String::new()]),
        }
        row
    });
    write_rows(path, header(corpus, &MATCH_COLUMNS), rows)
}

fn write_final(path: &Path, corpus: &Corpus, results: &[MatchResult]) -> Result<()> {
    let rows = corpus.entries.iter().zip(results).map(|(entry, result)| {
        let mut row = entry.columns.clone();
        row.push(result.stage().to_string());
        row.push(result.terms().join(LIST_SEPARATOR));
        row.push(result.concepts().map(|c| c.to_string()).unwrap_or_default());
        row
    });
    write_rows(path, header(corpus, &MATCH_COLUMNS), rows)
}

const MATCH_COLUMNS: [&str; 3] = [STAGE_COLUMN, MATCHED_TERM_COLUMN, MATCHED_CONCEPTS_COLUMN];
