//! Map dictionary entries onto a concept vocabulary with a four-stage cascade.
//!
//! Each corpus entry is tried, in order, by its headword (`lemma`), by its
//! single-word definitions (`short_def`), by multi-word definitions equal to a
//! vocabulary term (`long_def`) and finally by the root of each definition's
//! dependency parse (`root`). An entry leaves the cascade at the first stage
//! that finds at least one concept; whatever is left is `unmatched`.
//!
//! ```no_run
//! use conceptmap::{ColumnNames, NoParser, map_corpus_file};
//! use conceptmap_vocab::{IndexOptions, Vocabulary, VocabularyIndex};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vocab = Vocabulary::load("trinken_vokabular.json")?;
//! let index = VocabularyIndex::build(&vocab, IndexOptions::default());
//! let summary = map_corpus_file("korpus.tsv", "out", &ColumnNames::default(), &index, &NoParser)?;
//! println!("{} of {} entries unmatched", summary.unmatched, summary.entries);
//! # Ok(()) }
//! ```

pub mod cascade;
pub mod consolidate;
pub mod corpus;
pub mod output;
pub mod parse;
pub mod summary;

use std::path::Path;

use anyhow::{Context, Result};
use conceptmap_vocab::VocabularyIndex;
use tracing::info;

pub use cascade::{CascadeRun, Hit, Residual, StageOutput, run_cascade};
pub use consolidate::{ConsolidateError, consolidate};
pub use corpus::{ColumnNames, Corpus, CorpusError, RowError};
pub use output::{OutputPaths, write_outputs};
pub use parse::{
    CommandParser, ConlluParses, DependencyParser, DependencyTree, NoParser, ParseFailure, Token,
};
pub use summary::{RunSummary, StageSummary, VocabularySummary};

/// Read one corpus table, run the cascade and write every output file into
/// `output_dir`.
pub fn map_corpus_file<P>(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    columns: &ColumnNames,
    index: &VocabularyIndex,
    parser: &P,
) -> Result<RunSummary>
where
    P: DependencyParser + ?Sized,
{
    let input = input.as_ref();
    let corpus = Corpus::load(input, columns)?;
    let run = run_cascade(index, parser, &corpus.entries);
    let results = consolidate(&corpus.entries, &run)
        .with_context(|| format!("consolidate {}", input.display()))?;
    let summary = RunSummary::new(input, index, corpus.skipped.len(), &run, &results);

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no file stem in {}", input.display()))?;
    let paths = OutputPaths::new(output_dir.as_ref(), stem);
    write_outputs(&paths, &corpus, &run, &results, &summary)?;

    info!(
        "{}: {} entries, {} unmatched ({} ambiguous matches)",
        input.display(),
        summary.entries,
        summary.unmatched,
        summary.ambiguous_matches
    );
    Ok(summary)
}
