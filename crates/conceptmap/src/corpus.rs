use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use conceptmap_types::{CorpusEntry, EntryId};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_LEMMA_COLUMN: &str = "lemma";
pub const DEFAULT_DEFINITION_COLUMN: &str = "definition";
pub const DEFAULT_POS_COLUMN: &str = "pos";
pub const DEFAULT_GOLD_COLUMN: &str = "gold_concept";

/// Header names of the corpus table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnNames {
    pub id: String,
    pub lemma: String,
    pub definition: String,
    pub pos: String,
    pub gold: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_COLUMN.to_string(),
            lemma: DEFAULT_LEMMA_COLUMN.to_string(),
            definition: DEFAULT_DEFINITION_COLUMN.to_string(),
            pos: DEFAULT_POS_COLUMN.to_string(),
            gold: DEFAULT_GOLD_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("corpus table has no `{0}` column")]
    MissingColumn(String),
}

/// A corpus row that cannot become an entry. The row is skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("line {line}: empty id")]
    MissingId { line: u64 },
    #[error("line {line}: entry {id} has an empty headword")]
    MissingHeadword { line: u64, id: String },
    #[error("line {line}: duplicate entry id {id}")]
    DuplicateId { line: u64, id: String },
    #[error("line {line}: unreadable record: {reason}")]
    Record { line: u64, reason: String },
}

/// Entries of one corpus table, in file order.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    pub headers: Vec<String>,
    pub entries: Vec<CorpusEntry>,
    pub skipped: Vec<RowError>,
}

impl Corpus {
    pub fn load(path: impl AsRef<Path>, columns: &ColumnNames) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open corpus {}", path.display()))?;
        let corpus = Self::from_reader(file, columns)
            .with_context(|| format!("read corpus {}", path.display()))?;
        info!(
            "read {} entries from {} ({} rows skipped)",
            corpus.entries.len(),
            path.display(),
            corpus.skipped.len()
        );
        Ok(corpus)
    }

    /// Read a tab-separated table with a header row.
    ///
    /// Fields are taken verbatim (no quote handling). Short rows are padded
    /// with empty fields. Bad rows are collected in `skipped` and logged.
    pub fn from_reader<R: Read>(reader: R, columns: &ColumnNames) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| CorpusError::MissingColumn(name.to_string()))
        };

        let idx_id = required(&columns.id)?;
        let idx_lemma = required(&columns.lemma)?;
        let idx_definition = required(&columns.definition)?;
        let idx_pos = position(&columns.pos);
        let idx_gold = position(&columns.gold);

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (row, result) in rdr.records().enumerate() {
            // Header is line 1.
            let fallback_line = row as u64 + 2;
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    let line = err
                        .position()
                        .map(|p| p.line())
                        .unwrap_or(fallback_line);
                    skip(
                        &mut skipped,
                        RowError::Record {
                            line,
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);

            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            fields.resize(headers.len().max(fields.len()), String::new());
            let get = |idx: usize| fields[idx].trim();
            let optional = |idx: Option<usize>| {
                idx.map(|i| fields[i].trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            let id = get(idx_id);
            if id.is_empty() {
                skip(&mut skipped, RowError::MissingId { line });
                continue;
            }
            if get(idx_lemma).is_empty() {
                skip(
                    &mut skipped,
                    RowError::MissingHeadword {
                        line,
                        id: id.to_string(),
                    },
                );
                continue;
            }
            if !seen.insert(id.to_string()) {
                skip(
                    &mut skipped,
                    RowError::DuplicateId {
                        line,
                        id: id.to_string(),
                    },
                );
                continue;
            }

            entries.push(CorpusEntry {
                id: EntryId::from(id),
                headword: get(idx_lemma).to_string(),
                definition: get(idx_definition).to_string(),
                pos: optional(idx_pos),
                gold: optional(idx_gold),
                columns: fields[..headers.len()].to_vec(),
            });
        }

        Ok(Self {
            headers,
            entries,
            skipped,
        })
    }
}

fn skip(skipped: &mut Vec<RowError>, err: RowError) {
    warn!("skipping corpus row: {}", err);
    skipped.push(err);
}
