use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use conceptmap_types::ConceptId;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Concept, VocabError};

/// Keys that hold the term list of a tree node.
const TERM_KEYS: [&str; 2] = ["Begriffe", "terms"];

const CONCEPT_COLUMNS: [&str; 2] = ["concept", "Konzept"];
const TERM_COLUMNS: [&str; 2] = ["term", "Begriff"];
const VARIANT_COLUMNS: [&str; 2] = ["variants", "Begriffsvarianten"];
const PARENT_COLUMNS: [&str; 2] = ["parent", "Oberkonzept"];

#[derive(Deserialize)]
struct ConceptRecord {
    id: Option<String>,
    #[serde(default)]
    terms: Vec<String>,
    parent: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
}

pub(crate) fn parse_json(bytes: &[u8]) -> Result<Vec<Concept>> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(items) => parse_records(items),
        Value::Object(root) => Ok(parse_tree(&root)?),
        _ => Err(VocabError::UnsupportedShape.into()),
    }
}

fn parse_records(items: Vec<Value>) -> Result<Vec<Concept>> {
    let mut concepts = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let record: ConceptRecord = serde_json::from_value(item)
            .map_err(|err| anyhow::anyhow!("concept record #{position}: {err}"))?;
        let id = record
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(VocabError::MissingId { position })?;
        let labels = if record.labels.is_empty() {
            vec![default_label(&id)]
        } else {
            record.labels
        };
        concepts.push(Concept {
            id: ConceptId::from(id),
            labels,
            parent: record
                .parent
                .filter(|p| !p.trim().is_empty())
                .map(ConceptId::from),
            terms: record.terms,
        });
    }
    Ok(concepts)
}

/// Walk a nested concept tree. Only nodes that declare terms become concepts;
/// their parent is the closest declaring ancestor.
fn parse_tree(root: &Map<String, Value>) -> Result<Vec<Concept>, VocabError> {
    let mut declared: Vec<(Vec<String>, Vec<String>)> = Vec::new();
    collect_tree(root, &mut Vec::new(), &mut declared)?;

    let paths: BTreeSet<String> = declared.iter().map(|(path, _)| path.join(".")).collect();
    let mut concepts = Vec::with_capacity(declared.len());
    for (position, (path, terms)) in declared.into_iter().enumerate() {
        if path.is_empty() {
            return Err(VocabError::MissingId { position });
        }
        let parent = (1..path.len())
            .rev()
            .map(|len| path[..len].join("."))
            .find(|candidate| paths.contains(candidate))
            .map(ConceptId::from);
        let label = path.last().cloned().unwrap_or_default();
        concepts.push(Concept {
            id: ConceptId::from(path.join(".")),
            labels: vec![label],
            parent,
            terms,
        });
    }
    Ok(concepts)
}

fn collect_tree(
    node: &Map<String, Value>,
    path: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, Vec<String>)>,
) -> Result<(), VocabError> {
    for key in TERM_KEYS {
        if let Some(value) = node.get(key) {
            let mut terms = Vec::new();
            flatten_terms(value, &path.join("."), &mut terms)?;
            out.push((path.clone(), terms));
        }
    }
    for (key, value) in node {
        if TERM_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Value::Object(child) = value {
            path.push(key.clone());
            collect_tree(child, path, out)?;
            path.pop();
        }
    }
    Ok(())
}

fn flatten_terms(value: &Value, concept: &str, out: &mut Vec<String>) -> Result<(), VocabError> {
    match value {
        Value::String(term) => {
            if !out.contains(term) {
                out.push(term.clone());
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| flatten_terms(item, concept, out)),
        other => Err(VocabError::InvalidTerm {
            concept: concept.to_string(),
            found: other.to_string(),
        }),
    }
}

/// Read `concept`/`term` rows; repeated concepts accumulate terms.
pub(crate) fn parse_tsv(bytes: &[u8]) -> Result<Vec<Concept>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();
    let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.trim()));

    let idx_concept = column(&CONCEPT_COLUMNS[..]).ok_or(VocabError::MissingColumn("concept"))?;
    let idx_term = column(&TERM_COLUMNS[..]).ok_or(VocabError::MissingColumn("term"))?;
    let idx_variants = column(&VARIANT_COLUMNS[..]);
    let idx_parent = column(&PARENT_COLUMNS[..]);

    let mut concepts: Vec<Concept> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let Some(id) = field(Some(idx_concept)) else {
            return Err(VocabError::MissingId { position: row }.into());
        };
        let parent = field(idx_parent).map(ConceptId::from);

        let position = match positions.get(id) {
            Some(position) => *position,
            None => {
                positions.insert(id.to_string(), concepts.len());
                concepts.push(Concept {
                    id: ConceptId::from(id),
                    labels: vec![default_label(id)],
                    parent: parent.clone(),
                    terms: Vec::new(),
                });
                concepts.len() - 1
            }
        };
        let concept = &mut concepts[position];

        if let Some(second) = parent {
            match &concept.parent {
                Some(first) if *first != second => {
                    return Err(VocabError::ConflictingParent {
                        concept: concept.id.clone(),
                        first: first.clone(),
                        second,
                    }
                    .into());
                }
                Some(_) => {}
                None => concept.parent = Some(second),
            }
        }

        let variants = field(idx_variants)
            .map(|v| v.split(';').map(str::trim).collect::<Vec<_>>())
            .unwrap_or_default();
        for term in field(Some(idx_term)).into_iter().chain(variants) {
            if !term.is_empty() && !concept.terms.iter().any(|t| t == term) {
                concept.terms.push(term.to_string());
            }
        }
    }
    Ok(concepts)
}

fn default_label(id: &str) -> String {
    id.rsplit('.').next().unwrap_or(id).to_string()
}
