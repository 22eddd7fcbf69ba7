//! The four matching stages and the residual set they hand to each other.

use std::collections::BTreeMap;

use conceptmap_text::{headword_variants, normalize, segment_definition};
use conceptmap_types::{CandidateDefinition, ConceptSet, CorpusEntry, MatchStage};
use conceptmap_vocab::{IndexedTerm, VocabularyIndex};
use tracing::{debug, info};

use crate::parse::{DependencyParser, Token};

/// Terms and concepts collected for one entry within one stage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hit {
    /// Matched vocabulary spellings in first-hit order.
    pub terms: Vec<String>,
    pub concepts: ConceptSet,
}

impl Hit {
    fn new(term: &IndexedTerm) -> Self {
        Self {
            terms: vec![term.term.clone()],
            concepts: term.concepts.clone(),
        }
    }

    fn absorb(&mut self, term: &IndexedTerm) {
        if !self.terms.contains(&term.term) {
            self.terms.push(term.term.clone());
        }
        self.concepts.union_with(&term.concepts);
    }
}

/// What a stage saw and what it matched. Entries are corpus indices.
#[derive(Clone, Debug)]
pub struct StageOutput {
    pub stage: MatchStage,
    /// Entries that entered the stage, in corpus order.
    pub entered: Vec<usize>,
    pub matches: BTreeMap<usize, Hit>,
}

impl StageOutput {
    fn new(stage: MatchStage, entered: &Residual) -> Self {
        Self {
            stage,
            entered: entered.entries.clone(),
            matches: BTreeMap::new(),
        }
    }

    fn record(&mut self, entry: usize, term: &IndexedTerm) {
        match self.matches.get_mut(&entry) {
            Some(hit) => hit.absorb(term),
            None => {
                self.matches.insert(entry, Hit::new(term));
            }
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matches.len()
    }
}

/// Entries still waiting for a match, in corpus order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Residual {
    entries: Vec<usize>,
}

impl Residual {
    /// Every entry of a corpus with `len` rows.
    pub fn all(len: usize) -> Self {
        Self {
            entries: (0..len).collect(),
        }
    }

    /// Drop entries the stage matched.
    pub fn after(&self, output: &StageOutput) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|entry| !output.matches.contains_key(entry))
                .collect(),
        }
    }

    /// Split off entries for which `keep` is false.
    pub fn partition(self, keep: impl Fn(usize) -> bool) -> (Self, Vec<usize>) {
        let (kept, dropped) = self.entries.into_iter().partition(|entry| keep(*entry));
        (Self { entries: kept }, dropped)
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the cascade produced for one corpus.
#[derive(Clone, Debug)]
pub struct CascadeRun {
    /// Candidates per entry, indexed like the corpus.
    pub candidates: Vec<Vec<CandidateDefinition>>,
    /// One output per stage, in cascade order.
    pub stages: Vec<StageOutput>,
    /// Entries without candidates that Stage 1 did not match.
    pub without_candidates: Vec<usize>,
    /// Entries no stage matched, in corpus order.
    pub unmatched: Vec<usize>,
}

impl CascadeRun {
    pub fn stage(&self, stage: MatchStage) -> Option<&StageOutput> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

pub fn segment_entries(entries: &[CorpusEntry]) -> Vec<Vec<CandidateDefinition>> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| segment_definition(idx, &entry.definition))
        .collect()
}

/// Run all four stages over `entries`.
pub fn run_cascade<P>(
    index: &VocabularyIndex,
    parser: &P,
    entries: &[CorpusEntry],
) -> CascadeRun
where
    P: DependencyParser + ?Sized,
{
    let candidates = segment_entries(entries);
    let mut stages = Vec::with_capacity(MatchStage::ALL.len());

    let residual = Residual::all(entries.len());
    let lemma = match_lemma(index, entries, &residual);
    log_stage(&lemma, entries.len());
    let residual = residual.after(&lemma);
    stages.push(lemma);

    let (residual, without_candidates) =
        residual.partition(|entry| !candidates[entry].is_empty());
    if !without_candidates.is_empty() {
        info!(
            "{} unmatched entries have no usable definition and skip the definition stages",
            without_candidates.len()
        );
    }

    let short = match_short_def(index, &candidates, &residual);
    log_stage(&short, entries.len());
    let residual = residual.after(&short);
    stages.push(short);

    let long = match_long_def(index, &candidates, &residual);
    log_stage(&long, entries.len());
    let residual = residual.after(&long);
    stages.push(long);

    let root = match_root(index, parser, &candidates, &residual);
    log_stage(&root, entries.len());
    let residual = residual.after(&root);
    stages.push(root);

    let mut unmatched: Vec<usize> = residual
        .entries
        .into_iter()
        .chain(without_candidates.iter().copied())
        .collect();
    unmatched.sort_unstable();

    CascadeRun {
        candidates,
        stages,
        without_candidates,
        unmatched,
    }
}

fn log_stage(output: &StageOutput, total: usize) {
    info!(
        "stage {} ({}): {} of {} entries matched, {} of {} still unmatched",
        output.stage.ordinal(),
        output.stage,
        output.matched_count(),
        output.entered.len(),
        output.entered.len() - output.matched_count(),
        total
    );
}

/// Stage 1: every spelling variant of the headword, looked up exactly.
pub fn match_lemma(
    index: &VocabularyIndex,
    entries: &[CorpusEntry],
    residual: &Residual,
) -> StageOutput {
    let mut output = StageOutput::new(MatchStage::Lemma, residual);
    for &entry in residual.entries() {
        for variant in headword_variants(&entries[entry].headword) {
            if let Some(term) = index.resolve(&variant) {
                output.record(entry, term);
            }
        }
    }
    output
}

/// Stage 2: single-token candidates.
pub fn match_short_def(
    index: &VocabularyIndex,
    candidates: &[Vec<CandidateDefinition>],
    residual: &Residual,
) -> StageOutput {
    match_candidates(MatchStage::ShortDef, index, candidates, residual, |c| {
        c.is_single_token()
    })
}

/// Stage 3: multi-token candidates equal to a whole vocabulary term.
pub fn match_long_def(
    index: &VocabularyIndex,
    candidates: &[Vec<CandidateDefinition>],
    residual: &Residual,
) -> StageOutput {
    match_candidates(MatchStage::LongDef, index, candidates, residual, |c| {
        c.token_count() > 1
    })
}

fn match_candidates(
    stage: MatchStage,
    index: &VocabularyIndex,
    candidates: &[Vec<CandidateDefinition>],
    residual: &Residual,
    eligible: impl Fn(&CandidateDefinition) -> bool,
) -> StageOutput {
    let mut output = StageOutput::new(stage, residual);
    for &entry in residual.entries() {
        for candidate in candidates[entry].iter().filter(|c| eligible(c)) {
            if let Some(term) = index.lookup(&candidate.normalized) {
                output.record(entry, term);
            }
        }
    }
    output
}

/// Stage 4: root and coordinated root tokens of each candidate's parse.
///
/// All candidates of the residual entries go to the parser as one batch, in
/// corpus order.
pub fn match_root<P>(
    index: &VocabularyIndex,
    parser: &P,
    candidates: &[Vec<CandidateDefinition>],
    residual: &Residual,
) -> StageOutput
where
    P: DependencyParser + ?Sized,
{
    let mut output = StageOutput::new(MatchStage::Root, residual);
    let batch: Vec<&CandidateDefinition> = residual
        .entries()
        .iter()
        .flat_map(|&entry| candidates[entry].iter())
        .collect();
    if batch.is_empty() {
        return output;
    }

    let sentences: Vec<&str> = batch.iter().map(|c| c.normalized.as_str()).collect();
    let parses = parser.parse_batch(&sentences);
    for (candidate, parse) in batch.iter().zip(parses) {
        let tree = match parse {
            Ok(tree) => tree,
            Err(err) => {
                debug!(
                    "candidate {}#{} {:?}: {}",
                    candidate.entry, candidate.ordinal, candidate.normalized, err
                );
                continue;
            }
        };
        for token in tree.root_tokens() {
            if let Some(term) = lookup_token(index, token) {
                output.record(candidate.entry, term);
            }
        }
    }
    output
}

// Lemma first, surface form as fallback.
fn lookup_token<'a>(index: &'a VocabularyIndex, token: &Token) -> Option<&'a IndexedTerm> {
    token
        .lemma
        .as_deref()
        .and_then(|lemma| index.lookup(&normalize(lemma)))
        .or_else(|| index.lookup(&normalize(&token.form)))
}
