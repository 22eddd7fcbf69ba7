use std::fs;
use std::path::{Path, PathBuf};

use conceptmap::{
    ColumnNames, ConlluParses, Corpus, DependencyTree, NoParser, ParseFailure, RunSummary, Token,
    consolidate, map_corpus_file, run_cascade,
};
use conceptmap_types::{CorpusEntry, EntryId, MatchResult, MatchStage, Stage};
use conceptmap_vocab::{IndexOptions, Vocabulary, VocabularyIndex};
use proptest::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn drinking_index() -> VocabularyIndex {
    let vocab = Vocabulary::load(fixture("vokabular.json")).expect("load vocabulary");
    VocabularyIndex::build(&vocab, IndexOptions::default())
}

fn entry(id: &str, headword: &str, definition: &str) -> CorpusEntry {
    CorpusEntry {
        id: EntryId::from(id),
        headword: headword.to_string(),
        definition: definition.to_string(),
        pos: None,
        gold: None,
        columns: vec![id.to_string(), headword.to_string(), definition.to_string()],
    }
}

/// Root is the first word; every later word is a conjunct of the one before.
fn chain_parser(sentence: &str) -> Result<DependencyTree, ParseFailure> {
    let tokens: Vec<Token> = sentence
        .split_whitespace()
        .enumerate()
        .map(|(idx, word)| {
            let (head, deprel) = if idx == 0 { (0, "root") } else { (idx, "conj") };
            Token::new(idx + 1, word, None, head, deprel)
        })
        .collect();
    if tokens.is_empty() {
        return Err(ParseFailure::Empty);
    }
    Ok(DependencyTree::new(tokens))
}

fn describe(result: &MatchResult) -> (Stage, String) {
    (
        result.stage(),
        result.concepts().map(|c| c.to_string()).unwrap_or_default(),
    )
}

#[test]
fn drinking_example_reaches_every_stage() {
    let index = drinking_index();
    let entries = [
        entry("E1", "Trinken", ""),
        entry("E2", "xyz", "durst haben"),
        entry("E3", "xyz2", "er wollte schlucken und trinken"),
        entry("E4", "abc", ""),
    ];
    let parser = |sentence: &str| -> Result<DependencyTree, ParseFailure> {
        if sentence != "er wollte schlucken und trinken" {
            return Err(ParseFailure::NotFound(sentence.to_string()));
        }
        Ok(DependencyTree::new(vec![
            Token::new(1, "er", Some("er"), 3, "nsubj"),
            Token::new(2, "wollte", Some("wollen"), 3, "aux"),
            Token::new(3, "schlucken", Some("schlucken"), 0, "root"),
            Token::new(4, "und", Some("und"), 5, "cc"),
            Token::new(5, "trinken", Some("trinken"), 3, "conj"),
        ]))
    };

    let run = run_cascade(&index, &parser, &entries);
    let results = consolidate(&entries, &run).unwrap();
    let got: Vec<_> = results.iter().map(describe).collect();
    assert_eq!(
        got,
        [
            (Stage::Lemma, "C1".to_string()),
            (Stage::LongDef, "C1; C3".to_string()),
            (Stage::Root, "C1".to_string()),
            (Stage::Unmatched, String::new()),
        ]
    );
    assert_eq!(results[2].terms(), ["schlucken", "trinken"]);
    assert_eq!(run.without_candidates, [3]);
}

#[test]
fn empty_definition_and_unknown_headword_is_unmatched() {
    let index = drinking_index();
    let entries = [entry("E4", "abc", "")];
    let run = run_cascade(&index, &NoParser, &entries);
    let results = consolidate(&entries, &run).unwrap();
    assert_eq!(results[0].stage(), Stage::Unmatched);
    assert!(results[0].concepts().is_none());
    for stage in [MatchStage::ShortDef, MatchStage::LongDef, MatchStage::Root] {
        assert!(run.stage(stage).unwrap().entered.is_empty());
    }
}

#[test]
fn long_definitions_must_equal_a_whole_term() {
    let index = drinking_index();
    let entries = [
        entry("A", "a", "durst"),
        entry("B", "b", "grossen durst haben"),
        entry("C", "c", "Durst-haben"),
    ];
    let run = run_cascade(&index, &NoParser, &entries);
    assert!(run.stage(MatchStage::LongDef).unwrap().matches.is_empty());
    // `Durst-haben` normalizes to one token and is looked up as a short definition.
    assert!(run.stage(MatchStage::ShortDef).unwrap().matches.is_empty());
    assert_eq!(run.unmatched, [0, 1, 2]);
}

#[test]
fn maps_a_corpus_file_end_to_end() {
    let index = drinking_index();
    let parses = ConlluParses::load(fixture("korpus.conllu")).unwrap();
    let out = tempfile::tempdir().unwrap();

    let summary = map_corpus_file(
        fixture("korpus.tsv"),
        out.path(),
        &ColumnNames::default(),
        &index,
        &parses,
    )
    .unwrap();
    assert_eq!(summary.entries, 5);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.entries_without_candidates, 2);
    assert_eq!(summary.unmatched, 1);
    assert_eq!(summary.ambiguous_matches, 1);
    let matched: Vec<_> = summary.stages.iter().map(|s| (s.stage.as_str(), s.matched)).collect();
    assert_eq!(
        matched,
        [("lemma", 1), ("short_def", 1), ("long_def", 1), ("root", 1)]
    );

    let final_table = read(&out.path().join("korpus_final.tsv"));
    assert_eq!(
        final_table[0],
        "id\tlemma\tdefinition\tpos\tgold_concept\tstage\tmatched_term\tmatched_concept_ids"
    );
    assert_eq!(final_table[1], "E1\tTrinken\t\tVerb\tC1\tlemma\ttrinken\tC1");
    assert_eq!(final_table[2], "E2\txyz\tdurst haben\tVerb\tC3\tlong_def\tdurst haben\tC1; C3");
    assert!(final_table[3].ends_with("\troot\tschlucken; trinken\tC1"));
    assert_eq!(final_table[4], "E4\tabc\t\tSubst\t\tunmatched\t\t");
    assert!(final_table[5].ends_with("\tshort_def\tschlucken\tC1"));
    assert_eq!(final_table.len(), 6);

    let segmented = read(&out.path().join("0_korpus_segmented.tsv"));
    assert!(segmented[0].ends_with("\tcandidates"));
    assert!(segmented[5].ends_with("\tschlucken | gerstensaft"));

    // The lemma table lists every entry; later tables only what was passed on.
    assert_eq!(read(&out.path().join("1_korpus_lemma.tsv")).len(), 6);
    let short = read(&out.path().join("2_korpus_short_def.tsv"));
    assert_eq!(short.len(), 4);
    assert!(short[1].starts_with("E2\t") && short[1].ends_with("\t\t\t"));
    assert_eq!(read(&out.path().join("3_korpus_long_def.tsv")).len(), 3);
    assert_eq!(read(&out.path().join("4_korpus_root.tsv")).len(), 2);

    let json = fs::read_to_string(out.path().join("korpus_summary.json")).unwrap();
    let written: RunSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(written, summary);
}

#[test]
fn output_is_byte_identical_across_runs() {
    let index = drinking_index();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    for dir in [first.path(), second.path()] {
        map_corpus_file(
            fixture("korpus.tsv"),
            dir,
            &ColumnNames::default(),
            &index,
            &chain_parser,
        )
        .unwrap();
    }
    for name in ["korpus_final.tsv", "4_korpus_root.tsv", "korpus_summary.json"] {
        assert_eq!(
            fs::read(first.path().join(name)).unwrap(),
            fs::read(second.path().join(name)).unwrap(),
            "{name} differs"
        );
    }
}

#[test]
fn unreadable_corpus_is_an_error() {
    let index = drinking_index();
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("kaputt.tsv");
    fs::write(&bad, "id\tlemma\nE1\tTrinken\n").unwrap();
    let err = map_corpus_file(&bad, dir.path(), &ColumnNames::default(), &index, &NoParser)
        .unwrap_err();
    assert!(format!("{err:#}").contains("definition"));
    assert!(!dir.path().join("kaputt_final.tsv").exists());
}

fn read(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

const WORDS: [&str; 10] = [
    "trinken", "schlucken", "durst", "haben", "Bier", "wein", "xyz", "er", "und", "",
];

fn phrase() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 0..4).prop_map(|words| words.join(" "))
}

fn corpus_entries() -> impl Strategy<Value = Vec<CorpusEntry>> {
    prop::collection::vec(
        (
            prop::sample::select(WORDS.to_vec()),
            prop::collection::vec(phrase(), 0..4),
        ),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(idx, (headword, senses))| {
                entry(&format!("E{idx}"), headword, &senses.join("; "))
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn every_entry_lands_in_exactly_one_bucket(entries in corpus_entries()) {
        let index = drinking_index();
        let run = run_cascade(&index, &chain_parser, &entries);
        let results = consolidate(&entries, &run).expect("partition holds");
        prop_assert_eq!(results.len(), entries.len());

        let mapped: usize = run.stages.iter().map(|s| s.matched_count()).sum();
        prop_assert_eq!(mapped + run.unmatched.len(), entries.len());

        for (result, entry) in results.iter().zip(&entries) {
            prop_assert_eq!(&result.entry_id, &entry.id);
            if result.stage() != Stage::Unmatched {
                prop_assert!(result.concepts().is_some_and(|c| c.len() >= 1));
            }
        }
    }

    #[test]
    fn residual_never_grows(entries in corpus_entries()) {
        let index = drinking_index();
        let run = run_cascade(&index, &chain_parser, &entries);
        let mut previous = entries.len();
        for output in &run.stages {
            prop_assert!(output.entered.len() <= previous);
            prop_assert!(output.matches.keys().all(|k| output.entered.contains(k)));
            previous = output.entered.len() - output.matched_count();
        }
        prop_assert!(run.unmatched.len() >= previous);
    }
}

#[test]
fn corpus_fixture_skips_rows_without_id() {
    let corpus = Corpus::load(fixture("korpus.tsv"), &ColumnNames::default()).unwrap();
    assert_eq!(corpus.entries.len(), 5);
    assert_eq!(corpus.skipped.len(), 1);
}
