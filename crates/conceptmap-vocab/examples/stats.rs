use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use conceptmap_vocab::{IndexOptions, LoadMode, Vocabulary, VocabularyIndex};

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p conceptmap-vocab --example stats -- <vocabulary>")?;

    let vocab = Vocabulary::load_with_mode(&path, LoadMode::Mmap)
        .with_context(|| format!("loading vocabulary from {}", path.display()))?;
    let index = VocabularyIndex::build(&vocab, IndexOptions::default());

    let term_count: usize = vocab.concepts().iter().map(|c| c.terms.len()).sum();
    let roots = vocab.concepts().iter().filter(|c| c.parent.is_none()).count();
    let max_depth = vocab
        .concepts()
        .iter()
        .map(|c| vocab.ancestors(c.id.as_str()).count())
        .max()
        .unwrap_or(0);

    println!("Vocabulary   : {}", path.display());
    println!("Concepts     : {}", index.concept_count());
    println!("Root concepts: {}", roots);
    println!("Max depth    : {}", max_depth);
    println!("Declared terms: {}", term_count);
    println!("Index keys   : {}", index.term_count());
    println!("Multi-word keys: {}", index.multiword_term_count());

    let mut ambiguous: Vec<_> = index.ambiguous_terms().collect();
    ambiguous.sort_by(|a, b| a.0.cmp(b.0));
    println!("Ambiguous keys: {}", ambiguous.len());
    for (key, hit) in ambiguous {
        println!("  {:<24} {}", key, hit.concepts);
    }

    // Spot-check lookups.
    for probe in ["trinken", "Bier", "Durst haben"] {
        match index.resolve(probe) {
            Some(hit) => println!("'{}' -> {}", probe, hit.concepts),
            None => println!("'{}' -> (none)", probe),
        }
    }

    Ok(())
}
