//! Dependency-parser seam used by the root stage.
//!
//! The cascade only needs, per candidate sentence, the root token and the
//! tokens coordinated with it. Parsers are pluggable through
//! [`DependencyParser`]; the crate ships a closure adapter, pre-computed
//! CoNLL-U parses ([`ConlluParses`]), an external command speaking CoNLL-U
//! ([`CommandParser`]) and [`NoParser`].

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use conceptmap_text::normalize;
use thiserror::Error;
use tracing::{info, warn};

/// Why a sentence has no usable tree. Never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("empty sentence")]
    Empty,
    #[error("no parse available for {0:?}")]
    NotFound(String),
    #[error("no dependency parser configured")]
    Unavailable,
    #[error("parser command failed: {0}")]
    Command(String),
    #[error("malformed parse: {0}")]
    Malformed(String),
    #[error("parse has no root token")]
    NoRoot,
}

/// One row of a dependency parse.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// One-based position in the sentence.
    pub id: usize,
    pub form: String,
    /// `None` when the parser did not provide a lemma.
    pub lemma: Option<String>,
    /// Id of the governing token; `0` for the root.
    pub head: usize,
    pub deprel: String,
}

impl Token {
    pub fn new(id: usize, form: &str, lemma: Option<&str>, head: usize, deprel: &str) -> Self {
        Self {
            id,
            form: form.to_string(),
            lemma: lemma.map(str::to_string),
            head,
            deprel: deprel.to_string(),
        }
    }

    /// Universal Dependencies coordination, including subtypes like `conj:und`.
    pub fn is_conjunct(&self) -> bool {
        self.deprel == "conj" || self.deprel.starts_with("conj:")
    }
}

/// Tokens of one parsed sentence.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DependencyTree {
    pub tokens: Vec<Token>,
}

impl DependencyTree {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Id of the first token headed by `0`.
    ///
    /// Trees that glue several sentences together have several such tokens;
    /// only the first sentence counts.
    pub fn root_token_id(&self) -> Option<usize> {
        self.tokens.iter().find(|t| t.head == 0).map(|t| t.id)
    }

    /// Tokens reachable from the root through `conj` edges, transitively, in
    /// sentence order. Does not include the root itself.
    pub fn coordinated_root_token_ids(&self) -> Vec<usize> {
        let Some(root) = self.root_token_id() else {
            return Vec::new();
        };
        let mut reached = vec![root];
        let mut frontier = vec![root];
        while let Some(head) = frontier.pop() {
            for token in &self.tokens {
                if token.head == head && token.is_conjunct() && !reached.contains(&token.id) {
                    reached.push(token.id);
                    frontier.push(token.id);
                }
            }
        }
        let mut ids: Vec<usize> = reached.into_iter().filter(|id| *id != root).collect();
        ids.sort_unstable();
        ids
    }

    /// The root followed by its coordinated tokens.
    pub fn root_tokens(&self) -> Vec<&Token> {
        let Some(root) = self.root_token_id() else {
            return Vec::new();
        };
        std::iter::once(root)
            .chain(self.coordinated_root_token_ids())
            .filter_map(|id| self.token(id))
            .collect()
    }

    pub fn token(&self, id: usize) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }
}

pub trait DependencyParser {
    fn parse(&self, sentence: &str) -> Result<DependencyTree, ParseFailure>;

    /// Parse several sentences; results line up with the input.
    fn parse_batch(&self, sentences: &[&str]) -> Vec<Result<DependencyTree, ParseFailure>> {
        sentences.iter().map(|s| self.parse(s)).collect()
    }
}

impl<F> DependencyParser for F
where
    F: Fn(&str) -> Result<DependencyTree, ParseFailure>,
{
    fn parse(&self, sentence: &str) -> Result<DependencyTree, ParseFailure> {
        self(sentence)
    }
}

/// Placeholder when no parser is configured; the root stage matches nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoParser;

impl DependencyParser for NoParser {
    fn parse(&self, _sentence: &str) -> Result<DependencyTree, ParseFailure> {
        Err(ParseFailure::Unavailable)
    }

    fn parse_batch(&self, sentences: &[&str]) -> Vec<Result<DependencyTree, ParseFailure>> {
        if !sentences.is_empty() {
            warn!(
                "no dependency parser configured; {} candidates left for the root stage stay unmatched",
                sentences.len()
            );
        }
        vec![Err(ParseFailure::Unavailable); sentences.len()]
    }
}

/// Pre-computed parses keyed by the normalized `# text =` of each sentence.
///
/// A malformed block fails only its own sentence.
#[derive(Clone, Debug, Default)]
pub struct ConlluParses {
    by_text: HashMap<String, Result<DependencyTree, ParseFailure>>,
}

impl ConlluParses {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("read conllu {}", path.display()))?;
        let parses = Self::from_conllu(&text);
        info!("loaded {} parses from {}", parses.len(), path.display());
        Ok(parses)
    }

    /// Sentences without a `# text =` comment are ignored; the first parse of
    /// a repeated text wins.
    pub fn from_conllu(text: &str) -> Self {
        let mut by_text = HashMap::new();
        for block in sentence_blocks(text) {
            let Some(sentence) = block
                .iter()
                .find_map(|line| line.strip_prefix("# text ="))
                .map(normalize)
            else {
                continue;
            };
            let tree = parse_conllu_sentence(&block);
            if let Err(err) = &tree {
                warn!("skipping parse of {:?}: {}", sentence, err);
            }
            by_text.entry(sentence).or_insert(tree);
        }
        Self { by_text }
    }

    /// Number of usable parses.
    pub fn len(&self) -> usize {
        self.by_text.values().filter(|tree| tree.is_ok()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DependencyParser for ConlluParses {
    fn parse(&self, sentence: &str) -> Result<DependencyTree, ParseFailure> {
        let key = normalize(sentence);
        if key.is_empty() {
            return Err(ParseFailure::Empty);
        }
        match self.by_text.get(&key) {
            Some(parsed) => parsed.clone(),
            None => Err(ParseFailure::NotFound(key)),
        }
    }
}

/// Runs an external program once per batch.
///
/// The program reads one sentence per line on stdin and prints one CoNLL-U
/// sentence per input line, separated by blank lines, in the same order.
#[derive(Clone, Debug)]
pub struct CommandParser {
    program: String,
    args: Vec<String>,
}

impl CommandParser {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace (no shell quoting).
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn run(&self, input: String) -> Result<String, ParseFailure> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ParseFailure::Command(format!("spawn {}: {err}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ParseFailure::Command("stdin not captured".into()))?;
        // stdin is written on its own thread while stdout drains.
        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input.as_bytes()));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            output.and_then(|out| written.map(|_| out))
        })
        .map_err(|err| ParseFailure::Command(format!("{}: {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParseFailure::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|err| ParseFailure::Malformed(format!("non-utf8 output: {err}")))
    }
}

impl DependencyParser for CommandParser {
    fn parse(&self, sentence: &str) -> Result<DependencyTree, ParseFailure> {
        self.parse_batch(&[sentence])
            .pop()
            .unwrap_or(Err(ParseFailure::Empty))
    }

    fn parse_batch(&self, sentences: &[&str]) -> Vec<Result<DependencyTree, ParseFailure>> {
        let mut results: Vec<Option<Result<DependencyTree, ParseFailure>>> = sentences
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    Some(Err(ParseFailure::Empty))
                } else {
                    None
                }
            })
            .collect();
        let pending: Vec<usize> = (0..sentences.len())
            .filter(|idx| results[*idx].is_none())
            .collect();
        if pending.is_empty() {
            return results.into_iter().flatten().collect();
        }

        let mut input = String::new();
        for idx in &pending {
            // One sentence per line.
            input.push_str(&sentences[*idx].replace(['\n', '\r'], " "));
            input.push('\n');
        }

        match self.run(input).and_then(|stdout| self.read_parses(&stdout, pending.len())) {
            Ok(trees) => {
                for (idx, tree) in pending.iter().zip(trees) {
                    results[*idx] = Some(tree);
                }
            }
            Err(err) => {
                warn!("{}", err);
                for idx in &pending {
                    results[*idx] = Some(Err(err.clone()));
                }
            }
        }
        results.into_iter().flatten().collect()
    }
}

impl CommandParser {
    fn read_parses(
        &self,
        stdout: &str,
        expected: usize,
    ) -> Result<Vec<Result<DependencyTree, ParseFailure>>, ParseFailure> {
        let blocks = sentence_blocks(stdout);
        if blocks.len() != expected {
            return Err(ParseFailure::Command(format!(
                "{} returned {} parses for {} sentences",
                self.program,
                blocks.len(),
                expected
            )));
        }
        Ok(blocks
            .iter()
            .map(|block| parse_conllu_sentence(block))
            .collect())
    }
}

// Non-empty runs of lines separated by blank lines.
fn sentence_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Build a tree from the lines of one CoNLL-U sentence.
///
/// Comments, multi-word token ranges (`1-2`) and empty nodes (`1.1`) are
/// skipped.
pub fn parse_conllu_sentence(lines: &[&str]) -> Result<DependencyTree, ParseFailure> {
    let mut tokens = Vec::new();
    for line in lines {
        if line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != 10 {
            return Err(ParseFailure::Malformed(format!(
                "expected 10 columns, found {}: {line:?}",
                cols.len()
            )));
        }
        if cols[0].contains(['-', '.']) {
            continue;
        }
        let id = cols[0]
            .parse::<usize>()
            .map_err(|_| ParseFailure::Malformed(format!("bad token id {:?}", cols[0])))?;
        let head = cols[6]
            .parse::<usize>()
            .map_err(|_| ParseFailure::Malformed(format!("bad head {:?}", cols[6])))?;
        let lemma = Some(cols[2]).filter(|l| !l.is_empty() && *l != "_");
        tokens.push(Token::new(id, cols[1], lemma, head, cols[7]));
    }
    if tokens.is_empty() {
        return Err(ParseFailure::Empty);
    }
    let tree = DependencyTree::new(tokens);
    if tree.root_token_id().is_none() {
        return Err(ParseFailure::NoRoot);
    }
    Ok(tree)
}
