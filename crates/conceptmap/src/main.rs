use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use conceptmap_vocab::{IndexOptions, LoadMode, Vocabulary, VocabularyIndex};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use conceptmap::corpus::{
    DEFAULT_DEFINITION_COLUMN, DEFAULT_GOLD_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_LEMMA_COLUMN,
    DEFAULT_POS_COLUMN,
};
use conceptmap::{
    ColumnNames, CommandParser, ConlluParses, DependencyParser, NoParser, map_corpus_file,
};

const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Parser)]
#[command(name = "conceptmap")]
#[command(about = "Map dictionary entries onto a concept vocabulary")]
struct Cli {
    /// Vocabulary file (JSON tree, JSON records or TSV).
    #[arg(long, env = "CONCEPTMAP_VOCABULARY")]
    vocabulary: PathBuf,
    /// `mmap` or `owned`.
    #[arg(long, env = "CONCEPTMAP_LOAD_MODE", default_value = "mmap", value_parser = parse_load_mode)]
    load_mode: LoadMode,
    #[arg(long, env = "CONCEPTMAP_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Pre-computed CoNLL-U parses for the root stage.
    #[arg(long, env = "CONCEPTMAP_CONLLU", conflicts_with = "parser_cmd")]
    conllu: Option<PathBuf>,
    /// Command reading sentences on stdin and writing CoNLL-U to stdout.
    #[arg(long, env = "CONCEPTMAP_PARSER_CMD")]
    parser_cmd: Option<String>,
    #[arg(long, env = "CONCEPTMAP_ID_COLUMN", default_value = DEFAULT_ID_COLUMN)]
    id_column: String,
    #[arg(long, env = "CONCEPTMAP_LEMMA_COLUMN", default_value = DEFAULT_LEMMA_COLUMN)]
    lemma_column: String,
    #[arg(long, env = "CONCEPTMAP_DEFINITION_COLUMN", default_value = DEFAULT_DEFINITION_COLUMN)]
    definition_column: String,
    #[arg(long, env = "CONCEPTMAP_POS_COLUMN", default_value = DEFAULT_POS_COLUMN)]
    pos_column: String,
    #[arg(long, env = "CONCEPTMAP_GOLD_COLUMN", default_value = DEFAULT_GOLD_COLUMN)]
    gold_column: String,
    /// Index vocabulary terms only as written, without determiner-stripped forms.
    #[arg(long, env = "CONCEPTMAP_KEEP_DETERMINERS", default_value_t = false)]
    keep_determiners: bool,
    /// Corpus tables to map.
    #[arg(required = true)]
    corpus: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct Config {
    vocabulary_path: PathBuf,
    load_mode: LoadMode,
    output_dir: PathBuf,
    parser: ParserChoice,
    columns: ColumnNames,
    index_options: IndexOptions,
    corpus_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
enum ParserChoice {
    None,
    Conllu(PathBuf),
    Command(String),
}

fn main() -> Result<()> {
    init_tracing();

    let config = load_config(Cli::parse());
    info!(
        "using vocabulary at {} (mode: {:?})",
        config.vocabulary_path.display(),
        config.load_mode
    );
    info!("writing results to {}", config.output_dir.display());

    let start = Instant::now();
    let vocab = Vocabulary::load_with_mode(&config.vocabulary_path, config.load_mode)?;
    let index = VocabularyIndex::build(&vocab, config.index_options);
    info!("vocabulary indexed in {} ms", start.elapsed().as_millis());

    let parser = build_parser(&config.parser)?;

    for path in &config.corpus_paths {
        let start = Instant::now();
        map_corpus_file(
            path,
            &config.output_dir,
            &config.columns,
            &index,
            &*parser,
        )
        .with_context(|| format!("mapping {}", path.display()))?;
        info!("{} done in {} ms", path.display(), start.elapsed().as_millis());
    }
    Ok(())
}

fn load_config(cli: Cli) -> Config {
    let parser = match (cli.conllu, cli.parser_cmd) {
        (Some(path), _) => ParserChoice::Conllu(path),
        (None, Some(cmd)) => ParserChoice::Command(cmd),
        (None, None) => ParserChoice::None,
    };
    Config {
        vocabulary_path: cli.vocabulary,
        load_mode: cli.load_mode,
        output_dir: cli.output_dir,
        parser,
        columns: ColumnNames {
            id: cli.id_column,
            lemma: cli.lemma_column,
            definition: cli.definition_column,
            pos: cli.pos_column,
            gold: cli.gold_column,
        },
        index_options: IndexOptions {
            strip_determiners: !cli.keep_determiners,
        },
        corpus_paths: cli.corpus,
    }
}

fn build_parser(choice: &ParserChoice) -> Result<Box<dyn DependencyParser>> {
    let parser: Box<dyn DependencyParser> = match choice {
        ParserChoice::None => {
            info!("no dependency parser configured; the root stage will not match");
            Box::new(NoParser)
        }
        ParserChoice::Conllu(path) => Box::new(ConlluParses::load(path)?),
        ParserChoice::Command(line) => match CommandParser::from_command_line(line) {
            Some(parser) => {
                info!("parsing definitions with `{}`", line);
                Box::new(parser)
            }
            None => bail!("--parser-cmd is empty"),
        },
    };
    Ok(parser)
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Ok(LoadMode::Mmap),
        "owned" => Ok(LoadMode::Owned),
        other => Err(format!("unknown load mode `{other}` (expected mmap or owned)")),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
