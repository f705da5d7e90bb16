// Builds a weighted word co-occurrence graph from a directory of corpus files.
//
// $ cargo run --release -- --data-dir /path/to/corpus --output-dir /path/to/output \
//     --window-size 5 --min-count 5 --max-vocab-size 10000
use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use corpus_graph::{GraphConfig, Pipeline, Stage};

#[derive(Parser, Debug)]
#[command(name = "corpus_graph")]
#[command(about = "Weighted word co-occurrence graph from a text corpus")]
struct Args {
  /// JSON configuration file, overridden by any flag given below
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Corpus root directory
  #[arg(short, long)]
  data_dir: Option<PathBuf>,

  /// Directory for intermediate artifacts and the final graph
  #[arg(short, long)]
  output_dir: Option<PathBuf>,

  /// Only read files with this extension, e.g. ".txt"
  #[arg(long)]
  extension: Option<String>,

  /// Corpus file parser: txt or xml
  #[arg(long)]
  file_parser: Option<String>,

  /// XPath of the text nodes for the xml parser
  #[arg(long)]
  xml_node_path: Option<String>,

  /// Word tokenizer: WordPunct, PunktWord, Whitespace or Alphabetic
  #[arg(long)]
  tokenizer: Option<String>,

  /// Word normalizer: default, identity, lowercase or stem
  #[arg(long)]
  normalizer: Option<String>,

  /// Maximal distance between two co-occurring tokens
  #[arg(short, long)]
  window_size: Option<usize>,

  /// Number of parallel workers (defaults to the available processors)
  #[arg(short = 'p', long)]
  workers: Option<usize>,

  /// Minimal corpus-wide count of a vocabulary token
  #[arg(long)]
  min_count: Option<u64>,

  /// Vocabulary cap, a positive integer or "unlimited"
  #[arg(long, value_parser = parse_vocab_limit)]
  max_vocab_size: Option<VocabLimit>,

  /// Distinct pairs held in memory during aggregation before spilling to disk
  #[arg(long)]
  max_pairs_in_memory: Option<usize>,

  /// Keep the artifacts of an earlier, interrupted run
  #[arg(long)]
  resume: bool,

  /// Run a single stage on top of the artifacts already present
  #[arg(long, value_enum, default_value = "all")]
  stage: StageArg,
}

#[derive(Clone, Copy, Debug)]
struct VocabLimit(Option<usize>);

fn parse_vocab_limit(value: &str) -> Result<VocabLimit, String> {
  if value.eq_ignore_ascii_case("unlimited") {
    return Ok(VocabLimit(None));
  }
  match value.parse::<usize>() {
    Ok(size) if size > 0 => Ok(VocabLimit(Some(size))),
    _ => Err(format!("expected a positive integer or \"unlimited\", found {:?}", value)),
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StageArg {
  All,
  Encode,
  Pairs,
  Graph,
}

fn init_tracing() {
  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new("info"))
    .unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_level(true)
    .init();
}

fn configure(args: Args) -> Result<(GraphConfig, StageArg), Box<dyn Error>> {
  let mut config = match args.config {
    Some(ref path) => GraphConfig::from_json_file(path)?,
    None => GraphConfig::default(),
  };
  if let Some(data_dir) = args.data_dir {
    config.data_dir = data_dir;
  }
  if let Some(output_dir) = args.output_dir {
    config.output_dir = output_dir;
  }
  if args.extension.is_some() {
    config.file_extension = args.extension;
  }
  if let Some(file_parser) = args.file_parser {
    config.file_parser = file_parser;
  }
  if args.xml_node_path.is_some() {
    config.xml_node_path = args.xml_node_path;
  }
  if let Some(tokenizer) = args.tokenizer {
    config.tokenizer = tokenizer;
  }
  if let Some(normalizer) = args.normalizer {
    config.normalizer = normalizer;
  }
  if let Some(window_size) = args.window_size {
    config.window_size = window_size;
  }
  if args.workers.is_some() {
    config.workers = args.workers;
  }
  if let Some(min_count) = args.min_count {
    config.min_count = min_count;
  }
  if let Some(VocabLimit(limit)) = args.max_vocab_size {
    config.max_vocab_size = limit;
  }
  if let Some(max_pairs_in_memory) = args.max_pairs_in_memory {
    config.max_pairs_in_memory = max_pairs_in_memory;
  }
  config.resume = config.resume || args.resume;
  Ok((config, args.stage))
}

pub fn main() -> Result<(), Box<dyn Error>> {
  init_tracing();
  let (config, stage) = configure(Args::parse())?;
  let pipeline = Pipeline::new(config)?;

  match stage {
    StageArg::All => {
      let report = pipeline.run()?;
      println!("---");
      println!("Graph finished in {:?}s, gathered: ", report.duration_secs);
      println!("{:?} files;", report.file_count);
      println!("{:?} skipped files;", report.failures().count());
      println!(
        "{:?} tokens ({:?} after pruning);",
        report.graph.vocabulary_size, report.graph.pruned_vocabulary_size
      );
      println!("{:?} edges;", report.graph.edge_count);
      for failure in report.failures() {
        println!("skipped {} during {}: {}", failure.path, failure.stage, failure.message);
      }
    },
    StageArg::Encode => {
      let files = pipeline.files()?;
      let report = pipeline.encode_corpus(&files)?;
      info!("encoded {} of {} files", report.completed_count(), files.len());
    },
    StageArg::Pairs => {
      let files = pipeline.completed_files(Stage::Encode)?;
      let report = pipeline.extract_pairs(&files)?;
      info!("extracted pairs of {} of {} files", report.completed_count(), files.len());
    },
    StageArg::Graph => {
      let keys: Vec<String> = pipeline
        .completed_files(Stage::Graph)?
        .into_iter()
        .map(|file| file.key)
        .collect();
      let summary = pipeline.aggregate(&keys)?;
      info!(
        "graph of {} nodes and {} edges",
        summary.pruned_vocabulary_size, summary.edge_count
      );
    },
  }
  Ok(())
}
