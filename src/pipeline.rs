//! The orchestrator: a fixed-size worker pool running stages 1 and 2 one task per file, with a
//! barrier before the single coordinating pass of stage 3.
//!
//! Tasks share nothing but the artifact directories, each writing only below its own file key.
//! A task that fails leaves no artifact behind; the failure is recorded in the batch report and
//! the file is left out of every later stage.
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregationSummary, GraphAggregator};
use crate::artifacts::{
  read_encoded_sentences, write_atomically, write_encoded_file, write_pairs, ArtifactLayout,
};
use crate::config::GraphConfig;
use crate::corpus::{Corpus, CorpusFile, CorpusReader};
use crate::encoder::VocabularyEncoder;
use crate::error::GraphError;
use crate::normalizer::WordNormalizer;
use crate::tokenizer::WordTokenizer;
use crate::window::{sorted_pairs, WindowExtractor};

/// The three stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  /// tokenization, normalization and local dictionary encoding
  Encode,
  /// windowed pair extraction
  Pairs,
  /// vocabulary merge, pruning and edge aggregation
  Graph,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(match self {
      Stage::Encode => "encode",
      Stage::Pairs => "pairs",
      Stage::Graph => "graph",
    })
  }
}

/// A file left out of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
  /// source file
  pub path: String,
  /// stage the file failed in
  pub stage: Stage,
  /// error description
  pub message: String,
}

/// Outcome of one per-file stage over the whole corpus
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
  /// files that have the stage's artifacts, in canonical order
  #[serde(skip)]
  pub completed: Vec<CorpusFile>,
  /// of which were left untouched because their artifacts already existed
  pub resumed: usize,
  /// files that failed
  pub failures: Vec<FileFailure>,
  /// summed per-file counters
  pub catalog: HashMap<String, u64>,
}

impl StageReport {
  /// Number of files with artifacts
  pub fn completed_count(&self) -> usize { self.completed.len() }
  /// Artifact keys of the completed files
  pub fn keys(&self) -> Vec<String> { self.completed.iter().map(|file| file.key.clone()).collect() }
}

/// Everything that happened during a full run, written to `graph/report.json`
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
  /// files selected from the corpus
  pub file_count: usize,
  /// stage 1 outcome
  pub encode: StageReport,
  /// stage 2 outcome
  pub pairs: StageReport,
  /// stage 3 outcome
  pub graph: AggregationSummary,
  /// non-fatal conditions worth a look
  pub warnings: Vec<String>,
  /// wall clock time of the run
  pub duration_secs: u64,
}

impl BatchReport {
  /// Per-file failures of all stages
  pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
    self.encode.failures.iter().chain(self.pairs.failures.iter())
  }
}

enum TaskOutcome {
  Resumed,
  Done(HashMap<String, u64>),
}

/// A configured graph construction run
pub struct Pipeline {
  config: GraphConfig,
  corpus: Corpus,
  encoder: VocabularyEncoder,
  extractor: WindowExtractor,
  layout: ArtifactLayout,
  pool: ThreadPool,
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("config", &self.config)
      .field("encoder", &self.encoder)
      .field("reader", &self.corpus.reader)
      .finish()
  }
}

impl Pipeline {
  /// Validate `config`, resolve the named strategies and start the worker pool
  pub fn new(config: GraphConfig) -> Result<Self, GraphError> {
    config.validate()?;
    let tokenizer = WordTokenizer::from_name(&config.tokenizer)?;
    let normalizer = WordNormalizer::from_name(&config.normalizer)?;
    let reader = CorpusReader::from_name(&config.file_parser, config.xml_node_path.as_deref())?;
    let extractor = WindowExtractor::new(config.window_size)?;
    let pool = ThreadPoolBuilder::new()
      .num_threads(config.worker_count())
      .thread_name(|index| format!("corpus-graph-{}", index))
      .build()?;

    let mut corpus = Corpus::new(config.data_dir.clone());
    corpus.extension = config.file_extension.clone();
    corpus.exclude = Some(config.output_dir.clone());
    corpus.reader = reader;

    Ok(Pipeline {
      layout: ArtifactLayout::new(config.output_dir.clone()),
      encoder: VocabularyEncoder::new(tokenizer, normalizer),
      corpus,
      extractor,
      pool,
      config,
    })
  }

  /// Replace the tokenizer, e.g. by a custom one
  pub fn with_tokenizer(mut self, tokenizer: WordTokenizer) -> Self {
    self.encoder.tokenizer = tokenizer;
    self
  }

  /// Replace the normalizer, e.g. by one with custom options
  pub fn with_normalizer(mut self, normalizer: WordNormalizer) -> Self {
    self.encoder.normalizer = normalizer;
    self
  }

  /// Replace the corpus reader, e.g. by a custom one
  pub fn with_reader(mut self, reader: CorpusReader) -> Self {
    self.corpus.reader = reader;
    self
  }

  /// The settings of this run
  pub fn config(&self) -> &GraphConfig { &self.config }

  /// The artifact layout of this run
  pub fn layout(&self) -> &ArtifactLayout { &self.layout }

  /// Corpus files in canonical order
  pub fn files(&self) -> Result<Vec<CorpusFile>, GraphError> { self.corpus.files() }

  /// Run one task per file on the worker pool, collecting outcomes in the order of `files`
  fn dispatch<F>(&self, stage: Stage, files: &[CorpusFile], task: F) -> StageReport
  where F: Fn(&CorpusFile) -> Result<TaskOutcome, GraphError> + Send + Sync {
    let outcomes: Vec<Result<TaskOutcome, GraphError>> = self.pool.install(|| {
      files
        .par_iter()
        .enumerate()
        .map(|(index, file)| {
          if index % 1000 == 0 && index > 0 {
            info!("-- {} stage now processing file {}", stage, 1 + index);
          }
          task(file)
        })
        .collect()
    });

    let mut report = StageReport::default();
    for (file, outcome) in files.iter().zip(outcomes) {
      match outcome {
        Ok(TaskOutcome::Resumed) => {
          report.resumed += 1;
          report.completed.push(file.clone());
        },
        Ok(TaskOutcome::Done(counts)) => {
          for (k, v) in counts {
            let entry = report.catalog.entry(k).or_insert(0);
            *entry += v;
          }
          report.completed.push(file.clone());
        },
        Err(e) => {
          let error = e.into_file(&file.path);
          warn!("{} stage skips {:?}: {}", stage, file.path, error);
          report.failures.push(FileFailure {
            path: file.path.to_string_lossy().into_owned(),
            stage,
            message: error.to_string(),
          });
        },
      }
    }
    info!(
      "{} stage: {} files completed ({} resumed), {} failed",
      stage,
      report.completed.len(),
      report.resumed,
      report.failures.len()
    );
    report
  }

  /// Stage 1 over `files`
  pub fn encode_corpus(&self, files: &[CorpusFile]) -> Result<StageReport, GraphError> {
    self.layout.create_dirs()?;
    Ok(self.dispatch(Stage::Encode, files, |file| {
      if self.config.resume && self.layout.has_encoding(&file.key) {
        return Ok(TaskOutcome::Resumed);
      }
      // a failure below must not leave an earlier run's artifacts looking complete
      self.layout.remove_encoding(&file.key)?;
      let encoded = self.encoder.encode_file(&self.corpus.reader, &file.path)?;
      write_encoded_file(&self.layout, &file.key, &encoded)?;
      let mut counts = HashMap::new();
      counts.insert(String::from("sentence_count"), encoded.sentences.len() as u64);
      counts.insert(String::from("token_count"), encoded.token_count() as u64);
      counts.insert(
        String::from("local_vocabulary_size"),
        encoded.dictionary.len() as u64,
      );
      Ok(TaskOutcome::Done(counts))
    }))
  }

  /// Stage 2 over `files`, which must have stage 1 artifacts
  pub fn extract_pairs(&self, files: &[CorpusFile]) -> Result<StageReport, GraphError> {
    self.layout.create_dirs()?;
    Ok(self.dispatch(Stage::Pairs, files, |file| {
      if self.config.resume && self.layout.has_pairs(&file.key) {
        return Ok(TaskOutcome::Resumed);
      }
      self.layout.remove_pairs(&file.key)?;
      let sentences = read_encoded_sentences(&self.layout.encoded_path(&file.key))?;
      let counts = self.extractor.extract(&sentences);
      let occurrences: u64 = counts.values().sum();
      let pairs = sorted_pairs(counts);
      write_pairs(&self.layout.pairs_path(&file.key), &pairs)?;
      let mut catalog = HashMap::new();
      catalog.insert(String::from("distinct_pair_count"), pairs.len() as u64);
      catalog.insert(String::from("pair_occurrence_count"), occurrences);
      Ok(TaskOutcome::Done(catalog))
    }))
  }

  /// Stage 3 over the files keyed `keys`, in canonical order
  pub fn aggregate(&self, keys: &[String]) -> Result<AggregationSummary, GraphError> {
    let mut aggregator = GraphAggregator::new(self.layout.clone(), self.config.pruning_policy());
    aggregator.max_pairs_in_memory = self.config.max_pairs_in_memory;
    aggregator.aggregate(keys)
  }

  /// Files that already carry the artifacts of `stage`, e.g. to run the stages separately
  pub fn completed_files(&self, stage: Stage) -> Result<Vec<CorpusFile>, GraphError> {
    Ok(
      self
        .files()?
        .into_iter()
        .filter(|file| match stage {
          Stage::Encode => self.layout.has_encoding(&file.key),
          Stage::Pairs | Stage::Graph => {
            self.layout.has_encoding(&file.key) && self.layout.has_pairs(&file.key)
          },
        })
        .collect(),
    )
  }

  /// Run all three stages and write the batch report next to the graph
  pub fn run(&self) -> Result<BatchReport, GraphError> {
    let start = Instant::now();
    let files = self.files()?;
    info!(
      "building a co-occurrence graph from {} files in {:?} with {} workers",
      files.len(),
      self.config.data_dir,
      self.pool.current_num_threads()
    );
    let mut report = BatchReport {
      file_count: files.len(),
      ..BatchReport::default()
    };

    report.encode = self.encode_corpus(&files)?;
    report.pairs = self.extract_pairs(&report.encode.completed)?;
    report.graph = self.aggregate(&report.pairs.keys())?;

    if files.is_empty() {
      report.warnings.push(format!("no corpus files found in {:?}", self.config.data_dir));
    }
    if report.graph.pruned_vocabulary_size == 0 {
      report.warnings.push(String::from(
        "the pruned vocabulary is empty, the graph has no nodes",
      ));
    }
    let failure_count = report.failures().count();
    if failure_count > 0 {
      report
        .warnings
        .push(format!("{} files were skipped, see failures", failure_count));
    }
    for warning in &report.warnings {
      warn!("{}", warning);
    }

    report.duration_secs = start.elapsed().as_secs();
    write_atomically(&self.layout.report_path(), |writer| {
      serde_json::to_writer_pretty(writer, &report)?;
      Ok(())
    })?;
    Ok(report)
  }
}
