//! Configuration of a graph construction run
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::aggregate::{PruningPolicy, DEFAULT_MAX_PAIRS_IN_MEMORY};
use crate::error::GraphError;

/// All recognized options. Missing JSON fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
  /// root of the corpus directory tree
  pub data_dir: PathBuf,
  /// root of intermediate and final artifacts
  pub output_dir: PathBuf,
  /// only files ending with this extension are read, e.g. ".txt"
  pub file_extension: Option<String>,
  /// `txt` or `xml`
  pub file_parser: String,
  /// XPath of the text nodes for the `xml` parser
  pub xml_node_path: Option<String>,
  /// built-in word tokenizer name
  pub tokenizer: String,
  /// built-in word normalizer name
  pub normalizer: String,
  /// maximal token distance of a co-occurrence, at least 1
  pub window_size: usize,
  /// worker threads, defaults to the available processors
  pub workers: Option<usize>,
  /// minimal corpus-wide count of a vocabulary token
  pub min_count: u64,
  /// vocabulary cap, `null` or `"unlimited"` for none
  #[serde(deserialize_with = "deserialize_vocab_limit")]
  pub max_vocab_size: Option<usize>,
  /// distinct pairs held in memory during aggregation before spilling to disk
  pub max_pairs_in_memory: usize,
  /// skip files whose artifacts already exist
  pub resume: bool,
}

impl Default for GraphConfig {
  fn default() -> GraphConfig {
    GraphConfig {
      data_dir: PathBuf::from("data"),
      output_dir: PathBuf::from("output"),
      file_extension: None,
      file_parser: "txt".to_string(),
      xml_node_path: None,
      tokenizer: "WordPunct".to_string(),
      normalizer: "default".to_string(),
      window_size: 5,
      workers: None,
      min_count: 1,
      max_vocab_size: None,
      max_pairs_in_memory: DEFAULT_MAX_PAIRS_IN_MEMORY,
      resume: false,
    }
  }
}

impl GraphConfig {
  /// Default settings for the given input and output directories
  pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(data_dir: P, output_dir: Q) -> Self {
    GraphConfig {
      data_dir: data_dir.into(),
      output_dir: output_dir.into(),
      ..GraphConfig::default()
    }
  }

  /// Load settings from a JSON file
  pub fn from_json_file(path: &Path) -> Result<Self, GraphError> {
    let file = File::open(path)?;
    let config: GraphConfig = serde_json::from_reader(BufReader::new(file))?;
    Ok(config)
  }

  /// Reject settings that can never work
  pub fn validate(&self) -> Result<(), GraphError> {
    if self.window_size == 0 {
      return Err(GraphError::config("window_size must be a positive integer"));
    }
    if self.workers == Some(0) {
      return Err(GraphError::config("workers must be a positive integer"));
    }
    if self.max_vocab_size == Some(0) {
      return Err(GraphError::config(
        "max_vocab_size must be a positive integer or unlimited",
      ));
    }
    if self.max_pairs_in_memory == 0 {
      return Err(GraphError::config("max_pairs_in_memory must be a positive integer"));
    }
    Ok(())
  }

  /// Effective number of worker threads
  pub fn worker_count(&self) -> usize { self.workers.unwrap_or_else(rayon::current_num_threads) }

  /// Vocabulary pruning settings
  pub fn pruning_policy(&self) -> PruningPolicy {
    PruningPolicy {
      min_count: self.min_count,
      max_vocab_size: self.max_vocab_size,
    }
  }
}

/// Accepts a positive integer, `null` or the string `"unlimited"`
fn deserialize_vocab_limit<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where D: Deserializer<'de> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Limit {
    Size(usize),
    Keyword(String),
  }
  match Option::<Limit>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Limit::Size(size)) => Ok(Some(size)),
    Some(Limit::Keyword(keyword)) => {
      if keyword.eq_ignore_ascii_case("unlimited") {
        Ok(None)
      } else {
        Err(de::Error::custom(format!(
          "max_vocab_size must be a positive integer or \"unlimited\", found {:?}",
          keyword
        )))
      }
    },
  }
}
