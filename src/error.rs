//! Error kinds raised while building a co-occurrence graph
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong in a graph construction run.
///
/// `Configuration` errors are raised at construction time and are always fatal.
/// `FileProcessing` errors are scoped to a single source file: the orchestrator
/// records them and moves on. `Aggregation` errors abort the final stage, since
/// carrying on would emit an incomplete graph.
#[derive(Debug, Error)]
pub enum GraphError {
  /// Unknown strategy names, invalid numeric settings, colliding artifact keys
  #[error("configuration error: {0}")]
  Configuration(String),
  /// A single source file (or its per-file artifact) could not be processed
  #[error("failed to process {path:?}: {message}")]
  FileProcessing {
    /// the source file at fault
    path: PathBuf,
    /// what went wrong
    message: String,
  },
  /// An intermediate artifact required by the aggregator is missing or corrupt
  #[error("aggregation failed on artifact {artifact:?}: {message}")]
  Aggregation {
    /// the artifact at fault
    artifact: PathBuf,
    /// what went wrong
    message: String,
  },
  /// Underlying I/O failure
  #[error("i/o error: {0}")]
  Io(#[from] io::Error),
  /// Malformed tab-separated artifact
  #[error("tsv error: {0}")]
  Csv(#[from] csv::Error),
  /// Report or configuration (de)serialization failure
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
  /// External-merge run file failure
  #[error("spill error: {0}")]
  Spill(#[from] bincode::Error),
  /// The worker pool could not be started
  #[error("worker pool error: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl GraphError {
  /// Shorthand for a `Configuration` error
  pub fn config<M: Into<String>>(message: M) -> Self { GraphError::Configuration(message.into()) }

  /// Attribute any failure to the source file at `path`
  pub fn file<P: AsRef<Path>, M: Display>(path: P, message: M) -> Self {
    GraphError::FileProcessing {
      path: path.as_ref().to_path_buf(),
      message: message.to_string(),
    }
  }

  /// Attribute any failure to the intermediate artifact at `artifact`
  pub fn aggregation<P: AsRef<Path>, M: Display>(artifact: P, message: M) -> Self {
    GraphError::Aggregation {
      artifact: artifact.as_ref().to_path_buf(),
      message: message.to_string(),
    }
  }

  /// Re-attribute an error to an aggregator artifact, keeping `Aggregation` errors as they are
  pub fn into_aggregation<P: AsRef<Path>>(self, artifact: P) -> Self {
    match self {
      GraphError::Aggregation { .. } => self,
      other => GraphError::aggregation(artifact, other),
    }
  }

  /// Re-attribute an error to a source file, keeping `FileProcessing` errors as they are
  pub fn into_file<P: AsRef<Path>>(self, path: P) -> Self {
    match self {
      GraphError::FileProcessing { .. } => self,
      other => GraphError::file(path, other),
    }
  }
}
