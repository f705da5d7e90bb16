//! On-disk layout of intermediate and final artifacts
//!
//! ```text
//! <output>/dicts_and_encoded_texts/<key>.dicloc   token \t local_id \t count
//! <output>/dicts_and_encoded_texts/<key>.encoded  local ids of one sentence per line
//! <output>/edges/<key>.pairs                      local_a \t local_b \t count
//! <output>/graph/vocabulary.tsv                   token \t global_id \t count
//! <output>/graph/edges.tsv                        global_a \t global_b \t weight
//! <output>/graph/report.json                      batch report
//! ```
//!
//! Every artifact is written to a temporary file in its destination directory and renamed into
//! place once complete, so a file that exists under its final name is always whole.
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::dictionary::LocalDictionary;
use crate::encoder::EncodedFile;
use crate::error::GraphError;

static BUFFER_CAPACITY: usize = 1_048_576;

/// Folder of the stage 1 artifacts
pub const DICTS_FOLDER: &str = "dicts_and_encoded_texts";
/// Folder of the stage 2 artifacts
pub const EDGES_FOLDER: &str = "edges";
/// Folder of the final graph
pub const GRAPH_FOLDER: &str = "graph";
/// Extension of local dictionaries
pub const DICTIONARY_EXTENSION: &str = "dicloc";
/// Extension of id-encoded sentence files
pub const ENCODED_EXTENSION: &str = "encoded";
/// Extension of local pair-count files
pub const PAIRS_EXTENSION: &str = "pairs";

/// Paths of every artifact below one output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
  /// output root
  pub root: PathBuf,
}

impl ArtifactLayout {
  /// A layout rooted at `root`
  pub fn new<P: Into<PathBuf>>(root: P) -> Self { ArtifactLayout { root: root.into() } }

  /// Create all stage folders
  pub fn create_dirs(&self) -> Result<(), GraphError> {
    fs::create_dir_all(self.dicts_dir())?;
    fs::create_dir_all(self.edges_dir())?;
    fs::create_dir_all(self.graph_dir())?;
    Ok(())
  }

  /// stage 1 folder
  pub fn dicts_dir(&self) -> PathBuf { self.root.join(DICTS_FOLDER) }
  /// stage 2 folder
  pub fn edges_dir(&self) -> PathBuf { self.root.join(EDGES_FOLDER) }
  /// final graph folder
  pub fn graph_dir(&self) -> PathBuf { self.root.join(GRAPH_FOLDER) }
  /// scratch folder for external-merge runs
  pub fn spill_dir(&self) -> PathBuf { self.graph_dir().join(".spill") }

  /// local dictionary of the file keyed `key`
  pub fn dictionary_path(&self, key: &str) -> PathBuf {
    self.dicts_dir().join(format!("{}.{}", key, DICTIONARY_EXTENSION))
  }
  /// id-encoded sentences of the file keyed `key`
  pub fn encoded_path(&self, key: &str) -> PathBuf {
    self.dicts_dir().join(format!("{}.{}", key, ENCODED_EXTENSION))
  }
  /// local pair counts of the file keyed `key`
  pub fn pairs_path(&self, key: &str) -> PathBuf {
    self.edges_dir().join(format!("{}.{}", key, PAIRS_EXTENSION))
  }
  /// final pruned vocabulary
  pub fn vocabulary_path(&self) -> PathBuf { self.graph_dir().join("vocabulary.tsv") }
  /// final edge list
  pub fn edges_path(&self) -> PathBuf { self.graph_dir().join("edges.tsv") }
  /// batch report
  pub fn report_path(&self) -> PathBuf { self.graph_dir().join("report.json") }

  /// Stage 1 finished for `key` (the dictionary is persisted last)
  pub fn has_encoding(&self, key: &str) -> bool {
    self.encoded_path(key).is_file() && self.dictionary_path(key).is_file()
  }
  /// Stage 2 finished for `key`, and the pair counts are not older than the dictionary they
  /// were extracted against
  pub fn has_pairs(&self, key: &str) -> bool {
    match (
      modified(&self.pairs_path(key)),
      modified(&self.dictionary_path(key)),
    ) {
      (Some(pairs), Some(dictionary)) => pairs >= dictionary,
      _ => false,
    }
  }

  /// Forget everything stages 1 and 2 produced for `key`
  pub fn remove_encoding(&self, key: &str) -> Result<(), GraphError> {
    // the dictionary marks completion, so it goes first
    remove_if_present(&self.dictionary_path(key))?;
    remove_if_present(&self.encoded_path(key))?;
    self.remove_pairs(key)
  }

  /// Forget the stage 2 output of `key`
  pub fn remove_pairs(&self, key: &str) -> Result<(), GraphError> {
    remove_if_present(&self.pairs_path(key))
  }
}

fn modified(path: &Path) -> Option<SystemTime> {
  let metadata = fs::metadata(path).ok()?;
  if metadata.is_file() {
    metadata.modified().ok()
  } else {
    None
  }
}

fn remove_if_present(path: &Path) -> Result<(), GraphError> {
  match fs::remove_file(path) {
    Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    other => Ok(other?),
  }
}

/// Write `path` through `fill`, only moving the result into place when `fill` succeeds
pub fn write_atomically<F>(path: &Path, fill: F) -> Result<(), GraphError>
where F: FnOnce(&mut dyn Write) -> Result<(), GraphError> {
  let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent_dir)?;
  let temp_file = NamedTempFile::new_in(parent_dir)?;
  {
    let mut writer = BufWriter::with_capacity(BUFFER_CAPACITY, &temp_file);
    fill(&mut writer)?;
    writer.flush()?;
  }
  temp_file.persist(path).map_err(|e| GraphError::Io(e.error))?;
  Ok(())
}

/// A tab-separated writer without header row
pub fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
  csv::WriterBuilder::new()
    .delimiter(b'\t')
    .has_headers(false)
    .from_writer(writer)
}

/// A tab-separated reader without header row
pub fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
  csv::ReaderBuilder::new()
    .delimiter(b'\t')
    .has_headers(false)
    .from_reader(reader)
}

/// Persist the stage 1 output of the file keyed `key`. The dictionary goes last, its presence
/// marks the encoding as complete.
pub fn write_encoded_file(
  layout: &ArtifactLayout,
  key: &str,
  encoded: &EncodedFile,
) -> Result<(), GraphError> {
  write_atomically(&layout.encoded_path(key), |writer| {
    for sentence in &encoded.sentences {
      let line = sentence
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ");
      writeln!(writer, "{}", line)?;
    }
    Ok(())
  })?;
  write_dictionary(&layout.dictionary_path(key), &encoded.dictionary)
}

/// Persist a local dictionary
pub fn write_dictionary(path: &Path, dictionary: &LocalDictionary) -> Result<(), GraphError> {
  write_atomically(path, |writer| {
    let mut tsv = tsv_writer(writer);
    for (id, token, count) in dictionary.entries() {
      tsv.serialize((token, id, count))?;
    }
    tsv.flush()?;
    Ok(())
  })
}

/// Load a local dictionary, checking that its ids are dense
pub fn read_dictionary(path: &Path) -> Result<LocalDictionary, GraphError> {
  let file = File::open(path)?;
  let mut reader = tsv_reader(BufReader::new(file));
  let mut entries = Vec::new();
  for record in reader.deserialize() {
    let entry: (String, u32, u64) = record?;
    entries.push(entry);
  }
  LocalDictionary::from_entries(entries).map_err(|message| GraphError::aggregation(path, message))
}

/// Load id-encoded sentences
pub fn read_encoded_sentences(path: &Path) -> Result<Vec<Vec<u32>>, GraphError> {
  let file = File::open(path)?;
  let mut sentences = Vec::new();
  for (line_number, line) in BufReader::new(file).lines().enumerate() {
    let line = line?;
    let ids = line
      .split_whitespace()
      .map(str::parse::<u32>)
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| {
        GraphError::aggregation(path, format!("line {}: {}", line_number + 1, e))
      })?;
    if !ids.is_empty() {
      sentences.push(ids);
    }
  }
  Ok(sentences)
}

/// Persist local pair counts, expected in ascending order
pub fn write_pairs(path: &Path, pairs: &[(u32, u32, u64)]) -> Result<(), GraphError> {
  write_atomically(path, |writer| {
    let mut tsv = tsv_writer(writer);
    for pair in pairs {
      tsv.serialize(pair)?;
    }
    tsv.flush()?;
    Ok(())
  })
}

/// Load local pair counts, rejecting records that are not canonical `a < b` pairs
pub fn read_pairs(path: &Path) -> Result<Vec<(u32, u32, u64)>, GraphError> {
  let file = File::open(path)?;
  let mut reader = tsv_reader(BufReader::new(file));
  let mut pairs = Vec::new();
  for record in reader.deserialize() {
    let (a, b, count): (u32, u32, u64) = record?;
    if a >= b {
      return Err(GraphError::aggregation(
        path,
        format!("pair ({}, {}) is not in canonical order", a, b),
      ));
    }
    pairs.push((a, b, count));
  }
  Ok(pairs)
}
