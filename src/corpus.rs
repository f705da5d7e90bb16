//! Discovery of corpus files and the readers turning one file into its sentences
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use jwalk::WalkDir as ParWalkDir;
use libxml::parser::Parser;
use libxml::xpath::Context;

use crate::error::GraphError;

/// Default node selection for XML corpora, e.g. the `<doc>` elements of a wikipedia extract
pub const DEFAULT_XML_NODE_PATH: &str = "//doc";

/// A lazy sequence of sentences from one source file
pub type SentenceIter = Box<dyn Iterator<Item = io::Result<String>>>;
/// A caller-supplied reader, mapping a file path to its sentences
pub type ReadFn = Arc<dyn Fn(&Path) -> io::Result<SentenceIter> + Send + Sync>;

/// Turns a source file into sentences. Every call to `sentences` starts over from the beginning
/// of the file, so a reader can be reused when a batch is resumed.
#[derive(Clone)]
pub enum CorpusReader {
  /// Plain text, one sentence per non-blank line
  Text,
  /// XML documents: the text content of every node matched by `node_xpath`, one sentence per
  /// non-blank line
  Xml {
    /// XPath selecting the text-bearing nodes
    node_xpath: String,
  },
  /// Any caller-supplied reader
  Custom(ReadFn),
}

impl Default for CorpusReader {
  fn default() -> CorpusReader { CorpusReader::Text }
}

impl fmt::Debug for CorpusReader {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      CorpusReader::Text => f.write_str("Text"),
      CorpusReader::Xml { node_xpath } => write!(f, "Xml({})", node_xpath),
      CorpusReader::Custom(_) => f.write_str("Custom"),
    }
  }
}

impl CorpusReader {
  /// Resolve a reader by name: `txt` or `xml` (the latter with an optional node XPath)
  pub fn from_name(name: &str, xml_node_path: Option<&str>) -> Result<Self, GraphError> {
    match name.trim().to_ascii_lowercase().as_str() {
      "txt" | "text" => Ok(CorpusReader::Text),
      "xml" => {
        let node_xpath = xml_node_path.unwrap_or(DEFAULT_XML_NODE_PATH).trim();
        if node_xpath.is_empty() {
          return Err(GraphError::config("the xml file parser needs a non-empty node path"));
        }
        Ok(CorpusReader::Xml {
          node_xpath: node_xpath.to_string(),
        })
      },
      _ => Err(GraphError::config(format!(
        "unrecognized file parser {:?}, expected txt or xml",
        name
      ))),
    }
  }

  /// Wrap a custom reader function
  pub fn custom<F>(read: F) -> Self
  where F: Fn(&Path) -> io::Result<SentenceIter> + Send + Sync + 'static {
    CorpusReader::Custom(Arc::new(read))
  }

  /// Open `path` and return its sentences
  pub fn sentences(&self, path: &Path) -> Result<SentenceIter, GraphError> {
    match self {
      CorpusReader::Text => {
        let file = File::open(path).map_err(|e| GraphError::file(path, e))?;
        let lines = BufReader::new(file).lines().filter_map(|line| match line {
          Ok(line) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
              None
            } else {
              Some(Ok(trimmed.to_string()))
            }
          },
          Err(e) => Some(Err(e)),
        });
        Ok(Box::new(lines))
      },
      CorpusReader::Xml { node_xpath } => xml_sentences(path, node_xpath),
      CorpusReader::Custom(read) => read(path).map_err(|e| GraphError::file(path, e)),
    }
  }
}

fn xml_sentences(path: &Path, node_xpath: &str) -> Result<SentenceIter, GraphError> {
  let filepath = path
    .to_str()
    .ok_or_else(|| GraphError::file(path, "path is not valid UTF-8"))?;
  let dom = Parser::default()
    .parse_file(filepath)
    .map_err(|e| GraphError::file(path, format!("xml parse error: {:?}", e)))?;
  let context =
    Context::new(&dom).map_err(|_| GraphError::file(path, "could not create an XPath context"))?;
  let nodes = match context.evaluate(node_xpath) {
    Ok(found_payload) => found_payload.get_readonly_nodes_as_vec(),
    Err(_) => {
      return Err(GraphError::file(
        path,
        format!("could not evaluate node path {:?}", node_xpath),
      ))
    },
  };
  let mut sentences = Vec::new();
  for node in nodes {
    for line in node.get_content().lines() {
      let trimmed = line.trim();
      if !trimmed.is_empty() {
        sentences.push(Ok(trimmed.to_string()));
      }
    }
  }
  Ok(Box::new(sentences.into_iter()))
}

/// One source file of a corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
  /// Location of the file
  pub path: PathBuf,
  /// Disjoint artifact namespace of this file, e.g. `AA_wiki_03` for `AA/wiki_03.txt`
  pub key: String,
}

/// A directory tree of source files
#[derive(Debug, Clone)]
pub struct Corpus {
  /// root directory
  pub path: PathBuf,
  /// Extension of corpus files (e.g. ".txt"), selects every file when unset
  pub extension: Option<String>,
  /// Entries below this directory are never selected (typically the output directory)
  pub exclude: Option<PathBuf>,
  /// Sentence reader for the selected files
  pub reader: CorpusReader,
}

impl Default for Corpus {
  fn default() -> Corpus {
    Corpus {
      path: PathBuf::from("."),
      extension: None,
      exclude: None,
      reader: CorpusReader::default(),
    }
  }
}

impl Corpus {
  /// Create a new corpus with the base directory `dirpath`
  pub fn new<P: Into<PathBuf>>(dirpath: P) -> Self {
    Corpus {
      path: dirpath.into(),
      ..Corpus::default()
    }
  }

  /// All selected files in canonical order (sorted by relative path), each with its artifact key.
  /// Two files mapping onto the same key are a configuration error.
  pub fn files(&self) -> Result<Vec<CorpusFile>, GraphError> {
    if !self.path.is_dir() {
      return Err(GraphError::config(format!(
        "corpus directory {:?} does not exist",
        self.path
      )));
    }
    // compare resolved paths, `./out/x` must still fall under an excluded `out`
    let root = self.path.canonicalize()?;
    let exclude = self
      .exclude
      .as_ref()
      .and_then(|exclude| exclude.canonicalize().ok());
    let mut paths: Vec<PathBuf> = ParWalkDir::new(&self.path)
      .num_threads(rayon::current_num_threads())
      .skip_hidden(true)
      .sort(true)
      .into_iter()
      .filter_map(|each| {
        if let Ok(entry) = each {
          let file_name = entry.file_name.to_str().unwrap_or("");
          let selected = match self.extension {
            Some(ref extension) => file_name.ends_with(extension.as_str()),
            None => true,
          };
          if selected {
            let path = entry.path();
            let excluded = match exclude {
              Some(ref exclude) => match path.strip_prefix(&self.path) {
                Ok(relative) => root.join(relative).starts_with(exclude),
                Err(_) => path.starts_with(exclude),
              },
              None => false,
            };
            if !excluded && path.is_file() {
              return Some(path);
            }
          }
        }
        // all other cases
        None
      })
      .collect();
    paths.sort();

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
      let key = self.artifact_key(&path);
      if let Some(previous) = seen.insert(key.clone(), path.clone()) {
        return Err(GraphError::config(format!(
          "{:?} and {:?} map onto the same artifact key {:?}",
          previous, path, key
        )));
      }
      files.push(CorpusFile { path, key });
    }
    Ok(files)
  }

  /// The artifact key of a file: its path relative to the corpus root, extension removed,
  /// components joined by `_`
  pub fn artifact_key(&self, path: &Path) -> String {
    let relative = path.strip_prefix(&self.path).unwrap_or(path);
    let mut components: Vec<String> = relative
      .components()
      .filter_map(|component| match component {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
      })
      .collect();
    if let Some(last) = components.last_mut() {
      let stem = Path::new(last.as_str())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());
      if let Some(stem) = stem {
        *last = stem;
      }
    }
    components.join("_")
  }
}
