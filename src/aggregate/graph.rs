//! The final graph: pruned vocabulary (nodes) and weighted undirected edges
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifacts::{tsv_reader, tsv_writer, write_atomically, ArtifactLayout};
use crate::error::GraphError;

/// A node of the graph: a surviving token, its global id and its corpus-wide count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
  /// normalized token
  pub token: String,
  /// global id
  pub id: u32,
  /// total occurrences across the corpus
  pub count: u64,
}

/// An undirected weighted edge, `source < target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalEdge {
  /// smaller global id
  pub source: u32,
  /// larger global id
  pub target: u32,
  /// summed co-occurrence count
  pub weight: u64,
}

/// Persist the pruned vocabulary, one `token \t id \t count` row per node
pub fn write_vocabulary(path: &Path, entries: &[VocabularyEntry]) -> Result<(), GraphError> {
  write_atomically(path, |writer| {
    let mut tsv = tsv_writer(writer);
    for entry in entries {
      tsv.serialize(entry)?;
    }
    tsv.flush()?;
    Ok(())
  })
}

/// A final graph loaded back from disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
  /// nodes, in global id order
  pub vocabulary: Vec<VocabularyEntry>,
  /// edges, in ascending `(source, target)` order
  pub edges: Vec<GlobalEdge>,
}

impl Graph {
  /// Load the graph written below `layout`
  pub fn load(layout: &ArtifactLayout) -> Result<Self, GraphError> {
    let mut vocabulary_reader = tsv_reader(BufReader::new(File::open(layout.vocabulary_path())?));
    let vocabulary = vocabulary_reader
      .deserialize()
      .collect::<Result<Vec<VocabularyEntry>, csv::Error>>()?;
    let mut edge_reader = tsv_reader(BufReader::new(File::open(layout.edges_path())?));
    let edges = edge_reader
      .deserialize()
      .collect::<Result<Vec<GlobalEdge>, csv::Error>>()?;
    Ok(Graph { vocabulary, edges })
  }

  /// Number of nodes
  pub fn node_count(&self) -> usize { self.vocabulary.len() }
  /// Number of edges
  pub fn edge_count(&self) -> usize { self.edges.len() }

  /// token -> global id
  pub fn token_ids(&self) -> HashMap<&str, u32> {
    self
      .vocabulary
      .iter()
      .map(|entry| (entry.token.as_str(), entry.id))
      .collect()
  }

  /// Corpus-wide count of a token, if it is a node
  pub fn count(&self, token: &str) -> Option<u64> {
    self
      .vocabulary
      .iter()
      .find(|entry| entry.token == token)
      .map(|entry| entry.count)
  }

  /// The weight of the edge between two tokens, in either order
  pub fn weight(&self, first: &str, second: &str) -> Option<u64> {
    let ids = self.token_ids();
    let (a, b) = (*ids.get(first)?, *ids.get(second)?);
    let (source, target) = if a < b { (a, b) } else { (b, a) };
    self
      .edges
      .binary_search_by(|edge| (edge.source, edge.target).cmp(&(source, target)))
      .ok()
      .map(|index| self.edges[index].weight)
  }

  /// All edges as `(token, token, weight)`, tokens of each edge in lexical order, sorted
  pub fn token_edges(&self) -> Vec<(String, String, u64)> {
    let tokens: HashMap<u32, &str> = self
      .vocabulary
      .iter()
      .map(|entry| (entry.id, entry.token.as_str()))
      .collect();
    let mut edges: Vec<(String, String, u64)> = self
      .edges
      .iter()
      .filter_map(|edge| {
        let first = tokens.get(&edge.source)?;
        let second = tokens.get(&edge.target)?;
        let (first, second) = if first <= second {
          (first, second)
        } else {
          (second, first)
        };
        Some((first.to_string(), second.to_string(), edge.weight))
      })
      .collect();
    edges.sort();
    edges
  }
}
