//! Stage 3: merge all local dictionaries, prune the vocabulary, remap every local pair-count file
//! to global ids and sum the weights of identical pairs into the final graph.
//!
//! Pruning needs the complete frequency table, so the three phases run strictly one after the
//! other: dictionary merge (A), pruning (B), then remap and accumulate (C).
pub mod graph;
pub mod spill;
pub mod vocabulary;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::{read_dictionary, read_pairs, tsv_writer, write_atomically, ArtifactLayout};
use crate::error::GraphError;

pub use self::graph::{write_vocabulary, GlobalEdge, Graph, VocabularyEntry};
pub use self::spill::EdgeAccumulator;
pub use self::vocabulary::{
  GlobalVocabulary, PrunedVocabulary, PruningPolicy, RemapTable, VocabularyBuilder,
};

/// Default bound on distinct pairs held in memory before spilling
pub const DEFAULT_MAX_PAIRS_IN_MEMORY: usize = 10_000_000;

/// Figures describing one aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
  /// files merged
  pub file_count: usize,
  /// distinct tokens before pruning
  pub vocabulary_size: usize,
  /// distinct tokens after pruning
  pub pruned_vocabulary_size: usize,
  /// local pair records read
  pub local_pair_count: u64,
  /// local pair records dropped because an endpoint was pruned
  pub dropped_pair_count: u64,
  /// edges in the final graph
  pub edge_count: u64,
  /// summed weight of all final edges
  pub total_weight: u64,
  /// external-merge runs written
  pub spilled_runs: usize,
}

/// The stage 3 coordinator
#[derive(Debug, Clone)]
pub struct GraphAggregator {
  /// where the per-file artifacts live and where the graph goes
  pub layout: ArtifactLayout,
  /// vocabulary pruning
  pub policy: PruningPolicy,
  /// distinct pairs kept in memory before a spill
  pub max_pairs_in_memory: usize,
}

impl GraphAggregator {
  /// An aggregator over the artifacts of `layout`
  pub fn new(layout: ArtifactLayout, policy: PruningPolicy) -> Self {
    GraphAggregator {
      layout,
      policy,
      max_pairs_in_memory: DEFAULT_MAX_PAIRS_IN_MEMORY,
    }
  }

  /// Phase A: merge the dictionaries of `keys`, in the given order
  pub fn merge_dictionaries(
    &self,
    keys: &[String],
  ) -> Result<(GlobalVocabulary, Vec<RemapTable>), GraphError> {
    let mut builder = VocabularyBuilder::new();
    for key in keys {
      let path = self.layout.dictionary_path(key);
      if !path.is_file() {
        return Err(GraphError::aggregation(&path, "local dictionary is missing"));
      }
      let dictionary = read_dictionary(&path).map_err(|e| e.into_aggregation(&path))?;
      builder.merge(&dictionary);
    }
    Ok(builder.finish())
  }

  /// Run all three phases over the files keyed `keys` and write the final graph.
  /// `keys` must come in canonical order for global ids to be reproducible.
  pub fn aggregate(&self, keys: &[String]) -> Result<AggregationSummary, GraphError> {
    let mut summary = AggregationSummary {
      file_count: keys.len(),
      ..AggregationSummary::default()
    };

    let (vocabulary, remaps) = self.merge_dictionaries(keys)?;
    summary.vocabulary_size = vocabulary.len();
    info!(
      "merged {} local dictionaries into {} distinct tokens",
      keys.len(),
      vocabulary.len()
    );

    let pruned = vocabulary.prune(&self.policy);
    summary.pruned_vocabulary_size = pruned.len();
    if pruned.is_empty() {
      warn!(
        "no token survives pruning (min_count {}, max_vocab_size {:?}), the graph will be empty",
        self.policy.min_count, self.policy.max_vocab_size
      );
    } else {
      info!("{} tokens survive pruning", pruned.len());
    }

    let mut accumulator = EdgeAccumulator::new(self.layout.spill_dir(), self.max_pairs_in_memory);
    for (key, remap) in keys.iter().zip(remaps.iter()) {
      let path = self.layout.pairs_path(key);
      if !path.is_file() {
        return Err(GraphError::aggregation(&path, "local pair counts are missing"));
      }
      let pairs = read_pairs(&path).map_err(|e| e.into_aggregation(&path))?;
      for (a, b, count) in pairs {
        let (global_a, global_b) = match (remap.get(a), remap.get(b)) {
          (Some(global_a), Some(global_b)) => (global_a, global_b),
          _ => {
            return Err(GraphError::aggregation(
              &path,
              format!(
                "pair ({}, {}) refers to a local id outside its dictionary of {} tokens",
                a,
                b,
                remap.len()
              ),
            ))
          },
        };
        summary.local_pair_count += 1;
        if pruned.contains(global_a) && pruned.contains(global_b) {
          accumulator.add(global_a, global_b, count)?;
        } else {
          summary.dropped_pair_count += 1;
        }
      }
      debug!("remapped pair counts of {:?}", key);
    }
    summary.spilled_runs = accumulator.spilled_runs();

    write_vocabulary(&self.layout.vocabulary_path(), pruned.entries())?;
    let (mut edge_count, mut total_weight) = (0, 0);
    write_atomically(&self.layout.edges_path(), |writer| {
      let mut tsv = tsv_writer(writer);
      accumulator.finish(|edge| {
        edge_count += 1;
        total_weight += edge.weight;
        tsv.serialize(edge)?;
        Ok(())
      })?;
      tsv.flush()?;
      Ok(())
    })?;
    summary.edge_count = edge_count;
    summary.total_weight = total_weight;
    info!(
      "graph written: {} nodes, {} edges, total weight {}",
      summary.pruned_vocabulary_size, summary.edge_count, summary.total_weight
    );
    Ok(summary)
  }
}
