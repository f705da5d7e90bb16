//! Global vocabulary: merging local dictionaries (phase A) and pruning (phase B)
use std::collections::HashMap;

use crate::dictionary::LocalDictionary;

use super::graph::VocabularyEntry;

/// Limits applied to the merged vocabulary before any edge is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruningPolicy {
  /// min occurrences for inclusion in vocab
  pub min_count: u64,
  /// None for no limit
  pub max_vocab_size: Option<usize>,
}

impl Default for PruningPolicy {
  fn default() -> PruningPolicy {
    PruningPolicy {
      min_count: 1,
      max_vocab_size: None,
    }
  }
}

/// Local id -> global id translation of one source file. Frozen once the merge is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
  global_ids: Vec<u32>,
}

impl RemapTable {
  /// The global id of `local_id`, if the local dictionary knew it
  pub fn get(&self, local_id: u32) -> Option<u32> { self.global_ids.get(local_id as usize).copied() }
  /// Number of local ids covered
  pub fn len(&self) -> usize { self.global_ids.len() }
  /// true for an empty local dictionary
  pub fn is_empty(&self) -> bool { self.global_ids.is_empty() }
}

/// Phase A: unions local dictionaries, in the order they are merged, into one global dictionary
/// and frequency table
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
  ids: HashMap<String, u32>,
  tokens: Vec<String>,
  counts: Vec<u64>,
  remaps: Vec<RemapTable>,
}

impl VocabularyBuilder {
  /// An empty builder
  pub fn new() -> Self { VocabularyBuilder::default() }

  /// Merge the next file's dictionary, returning the index of its remap table. New tokens get the
  /// next global id, all tokens add their local counts to the frequency table.
  pub fn merge(&mut self, dictionary: &LocalDictionary) -> usize {
    let mut global_ids = Vec::with_capacity(dictionary.len());
    for (_, token, count) in dictionary.entries() {
      let global_id = match self.ids.get(token) {
        Some(id) => *id,
        None => {
          let id = self.tokens.len() as u32;
          self.ids.insert(token.to_string(), id);
          self.tokens.push(token.to_string());
          self.counts.push(0);
          id
        },
      };
      self.counts[global_id as usize] += count;
      global_ids.push(global_id);
    }
    self.remaps.push(RemapTable { global_ids });
    self.remaps.len() - 1
  }

  /// Freeze the merge into the global vocabulary and the per-file remap tables (in merge order)
  pub fn finish(self) -> (GlobalVocabulary, Vec<RemapTable>) {
    (
      GlobalVocabulary {
        ids: self.ids,
        tokens: self.tokens,
        counts: self.counts,
      },
      self.remaps,
    )
  }
}

/// Every token of the corpus, once, with its global id and total occurrence count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalVocabulary {
  ids: HashMap<String, u32>,
  tokens: Vec<String>,
  counts: Vec<u64>,
}

impl GlobalVocabulary {
  /// Number of distinct tokens
  pub fn len(&self) -> usize { self.tokens.len() }
  /// true for an empty corpus
  pub fn is_empty(&self) -> bool { self.tokens.is_empty() }
  /// The global id of a token
  pub fn id(&self, token: &str) -> Option<u32> { self.ids.get(token).copied() }
  /// The token behind a global id
  pub fn token(&self, id: u32) -> Option<&str> { self.tokens.get(id as usize).map(String::as_str) }
  /// Corpus-wide occurrence count of the token behind `id`
  pub fn count(&self, id: u32) -> u64 { self.counts.get(id as usize).copied().unwrap_or(0) }

  /// Phase B: keep tokens occurring at least `min_count` times, then, if more than
  /// `max_vocab_size` remain, the most frequent ones. Equal counts are ranked by first
  /// encounter, i.e. by global id.
  pub fn prune(&self, policy: &PruningPolicy) -> PrunedVocabulary {
    let mut survivors: Vec<u32> = (0..self.tokens.len() as u32)
      .filter(|id| self.counts[*id as usize] >= policy.min_count)
      .collect();
    if let Some(max_vocab_size) = policy.max_vocab_size {
      if survivors.len() > max_vocab_size {
        survivors.sort_by(|a, b| {
          self.counts[*b as usize]
            .cmp(&self.counts[*a as usize])
            .then(a.cmp(b))
        });
        survivors.truncate(max_vocab_size);
        survivors.sort_unstable();
      }
    }

    let mut kept = vec![false; self.tokens.len()];
    let entries = survivors
      .into_iter()
      .map(|id| {
        kept[id as usize] = true;
        VocabularyEntry {
          token: self.tokens[id as usize].clone(),
          id,
          count: self.counts[id as usize],
        }
      })
      .collect();
    PrunedVocabulary { kept, entries }
  }
}

/// The tokens surviving pruning, keeping their global ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedVocabulary {
  kept: Vec<bool>,
  entries: Vec<VocabularyEntry>,
}

impl PrunedVocabulary {
  /// Does the token with global id `id` survive?
  pub fn contains(&self, id: u32) -> bool { self.kept.get(id as usize).copied().unwrap_or(false) }
  /// Number of surviving tokens
  pub fn len(&self) -> usize { self.entries.len() }
  /// true when pruning removed everything
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
  /// Surviving entries in global id order
  pub fn entries(&self) -> &[VocabularyEntry] { &self.entries }
}
