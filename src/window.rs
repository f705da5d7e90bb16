//! Stage 2: windowed co-occurrence pairs over id-encoded sentences
//!
//! Every two token instances at most `window_size` positions apart within a sentence form a
//! pair. Pairs are unordered, stored as `(smaller id, larger id)`, and a token never pairs with
//! another instance of itself.
use std::collections::HashMap;

use circular_queue::CircularQueue;

use crate::error::GraphError;

/// Pair counts of one file, keyed by `(smaller id, larger id)`
pub type PairCounts = HashMap<(u32, u32), u64>;

/// Slides a window of fixed size over sentences and counts the pairs it sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowExtractor {
  window_size: usize,
}

impl WindowExtractor {
  /// A window spanning up to `window_size` positions to the left of each token (at least 1)
  pub fn new(window_size: usize) -> Result<Self, GraphError> {
    if window_size == 0 {
      return Err(GraphError::config("window size must be at least 1"));
    }
    Ok(WindowExtractor { window_size })
  }

  /// The configured window size
  pub fn window_size(&self) -> usize { self.window_size }

  /// Count the pairs of a single sentence into `counts`
  pub fn add_sentence(&self, sentence: &[u32], counts: &mut PairCounts) {
    if sentence.len() < 2 {
      return;
    }
    // the queue never needs to hold more than the sentence itself
    let mut window = CircularQueue::with_capacity(self.window_size.min(sentence.len()));
    for &current in sentence {
      for &previous in window.iter() {
        if previous == current {
          continue;
        }
        let pair = if previous < current {
          (previous, current)
        } else {
          (current, previous)
        };
        *counts.entry(pair).or_insert(0) += 1;
      }
      window.push(current);
    }
  }

  /// Count the pairs of all sentences of a file
  pub fn extract<'s, I>(&self, sentences: I) -> PairCounts
  where I: IntoIterator<Item = &'s Vec<u32>> {
    let mut counts = PairCounts::new();
    for sentence in sentences {
      self.add_sentence(sentence, &mut counts);
    }
    counts
  }
}

/// Pair counts as `(a, b, count)` records in ascending `(a, b)` order
pub fn sorted_pairs(counts: PairCounts) -> Vec<(u32, u32, u64)> {
  let mut records: Vec<(u32, u32, u64)> = counts.into_iter().map(|((a, b), c)| (a, b, c)).collect();
  records.sort_unstable();
  records
}
