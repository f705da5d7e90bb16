//! Tests for windowed pair extraction
use corpus_graph::window::{sorted_pairs, PairCounts, WindowExtractor};
use corpus_graph::GraphError;

fn count_of(counts: &PairCounts, a: u32, b: u32) -> u64 { counts.get(&(a, b)).copied().unwrap_or(0) }

#[test]
fn zero_window_is_rejected() {
  assert!(matches!(WindowExtractor::new(0), Err(GraphError::Configuration(_))));
}

#[test]
fn cat_sentence_with_window_two() {
  // the cat sat on the mat
  let sentence = vec![0, 1, 2, 3, 0, 4];
  let extractor = WindowExtractor::new(2).unwrap();
  let counts = extractor.extract(&[sentence]);
  assert_eq!(counts.len(), 8);
  assert_eq!(count_of(&counts, 0, 1), 1);
  assert_eq!(count_of(&counts, 0, 2), 2);
  assert_eq!(count_of(&counts, 1, 2), 1);
  assert_eq!(count_of(&counts, 1, 3), 1);
  assert_eq!(count_of(&counts, 2, 3), 1);
  assert_eq!(count_of(&counts, 0, 3), 1);
  assert_eq!(count_of(&counts, 3, 4), 1);
  assert_eq!(count_of(&counts, 0, 4), 1);
  assert_eq!(counts.values().sum::<u64>(), 9);
}

#[test]
fn distinct_tokens_give_the_closed_form_pair_total() {
  for length in 0..12usize {
    let sentence: Vec<u32> = (0..length as u32).collect();
    for window in 1..15usize {
      let extractor = WindowExtractor::new(window).unwrap();
      let counts = extractor.extract(&[sentence.clone()]);
      let expected: usize = (1..length).map(|position| position.min(window)).sum();
      assert_eq!(
        counts.values().sum::<u64>(),
        expected as u64,
        "length {} window {}",
        length,
        window
      );
      for &(a, b) in counts.keys() {
        assert!(a < b);
        assert!(b as usize - a as usize <= window);
      }
    }
  }
}

#[test]
fn repeated_tokens_never_pair_with_themselves() {
  let extractor = WindowExtractor::new(3).unwrap();
  let counts = extractor.extract(&[vec![0, 1, 0, 1]]);
  assert_eq!(counts.len(), 1);
  assert_eq!(count_of(&counts, 0, 1), 4);

  let counts = extractor.extract(&[vec![7, 7, 7]]);
  assert!(counts.is_empty());
}

#[test]
fn short_sentences_have_no_pairs() {
  let extractor = WindowExtractor::new(5).unwrap();
  let counts = extractor.extract(&[vec![], vec![3]]);
  assert!(counts.is_empty());
}

#[test]
fn sentences_do_not_share_windows() {
  let extractor = WindowExtractor::new(10).unwrap();
  let counts = extractor.extract(&[vec![0, 1], vec![2, 3]]);
  assert_eq!(counts.len(), 2);
  assert_eq!(count_of(&counts, 1, 2), 0);
}

#[test]
fn huge_window_covers_the_whole_sentence() {
  let extractor = WindowExtractor::new(usize::max_value()).unwrap();
  let counts = extractor.extract(&[vec![0, 1, 2, 3]]);
  assert_eq!(counts.len(), 6);
  assert!(counts.values().all(|&count| count == 1));
}

#[test]
fn pairs_are_sorted_for_persistence() {
  let extractor = WindowExtractor::new(2).unwrap();
  let counts = extractor.extract(&[vec![4, 2, 0, 3]]);
  let records = sorted_pairs(counts);
  assert_eq!(records, vec![(0, 2, 1), (0, 3, 1), (0, 4, 1), (2, 3, 1), (2, 4, 1)]);
}
