//! Per-file dictionaries: tokens recorded in order of appearance, with their occurrence counts
use std::collections::HashMap;

/// Token to local id mapping of a single source file.
///
/// Ids are dense, start at 0 and follow first-seen order. Each id also carries the number of
/// times its token occurred in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalDictionary {
  ids: HashMap<String, u32>,
  tokens: Vec<String>,
  counts: Vec<u64>,
}

impl LocalDictionary {
  /// create a new dictionary
  pub fn new() -> Self { LocalDictionary::default() }

  /// Record one occurrence of `token`, assigning the next id if it hasn't been seen yet
  pub fn insert(&mut self, token: &str) -> u32 {
    let id = match self.ids.get(token) {
      Some(id) => *id,
      None => {
        let id = self.tokens.len() as u32;
        self.ids.insert(token.to_string(), id);
        self.tokens.push(token.to_string());
        self.counts.push(0);
        id
      },
    };
    self.counts[id as usize] += 1;
    id
  }

  /// Rebuild a dictionary from `(token, id, count)` entries, which must list ids 0, 1, 2, ... in
  /// order and never repeat a token
  pub fn from_entries<I>(entries: I) -> Result<Self, String>
  where I: IntoIterator<Item = (String, u32, u64)> {
    let mut dictionary = LocalDictionary::new();
    for (token, id, count) in entries {
      let expected = dictionary.tokens.len() as u32;
      if id != expected {
        return Err(format!(
          "local ids are not dense: expected id {} for {:?}, found {}",
          expected, token, id
        ));
      }
      if dictionary.ids.insert(token.clone(), id).is_some() {
        return Err(format!("token {:?} is listed twice", token));
      }
      dictionary.tokens.push(token);
      dictionary.counts.push(count);
    }
    Ok(dictionary)
  }

  /// The id of a token, if recorded
  pub fn id(&self, token: &str) -> Option<u32> { self.ids.get(token).copied() }

  /// The token behind an id
  pub fn token(&self, id: u32) -> Option<&str> {
    self.tokens.get(id as usize).map(String::as_str)
  }

  /// Number of occurrences of the token behind `id` (0 for unknown ids)
  pub fn count(&self, id: u32) -> u64 { self.counts.get(id as usize).copied().unwrap_or(0) }

  /// get the number of entries in the dictionary
  pub fn len(&self) -> usize { self.tokens.len() }

  /// true when nothing was recorded
  pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

  /// `(id, token, count)` triples in id order
  pub fn entries(&self) -> impl Iterator<Item = (u32, &str, u64)> + '_ {
    self
      .tokens
      .iter()
      .zip(self.counts.iter())
      .enumerate()
      .map(|(id, (token, count))| (id as u32, token.as_str(), *count))
  }

  /// Total number of token occurrences in the file
  pub fn total_count(&self) -> u64 { self.counts.iter().sum() }
}
