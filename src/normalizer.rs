//! Word normalization applied to every token before it enters a dictionary
//!
//! Normalization may erase a token entirely, signalled by an empty string, in which case the
//! encoder drops the token.
use std::fmt;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unidecode::unidecode;

use crate::error::GraphError;

lazy_static! {
  // Integers, floats, subfigure numbers
  static ref IS_NUMERIC: Regex =
    Regex::new(r"^-?(?:\d+)(?:[a-k]|(?:[.,]\d+(?:[eE][+-]?\d+)?))?$").unwrap();
  static ref PUNCTUATION: Regex = Regex::new(r"[\p{P}\p{S}]+").unwrap();
  // morpha keeps global state, one caller at a time
  static ref MORPHA_LOCK: Mutex<()> = Mutex::new(());
}

/// A caller-supplied normalization function; an empty result drops the word
pub type NormalizeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The built-in normalization steps, applied in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
  /// Replace unicode characters by their ascii representation
  pub ascii_fold: bool,
  /// Strip punctuation and symbol characters, dropping words made only of them
  pub remove_punctuations: bool,
  /// Drop numeric literals
  pub remove_numbers: bool,
  /// Move to lowercase
  pub lowercase: bool,
  /// Apply the morpha stemmer (which also lowercases)
  pub stem_word: bool,
}

impl Default for NormalizerOptions {
  fn default() -> NormalizerOptions {
    NormalizerOptions {
      ascii_fold: false,
      remove_punctuations: true,
      remove_numbers: true,
      lowercase: true,
      stem_word: false,
    }
  }
}

impl NormalizerOptions {
  /// Leave every word untouched
  pub fn identity() -> NormalizerOptions {
    NormalizerOptions {
      ascii_fold: false,
      remove_punctuations: false,
      remove_numbers: false,
      lowercase: false,
      stem_word: false,
    }
  }
}

/// Maps a word to its normalized form, or to the empty string when the word should be dropped
#[derive(Clone, Default)]
pub struct WordNormalizer {
  /// built-in steps
  pub options: NormalizerOptions,
  /// optional custom step, run after the built-in ones
  custom: Option<NormalizeFn>,
}

impl fmt::Debug for WordNormalizer {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("WordNormalizer")
      .field("options", &self.options)
      .field("custom", &self.custom.is_some())
      .finish()
  }
}

impl WordNormalizer {
  /// A normalizer running the given built-in steps
  pub fn new(options: NormalizerOptions) -> Self {
    WordNormalizer {
      options,
      custom: None,
    }
  }

  /// Resolve one of the named built-in strategies: `default`, `identity`, `lowercase`, `stem`
  pub fn from_name(name: &str) -> Result<Self, GraphError> {
    let options = match name.trim().to_ascii_lowercase().as_str() {
      "default" => NormalizerOptions::default(),
      "identity" | "none" => NormalizerOptions::identity(),
      "lowercase" => NormalizerOptions {
        lowercase: true,
        ..NormalizerOptions::identity()
      },
      "stem" => NormalizerOptions {
        stem_word: true,
        ..NormalizerOptions::default()
      },
      _ => {
        return Err(GraphError::config(format!(
          "unrecognized word normalizer {:?}, expected one of default, identity, lowercase, stem",
          name
        )))
      },
    };
    Ok(WordNormalizer::new(options))
  }

  /// Add a custom step after the built-in ones
  pub fn with_custom<F>(mut self, normalize: F) -> Self
  where F: Fn(&str) -> String + Send + Sync + 'static {
    self.custom = Some(Arc::new(normalize));
    self
  }

  /// Normalize a single word; the empty string means "drop this word"
  pub fn apply(&self, word: &str) -> String {
    let options = &self.options;
    let mut normalized = if options.ascii_fold {
      unidecode(word)
    } else {
      word.to_string()
    };
    if options.remove_punctuations {
      normalized = PUNCTUATION.replace_all(&normalized, "").into_owned();
    }
    if options.remove_numbers && IS_NUMERIC.is_match(&normalized) {
      return String::new();
    }
    if options.lowercase {
      normalized = normalized.to_lowercase();
    }
    if options.stem_word && !normalized.is_empty() {
      normalized = stem(&normalized);
    }
    match self.custom {
      Some(ref custom) if !normalized.is_empty() => custom(&normalized),
      _ => normalized,
    }
  }
}

fn stem(word: &str) -> String {
  let _guard = MORPHA_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
  rustmorpha::stem(word)
}
