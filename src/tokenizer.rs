//! Provides functionality for tokenizing sentences into words
//!
//! A tokenizer is picked once, at construction time, either by the name of one of the built-in
//! strategies or by handing over a custom function. Unknown names are rejected right away.
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::GraphError;

lazy_static! {
  // runs of word characters, or runs of anything that is neither a word character nor whitespace
  static ref WORD_PUNCT: Regex = Regex::new(r"\w+|[^\w\s]+").unwrap();
}

/// A caller-supplied tokenization function
pub type TokenizeFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// The word tokenization strategies available to the vocabulary encoder
#[derive(Clone)]
pub enum WordTokenizer {
  /// Alternating runs of word characters and of punctuation, e.g. `this's` gives `this`, `'`, `s`
  WordPunct,
  /// Whitespace-separated chunks, with leading and trailing punctuation split off
  PunktWord,
  /// Plain whitespace splitting
  Whitespace,
  /// Maximal runs of alphabetic characters, everything else is a separator
  Alphabetic,
  /// Any caller-supplied tokenizer
  Custom(TokenizeFn),
}

impl Default for WordTokenizer {
  fn default() -> WordTokenizer { WordTokenizer::WordPunct }
}

impl fmt::Debug for WordTokenizer {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.name()) }
}

impl WordTokenizer {
  /// Resolve a built-in strategy by name (case-insensitive)
  pub fn from_name(name: &str) -> Result<Self, GraphError> {
    match name.trim().to_ascii_lowercase().as_str() {
      "wordpunct" => Ok(WordTokenizer::WordPunct),
      "punktword" => Ok(WordTokenizer::PunktWord),
      "whitespace" => Ok(WordTokenizer::Whitespace),
      "alphabetic" => Ok(WordTokenizer::Alphabetic),
      "" => Err(GraphError::config(
        "an empty tokenizer name was given, use a custom tokenizer function instead",
      )),
      _ => Err(GraphError::config(format!(
        "unrecognized word tokenizer {:?}, expected one of WordPunct, PunktWord, Whitespace, \
         Alphabetic",
        name
      ))),
    }
  }

  /// Wrap a custom tokenization function
  pub fn custom<F>(tokenize: F) -> Self
  where F: Fn(&str) -> Vec<String> + Send + Sync + 'static {
    WordTokenizer::Custom(Arc::new(tokenize))
  }

  /// The name this strategy is known by
  pub fn name(&self) -> &'static str {
    match self {
      WordTokenizer::WordPunct => "WordPunct",
      WordTokenizer::PunktWord => "PunktWord",
      WordTokenizer::Whitespace => "Whitespace",
      WordTokenizer::Alphabetic => "Alphabetic",
      WordTokenizer::Custom(_) => "Custom",
    }
  }

  /// Split a sentence into its ordered word tokens. The empty sentence has no tokens.
  pub fn tokenize(&self, sentence: &str) -> Vec<String> {
    match self {
      WordTokenizer::WordPunct => WORD_PUNCT
        .find_iter(sentence)
        .map(|found| found.as_str().to_string())
        .collect(),
      WordTokenizer::PunktWord => punkt_words(sentence),
      WordTokenizer::Whitespace => sentence.split_whitespace().map(str::to_string).collect(),
      WordTokenizer::Alphabetic => sentence
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect(),
      WordTokenizer::Custom(tokenize) => tokenize(sentence),
    }
  }
}

/// Whitespace chunks keep their word-internal punctuation ("isn't", "U.S"), while every
/// leading and trailing punctuation character becomes a token of its own.
fn punkt_words(sentence: &str) -> Vec<String> {
  let mut words = Vec::new();
  for chunk in sentence.split_whitespace() {
    let core_start = chunk.find(char::is_alphanumeric);
    let core_end = chunk
      .char_indices()
      .rev()
      .find(|(_, c)| c.is_alphanumeric())
      .map(|(index, c)| index + c.len_utf8());
    match (core_start, core_end) {
      (Some(start), Some(end)) => {
        words.extend(chunk[..start].chars().map(String::from));
        words.push(chunk[start..end].to_string());
        words.extend(chunk[end..].chars().map(String::from));
      },
      // pure punctuation, e.g. "--" or "..."
      _ => words.push(chunk.to_string()),
    }
  }
  words
}
