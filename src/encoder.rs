//! Stage 1: re-express every sentence of a file as a sequence of local dictionary ids
use std::path::Path;

use tracing::debug;

use crate::corpus::CorpusReader;
use crate::dictionary::LocalDictionary;
use crate::error::GraphError;
use crate::normalizer::WordNormalizer;
use crate::tokenizer::WordTokenizer;

/// The local dictionary of one file, together with its id-encoded sentences
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFile {
  /// token <-> local id, with occurrence counts
  pub dictionary: LocalDictionary,
  /// one entry per sentence that kept at least one token
  pub sentences: Vec<Vec<u32>>,
}

impl EncodedFile {
  /// Total number of encoded tokens
  pub fn token_count(&self) -> usize { self.sentences.iter().map(Vec::len).sum() }
}

/// Tokenizes and normalizes sentences, building a fresh local dictionary for every file
#[derive(Debug, Clone, Default)]
pub struct VocabularyEncoder {
  /// word tokenizer
  pub tokenizer: WordTokenizer,
  /// word normalizer, run once per token
  pub normalizer: WordNormalizer,
}

impl VocabularyEncoder {
  /// Create an encoder from a tokenizer and a normalizer
  pub fn new(tokenizer: WordTokenizer, normalizer: WordNormalizer) -> Self {
    VocabularyEncoder {
      tokenizer,
      normalizer,
    }
  }

  /// Encode one sentence into `dictionary`, returning its ids. Words normalized away are dropped.
  pub fn encode_sentence(&self, sentence: &str, dictionary: &mut LocalDictionary) -> Vec<u32> {
    self
      .tokenizer
      .tokenize(sentence)
      .iter()
      .filter_map(|word| {
        let token = self.normalizer.apply(word);
        if token.is_empty() {
          None
        } else {
          Some(dictionary.insert(&token))
        }
      })
      .collect()
  }

  /// Encode an in-memory sequence of sentences as if it were one file
  pub fn encode_sentences<I, S>(&self, sentences: I) -> EncodedFile
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut encoded = EncodedFile::default();
    for sentence in sentences {
      let ids = self.encode_sentence(sentence.as_ref(), &mut encoded.dictionary);
      if !ids.is_empty() {
        encoded.sentences.push(ids);
      }
    }
    encoded
  }

  /// Read `path` through `reader` and encode all of its sentences
  pub fn encode_file(&self, reader: &CorpusReader, path: &Path) -> Result<EncodedFile, GraphError> {
    let mut encoded = EncodedFile::default();
    for sentence in reader.sentences(path)? {
      let sentence = sentence.map_err(|e| GraphError::file(path, e))?;
      let ids = self.encode_sentence(&sentence, &mut encoded.dictionary);
      if !ids.is_empty() {
        encoded.sentences.push(ids);
      }
    }
    debug!(
      "encoded {:?}: {} sentences, {} distinct tokens",
      path,
      encoded.sentences.len(),
      encoded.dictionary.len()
    );
    Ok(encoded)
  }
}
