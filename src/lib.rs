//! # corpus_graph
//! Weighted word co-occurrence graphs from large, file-split text corpora.
//!
//! Three stages, the first two parallel over corpus files:
//! 1. `encoder`: tokenize and normalize every sentence, re-expressing it in local dictionary ids
//! 2. `window`: count the unordered id pairs co-occurring within a bounded window
//! 3. `aggregate`: merge the local dictionaries, prune the vocabulary, remap all pair counts to
//!    global ids and sum them into the final graph
//!
//! `pipeline::Pipeline` runs the stages on a fixed-size worker pool, handing artifacts between
//! them through the files laid out by `artifacts::ArtifactLayout`.

#![deny(
  missing_docs,
  trivial_casts,
  trivial_numeric_casts,
  unused_import_braces
)]

pub mod aggregate;
pub mod artifacts;
pub mod config;
pub mod corpus;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod tokenizer;
pub mod util;
pub mod window;

pub use crate::config::GraphConfig;
pub use crate::error::GraphError;
pub use crate::pipeline::{BatchReport, Pipeline, Stage};
