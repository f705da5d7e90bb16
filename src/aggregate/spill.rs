//! Phase C accumulation with a bounded memory footprint
//!
//! Weights are summed in a hash map until it holds more than `max_pairs_in_memory` pairs. The
//! map is then sorted by pair and written out as a run file. When accumulation is done, all runs
//! and the in-memory remainder are K-way merged, summing the weights of equal pairs on the fly.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::vec::IntoIter;

use tracing::debug;

use crate::error::GraphError;

use super::graph::GlobalEdge;

type Record = (u32, u32, u64);

/// Sums edge weights, spilling sorted partial sums to disk when the in-memory map grows too big
#[derive(Debug)]
pub struct EdgeAccumulator {
  pairs: HashMap<(u32, u32), u64>,
  max_pairs_in_memory: usize,
  spill_dir: PathBuf,
  runs: Vec<PathBuf>,
}

impl EdgeAccumulator {
  /// Accumulator spilling into `spill_dir` once more than `max_pairs_in_memory` pairs are held
  pub fn new<P: Into<PathBuf>>(spill_dir: P, max_pairs_in_memory: usize) -> Self {
    EdgeAccumulator {
      pairs: HashMap::new(),
      max_pairs_in_memory: max_pairs_in_memory.max(1),
      spill_dir: spill_dir.into(),
      runs: Vec::new(),
    }
  }

  /// Add `weight` to the undirected pair `{a, b}`
  pub fn add(&mut self, a: u32, b: u32, weight: u64) -> Result<(), GraphError> {
    let pair = if a < b { (a, b) } else { (b, a) };
    *self.pairs.entry(pair).or_insert(0) += weight;
    if self.pairs.len() > self.max_pairs_in_memory {
      self.spill()?;
    }
    Ok(())
  }

  /// Number of run files written so far
  pub fn spilled_runs(&self) -> usize { self.runs.len() }

  fn drain_sorted(&mut self) -> Vec<Record> {
    let mut records: Vec<Record> = self.pairs.drain().map(|((a, b), w)| (a, b, w)).collect();
    records.sort_unstable();
    records
  }

  fn spill(&mut self) -> Result<(), GraphError> {
    fs::create_dir_all(&self.spill_dir)?;
    let path = self.spill_dir.join(format!("run_{:05}.bin", self.runs.len()));
    let records = self.drain_sorted();
    let mut writer = BufWriter::new(File::create(&path)?);
    // registered before writing, so a half-written run is cleaned up as well
    self.runs.push(path.clone());
    bincode::serialize_into(&mut writer, &(records.len() as u64))?;
    for record in &records {
      bincode::serialize_into(&mut writer, record)?;
    }
    writer.flush()?;
    debug!("spilled {} pairs to {:?}", records.len(), path);
    Ok(())
  }

  /// Merge everything accumulated, handing each edge to `sink` in ascending `(a, b)` order.
  /// Run files are removed afterwards.
  pub fn finish<F>(mut self, mut sink: F) -> Result<(), GraphError>
  where F: FnMut(GlobalEdge) -> Result<(), GraphError> {
    let in_memory = self.drain_sorted();
    let mut sources: Vec<MergeSource> = Vec::with_capacity(self.runs.len() + 1);
    for path in &self.runs {
      sources.push(MergeSource::Run(RunReader::open(path.clone())?));
    }
    sources.push(MergeSource::Memory(in_memory.into_iter()));

    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (index, source) in sources.iter_mut().enumerate() {
      if let Some((a, b, w)) = source.next_record()? {
        heap.push(Reverse((a, b, w, index)));
      }
    }

    let mut current: Option<Record> = None;
    while let Some(Reverse((a, b, w, index))) = heap.pop() {
      if let Some((next_a, next_b, next_w)) = sources[index].next_record()? {
        heap.push(Reverse((next_a, next_b, next_w, index)));
      }
      let same_pair = matches!(current, Some((ca, cb, _)) if ca == a && cb == b);
      if same_pair {
        if let Some(edge) = current.as_mut() {
          edge.2 += w;
        }
      } else if let Some((source, target, weight)) = current.replace((a, b, w)) {
        sink(GlobalEdge {
          source,
          target,
          weight,
        })?;
      }
    }
    if let Some((source, target, weight)) = current {
      sink(GlobalEdge {
        source,
        target,
        weight,
      })?;
    }

    drop(sources);
    while let Some(path) = self.runs.pop() {
      fs::remove_file(path)?;
    }
    // only succeeds when nothing else lives there
    let _ = fs::remove_dir(&self.spill_dir);
    Ok(())
  }
}

impl Drop for EdgeAccumulator {
  /// Runs left behind by an aggregation that never finished
  fn drop(&mut self) {
    if self.runs.is_empty() {
      return;
    }
    for path in self.runs.drain(..) {
      let _ = fs::remove_file(path);
    }
    let _ = fs::remove_dir(&self.spill_dir);
  }
}

/// A sorted run file, streamed back record by record
struct RunReader {
  path: PathBuf,
  reader: BufReader<File>,
  remaining: u64,
}

impl RunReader {
  fn open(path: PathBuf) -> Result<Self, GraphError> {
    let mut reader = BufReader::new(File::open(&path)?);
    let remaining: u64 = bincode::deserialize_from(&mut reader)?;
    Ok(RunReader {
      path,
      reader,
      remaining,
    })
  }

  fn next_record(&mut self) -> Result<Option<Record>, GraphError> {
    if self.remaining == 0 {
      return Ok(None);
    }
    self.remaining -= 1;
    let record: Record = bincode::deserialize_from(&mut self.reader)
      .map_err(|e| GraphError::aggregation(&self.path, e))?;
    Ok(Some(record))
  }
}

enum MergeSource {
  Run(RunReader),
  Memory(IntoIter<Record>),
}

impl MergeSource {
  fn next_record(&mut self) -> Result<Option<Record>, GraphError> {
    match self {
      MergeSource::Run(run) => run.next_record(),
      MergeSource::Memory(records) => Ok(records.next()),
    }
  }
}
