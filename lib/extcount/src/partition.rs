//! Map side: turns the input line stream into bounded, sorted, duplicate-free
//! partitions on storage.

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::entry::{render_line, PartitionId};
use crate::error::{join_release, Result};
use crate::naming::PartitionNames;
use crate::stats::BuildStats;
use crate::storage::{PartitionReader, PartitionWriter, Storage};

/// In-memory key -> count map for one batch of input.
#[derive(Debug, Default)]
pub struct Accumulator {
    counts: HashMap<Vec<u8>, u64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &[u8]) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.to_vec(), 1);
            }
        }
    }

    /// Distinct keys held.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Consumes the batch and returns its entries ascending by key.
    pub fn into_sorted(self) -> Vec<(Vec<u8>, u64)> {
        let mut entries: Vec<(Vec<u8>, u64)> = self.counts.into_iter().collect();
        // Keys are unique, so an unstable sort is deterministic here.
        entries.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[derive(Clone, Debug, Default)]
pub struct BuildOutcome {
    pub partitions: Vec<PartitionId>,
    pub stats: BuildStats,
}

pub struct PartitionBuilder<'a, S> {
    storage: &'a S,
    names: &'a PartitionNames,
    threshold: usize,
}

impl<'a, S: Storage> PartitionBuilder<'a, S> {
    /// `threshold` is the distinct-key count that triggers a flush; values
    /// below 1 behave as 1.
    pub fn new(storage: &'a S, names: &'a PartitionNames, threshold: usize) -> Self {
        Self { storage, names, threshold: threshold.max(1) }
    }

    /// Reads `input` to the end and flushes a partition every `threshold`
    /// distinct keys, plus one for any remainder.
    ///
    /// Partitions flushed before a failure or cancellation stay on storage.
    /// The input handle is closed on every path.
    pub fn build(&self, input: &str, cancel: &CancelToken) -> Result<BuildOutcome> {
        let start = Instant::now();
        let mut reader = self.storage.open_for_read(input).map_err(|e| e.in_stage("open input"))?;
        let mut stats = BuildStats::default();
        let consumed = self.consume(&mut reader, cancel, &mut stats);
        let closed = reader.close().map_err(|e| e.in_stage("close input"));
        let partitions = join_release(consumed, [closed])?;

        stats.partitions = partitions.len() as u64;
        stats.wall_ms = start.elapsed().as_millis() as u64;
        info!(
            phase = "build",
            input,
            lines_in = stats.lines_in,
            empty_lines = stats.empty_lines,
            partitions = stats.partitions,
            entries_out = stats.entries_out,
            wall_ms = stats.wall_ms,
            "Partition phase complete"
        );
        Ok(BuildOutcome { partitions, stats })
    }

    fn consume(
        &self,
        reader: &mut S::Reader,
        cancel: &CancelToken,
        stats: &mut BuildStats,
    ) -> Result<Vec<PartitionId>> {
        let mut acc = Accumulator::new();
        let mut partitions = Vec::new();

        while reader.advance().map_err(|e| e.in_stage("read input"))? {
            cancel.check().map_err(|e| e.in_stage("build partitions"))?;
            stats.lines_in += 1;
            let line = reader.current_line();
            if line.is_empty() {
                stats.empty_lines += 1;
                continue;
            }
            acc.add(line);
            if acc.len() >= self.threshold {
                let batch = std::mem::take(&mut acc);
                partitions.push(self.flush(batch, stats)?);
            }
        }
        if !acc.is_empty() {
            partitions.push(self.flush(acc, stats)?);
        }
        Ok(partitions)
    }

    fn flush(&self, acc: Accumulator, stats: &mut BuildStats) -> Result<PartitionId> {
        let id = self.names.fresh();
        let entries = acc.into_sorted();
        let stage = || format!("flush partition {id}");

        let mut writer = self.storage.create_for_write(id.as_str()).map_err(|e| e.in_stage(stage()))?;
        let mut line = Vec::new();
        let written = entries.iter().try_for_each(|(key, count)| {
            render_line(&mut line, key, *count);
            writer.write_line(&line)
        });
        let closed = writer.close();
        join_release(written, [closed]).map_err(|e| e.in_stage(stage()))?;

        stats.entries_out += entries.len() as u64;
        debug!(partition = %id, keys = entries.len(), "flushed partition");
        Ok(id)
    }
}

/// Convenience wrapper over [`PartitionBuilder::build`] returning only the
/// partition names.
pub fn build_partitions<S: Storage>(
    storage: &S,
    names: &PartitionNames,
    input: &str,
    threshold: usize,
    cancel: &CancelToken,
) -> Result<Vec<PartitionId>> {
    PartitionBuilder::new(storage, names, threshold).build(input, cancel).map(|o| o.partitions)
}
