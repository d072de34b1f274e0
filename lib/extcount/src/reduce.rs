//! Reduce side: a merge tree over the partition list, one level at a time,
//! with each level's merges served by a bounded pool of worker threads.

use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use tracing::{debug, info, warn};

use crate::cancel::{CancelCause, CancelToken};
use crate::config::worker_count;
use crate::entry::PartitionId;
use crate::error::{Error, Result};
use crate::merge::merge_partitions;
use crate::naming::PartitionNames;
use crate::stats::{LevelStats, MergeStats, ReduceStats};
use crate::storage::Storage;

#[derive(Clone, Debug)]
pub struct ReduceOutcome {
    pub output: PartitionId,
    pub stats: ReduceStats,
}

/// One merge scheduled within a level. `slot` is its position in the next
/// level's partition list.
#[derive(Debug)]
struct MergeTask {
    slot: usize,
    inputs: Vec<PartitionId>,
    output: PartitionId,
}

pub struct Reducer<'a, S> {
    storage: &'a S,
    names: &'a PartitionNames,
    workers: usize,
    fan_in: usize,
}

impl<'a, S: Storage> Reducer<'a, S> {
    pub fn new(storage: &'a S, names: &'a PartitionNames) -> Self {
        Self { storage, names, workers: 1, fan_in: 2 }
    }

    /// Upper bound on concurrent merges within a level; 0 means one per CPU.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = worker_count(workers);
        self
    }

    /// Partitions combined per merge (at least 2).
    pub fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in.max(2);
        self
    }

    /// Merges `partitions` level by level until one remains.
    ///
    /// Adjacent groups of `fan_in` partitions are merged; a short trailing
    /// group of one passes through to the next level unmerged. A single input
    /// partition is returned as-is. Cancellation is checked before each level
    /// and before each merge starts; merges already running are allowed to
    /// finish.
    pub fn reduce(&self, partitions: Vec<PartitionId>, cancel: &CancelToken) -> Result<ReduceOutcome> {
        if partitions.is_empty() {
            return Err(Error::EmptyInput);
        }
        let start = Instant::now();
        let mut stats = ReduceStats::default();
        let mut current = partitions;
        let mut level = 0u64;

        while current.len() > 1 {
            let stage = || format!("reduce level {level}");
            cancel.check().map_err(|e| e.in_stage(stage()))?;
            let (next, level_stats) = self
                .run_level(level, current, cancel)
                .map_err(|e| e.in_stage(stage()))?;
            info!(
                phase = "reduce_level",
                level,
                partitions_in = level_stats.partitions_in,
                merges = level_stats.merges,
                passed_through = level_stats.passed_through,
                entries_in = level_stats.entries_in,
                entries_out = level_stats.entries_out,
                min_merge_ms = level_stats.min_merge_ms,
                max_merge_ms = level_stats.max_merge_ms,
                wall_ms = level_stats.wall_ms,
                "Reduce level complete"
            );
            stats.merges += level_stats.merges;
            stats.levels.push(level_stats);
            current = next;
            level += 1;
        }

        stats.wall_ms = start.elapsed().as_millis() as u64;
        let output = current.pop().ok_or(Error::EmptyInput)?;
        info!(
            phase = "reduce",
            levels = stats.levels.len(),
            merges = stats.merges,
            output = %output,
            wall_ms = stats.wall_ms,
            "Reduce phase complete"
        );
        Ok(ReduceOutcome { output, stats })
    }

    fn run_level(
        &self,
        level: u64,
        current: Vec<PartitionId>,
        cancel: &CancelToken,
    ) -> Result<(Vec<PartitionId>, LevelStats)> {
        let level_start = Instant::now();
        let mut level_stats = LevelStats {
            level,
            partitions_in: current.len() as u64,
            ..Default::default()
        };

        let mut slots: Vec<Option<PartitionId>> = Vec::with_capacity(current.len().div_ceil(self.fan_in));
        let mut tasks = Vec::new();
        for group in current.chunks(self.fan_in) {
            let slot = slots.len();
            if let [single] = group {
                slots.push(Some(single.clone()));
                level_stats.passed_through += 1;
            } else {
                slots.push(None);
                tasks.push(MergeTask { slot, inputs: group.to_vec(), output: self.names.merged() });
            }
        }

        let results = self.run_tasks(tasks, cancel)?;
        for (slot, output, merge_stats) in results {
            level_stats.record_merge(&merge_stats);
            slots[slot] = Some(output);
        }

        // Every slot is filled unless a worker stopped early on cancellation.
        let next: Option<Vec<PartitionId>> = slots.into_iter().collect();
        let next = match next {
            Some(next) => next,
            None => {
                cancel.check()?;
                return Err(Error::Cancelled { cause: CancelCause::Requested });
            }
        };
        level_stats.wall_ms = level_start.elapsed().as_millis() as u64;
        Ok((next, level_stats))
    }

    /// Runs `tasks` on at most `self.workers` threads. The first failure
    /// cancels the level so idle workers stop picking up merges; merges in
    /// flight run to completion. Returns the first error observed.
    fn run_tasks(
        &self,
        tasks: Vec<MergeTask>,
        cancel: &CancelToken,
    ) -> Result<Vec<(usize, PartitionId, MergeStats)>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let num_workers = self.workers.min(tasks.len());
        let level_cancel = cancel.child();

        let (task_tx, task_rx) = channel::bounded::<MergeTask>(tasks.len());
        for task in tasks {
            // Capacity covers every task and the receiver is alive.
            let _ = task_tx.send(task);
        }
        drop(task_tx);
        let (result_tx, result_rx) = channel::unbounded::<(MergeTask, Result<MergeStats>)>();

        let storage = self.storage;
        let mut done = Vec::new();
        let mut first_error: Option<Error> = None;

        thread::scope(|s| {
            let handles: Vec<_> = (0..num_workers)
                .map(|worker| {
                    let task_rx = task_rx.clone();
                    let result_tx = result_tx.clone();
                    let level_cancel = level_cancel.clone();
                    s.spawn(move || {
                        for task in task_rx.iter() {
                            if level_cancel.is_cancelled() {
                                break;
                            }
                            debug!(worker, output = %task.output, inputs = task.inputs.len(), "merge starting");
                            let result = merge_partitions(storage, &task.inputs, &task.output)
                                .map_err(|e| e.in_stage(format!("merge into {}", task.output)));
                            let failed = result.is_err();
                            if result_tx.send((task, result)).is_err() || failed {
                                level_cancel.cancel();
                                break;
                            }
                        }
                    })
                })
                .collect();
            drop(result_tx);

            for (task, result) in result_rx.iter() {
                match result {
                    Ok(stats) => done.push((task.slot, task.output, stats)),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        } else {
                            warn!(output = %task.output, error = %e, "additional merge failure in level");
                        }
                    }
                }
            }

            for handle in handles {
                if let Err(panic) = handle.join() {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    first_error.get_or_insert(Error::WorkerPanicked(msg));
                }
            }
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(done),
        }
    }
}

/// Convenience wrapper over [`Reducer::reduce`] returning only the final partition.
pub fn reduce_partitions<S: Storage>(
    storage: &S,
    names: &PartitionNames,
    partitions: Vec<PartitionId>,
    workers: usize,
    cancel: &CancelToken,
) -> Result<PartitionId> {
    Reducer::new(storage, names).workers(workers).reduce(partitions, cancel).map(|o| o.output)
}
