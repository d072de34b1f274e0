use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::entry::PartitionId;
use crate::error::Result;
use crate::naming::PartitionNames;
use crate::partition::PartitionBuilder;
use crate::reduce::Reducer;
use crate::stats::RunStats;
use crate::storage::Storage;

#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The single, fully aggregated partition. Publishing it under a final
    /// name is left to the caller.
    pub output: PartitionId,
    pub stats: RunStats,
}

/// Build-then-reduce over one input, against one storage backend.
pub struct Pipeline<S> {
    storage: S,
    config: Config,
}

impl<S: Storage> Pipeline<S> {
    pub fn new(storage: S, config: Config) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Counts the lines of `input`. Intermediates are named under
    /// `run_prefix` and are left on storage for the caller to dispose of.
    pub fn run(&self, input: &str, run_prefix: &str, cancel: &CancelToken) -> Result<RunOutcome> {
        let start = Instant::now();
        let cancel = match self.config.timeout {
            Some(timeout) => cancel.child_with_timeout(timeout),
            None => cancel.clone(),
        };
        let names = PartitionNames::new(run_prefix);
        info!(
            input,
            run_prefix,
            threshold = self.config.effective_threshold(),
            workers = self.config.effective_workers(),
            fan_in = self.config.effective_fan_in(),
            "extcount starting"
        );

        let built = PartitionBuilder::new(&self.storage, &names, self.config.effective_threshold())
            .build(input, &cancel)
            .map_err(|e| e.in_stage("map and shuffle stage"))?;

        let reduced = Reducer::new(&self.storage, &names)
            .workers(self.config.effective_workers())
            .fan_in(self.config.effective_fan_in())
            .reduce(built.partitions, &cancel)
            .map_err(|e| e.in_stage("reduce stage"))?;

        let stats = RunStats {
            build: built.stats,
            reduce: reduced.stats,
            wall_ms: start.elapsed().as_millis() as u64,
        };
        info!(output = %reduced.output, wall_ms = stats.wall_ms, "extcount finished");
        Ok(RunOutcome { output: reduced.output, stats })
    }
}

/// A run prefix unique to this process and moment, e.g. `run-4242-1760000000`.
pub fn local_run_id() -> String {
    let ts = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    format!("run-{}-{}", std::process::id(), ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use crate::ErrorKind;

    #[test]
    fn counts_small_input() {
        let storage = MemStorage::new();
        storage.insert_lines("input.txt", ["a", "b", "a", "c", "b", "a"]);
        let pipeline = Pipeline::new(storage, Config::default().threshold(2).workers(2));
        let out = pipeline.run("input.txt", "run", &CancelToken::new()).unwrap();
        let lines = pipeline.storage().lines(out.output.as_str()).unwrap();
        assert_eq!(lines, vec![b"a\t3".to_vec(), b"b\t2".to_vec(), b"c\t1".to_vec()]);
        assert_eq!(out.stats.build.partitions, 3);
        assert_eq!(out.stats.reduce.merges, 2);
    }

    #[test]
    fn single_batch_result_is_the_fresh_partition() {
        let storage = MemStorage::new();
        storage.insert_lines("input.txt", ["test_line"]);
        let pipeline = Pipeline::new(storage, Config::default().threshold(10));
        let out = pipeline.run("input.txt", "", &CancelToken::new()).unwrap();
        assert_eq!(out.output.as_str(), "temp_0.tsv");
    }

    #[test]
    fn empty_input_fails_in_reduce_stage() {
        let storage = MemStorage::new();
        storage.insert("input.txt", "");
        let pipeline = Pipeline::new(storage, Config::default());
        let err = pipeline.run("input.txt", "run", &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert_eq!(err.to_string(), "reduce stage: nothing to reduce");
    }

    #[test]
    fn missing_input_fails_in_map_stage() {
        let pipeline = Pipeline::new(MemStorage::new(), Config::default());
        let err = pipeline.run("input.txt", "run", &CancelToken::new()).unwrap_err();
        assert!(err.to_string().starts_with("map and shuffle stage: open input"), "{err}");
    }

    #[test]
    fn run_ids_carry_pid() {
        assert!(local_run_id().starts_with(&format!("run-{}-", std::process::id())));
    }
}
