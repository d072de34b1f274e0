use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::PartitionId;

/// Hands out partition names for one run.
///
/// Counters live on the instance, so two runs with different prefixes never
/// collide even inside one process.
#[derive(Debug)]
pub struct PartitionNames {
    prefix: String,
    fresh: AtomicU64,
    merged: AtomicU64,
}

impl PartitionNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), fresh: AtomicU64::new(0), merged: AtomicU64::new(0) }
    }

    /// Name for a partition flushed by the partition builder.
    pub fn fresh(&self) -> PartitionId {
        let n = self.fresh.fetch_add(1, Ordering::Relaxed);
        self.join(format!("temp_{n}.tsv"))
    }

    /// Name for the output of one merge.
    pub fn merged(&self) -> PartitionId {
        let n = self.merged.fetch_add(1, Ordering::Relaxed);
        self.join(format!("merged_{n}.tsv"))
    }

    fn join(&self, file: String) -> PartitionId {
        if self.prefix.is_empty() {
            PartitionId::new(file)
        } else {
            PartitionId::new(format!("{}/{}", self.prefix, file))
        }
    }
}
