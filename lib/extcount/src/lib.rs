//! Exact line frequency counts over inputs larger than memory.
//!
//! The input is cut into bounded, sorted partitions on storage
//! ([`partition`]), which are then merged pairwise, level by level, into one
//! sorted result whose counts are summed across partitions ([`merge`],
//! [`reduce`]). [`Pipeline`] ties the two together.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod heap;
pub mod merge;
pub mod naming;
pub mod partition;
pub mod pipeline;
pub mod reduce;
pub mod stats;
pub mod storage;

pub use cancel::{CancelCause, CancelToken};
pub use config::Config;
pub use entry::{KeyCount, PartitionId};
pub use error::{Error, ErrorKind, Result};
pub use heap::MinHeap;
pub use merge::merge_partitions;
pub use naming::PartitionNames;
pub use partition::{build_partitions, Accumulator, BuildOutcome, PartitionBuilder};
pub use pipeline::{local_run_id, Pipeline, RunOutcome};
pub use reduce::{reduce_partitions, ReduceOutcome, Reducer};
pub use stats::RunStats;
pub use storage::{FsStorage, MemStorage, PartitionReader, PartitionWriter, Storage};
