//! Centralized environment variable names and default values for extcount runs.

// Environment variable names
pub const ENV_THRESHOLD: &str = "EXTCOUNT_THRESHOLD";
pub const ENV_WORKERS: &str = "EXTCOUNT_WORKERS";
pub const ENV_FAN_IN: &str = "EXTCOUNT_FAN_IN";
pub const ENV_WORK_DIR: &str = "EXTCOUNT_WORK_DIR";
pub const ENV_KEEP_INTERMEDIATES: &str = "EXTCOUNT_KEEP_INTERMEDIATES";
pub const ENV_TIMEOUT_SECS: &str = "EXTCOUNT_TIMEOUT_SECS";

// Defaults
/// Distinct keys held in memory before a partition is flushed.
pub const DEFAULT_THRESHOLD: usize = 100_000;
/// Partitions combined per merge; 2 gives a binary merge tree.
pub const DEFAULT_FAN_IN: usize = 2;
pub const DEFAULT_WORK_DIR: &str = ".extcount_runs";
/// Published name of the final result when none is given.
pub const DEFAULT_OUTPUT: &str = "output.tsv";

pub const READ_BUFFER_BYTES: usize = 256 * 1024; // 256 KiB
pub const WRITE_BUFFER_BYTES: usize = 1024 * 1024; // 1 MiB
