use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;

/// Tunables for one run. `Default` gives the built-in defaults;
/// [`Config::from_env`] layers `EXTCOUNT_*` overrides on top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Distinct keys accumulated before a partition is flushed.
    pub threshold: usize,
    /// Concurrent merges per reduction level.
    pub workers: usize,
    /// Partitions combined by one merge.
    pub fan_in: usize,
    pub work_dir: PathBuf,
    pub keep_intermediates: bool,
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            workers: num_cpus::get(),
            fan_in: DEFAULT_FAN_IN,
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            keep_intermediates: false,
            timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Applies any `EXTCOUNT_*` variables that are set and parse; others are ignored.
    pub fn with_env(mut self) -> Self {
        if let Some(n) = env_parse::<usize>(ENV_THRESHOLD) {
            self.threshold = n;
        }
        if let Some(n) = env_parse::<usize>(ENV_WORKERS) {
            self.workers = n;
        }
        if let Some(n) = env_parse::<usize>(ENV_FAN_IN) {
            self.fan_in = n;
        }
        if let Ok(dir) = std::env::var(ENV_WORK_DIR) {
            self.work_dir = PathBuf::from(dir);
        }
        if std::env::var_os(ENV_KEEP_INTERMEDIATES).is_some() {
            self.keep_intermediates = env_var_truthy(ENV_KEEP_INTERMEDIATES);
        }
        if let Some(secs) = env_parse::<u64>(ENV_TIMEOUT_SECS) {
            self.timeout = Some(Duration::from_secs(secs));
        }
        self
    }

    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Threshold below 1 degrades to one partition per distinct line.
    pub fn effective_threshold(&self) -> usize {
        self.threshold.max(1)
    }

    /// `workers == 0` means one per CPU.
    pub fn effective_workers(&self) -> usize {
        worker_count(self.workers)
    }

    /// Merges need at least two inputs to make progress.
    pub fn effective_fan_in(&self) -> usize {
        self.fan_in.max(2)
    }
}

/// Resolves a requested worker count; 0 means one per available CPU.
pub fn worker_count(requested: usize) -> usize {
    if requested == 0 { num_cpus::get().max(1) } else { requested }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

pub fn env_var_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_values_clamp() {
        let c = Config::default().threshold(0).workers(0).fan_in(1);
        assert_eq!(c.effective_threshold(), 1);
        assert!(c.effective_workers() >= 1);
        assert_eq!(c.effective_fan_in(), 2);
    }

    #[test]
    fn zero_workers_resolves_to_cpu_count() {
        assert_eq!(worker_count(0), num_cpus::get().max(1));
        assert_eq!(worker_count(3), 3);
        assert_eq!(Config::default().workers(0).effective_workers(), worker_count(0));
    }

    #[test]
    fn env_overrides_apply() {
        // Only this test touches these variables.
        std::env::set_var(ENV_THRESHOLD, "17");
        std::env::set_var(ENV_FAN_IN, "4");
        std::env::set_var(ENV_KEEP_INTERMEDIATES, "Yes");
        std::env::set_var(ENV_WORKERS, "not-a-number");
        let c = Config::default().workers(3).with_env();
        std::env::remove_var(ENV_THRESHOLD);
        std::env::remove_var(ENV_FAN_IN);
        std::env::remove_var(ENV_KEEP_INTERMEDIATES);
        std::env::remove_var(ENV_WORKERS);

        assert_eq!(c.threshold, 17);
        assert_eq!(c.fan_in, 4);
        assert!(c.keep_intermediates);
        assert_eq!(c.workers, 3);
    }
}
