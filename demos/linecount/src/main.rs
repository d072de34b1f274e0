use anyhow::{Context, Result};
use clap::Parser;
use extcount::constants::DEFAULT_OUTPUT;
use extcount::{local_run_id, CancelToken, Config, FsStorage, Pipeline};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Counts how often each distinct line occurs in a file, using bounded memory.
#[derive(Parser, Debug)]
struct Args {
    /// Input file, one key per line
    #[arg(long, default_value = "input.txt")]
    input: String,
    /// Where the sorted `key<TAB>count` result is published
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Distinct keys held in memory before a partition is flushed
    #[arg(short = 'N', long)]
    threshold: Option<usize>,
    /// Concurrent merges per reduction level (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,
    /// Partitions combined by one merge
    #[arg(long)]
    fan_in: Option<usize>,
    /// Directory for intermediate partitions
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// Leave intermediate partitions on disk
    #[arg(long)]
    keep_intermediates: bool,
    /// Abort the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(n) = self.threshold {
            config = config.threshold(n);
        }
        if let Some(n) = self.workers {
            config = config.workers(n);
        }
        if let Some(n) = self.fan_in {
            config = config.fan_in(n);
        }
        if let Some(dir) = &self.work_dir {
            config = config.work_dir(dir);
        }
        if self.keep_intermediates {
            config = config.keep_intermediates(true);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout(Some(Duration::from_secs(secs)));
        }
        config
    }
}

/// Moves the result into place, copying when a rename cannot cross filesystems.
fn publish(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all {}", parent.display()))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();
    let config = args.config();

    let storage = FsStorage::new(".");
    let run_prefix = config.work_dir.join(local_run_id()).to_string_lossy().into_owned();
    let keep_intermediates = config.keep_intermediates;
    let pipeline = Pipeline::new(storage, config);

    let result = pipeline
        .run(&args.input, &run_prefix, &CancelToken::new())
        .context("line count failed")
        .and_then(|out| {
            let from = pipeline.storage().path(out.output.as_str());
            publish(&from, &args.output)?;
            info!(output = %args.output.display(), "published result");
            if let Some(path) = &args.stats_json {
                let json = out.stats.to_json_pretty().context("serialize stats")?;
                fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            }
            Ok(())
        });

    if !keep_intermediates {
        if let Err(e) = pipeline.storage().remove_dir(&run_prefix) {
            error!("cleanup {}: {}", run_prefix, e);
        }
    }
    result
}
