use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use extcount::{
    build_partitions, CancelToken, Config, ErrorKind, FsStorage, MemStorage, PartitionNames, PartitionReader, Pipeline,
    Result, Storage,
};

fn read_counts(path: &std::path::Path) -> BTreeMap<String, u64> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| {
            let (k, c) = l.rsplit_once('\t').unwrap();
            (k.to_string(), c.parse().unwrap())
        })
        .collect()
}

#[test]
fn scenario_from_six_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.txt"), "a\nb\na\nc\nb\na\n").unwrap();
    let pipeline = Pipeline::new(FsStorage::new(dir.path()), Config::default().threshold(2).workers(2));
    let out = pipeline.run("input.txt", "run-1", &CancelToken::new()).unwrap();

    let text = fs::read_to_string(pipeline.storage().path(out.output.as_str())).unwrap();
    assert_eq!(text, "a\t3\nb\t2\nc\t1\n");
    // Intermediates are left in place for the caller.
    assert!(dir.path().join("run-1/temp_0.tsv").exists());
}

#[test]
fn result_is_independent_of_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = String::new();
    for i in 0..500u32 {
        input.push_str(&format!("key-{}\n", (i * 7919) % 37));
        if i % 11 == 0 {
            input.push('\n');
        }
    }
    fs::write(dir.path().join("input.txt"), &input).unwrap();

    let mut results = Vec::new();
    for (threshold, fan_in) in [(1, 2), (2, 2), (5, 3), (1000, 2)] {
        let pipeline = Pipeline::new(
            FsStorage::new(dir.path()),
            Config::default().threshold(threshold).fan_in(fan_in).workers(3),
        );
        let out = pipeline.run("input.txt", &format!("run-t{threshold}"), &CancelToken::new()).unwrap();
        let counts = read_counts(&pipeline.storage().path(out.output.as_str()));
        assert_eq!(counts.values().sum::<u64>(), 500);
        results.push(counts);
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].len(), 37);
}

#[test]
fn crlf_input_counts_like_lf() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.txt"), "x\r\ny\r\nx").unwrap();
    let pipeline = Pipeline::new(FsStorage::new(dir.path()), Config::default().threshold(1));
    let out = pipeline.run("input.txt", "run", &CancelToken::new()).unwrap();
    let counts = read_counts(&pipeline.storage().path(out.output.as_str()));
    assert_eq!(counts, BTreeMap::from([("x".to_string(), 2), ("y".to_string(), 1)]));
}

#[test]
fn concurrent_runs_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.txt"), "p\nq\np\nr\ns\np\n").unwrap();
    let storage = FsStorage::new(dir.path());
    std::thread::scope(|s| {
        for run in 0..4 {
            let storage = storage.clone();
            s.spawn(move || {
                let pipeline = Pipeline::new(storage, Config::default().threshold(1).workers(2));
                let out = pipeline.run("input.txt", &format!("run-{run}"), &CancelToken::new()).unwrap();
                let counts = read_counts(&pipeline.storage().path(out.output.as_str()));
                assert_eq!(counts["p"], 3);
                assert_eq!(counts.len(), 4);
            });
        }
    });
}

#[test]
fn elapsed_timeout_cancels_run() {
    let storage = MemStorage::new();
    storage.insert_lines("in", ["a", "b"]);
    let pipeline = Pipeline::new(storage, Config::default().timeout(Some(std::time::Duration::ZERO)));
    let err = pipeline.run("in", "run", &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(err.to_string().contains("deadline exceeded"), "{err}");
}

/// Storage whose input reader raises cancellation once the first line has
/// been handed out.
struct CancelAfterFirstLine {
    inner: MemStorage,
    cancel: CancelToken,
}

struct CancellingReader {
    inner: <MemStorage as Storage>::Reader,
    cancel: CancelToken,
    advances: Arc<AtomicUsize>,
}

impl PartitionReader for CancellingReader {
    fn advance(&mut self) -> Result<bool> {
        if self.advances.fetch_add(1, Ordering::SeqCst) == 1 {
            self.cancel.cancel();
        }
        self.inner.advance()
    }

    fn current_line(&self) -> &[u8] {
        self.inner.current_line()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn line_no(&self) -> u64 {
        self.inner.line_no()
    }

    fn close(self) -> Result<()> {
        self.inner.close()
    }
}

impl Storage for CancelAfterFirstLine {
    type Reader = CancellingReader;
    type Writer = <MemStorage as Storage>::Writer;

    fn open_for_read(&self, name: &str) -> Result<Self::Reader> {
        Ok(CancellingReader {
            inner: self.inner.open_for_read(name)?,
            cancel: self.cancel.clone(),
            advances: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn create_for_write(&self, name: &str) -> Result<Self::Writer> {
        self.inner.create_for_write(name)
    }
}

#[test]
fn cancellation_before_second_line() {
    let inner = MemStorage::new();
    inner.insert_lines("in", ["a", "b", "c"]);
    let cancel = CancelToken::new();
    let storage = CancelAfterFirstLine { inner: inner.clone(), cancel: cancel.clone() };
    let names = PartitionNames::new("run");

    let err = build_partitions(&storage, &names, "in", 10, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(inner.open_count("in"), 1);
    assert_eq!(inner.close_count("in"), 1);
    // Nothing reached the flush threshold, so nothing was written.
    assert_eq!(inner.names(), ["in"]);
}
