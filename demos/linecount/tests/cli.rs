use assert_cmd::Command;
use std::fs;

#[test]
fn counts_and_publishes_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.txt"), "a\nb\na\nc\nb\na\n").unwrap();

    Command::cargo_bin("linecount")
        .unwrap()
        .current_dir(dir.path())
        .args(["-N", "2", "--workers", "2", "--stats-json", "stats.json"])
        .env_remove("EXTCOUNT_KEEP_INTERMEDIATES")
        .env_remove("EXTCOUNT_WORK_DIR")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(dir.path().join("output.tsv")).unwrap(), "a\t3\nb\t2\nc\t1\n");
    let stats = fs::read_to_string(dir.path().join("stats.json")).unwrap();
    assert!(stats.contains("\"partitions\": 3"), "{stats}");
    // Intermediates are removed by default.
    let leftovers = fs::read_dir(dir.path().join(".extcount_runs")).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn keeps_intermediates_on_request() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "x\ny\n").unwrap();

    Command::cargo_bin("linecount")
        .unwrap()
        .current_dir(dir.path())
        .args(["--input", "in.txt", "--output", "out/result.tsv", "-N", "1"])
        .args(["--work-dir", "scratch", "--keep-intermediates"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(dir.path().join("out/result.tsv")).unwrap(), "x\t1\ny\t1\n");
    let runs: Vec<_> = fs::read_dir(dir.path().join("scratch")).unwrap().collect();
    assert_eq!(runs.len(), 1);
}

#[test]
fn empty_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.txt"), "\n\n").unwrap();

    let output = Command::cargo_bin("linecount").unwrap().current_dir(dir.path()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nothing to reduce"), "{stderr}");
    assert!(!dir.path().join("output.tsv").exists());
}
