//! End-to-end tests of the `aes-bench` binary, using shell scripts in place of
//! the encryption executables.

#![cfg(unix)]

use std::{fs, os::unix::fs::PermissionsExt, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PROGRAMS: [&str; 3] = ["bench_cpu", "bench_cl", "bench_ni"];

fn aes_bench() -> Command {
  Command::cargo_bin("aes-bench").unwrap()
}

/// Stub executables that append `<program> <input> <threads>` to `calls.log`
/// and copy their input to the output path.
fn stub_bin_dir(dir: &Path) -> std::path::PathBuf {
  let bin = dir.join("bin");
  fs::create_dir(&bin).unwrap();

  for program in PROGRAMS {
    let path = bin.join(program);
    let log = dir.join("calls.log");
    fs::write(
      &path,
      format!("#!/bin/sh\necho \"{program} $(basename $1) $3\" >> {}\ncp \"$1\" \"$2\"\n", log.display()),
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  }

  bin
}

#[test]
fn renders_embedded_reference_summary() {
  aes_bench()
    .args(["render", "--output", "-"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("<?xml"))
    .stdout(predicate::str::contains("Runtime Comparison for AES-128 Encryption Implementations"))
    .stdout(predicate::str::contains(">Plain C</text>"))
    .stdout(predicate::str::contains(">AES-NI</text>"))
    .stdout(predicate::str::contains("across 10 executions"));
}

#[test]
fn render_writes_the_same_file_twice() {
  let dir = TempDir::new().unwrap();
  let (a, b) = (dir.path().join("a.svg"), dir.path().join("b.svg"));

  aes_bench().args(["render", "-n", "3", "--output"]).arg(&a).assert().success();
  aes_bench().args(["render", "-n", "3", "--output"]).arg(&b).assert().success();

  let svg = fs::read_to_string(&a).unwrap();
  assert_eq!(svg, fs::read_to_string(&b).unwrap());
  assert!(svg.contains("across 3 executions"));
}

#[test]
fn render_rejects_misaligned_summary() {
  let dir = TempDir::new().unwrap();
  let summary = dir.path().join("summary.json");
  let chart = dir.path().join("chart.svg");
  fs::write(
    &summary,
    r#"{"bench_cpu": {"1024": 1.5, "2048": 2.5}, "bench_cl": {"1024": 3.5}}"#,
  )
  .unwrap();

  aes_bench()
    .args(["render", "--summary"])
    .arg(&summary)
    .arg("--output")
    .arg(&chart)
    .assert()
    .failure()
    .stderr(predicate::str::contains("bench_cl has 1 sizes but bench_cpu has 2"));

  assert!(!chart.exists());
}

#[test]
fn render_rejects_zero_size() {
  let dir = TempDir::new().unwrap();
  let summary = dir.path().join("summary.json");
  let chart = dir.path().join("chart.svg");
  fs::write(&summary, r#"{"bench_cpu": {"0": 1.0, "1024": 2.0}}"#).unwrap();

  aes_bench()
    .args(["render", "--summary"])
    .arg(&summary)
    .arg("--output")
    .arg(&chart)
    .timeout(std::time::Duration::from_secs(30))
    .assert()
    .failure()
    .stderr(predicate::str::contains("bench_cpu has non-positive size 0"));

  assert!(!chart.exists());
}

#[test]
fn zero_threads_is_rejected_by_the_parser() {
  let dir = TempDir::new().unwrap();
  let bin = stub_bin_dir(dir.path());

  aes_bench()
    .args(["bench", "-t", "0", "--sizes", "1K", "--bin-dir"])
    .arg(&bin)
    .assert()
    .failure()
    .stderr(predicate::str::contains("--threads"));

  assert!(!dir.path().join("calls.log").exists());
}

#[test]
fn zero_iterations_fails_before_running_anything() {
  let dir = TempDir::new().unwrap();
  let bin = stub_bin_dir(dir.path());

  aes_bench()
    .args(["bench", "-n", "0", "--sizes", "1K", "--bin-dir"])
    .arg(&bin)
    .assert()
    .failure()
    .stderr(predicate::str::contains("iteration count must be at least 1"));

  assert!(!dir.path().join("calls.log").exists());
}

#[test]
fn bench_times_every_program_and_size() {
  let dir = TempDir::new().unwrap();
  let bin = stub_bin_dir(dir.path());
  let input = dir.path().join("input");
  let summary_file = dir.path().join("summary.json");

  aes_bench()
    .args(["inputs", "--sizes", "1K,2K", "--input-dir"])
    .arg(&input)
    .assert()
    .success();
  assert_eq!(fs::metadata(input.join("2K.bin")).unwrap().len(), 2048);

  let output = aes_bench()
    .args(["bench", "-n", "2", "-t", "3", "--sizes", "1K,2K", "--bin-dir"])
    .arg(&bin)
    .arg("--input-dir")
    .arg(&input)
    .arg("--output")
    .arg(&summary_file)
    .assert()
    .success()
    .stderr(predicate::str::contains("average latency (msec)"))
    .get_output()
    .stdout
    .clone();

  let stdout = String::from_utf8(output).unwrap();
  let (cpu, cl, ni) = (stdout.find("bench_cpu"), stdout.find("bench_cl"), stdout.find("bench_ni"));
  assert!(cpu < cl && cl < ni, "{stdout}");

  let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
  assert_eq!(summary.as_object().unwrap().len(), 3);
  for program in PROGRAMS {
    let sizes: Vec<_> = summary[program].as_object().unwrap().keys().cloned().collect();
    assert_eq!(sizes, ["1024", "2048"]);
    assert!(summary[program]["1024"].as_f64().unwrap() > 0.0);
  }

  let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary_file).unwrap()).unwrap();
  assert_eq!(written, summary);

  let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
  let expected: String = PROGRAMS
    .iter()
    .flat_map(|program| ["1K", "2K"].map(|label| format!("{program} {label}.bin 3\n")))
    .collect();
  assert_eq!(calls, expected.repeat(2));

  aes_bench()
    .args(["render", "--output", "-", "--summary"])
    .arg(&summary_file)
    .assert()
    .success()
    .stdout(predicate::str::contains("data-program=\"bench_ni\""));
}

#[test]
fn skip_policy_reports_failing_program() {
  let dir = TempDir::new().unwrap();
  let bin = stub_bin_dir(dir.path());
  fs::write(bin.join("bench_cl"), "#!/bin/sh\nexit 1\n").unwrap();
  let input = dir.path().join("input");

  aes_bench()
    .args(["inputs", "--sizes", "1K", "--input-dir"])
    .arg(&input)
    .assert()
    .success();

  aes_bench()
    .args(["bench", "-n", "1", "--sizes", "1K", "--on-failure", "skip", "--bin-dir"])
    .arg(&bin)
    .arg("--input-dir")
    .arg(&input)
    .assert()
    .failure()
    .stderr(predicate::str::contains("no samples for bench_cl at 1K"));
}
