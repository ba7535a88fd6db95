//! Integration tests for the profgantt binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SAMPLE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/src/trace/testdata/profile_threads.dat"
);

fn profgantt(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_profgantt"))
        .current_dir(dir)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run profgantt")
}

fn write_trace(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("profile_threads.dat");
    std::fs::write(&path, content).unwrap();
    path
}

/// Test that the binary reports on the sample profile and writes a waveform.
#[test]
fn test_sample_report_and_waveform() {
    let dir = tempfile::tempdir().unwrap();
    let output = profgantt(dir.path(), &[SAMPLE, "--cpuinfo", "/nonexistent/cpuinfo"]);

    assert!(output.status.success(), "profgantt should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("THREAD GANTT REPORT"), "Should have header");
    assert!(stdout.contains("  --threads 4\n"), "Should echo arguments");
    assert!(stdout.contains("  t0 "), "Should draw thread 0");
    assert!(stdout.contains("  t3 "), "Should draw thread 3");
    assert!(stdout.contains("  Total threads             = 4\n"));
    assert!(stdout.contains("  Total tasks               = 16\n"));
    assert!(stdout.contains("  Total yields              = 17\n"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Wrote waveform to profile_threads.vcd"));

    let waveform = std::fs::read_to_string(dir.path().join("profile_threads.vcd")).unwrap();
    assert!(waveform.starts_with("$version Generated by profgantt $end\n"));
    assert!(waveform.contains("cpu9_thread"));
    assert!(waveform.contains("parallelism"));
}

/// Test that the binary defaults to `profile_threads.dat` in the working directory.
#[test]
fn test_default_input_file() {
    let dir = tempfile::tempdir().unwrap();
    write_trace(
        dir.path(),
        "VLPROF mtask 1 start 0 end 10 elapsed 10 predict_time 10 cpu 0 on thread 0\n",
    );

    let output = profgantt(dir.path(), &["--no-vcd"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  t0 [0--------]"), "{stdout}");
}

/// Test that a missing input fails with the path in the message.
#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = profgantt(dir.path(), &["/nonexistent/profile_threads.dat"]);

    assert!(!output.status.success(), "Should fail with missing file");
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot read trace file /nonexistent/profile_threads.dat"),
        "{stderr}"
    );
    assert!(!dir.path().join("profile_threads.vcd").exists());
}

/// Test that a backwards interval aborts with its line number.
#[test]
fn test_backwards_interval_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_trace(
        dir.path(),
        "VLPROF arg --threads 1\n\
         VLPROF mtask 1 start 50 end 20 elapsed 0 predict_time 5 cpu 0 on thread 0\n",
    );

    let output = profgantt(dir.path(), &[input.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("line 2: interval ends at 20 before it starts at 50"),
        "{stderr}"
    );
}

/// Test that an empty profile still renders a report and a header-only waveform.
#[test]
fn test_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_trace(dir.path(), "");

    let output = profgantt(dir.path(), &[input.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  (no intervals)\n"));
    assert!(stdout.contains("  Total threads             = 0\n"));
    assert!(stdout.contains("  All-thread speedup        = 0.00\n"));

    let waveform = std::fs::read_to_string(dir.path().join("profile_threads.vcd")).unwrap();
    assert!(waveform.ends_with("$enddefinitions $end\n"));
}

/// Test that `--no-vcd` skips the waveform and `--vcd` redirects it.
#[test]
fn test_waveform_flags() {
    let dir = tempfile::tempdir().unwrap();

    let output = profgantt(dir.path(), &[SAMPLE, "--no-vcd"]);
    assert!(output.status.success());
    assert!(!dir.path().join("profile_threads.vcd").exists());

    let output = profgantt(dir.path(), &[SAMPLE, "--vcd", "custom.vcd"]);
    assert!(output.status.success());
    assert!(dir.path().join("custom.vcd").exists());
    assert!(!dir.path().join("profile_threads.vcd").exists());
}

/// Test that an explicit scale is used as-is.
#[test]
fn test_explicit_scale() {
    let dir = tempfile::tempdir().unwrap();
    let output = profgantt(dir.path(), &[SAMPLE, "--no-vcd", "--scale", "500"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("one character width = 500 time units"));
}

/// Test that unrecognized lines are echoed only under `--debug`.
#[test]
fn test_debug_echoes_unrecognized_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_trace(
        dir.path(),
        "VLPROF mtask 1 start 0 end 10 elapsed 10 predict_time 10 cpu 0 on thread 0\n\
         garbage from the simulator\n",
    );
    let input = input.to_str().unwrap();

    let quiet = profgantt(dir.path(), &[input, "--no-vcd"]);
    assert!(quiet.status.success());
    let stderr = String::from_utf8_lossy(&quiet.stderr);
    assert!(!stderr.contains("garbage"));
    assert!(stderr.contains("Skipped 1 unrecognized lines"), "{stderr}");

    let debug = profgantt(dir.path(), &[input, "--no-vcd", "--debug"]);
    assert!(debug.status.success());
    let stderr = String::from_utf8_lossy(&debug.stderr);
    assert!(
        stderr.contains("Unrecognized line 2: garbage from the simulator"),
        "{stderr}"
    );
}

/// Test that scheduling warnings are part of the report on stdout.
#[test]
fn test_warnings_in_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_trace(
        dir.path(),
        "VLPROF mtask 1 start 0 end 10 elapsed 10 predict_time 10 cpu 0 on thread 0\n\
         VLPROF mtask 2 start 0 end 10 elapsed 10 predict_time 10 cpu 0 on thread 1\n",
    );

    let output = profgantt(
        dir.path(),
        &[input.to_str().unwrap(), "--no-vcd", "--cpuinfo", "/nonexistent/cpuinfo"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\nWARNINGS\n"), "{stdout}");
    assert!(stdout.contains("fewer CPUs (1) than threads (2)"), "{stdout}");
}

/// Test that an unknown label policy is rejected by argument parsing.
#[test]
fn test_bad_label_policy() {
    let dir = tempfile::tempdir().unwrap();
    let output = profgantt(dir.path(), &[SAMPLE, "--label-policy", "wrap"]);

    assert!(!output.status.success());
    assert!(!dir.path().join("profile_threads.vcd").exists());
}
