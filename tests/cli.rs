#![cfg(unix)]

use std::{
    error::Error,
    fs::Permissions,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::{TempDir, tempdir};

fn write_engine(dir: &Path, name: &str, script: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n"))?;
    std::fs::set_permissions(&path, Permissions::from_mode(0o755))?;
    Ok(path)
}

/// An empty config file, so the user's own config never leaks into a test.
fn empty_config(dir: &TempDir) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "")?;
    Ok(path)
}

#[test]
fn test_bench_command_reports_and_writes_outputs() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    let binaries = temp_dir.path().join("Binaries");
    std::fs::create_dir(&binaries)?;
    write_engine(
        &binaries,
        "Fixture",
        r#"echo "Bench: 12345 nodes 600000 nps""#,
    )?;
    let output_dir = temp_dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("benchnps");
    cmd.arg("--config")
        .arg(empty_config(&temp_dir)?)
        .arg("bench")
        .arg("--binaries-dir")
        .arg(&binaries)
        .arg("--threads")
        .arg("2")
        .arg("--sets")
        .arg("2")
        .arg("--output")
        .arg(&output_dir);

    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "Command should succeed. Stdout: {stdout} Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Fixture         | 600000"), "{stdout}");

    for file in ["results.csv", "results.json", "results.md"] {
        assert!(
            output_dir.join(file).exists(),
            "{file} should have been created in the output directory"
        );
    }

    Ok(())
}

#[test]
fn test_bench_requires_threads_and_sets() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    write_engine(temp_dir.path(), "Fixture", r#"echo "1 nodes 1 nps""#)?;

    let mut cmd = cargo_bin_cmd!("benchnps");
    cmd.env_remove("BENCHNPS_BENCH__THREADS")
        .env_remove("BENCHNPS_BENCH__SETS")
        .arg("--config")
        .arg(empty_config(&temp_dir)?)
        .arg("bench")
        .arg("--binaries-dir")
        .arg(temp_dir.path())
        .arg("--sets")
        .arg("1");

    let output = cmd.output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("bench.threads"));

    Ok(())
}

#[test]
fn test_failing_engine_does_not_stop_the_others() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    let binaries = temp_dir.path().join("Binaries");
    std::fs::create_dir(&binaries)?;

    let flag = temp_dir.path().join("flip");
    write_engine(
        &binaries,
        "Alternating",
        &format!(
            r#"if [ -f "{flag}" ]; then rm "{flag}"; echo "100 nodes 5000 nps"; else touch "{flag}"; echo "101 nodes 5000 nps"; fi"#,
            flag = flag.display()
        ),
    )?;
    write_engine(&binaries, "Steady", r#"echo "2000 nodes 90000 nps""#)?;

    let mut cmd = cargo_bin_cmd!("benchnps");
    cmd.arg("--config")
        .arg(empty_config(&temp_dir)?)
        .arg("bench")
        .arg("--binaries-dir")
        .arg(&binaries)
        .arg("-T")
        .arg("1")
        .arg("-S")
        .arg("2");

    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "a failed engine must fail the run");
    assert!(stdout.contains("Non-deterministic"), "{stdout}");
    assert!(stdout.contains("Steady          | 90000"), "{stdout}");

    Ok(())
}

#[test]
fn test_parse_command_prints_sample() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    let log_file = temp_dir.path().join("bench.log");
    std::fs::write(
        &log_file,
        "info depth 13\nNodes searched: 4460356\n4460356 nodes 1523841 nps\n",
    )?;

    let mut cmd = cargo_bin_cmd!("benchnps");
    cmd.arg("--config")
        .arg(empty_config(&temp_dir)?)
        .arg("parse")
        .arg(&log_file);

    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("bench: 4460356"), "{stdout}");
    assert!(stdout.contains("nps:   1523841"), "{stdout}");

    Ok(())
}
