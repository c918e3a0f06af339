mod common;

use std::fs;
use std::process::Command;

use common::make_dataset;

#[test]
fn test_cli_dry_run_previews_all_invocations() {
    let td = tempfile::tempdir().expect("tmpdir");
    let wd = td.path();
    make_dataset(wd, &["01", "02"], &["rest"], "T1w");

    let config = wd.join("config.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "WD": "{wd}",
                "RAW_DIR": "{wd}/rawdata",
                "DERIVATIVES_DIR": "{wd}/derivatives",
                "FMRIPREP_DIR": "{wd}/derivatives/fmriprep",
                "SPACE": "T1w",
                "FWHM": 6.0,
                "SMOOTH": true,
                "STATS": false,
                "DATASET": false,
                "TASKS": ["rest"]
            }}"#,
            wd = wd.display()
        ),
    )
    .unwrap();
    let container = wd.join("container.json");
    fs::write(
        &container,
        r#"{"container_type": "docker", "docker_image": "cpplab/bidspm:latest"}"#,
    )
    .unwrap();

    let bin = env!("CARGO_BIN_EXE_bidspm-runner");
    let out = Command::new(bin)
        .args([
            "--config",
            config.to_str().unwrap(),
            "--container-config",
            container.to_str().unwrap(),
            "run",
            "--dry-run",
        ])
        .output()
        .expect("failed to run bidspm-runner run --dry-run");

    assert!(
        out.status.success(),
        "dry run exited non-zero: {:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8_lossy(&out.stdout);
    // one smoothing preview per subject, never executed
    assert_eq!(stdout.matches("dry-run: docker run --rm").count(), 2);
    assert!(stdout.contains("--participant_label 01"), "stdout:\n{stdout}");
    assert!(stdout.contains("--participant_label 02"), "stdout:\n{stdout}");
    assert!(stdout.contains("run complete: 2 invocations (2 ok, 0 failed)"));

    // a per-run log file was created under the working directory
    let logs: Vec<_> = fs::read_dir(wd)
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
        .collect();
    assert_eq!(logs.len(), 1, "expected exactly one run log");
}

#[test]
fn test_cli_nonexistent_fmriprep_dir_is_fatal() {
    let td = tempfile::tempdir().expect("tmpdir");
    let wd = td.path();
    make_dataset(wd, &["01"], &["rest"], "T1w");

    let config = wd.join("config.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "WD": "{wd}",
                "RAW_DIR": "{wd}/rawdata",
                "DERIVATIVES_DIR": "{wd}/derivatives",
                "FMRIPREP_DIR": "{wd}/derivatives/fmriprepp",
                "SPACE": "T1w",
                "FWHM": 6.0,
                "SMOOTH": true,
                "STATS": false,
                "DATASET": false,
                "TASKS": ["rest"]
            }}"#,
            wd = wd.display()
        ),
    )
    .unwrap();
    let container = wd.join("container.json");
    fs::write(
        &container,
        r#"{"container_type": "docker", "docker_image": "cpplab/bidspm:latest"}"#,
    )
    .unwrap();

    let bin = env!("CARGO_BIN_EXE_bidspm-runner");
    let out = Command::new(bin)
        .args([
            "--config",
            config.to_str().unwrap(),
            "--container-config",
            container.to_str().unwrap(),
            "run",
            "--dry-run",
        ])
        .output()
        .expect("failed to run bidspm-runner");

    // a typo'd fMRIPrep root must abort before scheduling, not complete a
    // run that silently did nothing
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("fMRIPrep directory"), "stderr:\n{err}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!stdout.contains("run complete"), "stdout:\n{stdout}");
}

#[test]
fn test_cli_missing_model_file_exits_127() {
    let td = tempfile::tempdir().expect("tmpdir");
    let wd = td.path();
    make_dataset(wd, &["01"], &["rest"], "T1w");

    let config = wd.join("config.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "WD": "{wd}",
                "RAW_DIR": "{wd}/rawdata",
                "DERIVATIVES_DIR": "{wd}/derivatives",
                "FMRIPREP_DIR": "{wd}/derivatives/fmriprep",
                "SPACE": "T1w",
                "FWHM": 6.0,
                "SMOOTH": true,
                "STATS": true,
                "DATASET": false,
                "TASKS": ["rest"],
                "MODELS_FILE": "absent.json"
            }}"#,
            wd = wd.display()
        ),
    )
    .unwrap();
    let container = wd.join("container.json");
    fs::write(
        &container,
        r#"{"container_type": "docker", "docker_image": "cpplab/bidspm:latest"}"#,
    )
    .unwrap();

    let bin = env!("CARGO_BIN_EXE_bidspm-runner");
    let out = Command::new(bin)
        .args([
            "--config",
            config.to_str().unwrap(),
            "--container-config",
            container.to_str().unwrap(),
            "run",
            "--dry-run",
        ])
        .output()
        .expect("failed to run bidspm-runner");

    // the model is required before any subject is processed; a missing file
    // maps to the same not-found exit code as a missing runtime binary
    assert_eq!(out.status.code(), Some(127));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("model file"), "stderr:\n{err}");
}

#[test]
fn test_cli_missing_config_is_fatal() {
    let td = tempfile::tempdir().expect("tmpdir");
    let bin = env!("CARGO_BIN_EXE_bidspm-runner");
    let out = Command::new(bin)
        .args([
            "--config",
            td.path().join("absent.json").to_str().unwrap(),
            "run",
        ])
        .output()
        .expect("failed to run bidspm-runner");
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("not found"), "stderr:\n{err}");
}
