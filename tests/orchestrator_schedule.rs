mod common;

use std::collections::BTreeSet;

use bidspm_runner::{Action, Backend, ContainerConfigDoc, Orchestrator};
use common::{labels_of, make_config, make_dataset, make_model, quiet_ctx, RecordingRunner};

fn docker_backend() -> Backend {
    Backend::from_doc(&ContainerConfigDoc {
        container_type: "docker".to_string(),
        docker_image: "cpplab/bidspm:latest".to_string(),
        apptainer_image: String::new(),
    })
    .unwrap()
}

#[test]
fn two_tasks_three_subjects_schedule_fourteen_invocations() {
    let td = tempfile::tempdir().unwrap();
    make_dataset(td.path(), &["01", "02", "03"], &["rest", "faces"], "T1w");
    let cfg = make_config(td.path(), &["rest", "faces"], "T1w");
    let model = make_model(td.path());
    let ctx = quiet_ctx();
    let backend = docker_backend();

    let mut runner = RecordingRunner::new();
    let orch = Orchestrator::new(&cfg, &backend, &ctx, Some(model), false);
    let summary = orch.execute(&mut runner).unwrap();

    // 2 × (3 × 2 + 1)
    assert_eq!(summary.scheduled, 14);
    assert_eq!(summary.succeeded, 14);
    assert_eq!(summary.failed, 0);
    assert!(summary.skipped_tasks.is_empty());
    assert!(summary.skipped_subjects.is_empty());
    assert_eq!(runner.invocations.len(), 14);

    // one dataset-level action per task, with no subject dimension
    let dataset_runs: Vec<_> = runner
        .invocations
        .iter()
        .filter(|i| i.action == Action::DatasetStats)
        .collect();
    assert_eq!(dataset_runs.len(), 2);
    assert!(dataset_runs.iter().all(|i| i.subject.is_none()));

    // smoothing precedes stats for each subject
    let first_sub01: Vec<_> = runner
        .invocations
        .iter()
        .filter(|i| i.subject.as_deref() == Some("01") && i.task == "rest")
        .map(|i| i.action)
        .collect();
    assert_eq!(first_sub01, [Action::Smooth, Action::SubjectStats]);
}

#[test]
fn subject_without_directory_is_skipped_once_others_proceed() {
    let td = tempfile::tempdir().unwrap();
    make_dataset(td.path(), &["01", "03"], &["rest"], "T1w");
    let mut cfg = make_config(td.path(), &["rest"], "T1w");
    // allowlist names a subject with no fMRIPrep directory
    cfg.subjects = Some(vec!["01".to_string(), "02".to_string(), "03".to_string()]);
    cfg.stats = false;
    cfg.dataset = false;
    let ctx = quiet_ctx();
    let backend = docker_backend();

    let mut runner = RecordingRunner::new();
    let orch = Orchestrator::new(&cfg, &backend, &ctx, None, false);
    let summary = orch.execute(&mut runner).unwrap();

    assert_eq!(summary.skipped_subjects, vec!["02".to_string()]);
    assert!(summary.skipped_tasks.is_empty());
    assert_eq!(summary.scheduled, 2);
    assert_eq!(
        labels_of(&runner.invocations),
        vec![Some("01".to_string()), Some("03".to_string())]
    );
}

#[test]
fn precheck_failure_skips_only_the_affected_task() {
    let td = tempfile::tempdir().unwrap();
    // 'rest' outputs exist in the requested space; 'faces' outputs are in a
    // different space only
    make_dataset(td.path(), &["01", "02"], &["rest"], "T1w");
    for sub in ["01", "02"] {
        let func = td.path().join(format!("derivatives/fmriprep/sub-{sub}/func"));
        std::fs::write(
            func.join(format!(
                "sub-{sub}_task-faces_space-MNI152NLin2009cAsym_desc-preproc_bold.nii.gz"
            )),
            b"",
        )
        .unwrap();
    }
    let mut cfg = make_config(td.path(), &["faces", "rest"], "T1w");
    cfg.stats = false;
    cfg.dataset = false;
    let ctx = quiet_ctx();
    let backend = docker_backend();

    let mut runner = RecordingRunner::new();
    let orch = Orchestrator::new(&cfg, &backend, &ctx, None, false);
    let summary = orch.execute(&mut runner).unwrap();

    assert_eq!(summary.skipped_tasks, vec!["faces".to_string()]);
    assert_eq!(summary.scheduled, 2);
    assert!(runner.invocations.iter().all(|i| i.task == "rest"));
}

#[test]
fn pilot_mode_selects_exactly_one_subject_per_task() {
    let td = tempfile::tempdir().unwrap();
    let subjects = ["01", "02", "03", "04", "05"];
    make_dataset(td.path(), &subjects, &["rest"], "T1w");
    let mut cfg = make_config(td.path(), &["rest"], "T1w");
    cfg.stats = false;
    cfg.dataset = false;
    let ctx = quiet_ctx();
    let backend = docker_backend();

    let mut picked = BTreeSet::new();
    for _ in 0..30 {
        let mut runner = RecordingRunner::new();
        let orch = Orchestrator::new(&cfg, &backend, &ctx, None, true);
        let summary = orch.execute(&mut runner).unwrap();
        assert_eq!(summary.scheduled, 1, "pilot must process exactly one subject");
        picked.insert(runner.invocations[0].subject.clone().unwrap());
    }
    // With five subjects and thirty draws, a single repeated pick would mean
    // the selection is not random at all.
    assert!(picked.len() >= 2, "pilot never varied its pick: {picked:?}");
    for p in &picked {
        assert!(subjects.contains(&p.as_str()));
    }
}

#[test]
fn stats_without_model_is_a_configuration_error() {
    let td = tempfile::tempdir().unwrap();
    make_dataset(td.path(), &["01"], &["rest"], "T1w");
    let cfg = make_config(td.path(), &["rest"], "T1w");
    let ctx = quiet_ctx();
    let backend = docker_backend();

    let mut runner = RecordingRunner::new();
    let orch = Orchestrator::new(&cfg, &backend, &ctx, None, false);
    let err = orch.execute(&mut runner).unwrap_err();
    assert!(err.to_string().contains("MODELS_FILE"), "{err}");
    assert!(runner.invocations.is_empty());
}
