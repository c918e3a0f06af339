#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use bidspm_runner::{
    ExecutionResult, Invocation, InvocationRunner, PreparedCommand, ResolvedModel, RunConfig,
    RunContext,
};

/// Build a minimal BIDS-ish dataset tree under `wd` with the given subjects,
/// each carrying one preprocessed file per task tagged with `space`.
pub fn make_dataset(wd: &Path, subjects: &[&str], tasks: &[&str], space: &str) {
    fs::create_dir_all(wd.join("rawdata")).unwrap();
    let fmriprep = wd.join("derivatives/fmriprep");
    for sub in subjects {
        let func = fmriprep.join(format!("sub-{sub}/func"));
        fs::create_dir_all(&func).unwrap();
        for task in tasks {
            fs::write(
                func.join(format!(
                    "sub-{sub}_task-{task}_space-{space}_desc-preproc_bold.nii.gz"
                )),
                b"",
            )
            .unwrap();
        }
    }
    fs::create_dir_all(wd.join("derivatives/models")).unwrap();
}

pub fn make_config(wd: &Path, tasks: &[&str], space: &str) -> RunConfig {
    RunConfig {
        wd: wd.to_path_buf(),
        raw_dir: wd.join("rawdata"),
        derivatives_dir: wd.join("derivatives"),
        fmriprep_dir: wd.join("derivatives/fmriprep"),
        space: space.to_string(),
        fwhm: 6.0,
        smooth: true,
        stats: true,
        dataset: true,
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
        models_file: Some("model.json".to_string()),
        subjects: None,
        verbosity: 0,
        model_validator: vec!["true".to_string()],
    }
}

pub fn make_model(wd: &Path) -> ResolvedModel {
    let host = wd.join("derivatives/models/model.json");
    fs::write(&host, b"{}").unwrap();
    ResolvedModel {
        host_path: host,
        container_path: "/data/derivatives/models/model.json".to_string(),
        extra_mount: false,
    }
}

pub fn quiet_ctx() -> RunContext {
    RunContext::console_only(0)
}

/// Records every invocation instead of executing; an optional predicate makes
/// selected steps fail.
pub struct RecordingRunner {
    pub invocations: Vec<Invocation>,
    pub previews: Vec<String>,
    fail_when: Option<Box<dyn Fn(&Invocation) -> bool>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            invocations: Vec::new(),
            previews: Vec::new(),
            fail_when: None,
        }
    }

    pub fn failing_when(pred: impl Fn(&Invocation) -> bool + 'static) -> Self {
        Self {
            invocations: Vec::new(),
            previews: Vec::new(),
            fail_when: Some(Box::new(pred)),
        }
    }
}

impl InvocationRunner for RecordingRunner {
    fn run(
        &mut self,
        invocation: &Invocation,
        command: &PreparedCommand,
        _ctx: &RunContext,
    ) -> ExecutionResult {
        self.invocations.push(invocation.clone());
        self.previews.push(command.preview());
        match &self.fail_when {
            Some(pred) if pred(invocation) => ExecutionResult::failed("injected failure"),
            _ => ExecutionResult::ok(),
        }
    }

    fn requires_runtime(&self) -> bool {
        false
    }
}

/// Convenience lookup of a subject label in an invocation list.
pub fn labels_of(invocations: &[Invocation]) -> Vec<Option<String>> {
    invocations.iter().map(|i| i.subject.clone()).collect()
}

pub fn scratch_entries(wd: &Path) -> Vec<PathBuf> {
    match fs::read_dir(wd.join("scratch")) {
        Ok(rd) => rd.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
