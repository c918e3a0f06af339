#![allow(clippy::module_name_repetitions)]
//! Run orchestration: task × subject × action loop with non-fatal failure
//! isolation.
//!
//! Every failure below the configuration layer is recorded and stepped over:
//! a failed precondition skips its task, a missing subject directory skips
//! that subject, a failed invocation marks the step and moves on. No step is
//! retried; partial output stays on disk for inspection.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::config::RunConfig;
use crate::container::{Backend, PreparedCommand, CONTAINER_DERIVATIVES, CONTAINER_RAW};
use crate::model::ResolvedModel;
use crate::precheck::validate_space;
use crate::runlog::RunContext;
use crate::scratch::{self, ScratchDirectory, DEFAULT_MAX_AGE};
use crate::util::exec::{ExecRequest, ExecService};

/// One processing step of the contained toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Smooth,
    SubjectStats,
    DatasetStats,
}

impl Action {
    fn scope(self) -> &'static str {
        match self {
            Action::Smooth | Action::SubjectStats => "subject",
            Action::DatasetStats => "dataset",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Action::Smooth => "smooth",
            Action::SubjectStats | Action::DatasetStats => "stats",
        }
    }

    fn needs_model(self) -> bool {
        matches!(self, Action::SubjectStats | Action::DatasetStats)
    }
}

/// One concrete unit of work; created per loop iteration and consumed
/// immediately by the command builder.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task: String,
    pub subject: Option<String>,
    pub action: Action,
}

impl Invocation {
    /// Positional-argument contract of the contained toolkit:
    /// `<raw> <derivatives> <scope> <action>` plus named flags.
    pub fn tool_args(&self, cfg: &RunConfig, model: Option<&ResolvedModel>) -> Vec<String> {
        let mut args = vec![
            CONTAINER_RAW.to_string(),
            CONTAINER_DERIVATIVES.to_string(),
            self.action.scope().to_string(),
            self.action.verb().to_string(),
        ];
        if self.action.needs_model() {
            args.push("--preproc_dir".to_string());
            args.push(format!("{CONTAINER_DERIVATIVES}/bidspm-preproc"));
            if let Some(m) = model {
                args.push("--model_file".to_string());
                args.push(m.container_path.clone());
            }
        }
        if let Some(label) = &self.subject {
            args.push("--participant_label".to_string());
            args.push(label.clone());
        }
        args.push("--task".to_string());
        args.push(self.task.clone());
        args.push("--space".to_string());
        args.push(cfg.space.clone());
        args.push("--fwhm".to_string());
        args.push(cfg.fwhm.to_string());
        args.push("--verbosity".to_string());
        args.push(cfg.verbosity.to_string());
        args
    }

    pub fn describe(&self) -> String {
        match (&self.subject, self.action) {
            (Some(s), Action::Smooth) => format!("smoothing sub-{s} task {}", self.task),
            (Some(s), _) => format!("subject stats sub-{s} task {}", self.task),
            (None, _) => format!("dataset stats task {}", self.task),
        }
    }
}

/// Outcome of one external invocation.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub detail: String,
}

impl ExecutionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            detail: String::new(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// Execution seam between the orchestrator and the external runtime.
pub trait InvocationRunner {
    fn run(
        &mut self,
        invocation: &Invocation,
        command: &PreparedCommand,
        ctx: &RunContext,
    ) -> ExecutionResult;

    /// Whether command construction must locate the runtime binary on PATH.
    fn requires_runtime(&self) -> bool {
        true
    }
}

/// Blocking execution with inherited stdio; the runtime's exit code is the
/// sole success signal.
pub struct ProcessRunner;

impl InvocationRunner for ProcessRunner {
    fn run(
        &mut self,
        invocation: &Invocation,
        command: &PreparedCommand,
        ctx: &RunContext,
    ) -> ExecutionResult {
        ctx.debug(&format!("running: {}", command.preview()));
        let request = ExecRequest::new(&command.program).args(&command.args);
        match ExecService::unbounded().run(request) {
            Ok(out) if out.success() => ExecutionResult::ok(),
            Ok(out) => ExecutionResult::failed(format!(
                "{} exited with {}",
                invocation.describe(),
                out.status
            )),
            Err(e) => ExecutionResult::failed(format!(
                "{} could not start: {e:#}",
                invocation.describe()
            )),
        }
    }
}

/// Print each prepared command instead of executing it.
pub struct DryRunRunner;

impl InvocationRunner for DryRunRunner {
    fn run(
        &mut self,
        _invocation: &Invocation,
        command: &PreparedCommand,
        ctx: &RunContext,
    ) -> ExecutionResult {
        ctx.log(&format!("dry-run: {}", command.preview()));
        ExecutionResult::ok()
    }

    fn requires_runtime(&self) -> bool {
        false
    }
}

/// End-of-run accounting, emitted unconditionally.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_tasks: Vec<String>,
    pub skipped_subjects: Vec<String>,
    pub swept_scratch_dirs: usize,
}

impl RunSummary {
    pub fn describe(&self) -> String {
        format!(
            "run complete: {} invocations ({} ok, {} failed), {} task(s) skipped, {} subject(s) skipped, {} scratch dir(s) reclaimed",
            self.scheduled,
            self.succeeded,
            self.failed,
            self.skipped_tasks.len(),
            self.skipped_subjects.len(),
            self.swept_scratch_dirs
        )
    }
}

pub struct Orchestrator<'a> {
    cfg: &'a RunConfig,
    backend: &'a Backend,
    ctx: &'a RunContext,
    model: Option<ResolvedModel>,
    pilot: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        cfg: &'a RunConfig,
        backend: &'a Backend,
        ctx: &'a RunContext,
        model: Option<ResolvedModel>,
        pilot: bool,
    ) -> Self {
        Self {
            cfg,
            backend,
            ctx,
            model,
            pilot,
        }
    }

    /// Drive the full run. Only configuration-level problems return `Err`;
    /// everything else is absorbed into the summary.
    pub fn execute(&self, runner: &mut dyn InvocationRunner) -> Result<RunSummary> {
        if (self.cfg.stats || self.cfg.dataset) && self.model.is_none() {
            bail!("stats requested but no MODELS_FILE configured");
        }

        let program = if runner.requires_runtime() {
            self.backend.runtime()?
        } else {
            PathBuf::from(self.backend.runtime_program())
        };

        let mut summary = RunSummary::default();

        for task in &self.cfg.tasks {
            self.ctx.section(&format!("Processing task: {task}"));

            // Directory existence is the only subject-validity check; a
            // subject dropped here is a skip notice, not a task failure.
            let mut subjects = Vec::new();
            for label in self.select_subjects() {
                if self.cfg.fmriprep_dir.join(format!("sub-{label}")).is_dir() {
                    subjects.push(label);
                } else {
                    self.ctx.warn(&format!(
                        "directory not found for subject '{label}' under '{}'; skipping subject",
                        self.cfg.fmriprep_dir.display()
                    ));
                    summary.skipped_subjects.push(label);
                }
            }
            if subjects.is_empty() {
                self.ctx
                    .warn(&format!("no subjects available for task '{task}'; skipping"));
                summary.skipped_tasks.push(task.clone());
                continue;
            }
            self.ctx
                .debug(&format!("candidate subjects: {}", subjects.join(", ")));

            let report = validate_space(&self.cfg.space, &subjects, task, &self.cfg.fmriprep_dir);
            if !report.ok() {
                self.ctx.warn(&report.describe());
                self.ctx.warn(&format!("skipping task '{task}'"));
                summary.skipped_tasks.push(task.clone());
                continue;
            }

            for label in &subjects {
                if self.cfg.smooth {
                    let inv = Invocation {
                        task: task.clone(),
                        subject: Some(label.clone()),
                        action: Action::Smooth,
                    };
                    self.run_one(&inv, &program, runner, &mut summary);
                }
                if self.cfg.stats {
                    let inv = Invocation {
                        task: task.clone(),
                        subject: Some(label.clone()),
                        action: Action::SubjectStats,
                    };
                    self.run_one(&inv, &program, runner, &mut summary);
                }
            }

            if self.cfg.dataset {
                let inv = Invocation {
                    task: task.clone(),
                    subject: None,
                    action: Action::DatasetStats,
                };
                self.run_one(&inv, &program, runner, &mut summary);
            }
        }

        summary.swept_scratch_dirs = scratch::sweep(&self.cfg.scratch_root(), DEFAULT_MAX_AGE);
        self.ctx.log(&summary.describe());
        Ok(summary)
    }

    fn run_one(
        &self,
        invocation: &Invocation,
        program: &Path,
        runner: &mut dyn InvocationRunner,
        summary: &mut RunSummary,
    ) {
        self.ctx.log(&format!(">>> {}", invocation.describe()));

        // Scratch allocation failure downgrades to an un-isolated attempt.
        let scratch = match ScratchDirectory::allocate(&self.cfg.scratch_root()) {
            Ok(s) => Some(s),
            Err(e) => {
                self.ctx
                    .warn(&format!("scratch allocation failed: {e}; running without scratch"));
                None
            }
        };

        let tool_args = invocation.tool_args(self.cfg, self.model.as_ref());
        let command = self.backend.build_with_program(
            program.to_path_buf(),
            self.cfg,
            self.model.as_ref(),
            scratch.as_ref(),
            &tool_args,
        );

        summary.scheduled += 1;
        let result = runner.run(invocation, &command, self.ctx);
        if result.success {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            self.ctx
                .warn(&format!("step failed: {}", result.detail));
        }
    }

    /// Subject set for one task, in priority order: pilot pick, explicit
    /// allowlist, auto-discovery. Pilot re-randomizes per task.
    fn select_subjects(&self) -> Vec<String> {
        let pool = match &self.cfg.subjects {
            Some(list) if !list.is_empty() => list.clone(),
            _ => discover_subjects(&self.cfg.fmriprep_dir),
        };
        if self.pilot {
            match pick_random(&pool) {
                Some(one) => {
                    self.ctx
                        .log(&format!("pilot mode: selected subject '{one}'"));
                    vec![one]
                }
                None => Vec::new(),
            }
        } else {
            pool
        }
    }
}

/// Enumerate `sub-*` directories under the fMRIPrep output root, sorted by
/// label.
pub fn discover_subjects(fmriprep_root: &std::path::Path) -> Vec<String> {
    let mut labels: Vec<String> = match std::fs::read_dir(fmriprep_root) {
        Ok(rd) => rd
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("sub-"))
                    .map(str::to_string)
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    labels.sort();
    labels
}

fn pick_random(pool: &[String]) -> Option<String> {
    if pool.is_empty() {
        return None;
    }
    let mut buf = [0u8; 4];
    let idx = match getrandom::getrandom(&mut buf) {
        Ok(()) => (u32::from_le_bytes(buf) as usize) % pool.len(),
        Err(_) => 0,
    };
    pool.get(idx).cloned()
}
