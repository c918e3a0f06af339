#![allow(clippy::module_name_repetitions)]
//! Statistical-model path resolution and external schema validation.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::container::{path_is_under, path_relative_to, CONTAINER_DERIVATIVES, CONTAINER_MODEL_DIR};
use crate::runlog::RunContext;
use crate::util::exec::{ExecRequest, ExecService};

/// Marker printed by the validator for the one schema deviation the pipeline
/// tolerates (a non-standard transformer name in the model document).
const TOLERATED_DEVIATION_MARKER: &str = "pybids-transforms-v1";

/// A model reference resolved against the derivatives tree.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    /// Absolute path on the host.
    pub host_path: PathBuf,
    /// Path the contained toolkit sees.
    pub container_path: String,
    /// True when the model lives outside derivatives and needs its own bind.
    pub extra_mount: bool,
}

/// Resolve a model reference to its host location and container-visible path.
///
/// Relative references are taken relative to `<derivatives>/models/`. A model
/// inside the derivatives tree reuses the derivatives mount; anything outside
/// is pinned to the sentinel mount point and flagged for an extra read-only
/// bind. A missing file is fatal: the model is required before any subject is
/// processed.
pub fn resolve(model_reference: &str, derivatives_root: &Path) -> io::Result<ResolvedModel> {
    let referenced = Path::new(model_reference);
    let host_path = if referenced.is_absolute() {
        referenced.to_path_buf()
    } else {
        derivatives_root.join("models").join(referenced)
    };

    if !host_path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("model file '{}' not found", host_path.display()),
        ));
    }

    if path_is_under(&host_path, derivatives_root) {
        let rel = path_relative_to(&host_path, derivatives_root)
            .unwrap_or_else(|| PathBuf::from(model_reference));
        Ok(ResolvedModel {
            host_path,
            container_path: format!("{CONTAINER_DERIVATIVES}/{}", rel.display()),
            extra_mount: false,
        })
    } else {
        let file_name = host_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model.json".to_string());
        Ok(ResolvedModel {
            host_path,
            container_path: format!("{CONTAINER_MODEL_DIR}/{file_name}"),
            extra_mount: true,
        })
    }
}

/// Run the external model validator against the resolved model.
///
/// The validator is an opaque program taking the model path as its single
/// argument. Exit zero passes. A non-zero exit whose output names the
/// tolerated transformer deviation downgrades to a warning; any other failure
/// aborts the run before work is scheduled.
pub fn validate_model(validator: &[String], model: &ResolvedModel, ctx: &RunContext) -> Result<()> {
    let (program, extra) = validator
        .split_first()
        .context("model validator command is empty")?;
    ctx.debug(&format!(
        "validating model '{}' with '{}'",
        model.host_path.display(),
        program
    ));

    let svc = ExecService::with_timeout(Duration::from_secs(30));
    let out = svc
        .run(
            ExecRequest::new(program)
                .args(extra.iter().map(String::as_str))
                .arg(&model.host_path)
                .capture_output(true),
        )
        .with_context(|| format!("failed to run model validator '{program}'"))?;

    let combined = out.combined();
    if !combined.trim().is_empty() {
        ctx.log(combined.trim_end());
    }
    if out.success() {
        return Ok(());
    }
    if combined.contains(TOLERATED_DEVIATION_MARKER) {
        ctx.warn("model uses a non-standard transformer; ignoring this deviation");
        return Ok(());
    }
    bail!(
        "model '{}' failed schema validation (validator exited with {})",
        model.host_path.display(),
        out.status
    );
}
