#![allow(clippy::module_name_repetitions)]
//! Container runtime discovery.

use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use which::which;

use crate::color::warn_print;
use crate::util::exec::{ExecRequest, ExecService};

/// Locate the runtime binary (`docker` or `apptainer`) on PATH.
pub fn runtime_path(program: &str) -> io::Result<PathBuf> {
    // Allow tests to disable discovery to avoid hard failures on CI hosts
    if env::var("BIDSPM_RUNNER_SKIP_RUNTIME").ok().as_deref() == Some("1") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{program} discovery disabled by environment override."),
        ));
    }
    which(program).map_err(|_| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{program}' is required but was not found in PATH."),
        )
    })
}

/// Best-effort compatibility probe: confirm the runtime answers `--version`
/// within a bounded wait. Failure is a warning, never fatal.
pub fn compatibility_probe(runtime: &std::path::Path) {
    let svc = ExecService::with_timeout(Duration::from_secs(30));
    match svc.run(
        ExecRequest::new(runtime)
            .arg("--version")
            .capture_output(true),
    ) {
        Ok(out) if out.success() => {}
        Ok(out) => warn_print(&format!(
            "runtime probe '{} --version' exited with {}; continuing",
            runtime.display(),
            out.status
        )),
        Err(e) => warn_print(&format!(
            "runtime probe '{} --version' failed: {e:#}; continuing",
            runtime.display()
        )),
    }
}
