//! Host-side launcher for containerized bidspm analyses.
//!
//! Translates a declarative run configuration into a sequence of Docker or
//! Apptainer invocations, iterating over tasks and subjects and tolerating
//! partial failures so a multi-subject batch completes even when individual
//! steps fail.

pub mod color;
pub mod config;
pub mod container;
pub mod errors;
pub mod model;
pub mod orchestrate;
pub mod precheck;
pub mod runlog;
pub mod scratch;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, warn_print, ColorMode,
};
pub use config::{ContainerConfigDoc, RunConfig, DEFAULT_CONFIG_FILE, DEFAULT_CONTAINER_CONFIG_FILE};
pub use container::{
    compatibility_probe, path_is_under, path_relative_to, runtime_path, Backend, BindMode,
    BindSpec, MountPlan, PreparedCommand, CONTAINER_DERIVATIVES, CONTAINER_HOME,
    CONTAINER_MODEL_DIR, CONTAINER_RAW, CONTAINER_TMP,
};
pub use errors::{exit_code_for_anyhow, exit_code_for_io_error};
pub use model::{resolve as resolve_model, validate_model, ResolvedModel};
pub use orchestrate::{
    discover_subjects, Action, DryRunRunner, ExecutionResult, Invocation, InvocationRunner,
    Orchestrator, ProcessRunner, RunSummary,
};
pub use precheck::{validate_space, SpaceReport};
pub use runlog::RunContext;
pub use scratch::{sweep as sweep_scratch, ScratchDirectory, DEFAULT_MAX_AGE};
pub use util::exec::{ExecOutput, ExecRequest, ExecService};
pub use util::{shell_escape, shell_join};
