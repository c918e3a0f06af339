#![allow(clippy::module_name_repetitions)]
//! Backend command construction and preview rendering.
//!
//! `Backend` owns every backend-specific decision: runtime program, isolation
//! flags, bind syntax, and environment propagation. Callers hand over the run
//! config, the resolved model, the scratch allocation and the tool argument
//! vector, and get back a ready-to-execute command they never have to inspect.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use nix::unistd::{getgid, getuid};

use crate::config::{ContainerConfigDoc, RunConfig};
use crate::model::ResolvedModel;
use crate::scratch::ScratchDirectory;
use crate::util::shell_escape;

use super::env::{isolation_env, push_env_kv, ISOLATION_CACHE_BINDS};
use super::mounts::{BindSpec, MountPlan};
use super::runtime::runtime_path;

/// Selected container backend with its validated image reference.
#[derive(Debug, Clone)]
pub enum Backend {
    Docker { image: String },
    Apptainer { image: PathBuf },
}

/// A complete, ready-to-execute argument vector. Built once per invocation;
/// execution is the orchestrator's job.
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PreparedCommand {
    /// Shell-escaped one-line rendering for logs and dry runs.
    pub fn preview(&self) -> String {
        let mut words = vec![self.program.display().to_string()];
        words.extend(self.args.iter().cloned());
        words
            .iter()
            .map(|w| shell_escape(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Backend {
    /// Validate the declarative document into a concrete backend.
    /// Invalid discriminants, empty image references and missing local image
    /// files are fatal before any invocation starts.
    pub fn from_doc(doc: &ContainerConfigDoc) -> io::Result<Self> {
        match doc.container_type.to_ascii_lowercase().as_str() {
            "docker" => {
                if doc.docker_image.trim().is_empty() {
                    return Err(invalid("docker image not specified in container configuration"));
                }
                Ok(Self::Docker {
                    image: doc.docker_image.trim().to_string(),
                })
            }
            "apptainer" => {
                if doc.apptainer_image.trim().is_empty() {
                    return Err(invalid(
                        "apptainer image not specified in container configuration",
                    ));
                }
                let image = PathBuf::from(doc.apptainer_image.trim());
                if !image.exists() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("apptainer image file '{}' not found", image.display()),
                    ));
                }
                Ok(Self::Apptainer { image })
            }
            other => Err(invalid(&format!(
                "invalid container_type '{other}': must be 'docker' or 'apptainer'"
            ))),
        }
    }

    pub fn runtime_program(&self) -> &'static str {
        match self {
            Self::Docker { .. } => "docker",
            Self::Apptainer { .. } => "apptainer",
        }
    }

    pub fn image_display(&self) -> String {
        match self {
            Self::Docker { image } => image.clone(),
            Self::Apptainer { image } => image.display().to_string(),
        }
    }

    /// Locate the runtime binary on PATH.
    pub fn runtime(&self) -> io::Result<PathBuf> {
        runtime_path(self.runtime_program())
    }

    /// Build the full argument vector for one invocation: mounts, environment,
    /// isolation flags, image reference, then the tool arguments, in that
    /// order.
    pub fn build(
        &self,
        cfg: &RunConfig,
        model: Option<&ResolvedModel>,
        scratch: Option<&ScratchDirectory>,
        tool_args: &[String],
    ) -> io::Result<PreparedCommand> {
        let runtime = self.runtime()?;
        Ok(self.build_with_program(runtime, cfg, model, scratch, tool_args))
    }

    /// Same as [`Backend::build`] with the runtime binary supplied by the
    /// caller. Dry runs pass the bare program name so previews render on
    /// hosts without the runtime installed.
    pub fn build_with_program(
        &self,
        program: PathBuf,
        cfg: &RunConfig,
        model: Option<&ResolvedModel>,
        scratch: Option<&ScratchDirectory>,
        tool_args: &[String],
    ) -> PreparedCommand {
        let plan = MountPlan::for_invocation(cfg, model, scratch);
        let args = match self {
            Self::Docker { image } => docker_args(image, &plan, tool_args),
            Self::Apptainer { image } => apptainer_args(image, &plan, scratch, tool_args),
        };
        PreparedCommand { program, args }
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// `docker run --rm [-v …]… [-e …]… [--user uid:gid] IMAGE args…`
fn docker_args(image: &str, plan: &MountPlan, tool_args: &[String]) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];
    for bind in &plan.binds {
        args.push("-v".to_string());
        args.push(bind.docker_arg());
    }
    for (k, v) in &plan.env {
        push_env_kv(&mut args, "-e", k, v);
    }
    #[cfg(unix)]
    {
        args.push("--user".to_string());
        args.push(format!("{}:{}", getuid(), getgid()));
    }
    args.push(image.to_string());
    args.extend(tool_args.iter().cloned());
    args
}

/// `apptainer exec --containall --cleanenv [--bind …]… [--env K=V]… IMAGE args…`
///
/// `--containall` keeps host filesystems and namespaces out of the container;
/// `--cleanenv` drops the host environment, so every variable the toolkit
/// needs is passed explicitly. Cache paths the toolkit writes outside its
/// mounted roots get writable scratch sub-binds, created on demand.
fn apptainer_args(
    image: &Path,
    plan: &MountPlan,
    scratch: Option<&ScratchDirectory>,
    tool_args: &[String],
) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "--containall".to_string(),
        "--cleanenv".to_string(),
    ];
    for bind in &plan.binds {
        args.push("--bind".to_string());
        args.push(bind.apptainer_arg());
    }
    if let Some(s) = scratch {
        for (name, container) in ISOLATION_CACHE_BINDS {
            match s.subdir(name) {
                Ok(host) => {
                    args.push("--bind".to_string());
                    args.push(BindSpec::rw(host, *container).apptainer_arg());
                }
                Err(e) => crate::color::warn_print(&format!(
                    "could not create scratch cache '{name}': {e}; continuing without it"
                )),
            }
        }
    }
    for (k, v) in &plan.env {
        push_env_kv(&mut args, "--env", k, v);
    }
    for (k, v) in isolation_env() {
        push_env_kv(&mut args, "--env", &k, &v);
    }
    args.push(image.display().to_string());
    args.extend(tool_args.iter().cloned());
    args
}

