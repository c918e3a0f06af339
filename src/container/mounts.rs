#![allow(clippy::module_name_repetitions)]
//! Bind-mount planning shared by both backends.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::RunConfig;
use crate::model::ResolvedModel;
use crate::scratch::ScratchDirectory;

/// Fixed in-container location of the raw BIDS dataset.
pub const CONTAINER_RAW: &str = "/data/rawdata";
/// Fixed in-container location of the derivatives tree.
pub const CONTAINER_DERIVATIVES: &str = "/data/derivatives";
/// Sentinel mount point for a statistical model living outside derivatives.
pub const CONTAINER_MODEL_DIR: &str = "/misc/models";
/// Home directory of the contained toolkit, backed by per-invocation scratch.
pub const CONTAINER_HOME: &str = "/home/bidspm";
/// Temporary-files directory of the contained toolkit.
pub const CONTAINER_TMP: &str = "/tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    ReadOnly,
    ReadWrite,
}

/// One host → container binding.
#[derive(Debug, Clone)]
pub struct BindSpec {
    pub host: PathBuf,
    pub container: String,
    pub mode: BindMode,
}

impl BindSpec {
    pub fn ro(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: BindMode::ReadOnly,
        }
    }

    pub fn rw(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: BindMode::ReadWrite,
        }
    }

    /// Render as a docker `-v` argument value.
    pub fn docker_arg(&self) -> String {
        match self.mode {
            BindMode::ReadOnly => format!("{}:{}:ro", self.host.display(), self.container),
            BindMode::ReadWrite => format!("{}:{}", self.host.display(), self.container),
        }
    }

    /// Render as an apptainer `--bind` argument value.
    pub fn apptainer_arg(&self) -> String {
        match self.mode {
            BindMode::ReadOnly => format!("{}:{}:ro", self.host.display(), self.container),
            BindMode::ReadWrite => format!("{}:{}:rw", self.host.display(), self.container),
        }
    }
}

/// Ordered bindings plus environment assignments for one invocation.
/// Rebuilt deterministically from the run config per invocation; never cached.
#[derive(Debug, Clone, Default)]
pub struct MountPlan {
    pub binds: Vec<BindSpec>,
    pub env: Vec<(String, String)>,
}

impl MountPlan {
    /// Backend-agnostic plan: data roots, the model bind when it lives outside
    /// derivatives, and the scratch-backed home/tmp area.
    pub fn for_invocation(
        cfg: &RunConfig,
        model: Option<&ResolvedModel>,
        scratch: Option<&ScratchDirectory>,
    ) -> Self {
        let mut plan = Self::default();
        plan.binds
            .push(BindSpec::ro(&cfg.raw_dir, CONTAINER_RAW));
        plan.binds
            .push(BindSpec::rw(&cfg.derivatives_dir, CONTAINER_DERIVATIVES));

        if let Some(m) = model {
            if m.extra_mount {
                plan.binds
                    .push(BindSpec::ro(&m.host_path, m.container_path.clone()));
            }
        }

        if let Some(s) = scratch {
            if let (Ok(home), Ok(tmp)) = (s.subdir("home"), s.subdir("tmp")) {
                plan.binds.push(BindSpec::rw(home, CONTAINER_HOME));
                plan.binds.push(BindSpec::rw(tmp, CONTAINER_TMP));
                plan.env.push(("HOME".to_string(), CONTAINER_HOME.to_string()));
                plan.env.push(("TMPDIR".to_string(), CONTAINER_TMP.to_string()));
                plan.env.push(("USER".to_string(), "bidspm".to_string()));
            }
        }

        plan
    }
}

/// Segment-wise containment test: is `path` located under `root`?
///
/// Both sides are canonicalized when possible and compared component by
/// component, so `/data/derivatives-old` is never mistaken for a child of
/// `/data/derivatives`.
pub fn path_is_under(path: &Path, root: &Path) -> bool {
    let p = normalize(path);
    let r = normalize(root);
    let pc: Vec<Component> = p.components().collect();
    let rc: Vec<Component> = r.components().collect();
    pc.len() >= rc.len() && pc[..rc.len()] == rc[..]
}

/// Relative path of `path` inside `root`, using the same segment comparison
/// as [`path_is_under`]. Returns `None` when `path` is not under `root`.
pub fn path_relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    let p = normalize(path);
    let r = normalize(root);
    p.strip_prefix(&r).ok().map(PathBuf::from)
}

/// Canonicalize when the path exists; otherwise fold `.`/`..` lexically.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(c) = fs::canonicalize(path) {
        return c;
    }
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
