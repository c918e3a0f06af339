//! Container backend abstraction: runtime discovery, mount planning and
//! per-backend command construction.

pub mod build;
pub mod env;
pub mod mounts;
pub mod runtime;

pub use build::{Backend, PreparedCommand};
pub use mounts::{
    path_is_under, path_relative_to, BindMode, BindSpec, MountPlan, CONTAINER_DERIVATIVES,
    CONTAINER_HOME, CONTAINER_MODEL_DIR, CONTAINER_RAW, CONTAINER_TMP,
};
pub use runtime::{compatibility_probe, runtime_path};
