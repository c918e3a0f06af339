#![allow(clippy::module_name_repetitions)]
//! Run and container configuration documents.
//!
//! Both documents are plain JSON files loaded once at process start and
//! validated against a fixed required/optional field table; everything
//! downstream receives immutable references.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::color::warn_print;
use crate::container::path_is_under;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_CONTAINER_CONFIG_FILE: &str = "container.json";

/// Declarative run configuration (`config.json`).
///
/// Key names follow the historical document layout; unknown keys are
/// rejected so typos surface at load time rather than as silently ignored
/// settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRunConfig {
    #[serde(rename = "WD")]
    wd: PathBuf,
    #[serde(rename = "RAW_DIR")]
    raw_dir: PathBuf,
    #[serde(rename = "DERIVATIVES_DIR")]
    derivatives_dir: PathBuf,
    #[serde(rename = "FMRIPREP_DIR")]
    fmriprep_dir: PathBuf,
    #[serde(rename = "SPACE")]
    space: String,
    #[serde(rename = "FWHM")]
    fwhm: f64,
    #[serde(rename = "SMOOTH")]
    smooth: bool,
    #[serde(rename = "STATS")]
    stats: bool,
    #[serde(rename = "DATASET")]
    dataset: bool,
    #[serde(rename = "TASKS")]
    tasks: Vec<String>,
    #[serde(rename = "MODELS_FILE", default)]
    models_file: Option<String>,
    #[serde(rename = "SUBJECTS", default)]
    subjects: Option<Vec<String>>,
    #[serde(rename = "VERBOSITY", default)]
    verbosity: Option<i64>,
    #[serde(rename = "MODEL_VALIDATOR", default)]
    model_validator: Option<Vec<String>>,
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub wd: PathBuf,
    pub raw_dir: PathBuf,
    pub derivatives_dir: PathBuf,
    pub fmriprep_dir: PathBuf,
    pub space: String,
    pub fwhm: f64,
    pub smooth: bool,
    pub stats: bool,
    pub dataset: bool,
    pub tasks: Vec<String>,
    pub models_file: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub verbosity: u8,
    pub model_validator: Vec<String>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("config file '{}' not found", path.display());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let raw: RawRunConfig = serde_json::from_str(&text)
            .with_context(|| format!("malformed config file '{}'", path.display()))?;
        Self::validate(raw)
    }

    fn validate(raw: RawRunConfig) -> Result<Self> {
        if raw.tasks.is_empty() {
            bail!("config: TASKS must list at least one task");
        }
        if !raw.wd.is_dir() {
            bail!("working directory '{}' does not exist", raw.wd.display());
        }
        if !raw.raw_dir.is_dir() {
            bail!("raw data directory '{}' does not exist", raw.raw_dir.display());
        }
        if !raw.derivatives_dir.is_dir() {
            bail!(
                "derivatives directory '{}' does not exist",
                raw.derivatives_dir.display()
            );
        }
        if !raw.fmriprep_dir.is_dir() {
            bail!(
                "fMRIPrep directory '{}' does not exist",
                raw.fmriprep_dir.display()
            );
        }
        // Soft invariant: fMRIPrep outputs normally live under derivatives.
        if !path_is_under(&raw.fmriprep_dir, &raw.derivatives_dir) {
            warn_print(&format!(
                "FMRIPREP_DIR '{}' is not nested under DERIVATIVES_DIR '{}'",
                raw.fmriprep_dir.display(),
                raw.derivatives_dir.display()
            ));
        }
        if let Some(subs) = &raw.subjects {
            if subs.iter().any(|s| s.trim().is_empty()) {
                bail!("config: SUBJECTS entries must be non-empty labels");
            }
        }

        let verbosity = match raw.verbosity {
            None => 0,
            Some(v @ 0..=3) => v as u8,
            Some(v) => {
                warn_print(&format!("VERBOSITY {v} out of range (0-3); using 0"));
                0
            }
        };

        let model_validator = raw.model_validator.unwrap_or_else(|| {
            vec!["python3".to_string(), "validate_bids_model.py".to_string()]
        });
        if model_validator.is_empty() {
            bail!("config: MODEL_VALIDATOR must name a program when given");
        }

        Ok(Self {
            wd: raw.wd,
            raw_dir: raw.raw_dir,
            derivatives_dir: raw.derivatives_dir,
            fmriprep_dir: raw.fmriprep_dir,
            space: raw.space,
            fwhm: raw.fwhm,
            smooth: raw.smooth,
            stats: raw.stats,
            dataset: raw.dataset,
            tasks: raw.tasks,
            models_file: raw.models_file,
            subjects: raw.subjects,
            verbosity,
            model_validator,
        })
    }

    /// Scratch area root for this run.
    pub fn scratch_root(&self) -> PathBuf {
        self.wd.join("scratch")
    }
}

/// Declarative container backend selection (`container.json`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfigDoc {
    #[serde(default = "default_container_type")]
    pub container_type: String,
    #[serde(default)]
    pub docker_image: String,
    #[serde(default)]
    pub apptainer_image: String,
}

fn default_container_type() -> String {
    "docker".to_string()
}

impl ContainerConfigDoc {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("container config file '{}' not found", path.display());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read container config '{}'", path.display()))?;
        let doc: Self = serde_json::from_str(&text)
            .with_context(|| format!("malformed container config '{}'", path.display()))?;
        Ok(doc)
    }
}
