#![allow(clippy::module_name_repetitions)]
//! Processing-space coverage checks over the fMRIPrep output tree.
//!
//! Before a task is scheduled, every candidate subject must have at least one
//! discovered output file carrying the requested space tag. A failed check
//! skips the task, never the run.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

/// Outcome of a space-coverage check for one task.
#[derive(Debug, Clone)]
pub struct SpaceReport {
    pub space: String,
    pub task: String,
    /// Subjects with no file carrying the requested tag (includes subjects
    /// with no matching files at all).
    pub missing: Vec<String>,
    /// Union of space tags actually observed across the candidate set, to
    /// let an operator pick a valid space.
    pub observed: BTreeSet<String>,
}

impl SpaceReport {
    pub fn ok(&self) -> bool {
        self.missing.is_empty()
    }

    /// One-line operator summary for the failure case.
    pub fn describe(&self) -> String {
        let observed = if self.observed.is_empty() {
            "none".to_string()
        } else {
            self.observed
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "space '{}' not found for task '{}': missing subjects [{}]; observed spaces: {}",
            self.space,
            self.task,
            self.missing.join(", "),
            observed
        )
    }
}

/// Check that every subject has at least one output file for `task` tagged
/// with `space`. Passes only on full coverage; partial coverage fails the
/// whole task.
pub fn validate_space(
    space: &str,
    subjects: &[String],
    task: &str,
    fmriprep_root: &Path,
) -> SpaceReport {
    let mut missing = Vec::new();
    let mut observed = BTreeSet::new();

    for label in subjects {
        let sub_dir = fmriprep_root.join(format!("sub-{label}"));
        let mut found = false;
        for entry in WalkDir::new(&sub_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if !file_matches(&name, label, task) {
                continue;
            }
            if let Some(tag) = space_tag(&name) {
                observed.insert(tag.to_string());
                if tag == space {
                    found = true;
                }
            }
        }
        if !found {
            missing.push(label.clone());
        }
    }

    SpaceReport {
        space: space.to_string(),
        task: task.to_string(),
        missing,
        observed,
    }
}

/// BIDS-style filename match: `sub-<label>_` prefix and a `task-<task>` entity.
fn file_matches(name: &str, label: &str, task: &str) -> bool {
    name.starts_with(&format!("sub-{label}_")) && has_entity(name, "task", task)
}

fn has_entity(name: &str, key: &str, value: &str) -> bool {
    name.split('_')
        .any(|seg| seg.strip_prefix(&format!("{key}-")) == Some(value))
}

/// Extract the `space-<tag>` entity from a filename, if present.
fn space_tag(name: &str) -> Option<&str> {
    name.split('_').find_map(|seg| seg.strip_prefix("space-"))
}
