#![allow(clippy::module_name_repetitions)]
//! Per-invocation scratch directories and age-based reclamation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::color::warn_print;
use crate::util::id::create_run_id;

/// Default retention for old scratch directories.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A uniquely-named scratch directory owned by exactly one invocation.
#[derive(Debug, Clone)]
pub struct ScratchDirectory {
    path: PathBuf,
}

impl ScratchDirectory {
    /// Create a fresh `<root>/<stamp>-<id>` directory, creating parents as
    /// needed.
    pub fn allocate(root: &Path) -> io::Result<Self> {
        let fmt = format_description!("[year][month][day]-[hour][minute][second]");
        let stamp = OffsetDateTime::now_utc()
            .format(fmt)
            .unwrap_or_else(|_| "00000000-000000".to_string());
        let name = format!("{stamp}-{}", create_run_id());
        let path = root.join(name);
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Named subdirectory inside the scratch area, created on demand.
    pub fn subdir(&self, name: &str) -> io::Result<PathBuf> {
        let p = self.path.join(name);
        fs::create_dir_all(&p)?;
        Ok(p)
    }
}

/// Remove scratch subdirectories older than `max_age` (by last-modified
/// time). Deletion failures are logged and skipped; a missing scratch root
/// means there is nothing to do.
pub fn sweep(root: &Path, max_age: Duration) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(rd) => rd,
        Err(_) => return 0,
    };
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|md| md.modified())
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        match age {
            Some(age) if age >= max_age => match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn_print(&format!(
                    "could not remove scratch dir '{}': {e}",
                    path.display()
                )),
            },
            _ => {}
        }
    }
    removed
}
