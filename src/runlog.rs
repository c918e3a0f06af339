#![allow(clippy::module_name_repetitions)]
//! Per-run logging context.
//!
//! One `RunContext` is created at startup and threaded through every
//! component that logs. It owns the append-only, timestamped log file named
//! from the model reference and the run start time; console output goes out
//! alongside each appended line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::color::{color_enabled_stderr, log_error_stderr, warn_print};

#[derive(Debug, Clone)]
pub struct RunContext {
    log_path: Option<PathBuf>,
    verbosity: u8,
}

impl RunContext {
    /// Open the per-run log file under the working directory. A file that
    /// cannot be created degrades to console-only logging with a warning.
    pub fn create(wd: &Path, model_reference: Option<&str>, verbosity: u8) -> Self {
        let stem = model_reference
            .map(Path::new)
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bidspm".to_string());
        let fmt = format_description!("[year][month][day]-[hour][minute][second]");
        let stamp = OffsetDateTime::now_utc()
            .format(fmt)
            .unwrap_or_else(|_| "00000000-000000".to_string());
        let log_path = wd.join(format!("{stem}_{stamp}.log"));

        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(_) => Self {
                log_path: Some(log_path),
                verbosity,
            },
            Err(e) => {
                warn_print(&format!(
                    "cannot open log file '{}': {e}; logging to console only",
                    log_path.display()
                ));
                Self {
                    log_path: None,
                    verbosity,
                }
            }
        }
    }

    /// Console-only context for tests and auxiliary subcommands.
    pub fn console_only(verbosity: u8) -> Self {
        Self {
            log_path: None,
            verbosity,
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    fn stamp() -> String {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        OffsetDateTime::now_utc()
            .format(fmt)
            .unwrap_or_else(|_| "0000-00-00 00:00:00".to_string())
    }

    fn append(&self, line: &str) {
        if let Some(path) = &self.log_path {
            if let Ok(mut f) = OpenOptions::new().append(true).open(path) {
                let _ = writeln!(f, "{line}");
            }
        }
    }

    /// Log a line to the run log and stdout.
    pub fn log(&self, msg: &str) {
        let line = format!("{} {msg}", Self::stamp());
        self.append(&line);
        println!("{line}");
    }

    /// Debug line, shown only at verbosity >= 1 but always persisted.
    pub fn debug(&self, msg: &str) {
        let line = format!("{} [DEBUG] {msg}", Self::stamp());
        self.append(&line);
        if self.verbosity >= 1 {
            println!("{line}");
        }
    }

    pub fn warn(&self, msg: &str) {
        let line = format!("{} [WARN] {msg}", Self::stamp());
        self.append(&line);
        warn_print(msg);
    }

    pub fn error(&self, msg: &str) {
        let line = format!("{} [ERROR] {msg}", Self::stamp());
        self.append(&line);
        log_error_stderr(color_enabled_stderr(), &format!("error: {msg}"));
    }

    /// Section banner matching the historical run log layout.
    pub fn section(&self, title: &str) {
        self.log("---------------------------------------------------");
        self.log(&format!(">>> {title}"));
        self.log("---------------------------------------------------");
    }
}
