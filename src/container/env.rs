#![allow(clippy::module_name_repetitions)]
//! Environment steering for the contained toolkit.

use super::mounts::CONTAINER_HOME;

/// Cache/UI environment for the isolated (Apptainer) backend. The contained
/// MATLAB/SPM stack writes these locations outside its mounted data roots, so
/// each is pointed at a scratch-backed path and the UI is forced headless.
pub(crate) fn isolation_env() -> Vec<(String, String)> {
    vec![
        (
            "MCR_CACHE_ROOT".to_string(),
            format!("{CONTAINER_HOME}/.mcr-cache"),
        ),
        (
            "TEMPLATEFLOW_HOME".to_string(),
            format!("{CONTAINER_HOME}/.templateflow"),
        ),
        ("SPM_HTML_BROWSER".to_string(), "0".to_string()),
        ("MATLABPATH".to_string(), "/opt/spm12".to_string()),
    ]
}

/// Writable cache locations the toolkit touches outside its mounted roots:
/// (scratch subdirectory name, container path).
pub(crate) const ISOLATION_CACHE_BINDS: &[(&str, &str)] = &[
    ("atlas", "/opt/bidspm/atlas"),
    ("spm-errors", "/opt/spm12/spm_errors"),
    ("matlab", "/home/bidspm/.matlab"),
    ("mcr-cache", "/home/bidspm/.mcr-cache"),
    ("templateflow", "/home/bidspm/.templateflow"),
];

pub(crate) fn push_env_kv(args: &mut Vec<String>, flag: &str, key: &str, val: &str) {
    args.push(flag.to_string());
    args.push(format!("{key}={val}"));
}
