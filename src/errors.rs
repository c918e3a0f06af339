//! Error → process exit code mapping.
//!
//! Fatal paths map io::ErrorKind::NotFound to exit code 127 (missing
//! runtime/validator binary); everything else exits 1.

use std::io;

pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Walk an anyhow chain looking for an io::Error to derive the exit code.
pub fn exit_code_for_anyhow(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(ioe) = cause.downcast_ref::<io::Error>() {
            return exit_code_for_io_error(ioe);
        }
    }
    1
}
