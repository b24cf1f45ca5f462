//! Detached `.sig` files beside the lock file and the manifest.
//!
//! A signature file holds the SHA-256 hex digest of the file it signs.
//! Signatures are optional; when present they must match.

use crate::digest::hash_file;
use crate::error::IntegrityError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to the signed file's name.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// A signature that disagrees with its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheck {
    /// The signed file.
    pub signed: PathBuf,
    /// Digest of the signed file.
    pub expected: String,
    /// Content of the signature file.
    pub got: String,
}

/// The signature path for `file`.
pub fn signature_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(SIGNATURE_SUFFIX);
    PathBuf::from(name)
}

/// Verifies the detached signature of `file`.
///
/// Returns `Ok(None)` when there is no signature or it matches, and the
/// mismatch otherwise. A signature whose file is missing is an I/O error.
pub fn check_detached(file: &Path) -> Result<Option<SignatureCheck>, IntegrityError> {
    let sig_path = signature_path(file);
    let got = match fs::read_to_string(&sig_path) {
        Ok(content) => content.trim().to_string(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IntegrityError::io(sig_path, e)),
    };
    let expected = hash_file(file)?;
    if got.eq_ignore_ascii_case(&expected) {
        return Ok(None);
    }
    Ok(Some(SignatureCheck {
        signed: file.to_path_buf(),
        expected,
        got,
    }))
}
