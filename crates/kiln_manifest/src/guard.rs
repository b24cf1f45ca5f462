//! The manifest fingerprint guard.
//!
//! A manifest records the fingerprint of the lock file its build was
//! verified against. Before anything is compiled, the prior manifest's
//! fingerprint must equal the fingerprint of the lock file as it is now.

use crate::error::ManifestError;
use crate::model::{manifest_path, MANIFEST_SCHEMA};
use kiln_diagnostics::data::ManifestMismatch;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recorded {
    schema: String,
    dependency_fingerprint: Option<String>,
}

/// Compares the prior manifest under `target_dir` with `current`.
///
/// Returns `None` when there is no prior manifest or the fingerprints
/// agree. A prior manifest that cannot be parsed disagrees with any lock.
pub fn check_fingerprint(
    workspace: &Path,
    target_dir: &Path,
    current: Option<&str>,
) -> Result<Option<ManifestMismatch>, ManifestError> {
    let path = workspace.join(manifest_path(target_dir));
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ManifestError::io(&path, e)),
    };

    let recorded = match serde_json::from_str::<Recorded>(&content) {
        Ok(r) if r.schema == MANIFEST_SCHEMA => r.dependency_fingerprint,
        Ok(r) => {
            tracing::warn!(schema = %r.schema, "prior manifest has an unknown schema");
            return Ok(Some(mismatch(None, current)));
        }
        Err(e) => {
            tracing::warn!(error = %e, "prior manifest is unreadable");
            return Ok(Some(mismatch(None, current)));
        }
    };

    if recorded.as_deref() == current {
        return Ok(None);
    }
    Ok(Some(mismatch(recorded, current)))
}

fn mismatch(recorded: Option<String>, current: Option<&str>) -> ManifestMismatch {
    ManifestMismatch {
        recorded,
        current: current.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn prior(dir: &Path, fingerprint: Option<&str>) {
        let value = serde_json::json!({
            "schema": MANIFEST_SCHEMA,
            "dependencyFingerprint": fingerprint,
        });
        fs::create_dir_all(dir.join("build")).unwrap();
        fs::write(dir.join("build/kiln.manifest"), value.to_string()).unwrap();
    }

    #[test]
    fn no_prior_manifest_passes() {
        let dir = tempfile::tempdir().unwrap();
        let check = check_fingerprint(dir.path(), Path::new("build"), Some("abc")).unwrap();
        assert!(check.is_none());
    }

    #[test]
    fn agreeing_fingerprint_passes() {
        let dir = tempfile::tempdir().unwrap();
        prior(dir.path(), Some("abc"));
        assert!(check_fingerprint(dir.path(), Path::new("build"), Some("abc"))
            .unwrap()
            .is_none());
        prior(dir.path(), None);
        assert!(check_fingerprint(dir.path(), Path::new("build"), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn disagreeing_fingerprint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        prior(dir.path(), Some("abc"));
        let mismatch = check_fingerprint(dir.path(), Path::new("build"), Some("def"))
            .unwrap()
            .unwrap();
        assert_eq!(mismatch.recorded.as_deref(), Some("abc"));
        assert_eq!(mismatch.current.as_deref(), Some("def"));

        let mismatch = check_fingerprint(dir.path(), Path::new("build"), None)
            .unwrap()
            .unwrap();
        assert_eq!(mismatch.current, None);
    }

    #[test]
    fn corrupt_manifest_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/kiln.manifest"), "{{{").unwrap();
        let mismatch = check_fingerprint(dir.path(), Path::new("build"), Some("abc")).unwrap();
        assert!(mismatch.is_some_and(|m| m.recorded.is_none()));
    }
}
