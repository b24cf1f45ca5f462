//! Deterministic content digests for cache directories and signed files.

use crate::error::IntegrityError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Computes the SHA-256 hex digest of a directory's contents.
///
/// Entries are visited sorted by file name. Each contributes one line:
/// `F:<rel>:<sha256>` for files, `D:<rel>` for directories and
/// `L:<rel>:<sha256-of-target>` for symlinks. Metadata such as timestamps
/// and permissions does not participate.
pub fn hash_directory(path: &Path) -> Result<String, IntegrityError> {
    let mut lines = Vec::new();

    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(path).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            IntegrityError::io(at, source)
        })?;
        let Ok(rel) = entry.path().strip_prefix(path) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_type = entry.file_type();
        let line = if file_type.is_symlink() {
            let target =
                fs::read_link(entry.path()).map_err(|e| IntegrityError::io(entry.path(), e))?;
            format!("L:{rel}:{}", hash_bytes(target.to_string_lossy().as_bytes()))
        } else if file_type.is_dir() {
            format!("D:{rel}")
        } else if file_type.is_file() {
            format!("F:{rel}:{}", hash_file(entry.path())?)
        } else {
            continue;
        };
        lines.push(line);
    }

    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the SHA-256 hex digest of a file.
pub fn hash_file(path: &Path) -> Result<String, IntegrityError> {
    let mut file = fs::File::open(path).map_err(|e| IntegrityError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer).map_err(|e| IntegrityError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the SHA-256 hex digest of a byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.kiln"), "fn main() {}").unwrap();
        fs::write(root.join("README"), "hello").unwrap();
    }

    #[test]
    fn empty_input_digest() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_content_same_digest() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        populate(a.path());
        populate(b.path());
        assert_eq!(
            hash_directory(a.path()).unwrap(),
            hash_directory(b.path()).unwrap()
        );
    }

    #[test]
    fn content_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let before = hash_directory(dir.path()).unwrap();
        fs::write(dir.path().join("README"), "changed").unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn empty_directory_participates() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let before = hash_directory(dir.path()).unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_directory(&dir.path().join("absent")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn file_digest_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"abc"));
    }
}
