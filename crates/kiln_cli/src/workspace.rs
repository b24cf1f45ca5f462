//! Locating the workspace a command runs in.

use kiln_config::WORKSPACE_FILE;
use std::path::{Path, PathBuf};

/// Walks up from `start` to the nearest directory containing `kiln.toml`.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(WORKSPACE_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {WORKSPACE_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves `--workspace`: a workspace file names its directory, a directory
/// is used as is. Without the flag the search starts at the current
/// directory.
pub fn resolve_workspace(flag: Option<&Path>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match flag {
        Some(path) if path.is_file() => Ok(path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))),
        Some(path) => Ok(path.to_path_buf()),
        None => find_workspace_root(&std::env::current_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_workspace_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kiln.toml"), "").unwrap();
        let nested = dir.path().join("src/net");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn missing_workspace_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_workspace_root(dir.path()).unwrap_err();
        assert!(err.to_string().contains("kiln.toml"));
    }

    #[test]
    fn workspace_flag_accepts_file_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kiln.toml");
        fs::write(&file, "").unwrap();
        assert_eq!(resolve_workspace(Some(&file)).unwrap(), dir.path());
        assert_eq!(resolve_workspace(Some(dir.path())).unwrap(), dir.path());
    }
}
