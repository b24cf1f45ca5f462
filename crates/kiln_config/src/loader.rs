//! Workspace file loading and validation.

use crate::error::ConfigError;
use crate::import::ImportSpec;
use crate::resolve::resolve_toolchain;
use crate::types::WorkspaceConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// Name of the workspace file at the workspace root.
pub const WORKSPACE_FILE: &str = "kiln.toml";

/// Loads and validates `kiln.toml` from a workspace directory.
pub fn load_workspace(workspace_dir: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let path = workspace_dir.join(WORKSPACE_FILE);
    let content = std::fs::read_to_string(&path)?;
    load_workspace_from_str(&content)
}

/// Parses and validates a workspace from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_workspace_from_str(content: &str) -> Result<WorkspaceConfig, ConfigError> {
    let config: WorkspaceConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_workspace(&config)?;
    Ok(config)
}

/// Checks required fields, import syntax, and the toolchain section.
fn validate_workspace(config: &WorkspaceConfig) -> Result<(), ConfigError> {
    let mut names = BTreeSet::new();
    for (i, pkg) in config.packages.iter().enumerate() {
        let required = [
            ("name", &pkg.name),
            ("version", &pkg.version),
            ("root", &pkg.root),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("packages[{i}].{field}")));
            }
        }
        let root = Path::new(pkg.root.trim());
        if root.has_root() || kiln_common::normalize(root).starts_with("..") {
            return Err(ConfigError::ValidationError(format!(
                "packages[{i}].root must stay inside the workspace, got '{}'",
                pkg.root
            )));
        }
        if !names.insert(pkg.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate package name '{}'",
                pkg.name
            )));
        }
        for entry in &pkg.import {
            ImportSpec::parse(&pkg.name, entry)?;
        }
    }
    resolve_toolchain(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[workspace]
version = "1.0.0"

[[packages]]
key = "main"
name = "app"
version = "0.0.1"
root = "./src"
import = ["./lib2", "modA ^1.2.0"]
"#;

    #[test]
    fn parse_minimal_workspace() {
        let config = load_workspace_from_str(MINIMAL).unwrap();
        assert_eq!(config.workspace.version, "1.0.0");
        assert_eq!(config.packages.len(), 1);
        assert_eq!(config.packages[0].import.len(), 2);
    }

    #[test]
    fn parse_full_workspace() {
        let toml = r#"
[workspace]
version = "1.0.0"

[[packages]]
key = "main"
name = "app"
version = "0.0.1"
root = "./src"
import = ["./lib2"]

[[packages]]
name = "lib2"
version = "0.1.0"
root = "./lib2"

[toolchain.compiler]
target = "./out"
env = ["linux/amd64", "darwin/arm64"]
backend = "clang-17"
frontend = "kilnc"
concurrency = 2

[toolchain.linker]
options = ["PIE"]
disable = ["darwin/arm64"]
"#;
        let config = load_workspace_from_str(toml).unwrap();
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.toolchain.compiler.concurrency, Some(2));
        assert_eq!(config.toolchain.linker.disable, vec!["darwin/arm64"]);
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[[packages]]
name = ""
version = "0.0.1"
root = "./src"
"#;
        let err = load_workspace_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "packages[0].name"));
    }

    #[test]
    fn duplicate_package_errors() {
        let toml = r#"
[[packages]]
name = "app"
version = "0.0.1"
root = "./a"

[[packages]]
name = "app"
version = "0.0.2"
root = "./b"
"#;
        let err = load_workspace_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn root_outside_workspace_errors() {
        for root in ["/abs/pkg", "../sibling", "./src/../../up"] {
            let toml = format!(
                "[[packages]]\nname = \"app\"\nversion = \"0.0.1\"\nroot = \"{root}\"\n"
            );
            match load_workspace_from_str(&toml).unwrap_err() {
                ConfigError::ValidationError(msg) => assert!(msg.contains("packages[0].root")),
                other => panic!("{root}: unexpected {other:?}"),
            }
        }
        let toml = "[[packages]]\nname = \"app\"\nversion = \"0.0.1\"\nroot = \"a/../src\"\n";
        assert!(load_workspace_from_str(toml).is_ok());
    }

    #[test]
    fn invalid_import_errors() {
        let toml = r#"
[[packages]]
name = "app"
version = "0.0.1"
root = "./src"
import = [""]
"#;
        let err = load_workspace_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImport { .. }));
    }

    #[test]
    fn absolute_target_errors() {
        let toml = r#"
[toolchain.compiler]
target = "/tmp/out"
"#;
        let err = load_workspace_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn bad_env_errors() {
        let toml = r#"
[toolchain.compiler]
env = ["linux"]
"#;
        let err = load_workspace_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_workspace_from_str("this is not toml {{{").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(WORKSPACE_FILE), MINIMAL).unwrap();
        let config = load_workspace(dir.path()).unwrap();
        assert_eq!(config.packages[0].name, "app");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_workspace(dir.path()).unwrap_err();
        assert!(err.is_io());
    }
}
