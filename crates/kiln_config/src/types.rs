//! Configuration types deserialized from `kiln.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// The top-level workspace configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace metadata.
    #[serde(default)]
    pub workspace: WorkspaceMeta,
    /// Declared packages.
    #[serde(default)]
    pub packages: Vec<PackageDecl>,
    /// Compiler and linker settings.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

/// Workspace-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceMeta {
    /// Workspace file format version.
    #[serde(default)]
    pub version: String,
}

/// A package declared in the workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDecl {
    /// Optional role key; the package keyed `main` names the binary.
    #[serde(default)]
    pub key: Option<String>,
    /// Package name, unique within the workspace.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Package root, relative to the workspace directory.
    pub root: String,
    /// Import entries: `"<path> [constraint]"`.
    #[serde(default)]
    pub import: Vec<String>,
}

/// The `[toolchain]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolchainConfig {
    /// Compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Linker settings.
    #[serde(default)]
    pub linker: LinkerConfig,
}

/// The `[toolchain.compiler]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    /// Build output directory, relative to the workspace. Defaults to `build`.
    pub target: Option<String>,
    /// Target environments as `os/arch` strings.
    ///
    /// Accepts either a single string or a list of strings.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub env: Vec<String>,
    /// Backend driver executable. Defaults to `clang`.
    pub backend: Option<String>,
    /// Front-end executable. Defaults to `kilnc`.
    pub frontend: Option<String>,
    /// Worker pool bound; `0` or absent means one worker per CPU.
    pub concurrency: Option<usize>,
}

/// The `[toolchain.linker]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkerConfig {
    /// Link options such as `PIE`, `static`, `dead_strip`.
    #[serde(default)]
    pub options: Vec<String>,
    /// Environments excluded from linking.
    #[serde(default)]
    pub disable: Vec<String>,
}

impl WorkspaceConfig {
    /// Looks up a package by name.
    pub fn package(&self, name: &str) -> Option<&PackageDecl> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// The binary name: the package keyed `main`, or `app`.
    pub fn binary_name(&self) -> &str {
        self.packages
            .iter()
            .find(|p| p.key.as_deref() == Some("main"))
            .map(|p| p.name.as_str())
            .unwrap_or("app")
    }
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `env = "linux/amd64"` as well as `env = ["linux/amd64", "darwin/arm64"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> WorkspaceConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn env_single_string() {
        let config = parse(
            r#"
[toolchain.compiler]
env = "linux/amd64"
"#,
        );
        assert_eq!(config.toolchain.compiler.env, vec!["linux/amd64"]);
    }

    #[test]
    fn env_list() {
        let config = parse(
            r#"
[toolchain.compiler]
env = ["linux/amd64", "darwin/arm64"]
"#,
        );
        assert_eq!(config.toolchain.compiler.env.len(), 2);
    }

    #[test]
    fn defaults_are_empty() {
        let config = parse("");
        assert!(config.packages.is_empty());
        assert!(config.toolchain.compiler.target.is_none());
        assert!(config.toolchain.compiler.env.is_empty());
        assert!(config.toolchain.linker.disable.is_empty());
    }

    #[test]
    fn binary_name_prefers_main_key() {
        let config = parse(
            r#"
[[packages]]
name = "lib"
version = "0.1.0"
root = "./lib"

[[packages]]
key = "main"
name = "server"
version = "0.1.0"
root = "./src"
"#,
        );
        assert_eq!(config.binary_name(), "server");
        assert!(config.package("lib").is_some());
    }

    #[test]
    fn binary_name_defaults_to_app() {
        let config = parse(
            r#"
[[packages]]
name = "lib"
version = "0.1.0"
root = "./lib"
"#,
        );
        assert_eq!(config.binary_name(), "app");
    }
}
