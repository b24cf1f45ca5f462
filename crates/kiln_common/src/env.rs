//! Target environments expressed as `os/arch` pairs.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// An `os/arch` target pair for which artifacts are produced independently.
///
/// Ordering is lexical on `os` then `arch`, which matches the ordering of the
/// rendered `os/arch` string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Env {
    os: String,
    arch: String,
}

/// Error returned when a string is not a valid `os/arch` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid environment '{0}': expected os/arch")]
pub struct ParseEnvError(pub String);

impl Env {
    /// Creates an environment from its two halves.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The environment of the machine running the driver.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os, arch)
    }

    /// The operating system half.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// The architecture half.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Relative directory `<os>/<arch>` used for environment-scoped subtrees.
    pub fn subdir(&self) -> PathBuf {
        PathBuf::from(&self.os).join(&self.arch)
    }
}

fn valid_half(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for Env {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((os, arch)) if valid_half(os) && valid_half(arch) => Ok(Self::new(os, arch)),
            _ => Err(ParseEnvError(s.to_string())),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl Serialize for Env {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Env {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EnvVisitor;

        impl Visitor<'_> for EnvVisitor {
            type Value = Env;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an os/arch string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(EnvVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid() {
        let env: Env = "linux/amd64".parse().unwrap();
        assert_eq!(env.os(), "linux");
        assert_eq!(env.arch(), "amd64");
        assert_eq!(env.to_string(), "linux/amd64");
    }

    #[test]
    fn parse_trims_whitespace() {
        let env: Env = " darwin/arm64 ".parse().unwrap();
        assert_eq!(env, Env::new("darwin", "arm64"));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["linux", "/amd64", "linux/", "linux/amd64/extra", "a b/c", ""] {
            assert!(bad.parse::<Env>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn ordering_matches_rendered_string() {
        let mut envs: Vec<Env> = ["linux/arm64", "darwin/arm64", "linux/amd64"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        envs.sort();
        let rendered: Vec<String> = envs.iter().map(|e| e.to_string()).collect();
        assert_eq!(rendered, vec!["darwin/arm64", "linux/amd64", "linux/arm64"]);
    }

    #[test]
    fn host_is_well_formed() {
        let host = Env::host();
        let reparsed: Env = host.to_string().parse().unwrap();
        assert_eq!(reparsed, host);
    }

    #[test]
    fn subdir_nests_arch_under_os() {
        let env = Env::new("linux", "amd64");
        assert_eq!(env.subdir(), PathBuf::from("linux").join("amd64"));
    }

    #[test]
    fn serde_as_string() {
        let env = Env::new("windows", "amd64");
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, "\"windows/amd64\"");
        let back: Env = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
