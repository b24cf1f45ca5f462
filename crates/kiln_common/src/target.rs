//! Build targets: the default host build and per-environment builds.

use crate::env::Env;
use std::fmt;
use std::path::PathBuf;

/// One column of the build matrix.
///
/// The default build always runs for the host and writes directly under the
/// target directory. Every environment the workspace declares additionally
/// gets its own `<os>/<arch>` subtree. Default sorts before any environment.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Target {
    /// The host build with the unscoped layout.
    Default(Env),
    /// A declared environment with the `<os>/<arch>` layout.
    Env(Env),
}

impl Target {
    /// The default build for the current host.
    pub fn host() -> Self {
        Target::Default(Env::host())
    }

    /// The environment compiled for.
    pub fn env(&self) -> &Env {
        match self {
            Target::Default(env) | Target::Env(env) => env,
        }
    }

    /// Returns `true` for the default build.
    pub fn is_default(&self) -> bool {
        matches!(self, Target::Default(_))
    }

    /// The declared environment, `None` for the default build.
    pub fn declared_env(&self) -> Option<&Env> {
        match self {
            Target::Default(_) => None,
            Target::Env(env) => Some(env),
        }
    }

    /// Subdirectory of the target directory holding this target's tree.
    pub fn subdir(&self) -> PathBuf {
        match self {
            Target::Default(_) => PathBuf::new(),
            Target::Env(env) => env.subdir(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Default(_) => f.write_str("default"),
            Target::Env(env) => fmt::Display::fmt(env, f),
        }
    }
}
