//! Toolchain resolution: turning the `[toolchain]` section into concrete settings.

use crate::error::ConfigError;
use crate::types::WorkspaceConfig;
use kiln_common::{Env, Target};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Default build output directory.
pub const DEFAULT_TARGET_DIR: &str = "build";
/// Default backend driver.
pub const DEFAULT_BACKEND: &str = "clang";
/// Default front-end executable.
pub const DEFAULT_FRONTEND: &str = "kilnc";

/// A fully resolved toolchain configuration.
///
/// The environment matrix is de-duplicated and sorted; when the workspace
/// declares none it holds the host environment alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToolchain {
    /// Build output directory, relative to the workspace.
    pub target_dir: PathBuf,
    /// The environment matrix.
    pub envs: Vec<Env>,
    /// `true` when `envs` was defaulted to the host.
    pub envs_defaulted: bool,
    /// Backend driver executable.
    pub backend: String,
    /// Front-end executable.
    pub frontend: String,
    /// Worker pool bound, `None` for one worker per CPU.
    pub concurrency: Option<usize>,
    /// Link options.
    pub link_options: Vec<String>,
    /// Environments excluded from linking.
    pub link_disabled: BTreeSet<Env>,
}

impl ResolvedToolchain {
    /// The build matrix: the default host build, then each declared
    /// environment in sorted order.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = vec![Target::host()];
        if !self.envs_defaulted {
            targets.extend(self.envs.iter().cloned().map(Target::Env));
        }
        targets
    }

    /// Returns `true` if linking is disabled for `target`.
    pub fn link_disabled_for(&self, target: &Target) -> bool {
        target
            .declared_env()
            .is_some_and(|env| self.link_disabled.contains(env))
    }
}

/// Resolves the toolchain section of a workspace.
pub fn resolve_toolchain(config: &WorkspaceConfig) -> Result<ResolvedToolchain, ConfigError> {
    let compiler = &config.toolchain.compiler;
    let linker = &config.toolchain.linker;

    let target_dir = match compiler.target.as_deref().map(str::trim) {
        None | Some("") => PathBuf::from(DEFAULT_TARGET_DIR),
        Some(target) => validate_target_dir(target)?,
    };

    let declared = compiler
        .env
        .iter()
        .map(|s| s.parse::<Env>())
        .collect::<Result<BTreeSet<_>, _>>()?;
    let envs_defaulted = declared.is_empty();
    let envs = if envs_defaulted {
        vec![Env::host()]
    } else {
        declared.into_iter().collect()
    };

    let link_disabled = linker
        .disable
        .iter()
        .map(|s| s.parse::<Env>())
        .collect::<Result<BTreeSet<_>, _>>()?;

    let non_empty = |v: &Option<String>, default: &str| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    Ok(ResolvedToolchain {
        target_dir,
        envs,
        envs_defaulted,
        backend: non_empty(&compiler.backend, DEFAULT_BACKEND),
        frontend: non_empty(&compiler.frontend, DEFAULT_FRONTEND),
        concurrency: compiler.concurrency.filter(|n| *n > 0),
        link_options: linker.options.clone(),
        link_disabled,
    })
}

/// The target directory must stay inside the workspace.
fn validate_target_dir(target: &str) -> Result<PathBuf, ConfigError> {
    let path = Path::new(target);
    if path.is_absolute() || target.starts_with('/') || target.starts_with('\\') {
        return Err(ConfigError::ValidationError(format!(
            "toolchain.compiler.target must be workspace-relative, got '{target}'"
        )));
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "toolchain.compiler.target must not leave the workspace, got '{target}'"
                )))
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "toolchain.compiler.target must name a subdirectory".to_string(),
        ));
    }
    Ok(clean)
}
