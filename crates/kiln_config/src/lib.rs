//! Parsing and validation of `kiln.toml` workspace files.
//!
//! This crate reads the workspace file and produces a strongly-typed
//! [`WorkspaceConfig`], classifies package import entries into local and
//! remote [`ImportSpec`]s, and resolves the toolchain section into a
//! [`ResolvedToolchain`] with a concrete environment matrix.

#![warn(missing_docs)]

pub mod error;
pub mod import;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use import::ImportSpec;
pub use loader::{load_workspace, load_workspace_from_str, WORKSPACE_FILE};
pub use resolve::{resolve_toolchain, ResolvedToolchain};
pub use types::*;
