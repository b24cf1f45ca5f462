//! Shared foundational types used across the kiln toolchain driver.
//!
//! This crate provides content hashing for build identity, the `os/arch`
//! [`Env`] target pair, the [`Target`] build matrix column, and helpers for
//! rendering workspace-relative paths.

#![warn(missing_docs)]

pub mod env;
pub mod hash;
pub mod path;
pub mod target;

pub use env::{Env, ParseEnvError};
pub use hash::{ContentHash, ParseHashError};
pub use path::{normalize, relative_to, slash, RelPathError};
pub use target::Target;
