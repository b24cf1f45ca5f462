//! The kiln build driver.
//!
//! Commands run against a [`BuildContext`], which owns the diagnostic
//! stream of the invocation. [`build()`] gates a build on the workspace,
//! the prior manifest, detached signatures and the dependency audit before
//! anything is compiled; [`audit()`] runs the dependency gate alone. The
//! exit category is read from the stream with [`BuildContext::finish`].

#![warn(missing_docs)]

pub mod audit;
pub mod build;
pub mod context;
pub mod error;
mod gate;
pub mod ports;

pub use audit::audit;
pub use build::{build, BuildOptions, BuildOutcome};
pub use context::BuildContext;
pub use error::DriverError;
pub use ports::Ports;
