//! External tool invocation for the kiln driver.
//!
//! Every subprocess the driver starts goes through the [`ToolInvoker`] port,
//! so tests can substitute a fake. [`Backend`] assembles native backend
//! command lines and [`Linker`] runs the per-target link step.

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod link;
pub mod tool;

pub use backend::{link_flags, target_triple, Backend};
pub use error::ToolError;
pub use link::{LinkJob, LinkOutcome, Linker};
pub use tool::{ProcessInvoker, ToolInvoker, ToolOutput};
