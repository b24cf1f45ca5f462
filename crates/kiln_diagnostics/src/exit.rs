//! Process exit categories.

use crate::code::FaultClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single classification an invocation terminates with.
///
/// Ordered by severity: when several faults occur, the greatest category
/// wins, so integrity failures are never masked by user or I/O errors.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCategory {
    /// Success.
    #[default]
    Ok,
    /// Bad input, configuration, or a policy violation.
    User,
    /// Filesystem or subprocess failure.
    Io,
    /// Dependency or manifest verification failure.
    Integrity,
}

impl ExitCategory {
    /// The category an error of the given fault class contributes.
    pub fn for_class(class: FaultClass) -> Self {
        match class {
            FaultClass::Filesystem | FaultClass::Tool => ExitCategory::Io,
            FaultClass::Integrity => ExitCategory::Integrity,
            FaultClass::Summary => ExitCategory::Ok,
            FaultClass::Schema
            | FaultClass::Import
            | FaultClass::Capability
            | FaultClass::FrontEnd
            | FaultClass::Other => ExitCategory::User,
        }
    }

    /// The process exit code.
    pub fn code(self) -> i32 {
        match self {
            ExitCategory::Ok => 0,
            ExitCategory::User => 1,
            ExitCategory::Io => 2,
            ExitCategory::Integrity => 3,
        }
    }

    /// Returns `true` for [`ExitCategory::Ok`].
    pub fn is_ok(self) -> bool {
        self == ExitCategory::Ok
    }
}

impl fmt::Display for ExitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCategory::Ok => write!(f, "ok"),
            ExitCategory::User => write!(f, "user error"),
            ExitCategory::Io => write!(f, "i/o error"),
            ExitCategory::Integrity => write!(f, "integrity error"),
        }
    }
}
