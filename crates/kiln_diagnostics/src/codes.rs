//! The codes emitted by the driver itself.
//!
//! Front-end diagnostics carry their own 6xx codes and are not listed here,
//! apart from the one substituted for codes outside that range.

use crate::code::{Category, DiagnosticCode};

const fn error(number: u16) -> DiagnosticCode {
    DiagnosticCode::new(Category::Error, number)
}

/// The workspace file violates its schema.
pub const WORKSPACE_SCHEMA: DiagnosticCode = error(101);

/// A declared package root does not exist.
pub const MISSING_PACKAGE_ROOT: DiagnosticCode = error(201);
/// Reading the workspace, lock file or cache failed.
pub const FILESYSTEM_ACCESS: DiagnosticCode = error(202);
/// Writing a build artifact failed.
pub const ARTIFACT_WRITE: DiagnosticCode = error(203);

/// Remote requirements exist but the lock file does not.
pub const LOCK_MISSING: DiagnosticCode = error(301);
/// A requirement has no entry in the lock file.
pub const MISSING_IN_LOCK: DiagnosticCode = error(302);
/// No locked version satisfies a requirement's constraint.
pub const UNSATISFIED: DiagnosticCode = error(303);
/// The resolved version is not present in the package cache.
pub const MISSING_IN_CACHE: DiagnosticCode = error(304);
/// The cache directory hash differs from the locked hash.
pub const HASH_MISMATCH: DiagnosticCode = error(305);
/// A version constraint could not be parsed.
pub const CONSTRAINT_PARSE: DiagnosticCode = error(306);
/// Summary of every dependency integrity fault.
pub const INTEGRITY_SUMMARY: DiagnosticCode = error(307);
/// The prior manifest's dependency fingerprint disagrees with the lock file.
pub const MANIFEST_MISMATCH: DiagnosticCode = error(308);
/// A detached signature does not match the signed file.
pub const SIGNATURE_MISMATCH: DiagnosticCode = error(309);
/// The lock file exists but cannot be parsed.
pub const LOCK_UNREADABLE: DiagnosticCode = error(310);

/// A local import path does not exist.
pub const LOCAL_IMPORT_MISSING: DiagnosticCode = error(401);
/// A local import path exists but is not a declared package.
pub const LOCAL_IMPORT_UNDECLARED: DiagnosticCode = error(402);
/// Two declared packages resolve to the same root.
pub const PACKAGE_ROOT_ALIAS: DiagnosticCode = DiagnosticCode::new(Category::Warning, 403);

/// An operation needs a capability the unit does not declare.
pub const CAPABILITY_NOT_DECLARED: DiagnosticCode = error(501);
/// An operation is used under a trust level that forbids it.
pub const TRUST_VIOLATION: DiagnosticCode = error(502);

/// Replaces a front-end code that falls outside the 6xx range.
pub const FRONTEND_UNCLASSIFIED: DiagnosticCode = error(699);

/// The native backend failed to link.
pub const LINK_FAILED: DiagnosticCode = error(701);
/// The native backend failed to compile an object.
pub const OBJECT_COMPILE_FAILED: DiagnosticCode = error(702);
/// The front-end process failed or produced unreadable output.
pub const FRONTEND_TOOL_FAILED: DiagnosticCode = error(703);

/// The build completed.
pub const BUILD_OK: DiagnosticCode = DiagnosticCode::new(Category::Info, 901);
/// Linking was skipped for a target.
pub const LINK_SKIPPED: DiagnosticCode = DiagnosticCode::new(Category::Info, 902);
/// The dependency audit found nothing to report.
pub const AUDIT_CLEAN: DiagnosticCode = DiagnosticCode::new(Category::Info, 903);
