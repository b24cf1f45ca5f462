//! Dependency integrity for kiln workspaces.
//!
//! The [`audit`] function reconciles the remote requirements declared in
//! `kiln.toml` with the lock file and the package cache, and checks that
//! local path imports resolve to declared packages. Discrepancies are data in
//! the returned [`AuditReport`]; only filesystem failures are errors.

#![warn(missing_docs)]

pub mod audit;
pub mod cache;
pub mod constraint;
pub mod digest;
pub mod error;
pub mod local;
pub mod lock;
pub mod signature;

pub use audit::{audit, audit_with_lock, collect_requirements, AuditReport, Requirement};
pub use cache::{PackageCache, CACHE_ENV};
pub use constraint::{Constraint, ConstraintError, Op};
pub use digest::{hash_bytes, hash_directory, hash_file};
pub use error::IntegrityError;
pub use local::{resolve_local_imports, LocalImportFault, LocalResolution, RootAlias};
pub use lock::{fingerprint_of, LockFile, LOCK_FILE, LOCK_SCHEMA};
pub use signature::{check_detached, signature_path, SignatureCheck, SIGNATURE_SUFFIX};
