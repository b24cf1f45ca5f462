//! The dependency integrity auditor.
//!
//! Each remote requirement declared in `kiln.toml` is matched against the
//! versions recorded in the lock file; the best match is then located in the
//! package cache and its directory digest compared with the locked hash. A
//! requirement lands in at most one fault set, in this order of precedence:
//! unparsable constraint, missing from the lock, unsatisfied, missing from
//! the cache, hash mismatch. Requirements that pass every step are verified.
//!
//! Local imports are resolved alongside (see [`crate::local`]).

use crate::cache::PackageCache;
use crate::constraint::Constraint;
use crate::error::IntegrityError;
use crate::local::{resolve_local_imports, LocalImportFault, RootAlias};
use crate::lock::{LockFile, LOCK_FILE};
use kiln_config::{ImportSpec, WorkspaceConfig, WORKSPACE_FILE};
use kiln_diagnostics::codes;
use kiln_diagnostics::data::{
    ConstraintFailure, HashMismatch, IntegrityFault, IntegrityItem, IntegritySummary, LocalImport,
    PackageAlias,
};
use kiln_diagnostics::Diagnostic;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// A remote requirement: a name plus a version constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// Dependency name.
    pub name: String,
    /// Constraint text; absent means latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Packages declaring this requirement, sorted.
    pub declared_by: Vec<String>,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(constraint) => write!(f, "{} {constraint}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The outcome of an audit. All lists are sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Every remote requirement of the workspace.
    pub requirements: Vec<Requirement>,
    /// Whether the lock file exists.
    pub sum_found: bool,
    /// Requirement names without a lock entry.
    pub missing_in_sum: Vec<String>,
    /// Requirement names that no locked version satisfies.
    pub unsatisfied: Vec<String>,
    /// Resolved `name@version` keys absent from the cache.
    pub missing_in_cache: Vec<String>,
    /// Resolved versions whose cache digest differs from the lock.
    pub mismatched: Vec<HashMismatch>,
    /// Requirements whose constraint does not parse.
    pub parse_errors: Vec<ConstraintFailure>,
    /// Resolved `name@version` keys whose digest matched.
    pub verified: Vec<String>,
    /// Local imports whose path does not exist.
    pub local_missing: Vec<LocalImportFault>,
    /// Local imports that exist but are not declared packages.
    pub local_undeclared: Vec<LocalImportFault>,
    /// Package roots declared by several packages.
    pub aliases: Vec<RootAlias>,
    /// Transitive local dependencies per package.
    #[serde(skip)]
    pub depends_on: BTreeMap<String, Vec<String>>,
}

impl AuditReport {
    /// Remote requirements exist but the lock file does not.
    pub fn lock_missing(&self) -> bool {
        !self.sum_found && !self.requirements.is_empty()
    }

    /// Returns `true` if any dependency integrity set is non-empty.
    pub fn has_integrity_faults(&self) -> bool {
        self.lock_missing()
            || !self.missing_in_sum.is_empty()
            || !self.unsatisfied.is_empty()
            || !self.missing_in_cache.is_empty()
            || !self.mismatched.is_empty()
            || !self.parse_errors.is_empty()
    }

    /// Returns `true` if any local import failed to resolve.
    pub fn has_local_faults(&self) -> bool {
        !self.local_missing.is_empty() || !self.local_undeclared.is_empty()
    }

    /// Returns `true` if the build may proceed past the integrity gate.
    pub fn is_clean(&self) -> bool {
        !self.has_integrity_faults() && !self.has_local_faults()
    }

    /// The integrity sets as a diagnostic payload.
    pub fn summary(&self) -> IntegritySummary {
        IntegritySummary {
            sum_found: self.sum_found,
            missing_in_sum: self.missing_in_sum.clone(),
            unsatisfied: self.unsatisfied.clone(),
            missing_in_cache: self.missing_in_cache.clone(),
            mismatched: self.mismatched.clone(),
            parse_errors: self.parse_errors.clone(),
            verified: self.verified.clone(),
        }
    }

    /// One diagnostic per fault, followed by a summary when any integrity
    /// set is non-empty.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let item = |fault, key: &str, constraint: Option<String>| IntegrityItem {
            fault,
            key: key.to_string(),
            constraint,
            expected: None,
            actual: None,
        };

        if self.lock_missing() {
            out.push(
                Diagnostic::error(
                    codes::LOCK_MISSING,
                    format!(
                        "{LOCK_FILE} not found; {} requirement(s) cannot be verified",
                        self.requirements.len()
                    ),
                )
                .with_file(LOCK_FILE)
                .with_data(item(IntegrityFault::SumMissing, LOCK_FILE, None)),
            );
        }
        for name in &self.missing_in_sum {
            let constraint = self.constraints_of(name);
            out.push(
                Diagnostic::error(
                    codes::MISSING_IN_LOCK,
                    format!("dependency '{name}' has no entry in {LOCK_FILE}"),
                )
                .with_file(LOCK_FILE)
                .with_data(item(IntegrityFault::MissingInSum, name.as_str(), constraint)),
            );
        }
        for name in &self.unsatisfied {
            let constraint = self.constraints_of(name);
            out.push(
                Diagnostic::error(
                    codes::UNSATISFIED,
                    format!(
                        "no locked version of '{name}' satisfies {}",
                        constraint.as_deref().unwrap_or("==latest")
                    ),
                )
                .with_file(LOCK_FILE)
                .with_data(item(IntegrityFault::Unsatisfied, name.as_str(), constraint)),
            );
        }
        for key in &self.missing_in_cache {
            out.push(
                Diagnostic::error(
                    codes::MISSING_IN_CACHE,
                    format!("{key} is locked but missing from the package cache"),
                )
                .with_data(item(IntegrityFault::MissingInCache, key.as_str(), None)),
            );
        }
        for mismatch in &self.mismatched {
            out.push(
                Diagnostic::error(
                    codes::HASH_MISMATCH,
                    format!("cached content of {} does not match {LOCK_FILE}", mismatch.key),
                )
                .with_data(IntegrityItem {
                    expected: Some(mismatch.expected.clone()),
                    actual: Some(mismatch.actual.clone()),
                    ..item(IntegrityFault::Mismatched, mismatch.key.as_str(), None)
                }),
            );
        }
        for failure in &self.parse_errors {
            out.push(
                Diagnostic::error(codes::CONSTRAINT_PARSE, failure.message.clone())
                    .with_file(WORKSPACE_FILE)
                    .with_data(item(
                        IntegrityFault::ParseError,
                        failure.requirement.as_str(),
                        None,
                    )),
            );
        }
        if self.has_integrity_faults() {
            out.push(
                Diagnostic::error(codes::INTEGRITY_SUMMARY, "dependency integrity check failed")
                    .with_file(LOCK_FILE)
                    .with_data(self.summary()),
            );
        }

        let local = |fault: &LocalImportFault| LocalImport {
            package: fault.package.clone(),
            import: fault.import.clone(),
            resolved: fault.resolved.clone(),
        };
        for fault in &self.local_missing {
            out.push(
                Diagnostic::error(
                    codes::LOCAL_IMPORT_MISSING,
                    format!("local import '{}' not found at {}", fault.import, fault.resolved),
                )
                .with_package(&fault.package)
                .with_file(WORKSPACE_FILE)
                .with_data(local(fault)),
            );
        }
        for fault in &self.local_undeclared {
            out.push(
                Diagnostic::error(
                    codes::LOCAL_IMPORT_UNDECLARED,
                    format!(
                        "local import '{}' resolves to {}, which is not a declared package",
                        fault.import, fault.resolved
                    ),
                )
                .with_package(&fault.package)
                .with_file(WORKSPACE_FILE)
                .with_data(local(fault)),
            );
        }
        for alias in &self.aliases {
            out.push(
                Diagnostic::warning(
                    codes::PACKAGE_ROOT_ALIAS,
                    format!(
                        "packages {} share the root {}",
                        alias.packages.join(", "),
                        alias.root
                    ),
                )
                .with_file(WORKSPACE_FILE)
                .with_data(PackageAlias {
                    root: alias.root.clone(),
                    packages: alias.packages.clone(),
                }),
            );
        }
        out
    }

    fn constraints_of(&self, name: &str) -> Option<String> {
        let constraints: Vec<&str> = self
            .requirements
            .iter()
            .filter(|r| r.name == name)
            .filter_map(|r| r.constraint.as_deref())
            .collect();
        (!constraints.is_empty()).then(|| constraints.join(", "))
    }
}

/// Collects the remote requirements of a workspace, merging duplicates.
pub fn collect_requirements(config: &WorkspaceConfig) -> Vec<Requirement> {
    let mut merged: BTreeMap<(String, Option<String>), BTreeSet<String>> = BTreeMap::new();
    for pkg in &config.packages {
        for entry in &pkg.import {
            if let Ok(ImportSpec::Remote { name, constraint }) = ImportSpec::parse(&pkg.name, entry)
            {
                merged
                    .entry((name, constraint))
                    .or_default()
                    .insert(pkg.name.clone());
            }
        }
    }
    merged
        .into_iter()
        .map(|((name, constraint), declared_by)| Requirement {
            name,
            constraint,
            declared_by: declared_by.into_iter().collect(),
        })
        .collect()
}

/// Audits a workspace against `kiln.lock` and the package cache.
pub fn audit(
    workspace_dir: &Path,
    config: &WorkspaceConfig,
    cache: &PackageCache,
) -> Result<AuditReport, IntegrityError> {
    let lock = LockFile::load(&workspace_dir.join(LOCK_FILE))?;
    audit_with_lock(workspace_dir, config, lock.as_ref(), cache)
}

/// Audits a workspace against an already loaded lock file.
///
/// Read-only: neither the lock file nor the cache is modified.
pub fn audit_with_lock(
    workspace_dir: &Path,
    config: &WorkspaceConfig,
    lock: Option<&LockFile>,
    cache: &PackageCache,
) -> Result<AuditReport, IntegrityError> {
    let requirements = collect_requirements(config);
    tracing::debug!(
        requirements = requirements.len(),
        lock = lock.is_some(),
        cache = %cache.root().display(),
        "auditing dependencies"
    );

    let mut missing_in_sum = BTreeSet::new();
    let mut unsatisfied = BTreeSet::new();
    let mut missing_in_cache = BTreeSet::new();
    let mut mismatched = BTreeSet::new();
    let mut parse_errors = BTreeSet::new();
    let mut verified = BTreeSet::new();

    for req in &requirements {
        let constraint = match Constraint::parse_optional(req.constraint.as_deref()) {
            Ok(constraint) => constraint,
            Err(e) => {
                parse_errors.insert(ConstraintFailure {
                    requirement: req.to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        let Some(versions) = lock.and_then(|lock| lock.versions(&req.name)) else {
            missing_in_sum.insert(req.name.clone());
            continue;
        };
        let Some(version) = constraint.best_match(versions.keys().map(String::as_str)) else {
            unsatisfied.insert(req.name.clone());
            continue;
        };
        let key = format!("{}@{version}", req.name);
        let expected = versions[version].to_ascii_lowercase();
        match cache.digest(&req.name, version)? {
            None => {
                missing_in_cache.insert(key);
            }
            Some(actual) if actual != expected => {
                tracing::warn!(%key, %expected, %actual, "cache digest mismatch");
                mismatched.insert(HashMismatch {
                    key,
                    expected,
                    actual,
                });
            }
            Some(_) => {
                verified.insert(key);
            }
        }
    }

    let local = resolve_local_imports(workspace_dir, config)?;

    Ok(AuditReport {
        requirements,
        sum_found: lock.is_some(),
        missing_in_sum: missing_in_sum.into_iter().collect(),
        unsatisfied: unsatisfied.into_iter().collect(),
        missing_in_cache: missing_in_cache.into_iter().collect(),
        mismatched: mismatched.into_iter().collect(),
        parse_errors: parse_errors.into_iter().collect(),
        verified: verified.into_iter().collect(),
        local_missing: local.missing,
        local_undeclared: local.undeclared,
        aliases: local.aliases,
        depends_on: local.depends_on,
    })
}
