//! Typed diagnostic payloads.
//!
//! Each fault kind has its own payload struct. On the wire they share one
//! `data` field, discriminated by a `kind` tag. [`CustomData`] keeps the
//! format open for payloads this crate does not know about, such as those
//! produced by the language front-end.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The payload attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiagnosticData {
    /// One dependency integrity fault.
    IntegrityItem(IntegrityItem),
    /// Every dependency integrity fault of one audit.
    IntegritySummary(IntegritySummary),
    /// Prior manifest fingerprint disagrees with the lock file.
    ManifestMismatch(ManifestMismatch),
    /// Detached signature disagrees with its file.
    SignatureMismatch(SignatureMismatch),
    /// A local import that failed to resolve.
    LocalImport(LocalImport),
    /// Declared packages sharing one root.
    PackageAlias(PackageAlias),
    /// A package root that does not exist.
    MissingRoot(MissingRoot),
    /// A capability or trust violation.
    Capability(CapabilityViolation),
    /// The backend failed to link a binary.
    LinkFailure(ToolFailure),
    /// An external tool failed outside of linking.
    ToolFailure(ToolFailure),
    /// Linking was skipped for a target.
    LinkSkipped(LinkSkipped),
    /// Summary of a successful build.
    BuildSummary(BuildSummary),
    /// Any other payload.
    Custom(CustomData),
}

/// Which integrity set a requirement landed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntegrityFault {
    /// No lock file exists.
    SumMissing,
    /// The lock file has no entry for the requirement.
    MissingInSum,
    /// No locked version satisfies the constraint.
    Unsatisfied,
    /// The resolved version is absent from the cache.
    MissingInCache,
    /// The cached content hash differs from the lock.
    Mismatched,
    /// The constraint could not be parsed.
    ParseError,
}

/// Payload for a single integrity fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityItem {
    /// The fault set.
    pub fault: IntegrityFault,
    /// `name` or `name@version`.
    pub key: String,
    /// The constraint text, when the fault concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Hash recorded in the lock file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Hash recomputed from the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// A hash mismatch carried in summaries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashMismatch {
    /// `name@version`.
    pub key: String,
    /// Hash recorded in the lock file.
    pub expected: String,
    /// Hash recomputed from the cache.
    pub actual: String,
}

/// An unparsable constraint carried in summaries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintFailure {
    /// The full requirement text.
    pub requirement: String,
    /// Why parsing failed.
    pub message: String,
}

/// Payload listing every integrity set of an audit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegritySummary {
    /// Whether the lock file exists.
    pub sum_found: bool,
    /// Requirements without a lock entry.
    pub missing_in_sum: Vec<String>,
    /// Requirements no locked version satisfies.
    pub unsatisfied: Vec<String>,
    /// Resolved `name@version` keys absent from the cache.
    pub missing_in_cache: Vec<String>,
    /// Resolved versions whose cache hash differs.
    pub mismatched: Vec<HashMismatch>,
    /// Unparsable constraints.
    pub parse_errors: Vec<ConstraintFailure>,
    /// Resolved `name@version` keys that verified.
    pub verified: Vec<String>,
}

/// Payload for a manifest fingerprint disagreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMismatch {
    /// Fingerprint stored in the prior manifest.
    pub recorded: Option<String>,
    /// Fingerprint of the current lock file.
    pub current: Option<String>,
}

/// Payload for a signature disagreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMismatch {
    /// The signed file.
    pub signed: String,
    /// Digest of the signed file.
    pub expected: String,
    /// Content of the signature file.
    pub got: String,
}

/// Payload for an unresolved local import.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalImport {
    /// The importing package.
    pub package: String,
    /// The import entry as declared.
    pub import: String,
    /// The workspace-relative path it resolved to.
    pub resolved: String,
}

/// Payload for declared packages sharing a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAlias {
    /// The shared workspace-relative root.
    pub root: String,
    /// The package names declared on that root, sorted.
    pub packages: Vec<String>,
}

/// Payload for a missing package root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRoot {
    /// The package declaring the root.
    pub package: String,
    /// The declared root.
    pub root: String,
}

/// Payload for a capability or trust violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityViolation {
    /// The unit using the operation.
    pub unit: String,
    /// The operation.
    pub operation: String,
    /// The capability the operation needs.
    pub required: String,
    /// The unit's declared trust level.
    pub trust: String,
}

/// Payload for an external tool failure.
///
/// `stderr` is the tool's complete error stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// The program that was invoked.
    pub tool: String,
    /// Its arguments.
    pub args: Vec<String>,
    /// Target environment, when the invocation was environment-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// The output the invocation was producing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Exit status, if the process ran to completion.
    #[serde(default)]
    pub status: Option<i32>,
    /// Everything the tool wrote to stderr.
    pub stderr: String,
}

/// Payload for a skipped link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSkipped {
    /// The target, or `default` for the host build.
    pub target: String,
    /// Why linking was skipped.
    pub reason: String,
}

/// Payload for a successful build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    /// The environment matrix.
    pub targets: Vec<String>,
    /// Workspace-relative target directory.
    pub target_dir: String,
    /// Workspace-relative manifest path.
    pub manifest: String,
    /// Host binaries.
    pub binaries: Vec<String>,
    /// Binaries per environment.
    pub binaries_by_env: BTreeMap<String, Vec<String>>,
    /// Default object indices.
    pub obj_index: Vec<String>,
    /// Object indices per environment.
    pub obj_index_by_env: BTreeMap<String, Vec<String>>,
}

/// An open payload for kinds not modelled above.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    /// Arbitrary fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

macro_rules! impl_into_data {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DiagnosticData {
                fn from(value: $ty) -> Self {
                    DiagnosticData::$variant(value)
                }
            }
        )*
    };
}

impl_into_data! {
    IntegrityItem => IntegrityItem,
    IntegritySummary => IntegritySummary,
    ManifestMismatch => ManifestMismatch,
    SignatureMismatch => SignatureMismatch,
    LocalImport => LocalImport,
    PackageAlias => PackageAlias,
    MissingRoot => MissingRoot,
    CapabilityViolation => Capability,
    LinkSkipped => LinkSkipped,
    BuildSummary => BuildSummary,
    CustomData => Custom,
}
