//! Capability and trust enforcement.

use crate::frontend::{Trust, UnitIr};
use kiln_diagnostics::data::CapabilityViolation;
use kiln_diagnostics::{codes, Diagnostic};

/// The capability an operation needs, if any.
pub fn required_capability(operation: &str) -> Option<&'static str> {
    let (namespace, _) = operation.split_once('.')?;
    match namespace {
        "io" => Some("io"),
        "net" => Some("net"),
        _ => None,
    }
}

/// Checks every operation a unit uses against its declared capabilities
/// and trust level. Returns one diagnostic per offending operation.
pub fn check_capabilities(package: &str, unit: &str, file: &str, ir: &UnitIr) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for op in &ir.operations {
        let Some(required) = required_capability(&op.name) else {
            continue;
        };
        let declared = ir.capabilities.iter().any(|c| c == required);
        let diag = if !declared {
            Diagnostic::error(
                codes::CAPABILITY_NOT_DECLARED,
                format!("{} requires capability '{required}', not declared by {unit}", op.name),
            )
        } else if ir.trust == Trust::Untrusted {
            Diagnostic::error(
                codes::TRUST_VIOLATION,
                format!("{} is not allowed in untrusted unit {unit}", op.name),
            )
        } else {
            continue;
        };
        let mut diag = diag
            .with_package(package)
            .with_file(file)
            .with_data(CapabilityViolation {
                unit: unit.to_string(),
                operation: op.name.clone(),
                required: required.to_string(),
                trust: ir.trust.to_string(),
            });
        if let Some(pos) = op.pos {
            diag = diag.with_pos(pos);
        }
        diags.push(diag);
    }
    diags
}
