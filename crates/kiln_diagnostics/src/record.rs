//! The schema-tagged diagnostic record written to the stream.

use crate::code::DiagnosticCode;
use crate::data::DiagnosticData;
use crate::diagnostic::{Diagnostic, Position};
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema tag carried by every record.
pub const RECORD_SCHEMA: &str = "kiln.diag/v1";

/// Timestamp format: UTC with millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A diagnostic stamped at emission time.
///
/// Field declaration order is the key order on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// Always [`RECORD_SCHEMA`].
    pub schema: String,
    /// Emission time, `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub timestamp: String,
    /// Severity.
    pub level: Severity,
    /// Stable code.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
    /// Package the record concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Subject file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Start position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    /// End position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos: Option<Position>,
    /// Structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DiagnosticData>,
}

impl DiagnosticRecord {
    /// Stamps a diagnostic with the given time.
    pub fn stamp(diag: Diagnostic, at: DateTime<Utc>) -> Self {
        Self {
            schema: RECORD_SCHEMA.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            level: diag.severity,
            code: diag.code,
            message: diag.message,
            package: diag.package,
            file: diag.file,
            pos: diag.pos,
            end_pos: diag.end_pos,
            data: diag.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn timestamp_has_millis_and_zulu() {
        let rec = DiagnosticRecord::stamp(Diagnostic::info(codes::BUILD_OK, "ok"), fixed_time());
        assert_eq!(rec.timestamp, "2024-03-09T14:05:07.000Z");
        assert_eq!(rec.schema, RECORD_SCHEMA);
    }

    #[test]
    fn stable_key_order() {
        let diag = Diagnostic::error(codes::CAPABILITY_NOT_DECLARED, "io.Read needs io")
            .with_package("app")
            .with_file("src/main.kiln")
            .with_pos(Position::new(4, 2, 31));
        let json = serde_json::to_string(&DiagnosticRecord::stamp(diag, fixed_time())).unwrap();
        let keys = [
            "schema", "timestamp", "level", "code", "message", "package", "file", "pos",
        ];
        let offsets: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{k}\"")).unwrap())
            .collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted, "{json}");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let diag = Diagnostic::warning(codes::PACKAGE_ROOT_ALIAS, "alias");
        let rec = DiagnosticRecord::stamp(diag, fixed_time());
        let value = serde_json::to_value(&rec).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("file"));
        assert!(!obj.contains_key("pos"));
        assert!(!obj.contains_key("data"));
        assert_eq!(obj["level"], "warn");
        assert_eq!(obj["code"], "W403");
    }
}
