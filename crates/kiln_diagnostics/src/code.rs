//! Diagnostic codes with category prefixes and fault classes.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
    /// Informational records, prefixed with `I`.
    Info,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Info => 'I',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'E' => Some(Category::Error),
            'W' => Some(Category::Warning),
            'I' => Some(Category::Info),
            _ => None,
        }
    }
}

/// The fault class a code belongs to, taken from its hundreds digit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FaultClass {
    /// 1xx: the workspace file violates its schema.
    Schema,
    /// 2xx: a filesystem access failed or a required path is missing.
    Filesystem,
    /// 3xx: dependency, lock, manifest or signature verification failed.
    Integrity,
    /// 4xx: a local import could not be resolved.
    Import,
    /// 5xx: capability or trust policy was violated.
    Capability,
    /// 6xx: reported by the language front-end.
    FrontEnd,
    /// 7xx: an external tool (backend, linker, front-end process) failed.
    Tool,
    /// 9xx: summaries and progress records.
    Summary,
    /// Any other range.
    Other,
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g. `E305`, `W403`, `I901`. Serialized as that string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    /// Returns the fault class encoded in the hundreds digit.
    pub fn class(self) -> FaultClass {
        match self.number / 100 {
            1 => FaultClass::Schema,
            2 => FaultClass::Filesystem,
            3 => FaultClass::Integrity,
            4 => FaultClass::Import,
            5 => FaultClass::Capability,
            6 => FaultClass::FrontEnd,
            7 => FaultClass::Tool,
            9 => FaultClass::Summary,
            _ => FaultClass::Other,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// Error returned when a string is not a valid diagnostic code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid diagnostic code '{0}'")]
pub struct ParseCodeError(pub String);

impl FromStr for DiagnosticCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCodeError(s.to_string());
        let mut chars = s.chars();
        let category = chars.next().and_then(Category::from_prefix).ok_or_else(err)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let number = digits.parse::<u16>().map_err(|_| err())?;
        Ok(Self::new(category, number))
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DiagnosticCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = DiagnosticCode;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a diagnostic code such as E305")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CodeVisitor)
    }
}
