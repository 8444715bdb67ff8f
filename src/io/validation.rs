//! Import validation and diagnostics.
//!
//! Checks archives against the store schema before they are appended, and
//! collects the non-fatal issues found along the way.

use crate::models::{ArrayValue, Sample, StoreSchema};
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// What happens to an archive that lacks a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFieldPolicy {
    /// Skip the archive and record a diagnostic.
    #[default]
    Reject,
    /// Stop the import with a schema error.
    Abort,
    /// Write zeros for the missing field and record a diagnostic.
    ZeroFill,
}

impl MissingFieldPolicy {
    /// Returns the policy name as used in config and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Abort => "abort",
            Self::ZeroFill => "zero-fill",
        }
    }
}

impl FromStr for MissingFieldPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "reject" | "skip" => Ok(Self::Reject),
            "abort" | "fail" => Ok(Self::Abort),
            "zero-fill" | "zerofill" | "zero" => Ok(Self::ZeroFill),
            _ => Err(Error::InvalidInput(format!(
                "unknown missing-field policy '{s}' (expected reject, abort, or zero-fill)"
            ))),
        }
    }
}

impl fmt::Display for MissingFieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// An archive lacks a field of the schema.
    MissingField,
    /// An archive carries a field the schema does not know.
    UnknownField,
    /// A field's dtype or shape differs from the schema.
    ShapeMismatch,
    /// An archive could not be read or decoded.
    Unreadable,
    /// A requested archive index does not exist.
    MissingIndex,
}

impl DiagnosticKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::UnknownField => "unknown_field",
            Self::ShapeMismatch => "shape_mismatch",
            Self::Unreadable => "unreadable",
            Self::MissingIndex => "missing_index",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal issue found while processing one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// The archive path or index the issue refers to.
    pub subject: String,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.subject, self.message, self.kind)
    }
}

/// Ordered collection of diagnostics for one run.
///
/// Every pushed diagnostic is logged at `warn` and counted in
/// `sampleconv_diagnostics_total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    entries: Vec<Diagnostic>,
}

impl DiagnosticReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = diagnostic.kind.as_str(),
            subject = %diagnostic.subject,
            "{}",
            diagnostic.message
        );
        metrics::counter!("sampleconv_diagnostics_total", "kind" => diagnostic.kind.as_str())
            .increment(1);
        self.entries.push(diagnostic);
    }

    /// Number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of diagnostics of one kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Iterates in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }
}

impl Extend<Diagnostic> for DiagnosticReport {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

impl<'a> IntoIterator for &'a DiagnosticReport {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Outcome of validating one archive.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// The row to append, shaped exactly like the schema. `None` if rejected.
    pub row: Option<Sample>,
    /// Issues found, in field-name order.
    pub issues: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns whether the archive can be appended.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.row.is_some()
    }
}

/// Normalizes archives into rows that fit a store schema.
///
/// Unknown fields are dropped with a diagnostic. Missing fields follow the
/// [`MissingFieldPolicy`]; under `Abort` they reject the archive here and
/// the caller turns the rejection into an error.
pub struct ImportValidator<'a> {
    schema: &'a StoreSchema,
    policy: MissingFieldPolicy,
}

impl<'a> ImportValidator<'a> {
    /// Creates a validator for `schema`.
    #[must_use]
    pub const fn new(schema: &'a StoreSchema, policy: MissingFieldPolicy) -> Self {
        Self { schema, policy }
    }

    /// Validates `sample` loaded from `subject`.
    #[must_use]
    pub fn validate(&self, subject: &str, mut sample: Sample) -> ValidationResult {
        let mut issues = Vec::new();
        let mut rejected = false;

        for name in sample.field_names().map(str::to_string).collect::<Vec<_>>() {
            if !self.schema.contains(&name) {
                sample.remove(&name);
                issues.push(Diagnostic::new(
                    DiagnosticKind::UnknownField,
                    subject,
                    format!("field '{name}' is not in the store schema, skipped"),
                ));
            }
        }

        let mut row = Sample::new();
        for (name, spec) in self.schema.iter() {
            match sample.remove(name) {
                Some(value) if spec.matches(&value) => {
                    row.insert(name, value);
                },
                Some(value) => {
                    rejected = true;
                    issues.push(Diagnostic::new(
                        DiagnosticKind::ShapeMismatch,
                        subject,
                        format!(
                            "field '{name}' is {} {:?}, store expects {} {:?}",
                            value.dtype(),
                            value.shape(),
                            spec.dtype,
                            spec.shape
                        ),
                    ));
                },
                None if self.policy == MissingFieldPolicy::ZeroFill => {
                    match ArrayValue::zeros(spec.dtype, spec.shape.clone()) {
                        Ok(zeros) => {
                            row.insert(name, zeros);
                            issues.push(Diagnostic::new(
                                DiagnosticKind::MissingField,
                                subject,
                                format!("field '{name}' is missing, filled with zeros"),
                            ));
                        },
                        Err(e) => {
                            rejected = true;
                            issues.push(Diagnostic::new(
                                DiagnosticKind::MissingField,
                                subject,
                                format!("field '{name}' is missing and cannot be zero-filled: {e}"),
                            ));
                        },
                    }
                },
                None => {
                    rejected = true;
                    issues.push(Diagnostic::new(
                        DiagnosticKind::MissingField,
                        subject,
                        format!("field '{name}' is missing"),
                    ));
                },
            }
        }

        ValidationResult {
            row: (!rejected).then_some(row),
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DType, FieldSpec};
    use test_case::test_case;

    fn schema() -> StoreSchema {
        StoreSchema::new()
            .with_field("a", FieldSpec::new(DType::F32, vec![2]))
            .with_field("b", FieldSpec::new(DType::I32, vec![]))
    }

    fn full() -> Sample {
        Sample::new()
            .with_field("a", ArrayValue::from_vec(vec![2], vec![1.0f32, 2.0]).unwrap())
            .with_field("b", ArrayValue::scalar(3i32))
    }

    #[test]
    fn test_valid_sample_passes() {
        let schema = schema();
        let result = ImportValidator::new(&schema, MissingFieldPolicy::Reject).validate("x", full());
        assert!(result.is_valid());
        assert!(result.issues.is_empty());
        assert_eq!(result.row.unwrap(), full());
    }

    #[test]
    fn test_unknown_field_is_dropped() {
        let schema = schema();
        let sample = full().with_field("extra", ArrayValue::scalar(1u8));
        let result = ImportValidator::new(&schema, MissingFieldPolicy::Reject).validate("x", sample);
        assert_eq!(result.row.unwrap(), full());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, DiagnosticKind::UnknownField);
    }

    #[test_case(MissingFieldPolicy::Reject, false; "reject")]
    #[test_case(MissingFieldPolicy::Abort, false; "abort")]
    #[test_case(MissingFieldPolicy::ZeroFill, true; "zero fill")]
    fn test_missing_field_policy(policy: MissingFieldPolicy, accepted: bool) {
        let schema = schema();
        let mut sample = full();
        sample.remove("b");

        let result = ImportValidator::new(&schema, policy).validate("x", sample);
        assert_eq!(result.is_valid(), accepted);
        assert_eq!(result.issues[0].kind, DiagnosticKind::MissingField);
        if let Some(row) = result.row {
            assert!(schema.check_row(&row).is_ok());
            assert_eq!(row.get("b").unwrap().to_vec::<i32>().unwrap(), vec![0]);
        }
    }

    #[test]
    fn test_shape_mismatch_rejects_even_with_zero_fill() {
        let schema = schema();
        let sample = full().with_field("b", ArrayValue::scalar(3i64));
        let result = ImportValidator::new(&schema, MissingFieldPolicy::ZeroFill).validate("x", sample);
        assert!(!result.is_valid());
        assert_eq!(result.issues[0].kind, DiagnosticKind::ShapeMismatch);
    }

    #[test_case("reject", MissingFieldPolicy::Reject)]
    #[test_case("ABORT", MissingFieldPolicy::Abort)]
    #[test_case("zero_fill", MissingFieldPolicy::ZeroFill)]
    fn test_policy_from_str(input: &str, expected: MissingFieldPolicy) {
        assert_eq!(input.parse::<MissingFieldPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_report_counts_by_kind() {
        let mut report = DiagnosticReport::new();
        report.push(Diagnostic::new(DiagnosticKind::MissingIndex, "7", "not found"));
        report.push(Diagnostic::new(DiagnosticKind::MissingIndex, "9", "not found"));
        report.push(Diagnostic::new(DiagnosticKind::Unreadable, "a.sample", "bad magic"));
        assert_eq!(report.len(), 3);
        assert_eq!(report.count(DiagnosticKind::MissingIndex), 2);
        assert_eq!(
            report.iter().next().unwrap().to_string(),
            "7: not found (missing_index)"
        );
    }
}
