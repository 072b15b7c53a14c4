use crate::schema::SourceKind;
use crate::validation::ValidationFinding;
use serde::Serialize;
use std::fmt;

/// A non-fatal problem found while processing a batch. The affected row
/// proceeds with a safe default (or is dropped when it cannot be placed in
/// time) and the warning travels back to the caller in a [`QualityReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// A data line with the wrong number of delimited fields
    SkippedLine {
        line: usize,
        found: usize,
        expected: usize,
    },
    /// A row whose date could not be parsed; the row is dropped
    MalformedDate {
        source: SourceKind,
        row: usize,
        value: String,
    },
    /// A Monitor row without a medium; the row is dropped
    MissingMedium { row: usize },
    /// A numeric cell that could not be parsed; zero or empty is used instead
    MalformedNumber {
        source: SourceKind,
        row: usize,
        column: String,
        value: String,
    },
    /// A negative amount; zero is used instead
    NegativeAmount {
        source: SourceKind,
        row: usize,
        column: String,
        value: f64,
    },
    /// A medium with no factor in the table; 1.0 is applied
    UnknownMedium { medium: String, rows: usize },
    /// An element type with no cap; the tariff is allocated uncapped
    UncappedElementType { element_type: String, rows: usize },
    Validation(ValidationFinding),
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::SkippedLine {
                line,
                found,
                expected,
            } => write!(
                f,
                "Line {} has {} fields, expected {}; skipped",
                line, found, expected
            ),
            DataQualityWarning::MalformedDate { source, row, value } => write!(
                f,
                "{} row {}: invalid date '{}'; row dropped",
                source, row, value
            ),
            DataQualityWarning::MissingMedium { row } => {
                write!(f, "Monitor row {}: empty medium; row dropped", row)
            }
            DataQualityWarning::MalformedNumber {
                source,
                row,
                column,
                value,
            } => write!(
                f,
                "{} row {}: '{}' is not a number in column {}",
                source, row, value, column
            ),
            DataQualityWarning::NegativeAmount {
                source,
                row,
                column,
                value,
            } => write!(
                f,
                "{} row {}: negative {} ({}) replaced with 0",
                source, row, column, value
            ),
            DataQualityWarning::UnknownMedium { medium, rows } => write!(
                f,
                "Medium '{}' has no conversion factor ({} rows); using 1.0",
                medium, rows
            ),
            DataQualityWarning::UncappedElementType { element_type, rows } => write!(
                f,
                "Element type '{}' has no tariff cap ({} rows); allocated uncapped",
                element_type, rows
            ),
            DataQualityWarning::Validation(finding) => write!(f, "Validation: {}", finding),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub warnings: Vec<DataQualityWarning>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: DataQualityWarning) {
        self.warnings.push(warning);
    }

    pub fn extend_findings(&mut self, findings: impl IntoIterator<Item = ValidationFinding>) {
        self.warnings
            .extend(findings.into_iter().map(DataQualityWarning::Validation));
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataQualityWarning> {
        self.warnings.iter()
    }

    pub fn findings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.warnings.iter().filter_map(|w| match w {
            DataQualityWarning::Validation(finding) => Some(finding),
            _ => None,
        })
    }

    /// One-line summary for logs and report headers, `None` when clean.
    pub fn summary(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }

        let skipped = self
            .warnings
            .iter()
            .filter(|w| {
                matches!(
                    w,
                    DataQualityWarning::SkippedLine { .. }
                        | DataQualityWarning::MalformedDate { .. }
                        | DataQualityWarning::MissingMedium { .. }
                )
            })
            .count();
        let findings = self.findings().count();

        Some(format!(
            "{} warnings ({} rows skipped or dropped, {} validation findings)",
            self.warnings.len(),
            skipped,
            findings
        ))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
