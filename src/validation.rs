use crate::consolidation::{ConsolidatedDataset, CANONICAL_COLUMNS};
use crate::ingestion::ParsedMonitor;
use crate::schema::Medium;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Share of Monitor rows that must carry a valid date.
pub const MIN_VALID_DATE_PERCENT: f64 = 90.0;
/// Share of Monitor rows expected to carry a positive spend.
pub const MIN_POSITIVE_SPEND_PERCENT: f64 = 20.0;

/// A dataset-level check that did not hold. Findings never abort a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum ValidationFinding {
    ColumnCount { expected: usize, found: usize },
    ColumnOrder,
    MissingMedium { rows: usize },
    UnexpectedMedia { media: Vec<String> },
    NegativeInvestment { rows: usize },
    LowValidDateShare { percent: f64 },
    LowPositiveSpendShare { percent: f64 },
    EmptyCriticalColumn { column: String, rows: usize },
    RowCountMismatch { expected: usize, found: usize },
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFinding::ColumnCount { expected, found } => {
                write!(f, "expected {} columns, found {}", expected, found)
            }
            ValidationFinding::ColumnOrder => write!(f, "columns are not in canonical order"),
            ValidationFinding::MissingMedium { rows } => {
                write!(f, "{} rows without a medium", rows)
            }
            ValidationFinding::UnexpectedMedia { media } => {
                write!(f, "unexpected media: {}", media.join(", "))
            }
            ValidationFinding::NegativeInvestment { rows } => {
                write!(f, "{} rows with negative investment", rows)
            }
            ValidationFinding::LowValidDateShare { percent } => write!(
                f,
                "only {:.1}% of rows have a valid date (expected at least {:.0}%)",
                percent, MIN_VALID_DATE_PERCENT
            ),
            ValidationFinding::LowPositiveSpendShare { percent } => write!(
                f,
                "only {:.1}% of rows have a positive spend (expected at least {:.0}%)",
                percent, MIN_POSITIVE_SPEND_PERCENT
            ),
            ValidationFinding::EmptyCriticalColumn { column, rows } => {
                write!(f, "column {} is empty in {} rows", column, rows)
            }
            ValidationFinding::RowCountMismatch { expected, found } => write!(
                f,
                "expected {} output rows, found {}",
                expected, found
            ),
        }
    }
}

/// Checks the consolidated output: canonical columns, medium present and
/// known, investment non-negative. Dates are non-null by construction.
pub fn validate_consolidated(dataset: &ConsolidatedDataset) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    if dataset.columns.len() != CANONICAL_COLUMNS.len() {
        findings.push(ValidationFinding::ColumnCount {
            expected: CANONICAL_COLUMNS.len(),
            found: dataset.columns.len(),
        });
    } else if dataset
        .columns
        .iter()
        .zip(CANONICAL_COLUMNS.iter())
        .any(|(found, expected)| found != expected)
    {
        findings.push(ValidationFinding::ColumnOrder);
    }

    let missing_medium = dataset
        .records
        .iter()
        .filter(|r| r.medium.label().is_empty())
        .count();
    if missing_medium > 0 {
        findings.push(ValidationFinding::MissingMedium {
            rows: missing_medium,
        });
    }

    let unexpected: BTreeSet<&str> = dataset
        .records
        .iter()
        .map(|r| &r.medium)
        .filter(|m| !m.label().is_empty() && !m.is_known())
        .map(|m| m.label())
        .collect();
    if !unexpected.is_empty() {
        findings.push(ValidationFinding::UnexpectedMedia {
            media: unexpected.into_iter().map(str::to_string).collect(),
        });
    }

    let negative = dataset
        .records
        .iter()
        .filter(|r| r.investment < 0.0)
        .count();
    if negative > 0 {
        findings.push(ValidationFinding::NegativeInvestment { rows: negative });
    }

    findings
}

/// Plausibility checks on a parsed Monitor file.
pub fn validate_monitor(parsed: &ParsedMonitor) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let data_rows = parsed.data_lines.saturating_sub(parsed.skipped_lines);
    if data_rows == 0 {
        return findings;
    }

    let valid_dates = data_rows.saturating_sub(parsed.invalid_dates);
    let percent = percentage(valid_dates, data_rows);
    if percent < MIN_VALID_DATE_PERCENT {
        findings.push(ValidationFinding::LowValidDateShare { percent });
    }

    let records = &parsed.records;
    if !records.is_empty() {
        let positive = records.iter().filter(|r| r.spend > 0.0).count();
        let percent = percentage(positive, records.len());
        if percent < MIN_POSITIVE_SPEND_PERCENT {
            findings.push(ValidationFinding::LowPositiveSpendShare { percent });
        }
    }

    let critical = [
        ("MEDIO", parsed.missing_media),
        (
            "MARCA",
            records.iter().filter(|r| r.brand.is_empty()).count(),
        ),
        (
            "ANUNCIANTE",
            records.iter().filter(|r| r.advertiser.is_empty()).count(),
        ),
    ];
    for (column, rows) in critical {
        if rows > 0 {
            findings.push(ValidationFinding::EmptyCriticalColumn {
                column: column.to_string(),
                rows,
            });
        }
    }

    let unexpected: BTreeSet<&str> = records
        .iter()
        .filter(|r| !Medium::MONITOR.contains(&r.medium))
        .map(|r| r.medium.label())
        .collect();
    if !unexpected.is_empty() {
        findings.push(ValidationFinding::UnexpectedMedia {
            media: unexpected.into_iter().map(str::to_string).collect(),
        });
    }

    findings
}

/// The allocation must yield exactly one row per input row.
pub fn validate_allocation(input_rows: usize, output_rows: usize) -> Option<ValidationFinding> {
    (input_rows != output_rows).then_some(ValidationFinding::RowCountMismatch {
        expected: input_rows,
        found: output_rows,
    })
}

fn percentage(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}
