use crate::config::MonitorFactors;
use crate::report::{DataQualityWarning, QualityReport};
use crate::schema::{Medium, PeriodFields, RawMonitorRecord};
use crate::utils::round2;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// A Monitor insertion after the factor pass. `record.spend` holds the
/// adjusted figure; the raw figure and the factor stay alongside for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactoredInsertion {
    pub record: RawMonitorRecord,
    pub period: PeriodFields,
    pub raw_spend: f64,
    pub factor: f64,
}

pub struct FactorEngine<'a> {
    factors: &'a MonitorFactors,
}

impl<'a> FactorEngine<'a> {
    pub fn new(factors: &'a MonitorFactors) -> Self {
        Self { factors }
    }

    /// Multiplies every spend by the factor of its medium, rounded to cents.
    ///
    /// Media without a factor keep their spend (factor 1.0); each such medium
    /// is reported once with the number of rows it affected.
    pub fn apply(
        &self,
        records: Vec<RawMonitorRecord>,
        report: &mut QualityReport,
    ) -> Vec<FactoredInsertion> {
        let mut unknown_media: BTreeMap<Medium, usize> = BTreeMap::new();
        let mut raw_total = 0.0;
        let mut adjusted_total = 0.0;

        let factored: Vec<FactoredInsertion> = records
            .into_iter()
            .map(|mut record| {
                let factor = match self.factors.factor(&record.medium) {
                    Some(factor) => factor,
                    None => {
                        *unknown_media.entry(record.medium.clone()).or_default() += 1;
                        1.0
                    }
                };

                let raw_spend = record.spend;
                record.spend = round2(raw_spend * factor);
                raw_total += raw_spend;
                adjusted_total += record.spend;

                FactoredInsertion {
                    period: PeriodFields::from_date(record.date),
                    record,
                    raw_spend,
                    factor,
                }
            })
            .collect();

        for (medium, rows) in unknown_media {
            warn!(
                "Medium '{}' has no conversion factor; {} rows kept at factor 1.0",
                medium, rows
            );
            report.push(DataQualityWarning::UnknownMedium {
                medium: medium.label().to_string(),
                rows,
            });
        }

        let reduction = if raw_total > 0.0 {
            (1.0 - adjusted_total / raw_total) * 100.0
        } else {
            0.0
        };
        info!(
            "Applied Monitor factors to {} rows: {:.2} -> {:.2} ({:.1}% reduction)",
            factored.len(),
            raw_total,
            adjusted_total,
            reduction
        );
        debug!("Monitor spend by medium: {:?}", totals_by_medium(&factored));

        factored
    }
}

/// Adjusted spend per medium, for logs and per-source summaries.
pub fn totals_by_medium(insertions: &[FactoredInsertion]) -> BTreeMap<Medium, f64> {
    let mut totals = BTreeMap::new();
    for insertion in insertions {
        *totals.entry(insertion.record.medium.clone()).or_insert(0.0) += insertion.record.spend;
    }
    totals
}
