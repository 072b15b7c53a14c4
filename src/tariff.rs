//! OutView tariff allocation.
//!
//! A raw OutView tariff is quoted per sighting, but the same physical element
//! is sighted many times a month (and several times a day when multiple
//! creatives rotate on it). The allocator spreads the tariff over those
//! sightings so that one element never accounts for more than its monthly cap.
//!
//! The work runs in three phases:
//!
//! 1. every row derives its month token, period fields and keys;
//! 2. a grouping barrier counts and sums per key (each aggregate once);
//! 3. every row reads its aggregates and computes its real investment.

use crate::config::OutViewTariffs;
use crate::keys::{month_token, DailySlotKey, GroupKey, MonthlySlotKey, PieceKey, SlotFields};
use crate::report::{DataQualityWarning, QualityReport};
use crate::schema::{PeriodFields, RawOutViewRecord};
use crate::utils::round2;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Every intermediate of the allocation chain for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffDerivation {
    /// Sightings of the same slot on the same day
    pub denominator_daily: usize,
    /// Sightings of the same slot in the same month token
    pub denominator_monthly: usize,
    pub tariff_usd: f64,
    pub tariff_daily: f64,
    /// Sum of the daily tariffs of the month slot, shared by all its rows
    pub tariff_monthly: f64,
    pub tariff_capped: f64,
    pub tariff_prorated: f64,
    pub cap: Option<f64>,
    pub factor: f64,
}

/// An OutView sighting with its allocated investment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatedSighting {
    pub record: RawOutViewRecord,
    pub period: PeriodFields,
    pub month_token: String,
    pub derivation: TariffDerivation,
    /// Allocated investment in USD (`Tarifa Real ($)`)
    pub real_investment: f64,
    /// Distinct creative versions shown on the element that month
    pub versions_per_element: usize,
    /// Sightings of the same creative piece (`+1 Superficie`)
    pub surface_count: usize,
    pub tariff_by_surface: f64,
    /// 1 on the first sighting of each element-month, 0 otherwise
    pub monthly_count: u8,
}

struct RowAggregates {
    derivation: TariffDerivation,
    real_investment: f64,
    versions_per_element: usize,
    surface_count: usize,
    monthly_count: u8,
}

pub struct TariffAllocator<'a> {
    config: &'a OutViewTariffs,
}

impl<'a> TariffAllocator<'a> {
    pub fn new(config: &'a OutViewTariffs) -> Self {
        Self { config }
    }

    /// Allocates every row. The output has one row per input row, in input order.
    pub fn allocate(
        &self,
        records: Vec<RawOutViewRecord>,
        report: &mut QualityReport,
    ) -> Vec<AllocatedSighting> {
        let tokens: Vec<String> = records.iter().map(|r| month_token(&r.base_name)).collect();
        let periods: Vec<PeriodFields> = records
            .iter()
            .map(|r| PeriodFields::from_date(r.date))
            .collect();

        let aggregates = self.compute_aggregates(&records, &tokens, &periods);
        self.report_uncapped(&records, report);

        let allocated: Vec<AllocatedSighting> = records
            .into_iter()
            .zip(tokens)
            .zip(periods)
            .zip(aggregates)
            .map(|(((record, month_token), period), agg)| AllocatedSighting {
                tariff_by_surface: round2(agg.real_investment * agg.surface_count as f64),
                record,
                period,
                month_token,
                derivation: agg.derivation,
                real_investment: agg.real_investment,
                versions_per_element: agg.versions_per_element,
                surface_count: agg.surface_count,
                monthly_count: agg.monthly_count,
            })
            .collect();

        let total: f64 = allocated.iter().map(|a| a.real_investment).sum();
        let elements = allocated.iter().filter(|a| a.monthly_count == 1).count();
        info!(
            "Allocated OutView tariffs for {} rows ({} element-months, {:.2} USD)",
            allocated.len(),
            elements,
            total
        );

        allocated
    }

    fn compute_aggregates(
        &self,
        records: &[RawOutViewRecord],
        tokens: &[String],
        periods: &[PeriodFields],
    ) -> Vec<RowAggregates> {
        // Phase 1: keys
        let slots: Vec<SlotFields> = records.iter().map(SlotFields::of).collect();
        let daily_keys: Vec<DailySlotKey> = records
            .iter()
            .zip(&slots)
            .map(|(r, slot)| DailySlotKey {
                date: r.date,
                slot: *slot,
            })
            .collect();
        let monthly_keys: Vec<MonthlySlotKey> = tokens
            .iter()
            .zip(&slots)
            .map(|(token, slot)| MonthlySlotKey {
                month_token: token,
                slot: *slot,
            })
            .collect();
        let group_keys: Vec<GroupKey> = records
            .iter()
            .zip(tokens)
            .zip(periods)
            .map(|((r, token), period)| GroupKey::new(r, token, period.year))
            .collect();
        let piece_keys: Vec<PieceKey> = records
            .iter()
            .zip(tokens)
            .zip(periods)
            .map(|((r, token), period)| PieceKey::new(r, token, period.year, period.week))
            .collect();

        // Phase 2: grouping barrier
        let denominator_daily = count_by(&daily_keys);
        let denominator_monthly = count_by(&monthly_keys);
        let surface_counts = count_by(&piece_keys);

        let mut versions: HashMap<&GroupKey, HashSet<&str>> = HashMap::new();
        for (key, record) in group_keys.iter().zip(records) {
            let seen = versions.entry(key).or_default();
            if !record.version.is_empty() {
                seen.insert(record.version.as_str());
            }
        }

        let usd: Vec<f64> = records
            .iter()
            .map(|r| r.tariff / self.config.exchange_rate)
            .collect();
        let daily: Vec<f64> = usd
            .iter()
            .zip(&daily_keys)
            .map(|(usd, key)| safe_divide(*usd, denominator_daily[key]))
            .collect();

        let mut monthly_sums: HashMap<&MonthlySlotKey, f64> = HashMap::new();
        for (key, value) in monthly_keys.iter().zip(&daily) {
            *monthly_sums.entry(key).or_insert(0.0) += value;
        }

        debug!(
            "OutView grouping: {} daily slots, {} monthly slots, {} elements, {} pieces",
            denominator_daily.len(),
            denominator_monthly.len(),
            versions.len(),
            surface_counts.len()
        );

        // Phase 3: per-row application
        let mut seen_groups: HashSet<&GroupKey> = HashSet::new();
        (0..records.len())
            .map(|i| {
                let element_type = &records[i].element_type;
                let cap = self.config.cap(element_type);
                let factor = self.config.allocation_factor(element_type);

                let d1 = denominator_daily[&daily_keys[i]];
                let d2 = denominator_monthly[&monthly_keys[i]];
                let tariff_monthly = monthly_sums[&monthly_keys[i]];
                let tariff_capped = match cap {
                    Some(cap) => tariff_monthly.min(cap),
                    None => tariff_monthly,
                };
                let tariff_prorated = safe_divide(tariff_capped, d2);
                let real_investment = round2(tariff_prorated * factor);

                let monthly_count = u8::from(seen_groups.insert(&group_keys[i]));

                RowAggregates {
                    derivation: TariffDerivation {
                        denominator_daily: d1,
                        denominator_monthly: d2,
                        tariff_usd: usd[i],
                        tariff_daily: daily[i],
                        tariff_monthly,
                        tariff_capped,
                        tariff_prorated,
                        cap,
                        factor,
                    },
                    real_investment,
                    versions_per_element: versions[&group_keys[i]].len(),
                    surface_count: surface_counts[&piece_keys[i]],
                    monthly_count,
                }
            })
            .collect()
    }

    fn report_uncapped(&self, records: &[RawOutViewRecord], report: &mut QualityReport) {
        let mut uncapped: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            if self.config.cap(&record.element_type).is_none() {
                *uncapped.entry(record.element_type.label()).or_default() += 1;
            }
        }

        for (element_type, rows) in uncapped {
            warn!(
                "Element type '{}' has no tariff cap; {} rows allocated uncapped",
                element_type, rows
            );
            report.push(DataQualityWarning::UncappedElementType {
                element_type: element_type.to_string(),
                rows,
            });
        }
    }
}

fn count_by<K: std::hash::Hash + Eq>(keys: &[K]) -> HashMap<&K, usize> {
    let mut counts = HashMap::with_capacity(keys.len());
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn safe_divide(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ElementType, Medium};
    use chrono::NaiveDate;

    fn sighting(day: u32, element_type: ElementType, tariff: f64) -> RawOutViewRecord {
        RawOutViewRecord {
            row: day as usize,
            date: NaiveDate::from_ymd_opt(2023, 3, day).unwrap(),
            base_name: "OPW09MAR2023".to_string(),
            medium: Medium::ViaPublica,
            provider: "CLEAR".to_string(),
            provider_code: "C-1".to_string(),
            element_type,
            district: "MIRAFLORES".to_string(),
            avenue: "AV. LARCO".to_string(),
            street: "12".to_string(),
            orientation: "N-S".to_string(),
            sector: "BEBIDAS".to_string(),
            category: "GASEOSAS".to_string(),
            item: "COLA".to_string(),
            brand: "COLA".to_string(),
            product: "COLA 500ML".to_string(),
            version: "V1".to_string(),
            agency: String::new(),
            advertiser: "ACME".to_string(),
            region: "LIMA".to_string(),
            latitude: Some(-12.12),
            longitude: Some(-77.03),
            tariff,
            extra: Default::default(),
        }
    }

    fn allocate(records: Vec<RawOutViewRecord>) -> (Vec<AllocatedSighting>, QualityReport) {
        let config = OutViewTariffs::default();
        let mut report = QualityReport::new();
        let out = TariffAllocator::new(&config).allocate(records, &mut report);
        (out, report)
    }

    #[test]
    fn test_three_sightings_same_day() {
        let rows = vec![
            sighting(9, ElementType::Panel, 300.0),
            sighting(9, ElementType::Panel, 300.0),
            sighting(9, ElementType::Panel, 300.0),
        ];
        let (out, report) = allocate(rows);

        assert_eq!(out.len(), 3);
        for row in &out {
            let d = &row.derivation;
            assert_eq!(d.tariff_usd, 100.0);
            assert_eq!(d.denominator_daily, 3);
            assert_eq!(d.denominator_monthly, 3);
            assert!((d.tariff_daily - 100.0 / 3.0).abs() < 1e-9);
            assert!((d.tariff_monthly - 100.0).abs() < 1e-9);
            assert!((d.tariff_capped - 100.0).abs() < 1e-9);
            assert!((d.tariff_prorated - 100.0 / 3.0).abs() < 1e-9);
            assert_eq!(row.real_investment, 26.67);
            assert_eq!(row.month_token, "MAR2023");
        }
        assert!(report.is_empty());
    }

    #[test]
    fn test_monthly_sum_spans_days_and_cap_applies() {
        // 30 daily sightings of a VALLA at 300 -> 100 USD each, 3000 a month
        let rows: Vec<_> = (1..=30)
            .map(|day| sighting(day, ElementType::Valla, 300.0))
            .collect();
        let (out, _) = allocate(rows);

        let cap = 800.0;
        for row in &out {
            assert_eq!(row.derivation.denominator_daily, 1);
            assert_eq!(row.derivation.denominator_monthly, 30);
            assert!((row.derivation.tariff_monthly - 3000.0).abs() < 1e-6);
            assert_eq!(row.derivation.tariff_capped, cap);
            assert!(row.real_investment >= 0.0);
            assert!(row.real_investment <= round2(cap / 30.0));
        }
        assert_eq!(out[0].real_investment, round2(800.0 / 30.0 * 0.8));
    }

    #[test]
    fn test_led_factor() {
        let (out, _) = allocate(vec![sighting(9, ElementType::PantallaLed, 300.0)]);
        assert_eq!(out[0].derivation.factor, 0.4);
        assert_eq!(out[0].real_investment, 40.0);
    }

    #[test]
    fn test_monthly_count_marks_first_row_of_each_element() {
        let mut other_site = sighting(10, ElementType::Panel, 300.0);
        other_site.avenue = "AV. AREQUIPA".to_string();
        let rows = vec![
            sighting(9, ElementType::Panel, 300.0),
            other_site,
            sighting(10, ElementType::Panel, 300.0),
            sighting(11, ElementType::Panel, 300.0),
        ];
        let (out, _) = allocate(rows);

        let counts: Vec<u8> = out.iter().map(|r| r.monthly_count).collect();
        assert_eq!(counts, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_versions_and_surface_counts() {
        let mut v2 = sighting(9, ElementType::Panel, 300.0);
        v2.version = "V2".to_string();
        let rows = vec![
            sighting(9, ElementType::Panel, 300.0),
            sighting(9, ElementType::Panel, 300.0),
            v2,
        ];
        let (out, _) = allocate(rows);

        assert!(out.iter().all(|r| r.versions_per_element == 2));
        assert_eq!(out[0].surface_count, 2);
        assert_eq!(out[2].surface_count, 1);
        assert_eq!(
            out[0].tariff_by_surface,
            round2(out[0].real_investment * 2.0)
        );
    }

    #[test]
    fn test_empty_versions_are_not_counted() {
        let mut blank = sighting(9, ElementType::Panel, 300.0);
        blank.version = String::new();
        let (out, _) = allocate(vec![blank.clone(), blank.clone()]);
        assert!(out.iter().all(|r| r.versions_per_element == 0));

        let (out, _) = allocate(vec![sighting(9, ElementType::Panel, 300.0), blank]);
        assert!(out.iter().all(|r| r.versions_per_element == 1));
    }

    #[test]
    fn test_unknown_element_type_is_uncapped() {
        let mural = ElementType::parse("MURAL");
        let rows: Vec<_> = (1..=30)
            .map(|day| sighting(day, mural.clone(), 300.0))
            .collect();
        let (out, report) = allocate(rows);

        assert_eq!(out[0].derivation.cap, None);
        assert!((out[0].derivation.tariff_capped - 3000.0).abs() < 1e-6);
        assert_eq!(out[0].real_investment, 80.0);
        assert_eq!(
            report.warnings,
            vec![DataQualityWarning::UncappedElementType {
                element_type: "MURAL".to_string(),
                rows: 30
            }]
        );
    }

    #[test]
    fn test_zero_tariff_allocates_zero() {
        let (out, _) = allocate(vec![sighting(9, ElementType::Totem, 0.0)]);
        assert_eq!(out[0].real_investment, 0.0);
        assert_eq!(out[0].tariff_by_surface, 0.0);
    }
}
