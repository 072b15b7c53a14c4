use crate::consolidation::CanonicalRecord;
use crate::monitor::FactoredInsertion;
use crate::tariff::AllocatedSighting;
use crate::utils::{format_day_first, join_truncated};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

const SECTOR_DISPLAY_LIMIT: usize = 3;
const CATEGORY_DISPLAY_LIMIT: usize = 5;
const ELEMENT_TYPE_DISPLAY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    fn extend(range: Option<Self>, date: NaiveDate) -> Option<Self> {
        Some(match range {
            None => DateRange {
                start: date,
                end: date,
            },
            Some(r) => DateRange {
                start: r.start.min(date),
                end: r.end.max(date),
            },
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            format_day_first(self.start),
            format_day_first(self.end)
        )
    }
}

/// Header metadata of a dataset: size, time span and the distinct values
/// report readers scan first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub date_range: Option<DateRange>,
    pub distinct_brands: usize,
    /// Sorted, empty values excluded
    pub sectors: Vec<String>,
    pub categories: Vec<String>,
    pub regions: Vec<String>,
}

#[derive(Default)]
struct Collector<'a> {
    rows: usize,
    date_range: Option<DateRange>,
    brands: BTreeSet<&'a str>,
    sectors: BTreeSet<&'a str>,
    categories: BTreeSet<&'a str>,
    regions: BTreeSet<&'a str>,
}

impl<'a> Collector<'a> {
    fn add(
        &mut self,
        date: NaiveDate,
        brand: &'a str,
        sector: &'a str,
        category: &'a str,
        region: &'a str,
    ) {
        self.rows += 1;
        self.date_range = DateRange::extend(self.date_range, date);
        for (set, value) in [
            (&mut self.brands, brand),
            (&mut self.sectors, sector),
            (&mut self.categories, category),
            (&mut self.regions, region),
        ] {
            if !value.is_empty() {
                set.insert(value);
            }
        }
    }

    fn finish(self) -> DatasetSummary {
        let owned = |set: BTreeSet<&str>| -> Vec<String> {
            set.into_iter().map(str::to_string).collect()
        };
        DatasetSummary {
            rows: self.rows,
            date_range: self.date_range,
            distinct_brands: self.brands.len(),
            sectors: owned(self.sectors),
            categories: owned(self.categories),
            regions: owned(self.regions),
        }
    }
}

impl DatasetSummary {
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let mut collector = Collector::default();
        for r in records {
            collector.add(r.date, &r.brand, &r.sector, &r.category, &r.region);
        }
        collector.finish()
    }

    pub fn from_monitor(insertions: &[FactoredInsertion]) -> Self {
        let mut collector = Collector::default();
        for insertion in insertions {
            let r = &insertion.record;
            collector.add(r.date, &r.brand, &r.sector, &r.category, &r.region);
        }
        collector.finish()
    }

    /// Label/value pairs for a report header block.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Filas", self.rows.to_string()),
            (
                "Rango de fechas",
                self.date_range
                    .map_or_else(|| "N/A".to_string(), |r| r.to_string()),
            ),
            ("Marcas / Anunciantes", self.distinct_brands.to_string()),
            ("Sectores", join_truncated(&self.sectors, SECTOR_DISPLAY_LIMIT)),
            (
                "Categorías",
                join_truncated(&self.categories, CATEGORY_DISPLAY_LIMIT),
            ),
            ("Regiones", self.regions.join(", ")),
        ]
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Header metadata of the allocated OutView sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutViewSummary {
    pub rows: usize,
    pub date_range: Option<DateRange>,
    pub distinct_brands: usize,
    pub element_types: Vec<String>,
    pub providers: Vec<String>,
    pub total_investment: f64,
}

impl OutViewSummary {
    pub fn from_sightings(sightings: &[AllocatedSighting]) -> Self {
        let mut date_range = None;
        let mut brands = BTreeSet::new();
        let mut element_types = BTreeSet::new();
        let mut providers = BTreeSet::new();

        for sighting in sightings {
            let r = &sighting.record;
            date_range = DateRange::extend(date_range, r.date);
            if !r.brand.is_empty() {
                brands.insert(r.brand.as_str());
            }
            element_types.insert(r.element_type.label());
            if !r.provider.is_empty() {
                providers.insert(r.provider.as_str());
            }
        }

        Self {
            rows: sightings.len(),
            date_range,
            distinct_brands: brands.len(),
            element_types: element_types.into_iter().map(str::to_string).collect(),
            providers: providers.into_iter().map(str::to_string).collect(),
            total_investment: sightings.iter().map(|s| s.real_investment).sum(),
        }
    }

    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Filas", self.rows.to_string()),
            (
                "Rango de fechas",
                self.date_range
                    .map_or_else(|| "N/A".to_string(), |r| r.to_string()),
            ),
            ("Marcas", self.distinct_brands.to_string()),
            (
                "Tipos de elemento",
                join_truncated(&self.element_types, ELEMENT_TYPE_DISPLAY_LIMIT),
            ),
            ("Proveedores", self.providers.join(", ")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::FieldValue;
    use crate::schema::{Medium, SourceKind};

    fn record(day: u32, brand: &str, sector: &str, category: &str) -> CanonicalRecord {
        CanonicalRecord {
            source: SourceKind::Monitor,
            date: NaiveDate::from_ymd_opt(2023, 3, day).unwrap(),
            year: 2023,
            month: "marzo".to_string(),
            week: 10,
            medium: Medium::Tv,
            brand: brand.to_string(),
            product: String::new(),
            version: String::new(),
            duration: FieldValue::Empty,
            element_type: FieldValue::Empty,
            time_or_versions: FieldValue::Empty,
            station_or_district: String::new(),
            program_or_avenue: String::new(),
            break_or_street: String::new(),
            spot_or_orientation: String::new(),
            investment: 1.0,
            sector: sector.to_string(),
            category: category.to_string(),
            item: String::new(),
            agency: String::new(),
            advertiser: String::new(),
            region: "LIMA".to_string(),
            width_or_latitude: FieldValue::Empty,
            height_or_longitude: FieldValue::Empty,
            genre_or_surface: FieldValue::Empty,
            element_count: FieldValue::Empty,
            editor_or_provider: String::new(),
        }
    }

    #[test]
    fn test_summary_of_records() {
        let records = vec![
            record(12, "COLA", "D", "C1"),
            record(3, "COLA", "A", "C2"),
            record(9, "ZETA", "C", ""),
            record(20, "BETA", "B", "C3"),
        ];
        let summary = DatasetSummary::from_records(&records);

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.distinct_brands, 3);
        assert_eq!(summary.sectors, vec!["A", "B", "C", "D"]);
        assert_eq!(summary.categories, vec!["C1", "C2", "C3"]);
        assert_eq!(summary.regions, vec!["LIMA"]);

        let rows = summary.display_rows();
        assert_eq!(rows[1], ("Rango de fechas", "03/03/2023 - 20/03/2023".to_string()));
        assert_eq!(rows[3], ("Sectores", "A, B, C...".to_string()));
        assert_eq!(rows[4], ("Categorías", "C1, C2, C3".to_string()));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DatasetSummary::from_records(&[]);
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.date_range, None);
        assert_eq!(summary.display_rows()[1].1, "N/A");
    }
}
