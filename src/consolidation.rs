use crate::error::{MediaSpendError, Result};
use crate::monitor::FactoredInsertion;
use crate::schema::{Medium, PeriodFields, SourceKind};
use crate::tariff::AllocatedSighting;
use crate::utils::format_day_first;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Serialize, Serializer};
use std::fmt;

/// Output columns, in order. Slashed names hold a Monitor field on the left
/// and an OutView field on the right.
pub const CANONICAL_COLUMNS: [&str; 27] = [
    "FECHA",
    "AÑO",
    "MES",
    "SEMANA",
    "MEDIO",
    "MARCA",
    "PRODUCTO",
    "VERSIÓN",
    "DURACIÓN",
    "TIPO ELEMENTO",
    "TIME / Q VERSIONES",
    "EMISORA / DISTRITO",
    "PROGRAMA / AVENIDA",
    "BREAK / CALLE",
    "POS. SPOT / ORIENTACIÓN",
    "INVERSIÓN REAL",
    "SECTOR",
    "CATEGORÍA",
    "ÍTEM",
    "AGENCIA",
    "ANUNCIANTE",
    "REGIÓN",
    "ANCHO / LATITUD",
    "ALTO / LONGITUD",
    "GEN / +1 SUPERFICIE",
    "Q ELEMENTOS",
    "EDITORA / PROVEEDOR",
];

/// Calendar columns computed from the placement date rather than read from a
/// source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodColumn {
    Date,
    Year,
    Month,
    Week,
}

/// Where a canonical column takes its value from in each source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Same meaning in both sources
    Simple {
        monitor: &'static str,
        outview: &'static str,
    },
    /// Different meanings sharing one slot
    Hybrid {
        monitor: &'static str,
        outview: &'static str,
    },
    MonitorOnly(&'static str),
    OutViewOnly(&'static str),
    Derived(PeriodColumn),
}

impl ColumnSource {
    /// The source column feeding this slot for `source`, `None` when the
    /// slot stays empty for that source or is derived from the date.
    pub fn column_for(&self, source: SourceKind) -> Option<&'static str> {
        match (*self, source) {
            (
                ColumnSource::Simple { monitor, .. } | ColumnSource::Hybrid { monitor, .. },
                SourceKind::Monitor,
            ) => Some(monitor),
            (
                ColumnSource::Simple { outview, .. } | ColumnSource::Hybrid { outview, .. },
                SourceKind::OutView,
            ) => Some(outview),
            (ColumnSource::MonitorOnly(column), SourceKind::Monitor) => Some(column),
            (ColumnSource::OutViewOnly(column), SourceKind::OutView) => Some(column),
            _ => None,
        }
    }
}

/// Source column feeding each canonical column, index-aligned with
/// [`CANONICAL_COLUMNS`].
pub const COLUMN_MAPPINGS: [ColumnSource; 27] = [
    ColumnSource::Derived(PeriodColumn::Date),
    ColumnSource::Derived(PeriodColumn::Year),
    ColumnSource::Derived(PeriodColumn::Month),
    ColumnSource::Derived(PeriodColumn::Week),
    ColumnSource::Simple { monitor: "MEDIO", outview: "Medio" },
    ColumnSource::Simple { monitor: "MARCA", outview: "Marca" },
    ColumnSource::Simple { monitor: "PRODUCTO", outview: "Producto" },
    ColumnSource::Simple { monitor: "VERSION", outview: "Versión" },
    ColumnSource::MonitorOnly("DURACION"),
    ColumnSource::OutViewOnly("Tipo Elemento"),
    ColumnSource::Hybrid { monitor: "HORA", outview: "Q versiones por elemento Mes" },
    ColumnSource::Hybrid { monitor: "EMISORA/SITE", outview: "Distrito" },
    ColumnSource::Hybrid { monitor: "PROGRAMA/TIPO DE SITE", outview: "Avenida" },
    ColumnSource::Hybrid { monitor: "BREAK", outview: "Nro Calle/Cuadra" },
    ColumnSource::Hybrid { monitor: "POS. SPOT", outview: "Orientación de Vía" },
    ColumnSource::Simple { monitor: "INVERSION", outview: "Tarifa Real ($)" },
    ColumnSource::Simple { monitor: "SECTOR", outview: "Sector" },
    ColumnSource::Simple { monitor: "CATEGORIA", outview: "Categoría" },
    ColumnSource::Simple { monitor: "ITEM", outview: "Item" },
    ColumnSource::Simple { monitor: "AGENCIA", outview: "Agencia" },
    ColumnSource::Simple { monitor: "ANUNCIANTE", outview: "Anunciante" },
    ColumnSource::Simple { monitor: "REGION/ÁMBITO", outview: "Región" },
    ColumnSource::Hybrid { monitor: "ANCHO", outview: "Latitud" },
    ColumnSource::Hybrid { monitor: "ALTO", outview: "Longitud" },
    ColumnSource::Hybrid { monitor: "GENERO", outview: "+1 Superficie" },
    ColumnSource::OutViewOnly("Conteo mensual"),
    ColumnSource::Hybrid { monitor: "EDITORA", outview: "Proveedor" },
];

/// A single output cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Number(f64),
    Date(NaiveDate),
}

impl FieldValue {
    fn text(value: &str) -> Self {
        if value.is_empty() {
            FieldValue::Empty
        } else {
            FieldValue::Text(value.to_string())
        }
    }

    fn number(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Empty, FieldValue::Number)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Date(date) => f.write_str(&format_day_first(*date)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Empty => serializer.serialize_str(""),
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Integer(value) => serializer.serialize_i64(*value),
            FieldValue::Number(value) => serializer.serialize_f64(*value),
            FieldValue::Date(date) => serializer.serialize_str(&format_day_first(*date)),
        }
    }
}

/// One placement in the unified shape. Field names follow the canonical
/// headers when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    #[serde(skip)]
    pub source: SourceKind,
    #[serde(rename = "FECHA", serialize_with = "serialize_date")]
    pub date: NaiveDate,
    #[serde(rename = "AÑO")]
    pub year: i32,
    #[serde(rename = "MES")]
    pub month: String,
    #[serde(rename = "SEMANA")]
    pub week: u32,
    #[serde(rename = "MEDIO")]
    pub medium: Medium,
    #[serde(rename = "MARCA")]
    pub brand: String,
    #[serde(rename = "PRODUCTO")]
    pub product: String,
    #[serde(rename = "VERSIÓN")]
    pub version: String,
    #[serde(rename = "DURACIÓN")]
    pub duration: FieldValue,
    #[serde(rename = "TIPO ELEMENTO")]
    pub element_type: FieldValue,
    #[serde(rename = "TIME / Q VERSIONES")]
    pub time_or_versions: FieldValue,
    #[serde(rename = "EMISORA / DISTRITO")]
    pub station_or_district: String,
    #[serde(rename = "PROGRAMA / AVENIDA")]
    pub program_or_avenue: String,
    #[serde(rename = "BREAK / CALLE")]
    pub break_or_street: String,
    #[serde(rename = "POS. SPOT / ORIENTACIÓN")]
    pub spot_or_orientation: String,
    #[serde(rename = "INVERSIÓN REAL")]
    pub investment: f64,
    #[serde(rename = "SECTOR")]
    pub sector: String,
    #[serde(rename = "CATEGORÍA")]
    pub category: String,
    #[serde(rename = "ÍTEM")]
    pub item: String,
    #[serde(rename = "AGENCIA")]
    pub agency: String,
    #[serde(rename = "ANUNCIANTE")]
    pub advertiser: String,
    #[serde(rename = "REGIÓN")]
    pub region: String,
    #[serde(rename = "ANCHO / LATITUD")]
    pub width_or_latitude: FieldValue,
    #[serde(rename = "ALTO / LONGITUD")]
    pub height_or_longitude: FieldValue,
    #[serde(rename = "GEN / +1 SUPERFICIE")]
    pub genre_or_surface: FieldValue,
    #[serde(rename = "Q ELEMENTOS")]
    pub element_count: FieldValue,
    #[serde(rename = "EDITORA / PROVEEDOR")]
    pub editor_or_provider: String,
}

fn serialize_date<S: Serializer>(
    date: &NaiveDate,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_day_first(*date))
}

impl CanonicalRecord {
    /// The record as cells in [`CANONICAL_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Date(self.date),
            FieldValue::Integer(i64::from(self.year)),
            FieldValue::text(&self.month),
            FieldValue::Integer(i64::from(self.week)),
            FieldValue::text(self.medium.label()),
            FieldValue::text(&self.brand),
            FieldValue::text(&self.product),
            FieldValue::text(&self.version),
            self.duration.clone(),
            self.element_type.clone(),
            self.time_or_versions.clone(),
            FieldValue::text(&self.station_or_district),
            FieldValue::text(&self.program_or_avenue),
            FieldValue::text(&self.break_or_street),
            FieldValue::text(&self.spot_or_orientation),
            FieldValue::Number(self.investment),
            FieldValue::text(&self.sector),
            FieldValue::text(&self.category),
            FieldValue::text(&self.item),
            FieldValue::text(&self.agency),
            FieldValue::text(&self.advertiser),
            FieldValue::text(&self.region),
            self.width_or_latitude.clone(),
            self.height_or_longitude.clone(),
            self.genre_or_surface.clone(),
            self.element_count.clone(),
            FieldValue::text(&self.editor_or_provider),
        ]
    }
}

/// A normalized source row whose values can be looked up by source column name.
pub trait SourceRow {
    const KIND: SourceKind;

    fn date(&self) -> NaiveDate;

    fn period(&self) -> &PeriodFields;

    /// Value of a source column, `None` when this source has no such column.
    fn column(&self, name: &str) -> Option<FieldValue>;
}

impl SourceRow for FactoredInsertion {
    const KIND: SourceKind = SourceKind::Monitor;

    fn date(&self) -> NaiveDate {
        self.record.date
    }

    fn period(&self) -> &PeriodFields {
        &self.period
    }

    fn column(&self, name: &str) -> Option<FieldValue> {
        let r = &self.record;
        let value = match name {
            "MEDIO" => FieldValue::text(r.medium.label()),
            "MARCA" => FieldValue::text(&r.brand),
            "PRODUCTO" => FieldValue::text(&r.product),
            "VERSION" => FieldValue::text(&r.version),
            "DURACION" => FieldValue::text(&r.duration),
            "HORA" => FieldValue::text(&r.hour),
            "EMISORA/SITE" => FieldValue::text(&r.station),
            "PROGRAMA/TIPO DE SITE" => FieldValue::text(&r.program),
            "BREAK" => FieldValue::text(&r.break_slot),
            "POS. SPOT" => FieldValue::text(&r.spot_position),
            "INVERSION" => FieldValue::Number(r.spend),
            "SECTOR" => FieldValue::text(&r.sector),
            "CATEGORIA" => FieldValue::text(&r.category),
            "ITEM" => FieldValue::text(&r.item),
            "AGENCIA" => FieldValue::text(&r.agency),
            "ANUNCIANTE" => FieldValue::text(&r.advertiser),
            "REGION/ÁMBITO" => FieldValue::text(&r.region),
            "ANCHO" => FieldValue::number(r.width),
            "ALTO" => FieldValue::number(r.height),
            "GENERO" => FieldValue::text(&r.genre),
            "EDITORA" => FieldValue::text(&r.editor),
            _ => return None,
        };
        Some(value)
    }
}

impl SourceRow for AllocatedSighting {
    const KIND: SourceKind = SourceKind::OutView;

    fn date(&self) -> NaiveDate {
        self.record.date
    }

    fn period(&self) -> &PeriodFields {
        &self.period
    }

    fn column(&self, name: &str) -> Option<FieldValue> {
        let r = &self.record;
        let value = match name {
            "Medio" => FieldValue::text(r.medium.label()),
            "Marca" => FieldValue::text(&r.brand),
            "Producto" => FieldValue::text(&r.product),
            "Versión" => FieldValue::text(&r.version),
            "Tipo Elemento" => FieldValue::text(r.element_type.label()),
            "Q versiones por elemento Mes" => {
                FieldValue::Integer(self.versions_per_element as i64)
            }
            "Distrito" => FieldValue::text(&r.district),
            "Avenida" => FieldValue::text(&r.avenue),
            "Nro Calle/Cuadra" => FieldValue::text(&r.street),
            "Orientación de Vía" => FieldValue::text(&r.orientation),
            "Tarifa Real ($)" => FieldValue::Number(self.real_investment),
            "Sector" => FieldValue::text(&r.sector),
            "Categoría" => FieldValue::text(&r.category),
            "Item" => FieldValue::text(&r.item),
            "Agencia" => FieldValue::text(&r.agency),
            "Anunciante" => FieldValue::text(&r.advertiser),
            "Región" => FieldValue::text(&r.region),
            "Latitud" => FieldValue::number(r.latitude),
            "Longitud" => FieldValue::number(r.longitude),
            "+1 Superficie" => FieldValue::Integer(self.surface_count as i64),
            "Conteo mensual" => FieldValue::Integer(i64::from(self.monthly_count)),
            "Proveedor" => FieldValue::text(&r.provider),
            _ => return None,
        };
        Some(value)
    }
}

/// Projects a source row onto the canonical shape, slot by slot as
/// [`COLUMN_MAPPINGS`] directs.
pub fn project<R: SourceRow>(row: &R) -> CanonicalRecord {
    let mut cells: Vec<FieldValue> = COLUMN_MAPPINGS
        .iter()
        .map(|mapping| match mapping.column_for(R::KIND) {
            Some(name) => row.column(name).unwrap_or_else(|| {
                debug!("{} has no column '{}'; slot left empty", R::KIND, name);
                FieldValue::Empty
            }),
            None => FieldValue::Empty,
        })
        .collect();
    let mut take = |idx: usize| std::mem::take(&mut cells[idx]);
    let period = row.period();

    CanonicalRecord {
        source: R::KIND,
        date: row.date(),
        year: period.year,
        month: period.month.clone(),
        week: period.week,
        medium: Medium::parse(&take(4).to_string()),
        brand: take(5).to_string(),
        product: take(6).to_string(),
        version: take(7).to_string(),
        duration: take(8),
        element_type: take(9),
        time_or_versions: take(10),
        station_or_district: take(11).to_string(),
        program_or_avenue: take(12).to_string(),
        break_or_street: take(13).to_string(),
        spot_or_orientation: take(14).to_string(),
        investment: take(15).as_number().unwrap_or(0.0),
        sector: take(16).to_string(),
        category: take(17).to_string(),
        item: take(18).to_string(),
        agency: take(19).to_string(),
        advertiser: take(20).to_string(),
        region: take(21).to_string(),
        width_or_latitude: take(22),
        height_or_longitude: take(23),
        genre_or_surface: take(24),
        element_count: take(25),
        editor_or_provider: take(26).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedDataset {
    pub columns: Vec<String>,
    pub records: Vec<CanonicalRecord>,
}

impl ConsolidatedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<FieldValue>> + '_ {
        self.records.iter().map(CanonicalRecord::to_row)
    }

    pub fn total_investment(&self) -> f64 {
        self.records.iter().map(|r| r.investment).sum()
    }

    pub fn count_by_source(&self, source: SourceKind) -> usize {
        self.records.iter().filter(|r| r.source == source).count()
    }
}

/// Unions both sources into the canonical shape: Monitor rows first, then a
/// stable sort by date and brand.
pub fn consolidate(
    monitor: Option<&[FactoredInsertion]>,
    outview: Option<&[AllocatedSighting]>,
) -> Result<ConsolidatedDataset> {
    if monitor.is_none() && outview.is_none() {
        return Err(MediaSpendError::MissingSources);
    }

    let mut records: Vec<CanonicalRecord> = Vec::new();
    if let Some(rows) = monitor {
        records.extend(rows.iter().map(project));
    }
    if let Some(rows) = outview {
        records.extend(rows.iter().map(project));
    }

    sort_canonical(&mut records);

    info!(
        "Consolidated {} rows ({} Monitor, {} OutView)",
        records.len(),
        monitor.map_or(0, <[_]>::len),
        outview.map_or(0, <[_]>::len)
    );

    Ok(ConsolidatedDataset {
        columns: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        records,
    })
}

pub fn sort_canonical(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.brand.cmp(&b.brand)));
}
