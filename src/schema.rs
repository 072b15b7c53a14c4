use crate::utils::{iso_week, normalize_label, spanish_month_name};
use chrono::{Datelike, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Monitor,
    OutView,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Monitor => write!(f, "Monitor"),
            SourceKind::OutView => write!(f, "OutView"),
        }
    }
}

/// Media channel of a placement.
///
/// Monitor rows carry one of the five broadcast/print channels; OutView rows
/// are out-of-home (`VIA PUBLICA`). Anything else is kept verbatim in
/// [`Medium::Unknown`] so it can be reported instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Medium {
    Tv,
    Cable,
    Radio,
    Revista,
    Diarios,
    ViaPublica,
    Unknown(String),
}

impl Medium {
    pub const MONITOR: [Medium; 5] = [
        Medium::Tv,
        Medium::Cable,
        Medium::Radio,
        Medium::Revista,
        Medium::Diarios,
    ];

    /// Parses a raw medium label. `SUPLEMENTO` is an alias of `DIARIOS`.
    pub fn parse(raw: &str) -> Self {
        let label = normalize_label(raw);
        match label.as_str() {
            "TV" => Medium::Tv,
            "CABLE" => Medium::Cable,
            "RADIO" => Medium::Radio,
            "REVISTA" => Medium::Revista,
            "DIARIOS" | "SUPLEMENTO" => Medium::Diarios,
            "VIA PUBLICA" | "VÍA PÚBLICA" | "VIA PÚBLICA" => Medium::ViaPublica,
            _ => Medium::Unknown(label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Medium::Tv => "TV",
            Medium::Cable => "CABLE",
            Medium::Radio => "RADIO",
            Medium::Revista => "REVISTA",
            Medium::Diarios => "DIARIOS",
            Medium::ViaPublica => "VIA PUBLICA",
            Medium::Unknown(label) => label,
        }
    }

    /// Default spend multiplier for the Monitor factor pass.
    pub fn default_factor(&self) -> Option<f64> {
        match self {
            Medium::Tv => Some(0.255),
            Medium::Cable | Medium::Radio => Some(0.425),
            Medium::Revista | Medium::Diarios => Some(0.14875),
            Medium::ViaPublica | Medium::Unknown(_) => None,
        }
    }

    /// One of the six media accepted in the consolidated output.
    pub fn is_known(&self) -> bool {
        !matches!(self, Medium::Unknown(_))
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Medium {
    fn from(value: String) -> Self {
        Medium::parse(&value)
    }
}

impl From<Medium> for String {
    fn from(value: Medium) -> Self {
        value.label().to_string()
    }
}

impl JsonSchema for Medium {
    fn schema_name() -> String {
        "Medium".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Physical out-of-home element category. Each known type has a monthly cap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ElementType {
    Banderola,
    Clip,
    Minipolar,
    Paleta,
    Panel,
    PanelCarretero,
    PantallaLed,
    Paradero,
    Prisma,
    Quiosco,
    Reloj,
    TorreUnipolar,
    Totem,
    Valla,
    VallaAlta,
    Unknown(String),
}

impl ElementType {
    pub const KNOWN: [ElementType; 15] = [
        ElementType::Banderola,
        ElementType::Clip,
        ElementType::Minipolar,
        ElementType::Paleta,
        ElementType::Panel,
        ElementType::PanelCarretero,
        ElementType::PantallaLed,
        ElementType::Paradero,
        ElementType::Prisma,
        ElementType::Quiosco,
        ElementType::Reloj,
        ElementType::TorreUnipolar,
        ElementType::Totem,
        ElementType::Valla,
        ElementType::VallaAlta,
    ];

    pub fn parse(raw: &str) -> Self {
        let label = normalize_label(raw);
        match label.as_str() {
            "BANDEROLA" => ElementType::Banderola,
            "CLIP" => ElementType::Clip,
            "MINIPOLAR" => ElementType::Minipolar,
            "PALETA" => ElementType::Paleta,
            "PANEL" => ElementType::Panel,
            "PANEL CARRETERO" => ElementType::PanelCarretero,
            "PANTALLA LED" => ElementType::PantallaLed,
            "PARADERO" => ElementType::Paradero,
            "PRISMA" => ElementType::Prisma,
            "QUIOSCO" => ElementType::Quiosco,
            "RELOJ" => ElementType::Reloj,
            "TORRE UNIPOLAR" => ElementType::TorreUnipolar,
            "TOTEM" => ElementType::Totem,
            "VALLA" => ElementType::Valla,
            "VALLA ALTA" => ElementType::VallaAlta,
            _ => ElementType::Unknown(label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ElementType::Banderola => "BANDEROLA",
            ElementType::Clip => "CLIP",
            ElementType::Minipolar => "MINIPOLAR",
            ElementType::Paleta => "PALETA",
            ElementType::Panel => "PANEL",
            ElementType::PanelCarretero => "PANEL CARRETERO",
            ElementType::PantallaLed => "PANTALLA LED",
            ElementType::Paradero => "PARADERO",
            ElementType::Prisma => "PRISMA",
            ElementType::Quiosco => "QUIOSCO",
            ElementType::Reloj => "RELOJ",
            ElementType::TorreUnipolar => "TORRE UNIPOLAR",
            ElementType::Totem => "TOTEM",
            ElementType::Valla => "VALLA",
            ElementType::VallaAlta => "VALLA ALTA",
            ElementType::Unknown(label) => label,
        }
    }

    /// Default monthly allocation ceiling in USD.
    pub fn default_cap(&self) -> Option<f64> {
        match self {
            ElementType::Banderola => Some(16000.00),
            ElementType::Clip => Some(800.00),
            ElementType::Minipolar => Some(1333.33),
            ElementType::Paleta => Some(800.00),
            ElementType::Panel => Some(2433.33),
            ElementType::PanelCarretero => Some(6666.67),
            ElementType::PantallaLed => Some(7200.00),
            ElementType::Paradero => Some(1066.67),
            ElementType::Prisma => Some(3733.33),
            ElementType::Quiosco => Some(800.00),
            ElementType::Reloj => Some(1120.00),
            ElementType::TorreUnipolar => Some(4000.00),
            ElementType::Totem => Some(1266.67),
            ElementType::Valla => Some(800.00),
            ElementType::VallaAlta => Some(1733.33),
            ElementType::Unknown(_) => None,
        }
    }

    pub fn is_led(&self) -> bool {
        matches!(self, ElementType::PantallaLed)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for ElementType {
    fn from(value: String) -> Self {
        ElementType::parse(&value)
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.label().to_string()
    }
}

impl JsonSchema for ElementType {
    fn schema_name() -> String {
        "ElementType".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Calendar fields derived from a placement date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFields {
    pub year: i32,
    /// Spanish month name, lower case (`enero` .. `diciembre`)
    pub month: String,
    /// ISO-8601 week number
    pub week: u32,
}

impl PeriodFields {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: spanish_month_name(date.month()).to_string(),
            week: iso_week(date),
        }
    }
}

/// One advertising insertion on broadcast/print media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMonitorRecord {
    /// Line number in the source text (1-based, blank lines excluded)
    pub line: usize,
    pub date: NaiveDate,
    pub medium: Medium,
    pub brand: String,
    pub product: String,
    pub version: String,
    pub duration: String,
    pub hour: String,
    pub station: String,
    pub program: String,
    pub break_slot: String,
    pub spot_position: String,
    pub sector: String,
    pub category: String,
    pub item: String,
    pub genre: String,
    pub agency: String,
    pub advertiser: String,
    pub editor: String,
    pub region: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Spend in local currency. Overwritten by the factor pass.
    pub spend: f64,
    /// Every other column, keyed by normalized header
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// One sighting of a physical out-of-home element on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutViewRecord {
    /// Row number in the source sheet (1-based)
    pub row: usize,
    pub date: NaiveDate,
    /// Placement code plus month token, e.g. `OPW09MAR2023`
    pub base_name: String,
    pub medium: Medium,
    pub provider: String,
    pub provider_code: String,
    pub element_type: ElementType,
    pub district: String,
    pub avenue: String,
    pub street: String,
    pub orientation: String,
    pub sector: String,
    pub category: String,
    pub item: String,
    pub brand: String,
    pub product: String,
    pub version: String,
    pub agency: String,
    pub advertiser: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Tariff in local currency (`Tarifa S/.`)
    pub tariff: f64,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}
