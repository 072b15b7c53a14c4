use crate::error::{MediaSpendError, Result};
use crate::schema::{ElementType, Medium};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_EXCHANGE_RATE: f64 = 3.0;
pub const DEFAULT_LED_FACTOR: f64 = 0.4;
pub const DEFAULT_STANDARD_FACTOR: f64 = 0.8;

/// Everything the engine reads besides the input payloads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(description = "Per-medium spend multipliers for the Monitor feed")]
    pub monitor: MonitorFactors,

    #[schemars(description = "Exchange rate, caps and allocation factors for the OutView feed")]
    pub outview: OutViewTariffs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MonitorFactors {
    #[schemars(
        description = "Medium label (TV, CABLE, RADIO, REVISTA, DIARIOS) to multiplier. Media absent from the table are multiplied by 1.0."
    )]
    pub factors: BTreeMap<Medium, f64>,
}

impl Default for MonitorFactors {
    fn default() -> Self {
        let factors = Medium::MONITOR
            .iter()
            .filter_map(|m| m.default_factor().map(|f| (m.clone(), f)))
            .collect();
        Self { factors }
    }
}

impl MonitorFactors {
    pub fn factor(&self, medium: &Medium) -> Option<f64> {
        self.factors.get(medium).copied()
    }

    pub fn with_factor(mut self, medium: Medium, factor: f64) -> Self {
        self.factors.insert(medium, factor);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutViewTariffs {
    #[schemars(description = "Local currency units per USD; raw tariffs are divided by this")]
    pub exchange_rate: f64,

    #[schemars(description = "Allocation factor applied to PANTALLA LED elements")]
    pub led_factor: f64,

    #[schemars(description = "Allocation factor applied to every other element type")]
    pub standard_factor: f64,

    #[schemars(
        description = "Monthly allocation ceiling in USD per element type. Types absent from the table are allocated uncapped."
    )]
    pub caps: BTreeMap<ElementType, f64>,
}

impl Default for OutViewTariffs {
    fn default() -> Self {
        let caps = ElementType::KNOWN
            .iter()
            .filter_map(|e| e.default_cap().map(|c| (e.clone(), c)))
            .collect();
        Self {
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            led_factor: DEFAULT_LED_FACTOR,
            standard_factor: DEFAULT_STANDARD_FACTOR,
            caps,
        }
    }
}

impl OutViewTariffs {
    pub fn cap(&self, element_type: &ElementType) -> Option<f64> {
        self.caps.get(element_type).copied()
    }

    pub fn allocation_factor(&self, element_type: &ElementType) -> f64 {
        if element_type.is_led() {
            self.led_factor
        } else {
            self.standard_factor
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Writes the configuration as pretty JSON through a temporary file so a
    /// concurrent reader never sees a half-written document.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (medium, factor) in &self.monitor.factors {
            if !factor.is_finite() || *factor < 0.0 {
                return Err(MediaSpendError::InvalidConfig(format!(
                    "factor for medium {} must be a non-negative number, got {}",
                    medium, factor
                )));
            }
        }

        let tariffs = &self.outview;
        if !tariffs.exchange_rate.is_finite() || tariffs.exchange_rate <= 0.0 {
            return Err(MediaSpendError::InvalidConfig(format!(
                "exchange rate must be positive, got {}",
                tariffs.exchange_rate
            )));
        }

        for (name, factor) in [
            ("led_factor", tariffs.led_factor),
            ("standard_factor", tariffs.standard_factor),
        ] {
            if !factor.is_finite() || factor < 0.0 {
                return Err(MediaSpendError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, factor
                )));
            }
        }

        for (element_type, cap) in &tariffs.caps {
            if cap.is_nan() || *cap < 0.0 {
                return Err(MediaSpendError::InvalidConfig(format!(
                    "cap for element type {} must be non-negative, got {}",
                    element_type, cap
                )));
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let config = EngineConfig::default();
        assert_eq!(config.monitor.factor(&Medium::Tv), Some(0.255));
        assert_eq!(config.monitor.factor(&Medium::Radio), Some(0.425));
        assert_eq!(config.monitor.factor(&Medium::ViaPublica), None);
        assert_eq!(config.monitor.factors.len(), 5);

        assert_eq!(config.outview.caps.len(), 15);
        assert_eq!(config.outview.cap(&ElementType::PantallaLed), Some(7200.0));
        assert_eq!(config.outview.allocation_factor(&ElementType::PantallaLed), 0.4);
        assert_eq!(config.outview.allocation_factor(&ElementType::Valla), 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "outview": { "exchange_rate": 3.7 } }"#).unwrap();
        assert_eq!(config.outview.exchange_rate, 3.7);
        assert_eq!(config.outview.caps.len(), 15);
        assert_eq!(config.monitor, MonitorFactors::default());
    }

    #[test]
    fn test_json_round_trip_uses_labels() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"PANTALLA LED\":7200.0"));
        assert!(json.contains("\"TV\":0.255"));

        let back = EngineConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.outview.exchange_rate = 0.0;
        assert!(matches!(
            config.validate(),
            Err(MediaSpendError::InvalidConfig(_))
        ));

        let config = EngineConfig {
            monitor: MonitorFactors::default().with_factor(Medium::Tv, -1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "media_spend_config_{}.json",
            std::process::id()
        ));
        let config = EngineConfig {
            monitor: MonitorFactors::default().with_factor(Medium::Tv, 0.3),
            ..Default::default()
        };
        config.save_to_path(&path).unwrap();
        let loaded = EngineConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.monitor.factor(&Medium::Tv), Some(0.3));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = EngineConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("exchange_rate"));
        assert!(schema_json.contains("caps"));
    }
}
