use crate::config::EngineConfig;
use crate::schema::{ElementType, Medium};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An ordered set of adjustments to an [`EngineConfig`].
///
/// Callers keep the documented defaults as their base and ship only the
/// differences (a new exchange rate for the quarter, a renegotiated cap).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ConfigOverrides {
    #[schemars(description = "Modifications applied in order to the base configuration.")]
    #[serde(default)]
    pub modifications: Vec<ConfigModification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConfigModification {
    /// Set or replace the Monitor multiplier of a medium.
    SetMediumFactor {
        #[schemars(description = "Medium label, e.g. TV or DIARIOS.")]
        medium: Medium,
        factor: f64,
    },

    /// Remove a medium from the multiplier table (its rows are then multiplied by 1.0).
    RemoveMediumFactor { medium: Medium },

    SetExchangeRate {
        #[schemars(description = "Local currency units per USD.")]
        rate: f64,
    },

    /// Change the LED and/or standard allocation factor.
    SetAllocationFactors {
        led: Option<f64>,
        standard: Option<f64>,
    },

    /// Set or replace the monthly cap (USD) of an element type.
    SetCap {
        #[schemars(description = "Element type label, e.g. PANEL or PANTALLA LED.")]
        element_type: ElementType,
        cap: f64,
    },

    /// Remove the cap of an element type; its rows are then allocated uncapped.
    RemoveCap { element_type: ElementType },

    /// Multiply every cap by a factor (e.g. 1.05 for a yearly rate increase).
    ScaleCaps { factor: f64 },
}

impl ConfigOverrides {
    pub fn new(modifications: Vec<ConfigModification>) -> Self {
        Self { modifications }
    }

    /// Applies the overrides to a base configuration, returning a new configuration.
    /// The base is left untouched.
    pub fn apply(&self, base_config: &EngineConfig) -> EngineConfig {
        let mut config = base_config.clone();
        for modification in &self.modifications {
            apply_single_modification(&mut config, modification);
        }
        config
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn apply_single_modification(config: &mut EngineConfig, modification: &ConfigModification) {
    match modification {
        ConfigModification::SetMediumFactor { medium, factor } => {
            config.monitor.factors.insert(medium.clone(), *factor);
        }

        ConfigModification::RemoveMediumFactor { medium } => {
            config.monitor.factors.remove(medium);
        }

        ConfigModification::SetExchangeRate { rate } => {
            config.outview.exchange_rate = *rate;
        }

        ConfigModification::SetAllocationFactors { led, standard } => {
            if let Some(led) = led {
                config.outview.led_factor = *led;
            }
            if let Some(standard) = standard {
                config.outview.standard_factor = *standard;
            }
        }

        ConfigModification::SetCap { element_type, cap } => {
            config.outview.caps.insert(element_type.clone(), *cap);
        }

        ConfigModification::RemoveCap { element_type } => {
            config.outview.caps.remove(element_type);
        }

        ConfigModification::ScaleCaps { factor } => {
            for cap in config.outview.caps.values_mut() {
                *cap *= factor;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_leaves_base_untouched() {
        let base = EngineConfig::default();
        let overrides = ConfigOverrides::new(vec![
            ConfigModification::SetExchangeRate { rate: 3.8 },
            ConfigModification::SetMediumFactor {
                medium: Medium::Tv,
                factor: 0.3,
            },
            ConfigModification::RemoveCap {
                element_type: ElementType::Clip,
            },
        ]);

        let adjusted = overrides.apply(&base);

        assert_eq!(adjusted.outview.exchange_rate, 3.8);
        assert_eq!(adjusted.monitor.factor(&Medium::Tv), Some(0.3));
        assert_eq!(adjusted.outview.cap(&ElementType::Clip), None);
        assert_eq!(base.outview.exchange_rate, 3.0);
        assert_eq!(base.outview.cap(&ElementType::Clip), Some(800.0));
    }

    #[test]
    fn test_modifications_apply_in_order() {
        let overrides = ConfigOverrides::new(vec![
            ConfigModification::SetCap {
                element_type: ElementType::parse("MURAL"),
                cap: 500.0,
            },
            ConfigModification::ScaleCaps { factor: 2.0 },
        ]);
        let adjusted = overrides.apply(&EngineConfig::default());

        assert_eq!(
            adjusted.outview.cap(&ElementType::parse("mural")),
            Some(1000.0)
        );
        assert_eq!(adjusted.outview.cap(&ElementType::Valla), Some(1600.0));
    }

    #[test]
    fn test_deserialize_tagged_modifications() {
        let json = r#"{
            "modifications": [
                { "action": "set_allocation_factors", "led": 0.5, "standard": null },
                { "action": "remove_medium_factor", "medium": "suplemento" }
            ]
        }"#;
        let overrides = ConfigOverrides::from_json_str(json).unwrap();
        let adjusted = overrides.apply(&EngineConfig::default());

        assert_eq!(adjusted.outview.led_factor, 0.5);
        assert_eq!(adjusted.outview.standard_factor, 0.8);
        assert_eq!(adjusted.monitor.factor(&Medium::Diarios), None);
    }
}
