//! Feature schema shared by training and inference.
//!
//! The model only ever sees features in [`FEATURE_COLS`] order. Input maps are
//! always re-ordered through this list, never by their own iteration order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FloodSightError, Result};

/// Number of environmental input features.
pub const NUM_FEATURES: usize = 14;

/// Number of predicted targets.
pub const NUM_TARGETS: usize = 2;

/// Input feature names in training order.
pub const FEATURE_COLS: [&str; NUM_FEATURES] = [
    "temperature_c",
    "humidity_pct",
    "upstream_flow",
    "soil_moisture",
    "previous_day_rainfall",
    "wind_speed",
    "pressure",
    "evaporation_rate",
    "catchment_area",
    "river_level",
    "elevation",
    "distance_to_river",
    "land_use_index",
    "solar_radiation",
];

/// Target column names, in the order of the network heads.
pub const TARGET_COLS: [&str; NUM_TARGETS] = ["rainfall_mm", "flood_risk_pct"];

/// An ordered vector of the 14 features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; NUM_FEATURES],
}

impl FeatureVector {
    /// Build from values already in [`FEATURE_COLS`] order.
    pub fn new(values: [f64; NUM_FEATURES]) -> Result<Self> {
        for (name, value) in FEATURE_COLS.iter().zip(values.iter()) {
            if !value.is_finite() {
                return Err(FloodSightError::InvalidFeature {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(Self { values })
    }

    /// Assemble from a name → value mapping. Extra keys are ignored.
    pub fn from_map(input: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0; NUM_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_COLS.iter()) {
            *slot = *input
                .get(*name)
                .ok_or_else(|| FloodSightError::MissingFeature(name.to_string()))?;
        }
        Self::new(values)
    }

    /// Assemble from raw text values, e.g. form fields or CLI answers.
    pub fn parse_map(input: &HashMap<String, String>) -> Result<Self> {
        let mut values = [0.0; NUM_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_COLS.iter()) {
            let raw = input
                .get(*name)
                .ok_or_else(|| FloodSightError::MissingFeature(name.to_string()))?;
            *slot = parse_value(name, raw)?;
        }
        Self::new(values)
    }

    /// The documented sample reading.
    pub fn sample() -> Self {
        Self {
            values: [
                28.5, 80.0, 110.0, 0.35, 15.2, 6.5, 1007.0, 3.0, 210.0, 3.2, 130.0, 1.8, 0.7, 295.0,
            ],
        }
    }

    pub fn values(&self) -> &[f64; NUM_FEATURES] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_COLS
            .iter()
            .position(|col| *col == name)
            .map(|idx| self.values[idx])
    }

    /// Convert back into a name → value mapping.
    pub fn to_map(&self) -> HashMap<String, f64> {
        FEATURE_COLS
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }
}

/// Parse one text answer for feature `name`. Surrounding whitespace is
/// ignored; anything that is not a finite number is `InvalidFeature`.
pub fn parse_value(name: &str, raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FloodSightError::InvalidFeature {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Human-readable label for a column name: `temperature_c` → `Temperature C`.
pub fn label(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_map_reorders_by_schema() {
        let sample = FeatureVector::sample();
        // HashMap iteration order is arbitrary; the vector must not depend on it
        let rebuilt = FeatureVector::from_map(&sample.to_map()).unwrap();
        assert_eq!(rebuilt, sample);
        assert_eq!(rebuilt.values()[6], 1007.0);
    }

    #[test]
    fn test_missing_feature_is_named() {
        for name in FEATURE_COLS {
            let mut map = FeatureVector::sample().to_map();
            map.remove(name);
            match FeatureVector::from_map(&map) {
                Err(FloodSightError::MissingFeature(missing)) => assert_eq!(missing, name),
                other => panic!("expected missing feature, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let mut map = FeatureVector::sample().to_map();
        map.insert("pressure".to_string(), f64::NAN);
        assert!(matches!(
            FeatureVector::from_map(&map),
            Err(FloodSightError::InvalidFeature { ref name, .. }) if name == "pressure"
        ));
    }

    #[test]
    fn test_parse_map() {
        let mut raw: HashMap<String, String> = FEATURE_COLS
            .iter()
            .map(|name| (name.to_string(), "1.5".to_string()))
            .collect();
        let parsed = FeatureVector::parse_map(&raw).unwrap();
        assert!(parsed.values().iter().all(|&v| v == 1.5));

        raw.insert("wind_speed".to_string(), "breezy".to_string());
        assert!(matches!(
            FeatureVector::parse_map(&raw),
            Err(FloodSightError::InvalidFeature { ref value, .. }) if value == "breezy"
        ));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("pressure", " 1007.5 ").unwrap(), 1007.5);
        for raw in ["", "inf", "NaN", "12mm"] {
            assert!(matches!(
                parse_value("pressure", raw),
                Err(FloodSightError::InvalidFeature { ref name, .. }) if name == "pressure"
            ));
        }
    }

    #[test]
    fn test_label() {
        assert_eq!(label("temperature_c"), "Temperature C");
        assert_eq!(label("previous_day_rainfall"), "Previous Day Rainfall");
    }
}
