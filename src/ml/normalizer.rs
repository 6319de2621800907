//! Reversible value scalers persisted next to each forecast model.
//!
//! Both kinds mirror the scikit-learn scalers the bundles were fitted with,
//! so a persisted scaler reproduces the training-time transform exactly.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    /// `scaled = (raw - data_min) / (data_max - data_min) * (hi - lo) + lo`
    MinMax {
        data_min: f64,
        data_max: f64,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
    },
    /// `scaled = (raw - mean) / scale`
    Standard { mean: f64, scale: f64 },
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl Normalizer {
    pub fn min_max(data_min: f64, data_max: f64) -> Self {
        Normalizer::MinMax {
            data_min,
            data_max,
            feature_range: default_feature_range(),
        }
    }

    /// Checks that the scaler can be inverted.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            Normalizer::MinMax {
                data_min,
                data_max,
                feature_range: (lo, hi),
            } => {
                if !(data_min.is_finite() && data_max.is_finite() && lo.is_finite() && hi.is_finite()) {
                    return Err("min-max scaler has non-finite bounds".to_string());
                }
                if data_max <= data_min {
                    return Err(format!(
                        "min-max scaler range is empty: data_min={} data_max={}",
                        data_min, data_max
                    ));
                }
                if hi <= lo {
                    return Err(format!("invalid feature_range ({}, {})", lo, hi));
                }
                Ok(())
            }
            Normalizer::Standard { mean, scale } => {
                if !mean.is_finite() || !scale.is_finite() || scale == 0.0 {
                    return Err(format!("standard scaler is degenerate: mean={} scale={}", mean, scale));
                }
                Ok(())
            }
        }
    }

    pub fn forward(&self, raw: f64) -> Result<f64, ModelError> {
        let scaled = match *self {
            Normalizer::MinMax {
                data_min,
                data_max,
                feature_range: (lo, hi),
            } => (raw - data_min) / (data_max - data_min) * (hi - lo) + lo,
            Normalizer::Standard { mean, scale } => (raw - mean) / scale,
        };
        finite(scaled)
    }

    pub fn inverse(&self, scaled: f64) -> Result<f64, ModelError> {
        let raw = match *self {
            Normalizer::MinMax {
                data_min,
                data_max,
                feature_range: (lo, hi),
            } => (scaled - lo) / (hi - lo) * (data_max - data_min) + data_min,
            Normalizer::Standard { mean, scale } => scaled * scale + mean,
        };
        finite(raw)
    }
}

fn finite(value: f64) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn min_max_round_trip_over_training_range() {
        let scaler = Normalizer::min_max(450.0, 2850.0);
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let x: f64 = rng.gen_range(450.0..=2850.0);
            let back = scaler.inverse(scaler.forward(x).unwrap()).unwrap();
            assert!((back - x).abs() < 1e-6, "{} -> {}", x, back);
        }
    }

    #[test]
    fn standard_round_trip_over_training_range() {
        let scaler = Normalizer::Standard { mean: 1200.0, scale: 310.5 };
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let x: f64 = rng.gen_range(100.0..=3000.0);
            let back = scaler.inverse(scaler.forward(x).unwrap()).unwrap();
            assert!((back - x).abs() < 1e-6);
        }
    }

    #[test]
    fn min_max_maps_bounds_onto_feature_range() {
        let scaler = Normalizer::MinMax {
            data_min: 100.0,
            data_max: 200.0,
            feature_range: (-1.0, 1.0),
        };
        assert_eq!(scaler.forward(100.0).unwrap(), -1.0);
        assert_eq!(scaler.forward(200.0).unwrap(), 1.0);
        assert_eq!(scaler.forward(150.0).unwrap(), 0.0);
    }

    #[test]
    fn degenerate_scalers_are_rejected() {
        assert!(Normalizer::min_max(5.0, 5.0).validate().is_err());
        assert!(Normalizer::Standard { mean: 1.0, scale: 0.0 }.validate().is_err());
        assert!(Normalizer::min_max(1.0, 2.0).validate().is_ok());
    }

    #[test]
    fn non_finite_output_is_an_error() {
        let scaler = Normalizer::min_max(0.0, 1.0);
        assert_eq!(
            scaler.inverse(f64::INFINITY),
            Err(ModelError::NonFinite(f64::INFINITY))
        );
    }

    #[test]
    fn deserializes_with_default_feature_range() {
        let scaler: Normalizer =
            serde_json::from_str(r#"{"kind": "min_max", "data_min": 1.0, "data_max": 3.0}"#).unwrap();
        assert_eq!(scaler, Normalizer::min_max(1.0, 3.0));
    }
}
