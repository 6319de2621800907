use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::ForecastError;
use crate::ml::{Forecast, SeriesPoint, SeriesStats};
use crate::registry::ModelInfo;

/// Prediction body; the entity key depends on the family (`district`, `pepper_type`).
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResponse {
    pub entity_label: String,
    pub entity: String,
    pub target_date: String,
    pub predicted_price: f64,
    pub model_accuracy: f64,
    pub model_type: String,
}

impl ForecastResponse {
    pub fn from_forecast(entity_label: &str, forecast: &Forecast) -> Self {
        Self {
            entity_label: entity_label.to_string(),
            entity: forecast.entity.clone(),
            target_date: forecast.target_date.format("%Y-%m-%d").to_string(),
            predicted_price: forecast.predicted_value,
            model_accuracy: forecast.model_accuracy,
            model_type: forecast.model_kind.clone(),
        }
    }
}

impl Serialize for ForecastResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry(&self.entity_label, &self.entity)?;
        map.serialize_entry("target_date", &self.target_date)?;
        map.serialize_entry("predicted_price", &self.predicted_price)?;
        map.serialize_entry("model_accuracy", &self.model_accuracy)?;
        map.serialize_entry("model_type", &self.model_type)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub entity_label: String,
    pub entity: String,
    pub history: Vec<SeriesPoint>,
    pub statistics: SeriesStats,
}

impl Serialize for HistoryResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&self.entity_label, &self.entity)?;
        map.serialize_entry("history", &self.history)?;
        map.serialize_entry("statistics", &self.statistics)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitiesResponse {
    pub family: String,
    pub available_models: Vec<String>,
    pub models_info: BTreeMap<String, ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl From<&ForecastError> for ErrorResponse {
    fn from(err: &ForecastError) -> Self {
        Self {
            error: err.to_string(),
            status: err.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn forecast_response_uses_family_entity_key() {
        let forecast = Forecast {
            entity: "Kegalle".to_string(),
            target_date: "2025-09-30".parse().unwrap(),
            predicted_value: 1234.57,
            model_accuracy: 91.2,
            model_kind: "LSTM".to_string(),
            steps: 3,
        };
        let body = serde_json::to_value(ForecastResponse::from_forecast("district", &forecast)).unwrap();
        assert_eq!(
            body,
            json!({
                "district": "Kegalle",
                "target_date": "2025-09-30",
                "predicted_price": 1234.57,
                "model_accuracy": 91.2,
                "model_type": "LSTM"
            })
        );
    }

    #[test]
    fn error_response_carries_status() {
        let body = ErrorResponse::from(&ForecastError::NotFound("Atlantis".to_string()));
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"error": "No model found for Atlantis", "status": 404})
        );
    }
}
