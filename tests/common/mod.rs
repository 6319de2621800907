#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Months, NaiveDate};
use serde_json::json;

use pepper_forecast::error::{ForecastError, ModelError, Result};
use pepper_forecast::ml::SeriesPoint;
use pepper_forecast::{ForecastBundle, ModelStore, Normalizer, SequenceModel, SeriesSnapshot};

pub fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// `count` month-end-ish points ending on `last`, rising by 10 from `start`.
pub fn monthly_points(last: &str, count: u32, start: f64) -> Vec<SeriesPoint> {
    let last = date(last);
    (0..count)
        .map(|i| SeriesPoint {
            date: last - Months::new(count - 1 - i),
            value: start + 10.0 * i as f64,
        })
        .collect()
}

/// Writes a persisted bundle whose linear model adds `drift` to the newest scaled value.
pub fn write_drift_entity(root: &Path, entity: &str, value_column: &str, last: &str, seq_length: usize, drift: f64) {
    let dir = root.join(entity);
    fs::create_dir_all(&dir).unwrap();

    let components = json!({
        "scaler": {"kind": "min_max", "data_min": 500.0, "data_max": 2500.0},
        "params": {"seq_length": seq_length},
        "accuracy": 91.37,
        "model_type": "Linear"
    });
    fs::write(dir.join("model_components.json"), components.to_string()).unwrap();

    let mut coefficients = vec![0.0; seq_length];
    coefficients[seq_length - 1] = 1.0;
    let model = json!({"kind": "linear", "coefficients": coefficients, "intercept": drift});
    fs::write(dir.join("model.json"), model.to_string()).unwrap();

    let mut csv = format!("Date,{}\n", value_column);
    for point in monthly_points(last, 24, 1000.0) {
        csv.push_str(&format!("{},{}\n", point.date, point.value));
    }
    fs::write(dir.join("latest_data.csv"), csv).unwrap();
}

/// Predicts `newest + 0.01` and counts calls; optionally fails on the nth call.
#[derive(Debug)]
pub struct CountingModel {
    pub calls: Arc<AtomicUsize>,
    pub fail_on_call: Option<usize>,
}

impl SequenceModel for CountingModel {
    fn predict(&self, window: &[f64]) -> std::result::Result<f64, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(ModelError::InferenceError("tensor shape mismatch".to_string()));
        }
        Ok(window[window.len() - 1] + 0.01)
    }

    fn kind(&self) -> &'static str {
        "counting"
    }
}

/// In-memory store serving a single entity, counting bundle reads.
pub struct CountingStore {
    pub entity: String,
    pub last: String,
    pub bundle_reads: AtomicUsize,
    pub predictor_calls: Arc<AtomicUsize>,
    pub fail_on_call: Option<usize>,
    pub load_delay: Duration,
}

impl CountingStore {
    pub fn new(entity: &str, last: &str) -> Self {
        Self {
            entity: entity.to_string(),
            last: last.to_string(),
            bundle_reads: AtomicUsize::new(0),
            predictor_calls: Arc::new(AtomicUsize::new(0)),
            fail_on_call: None,
            load_delay: Duration::ZERO,
        }
    }

    pub fn reads(&self) -> usize {
        self.bundle_reads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.predictor_calls.load(Ordering::SeqCst)
    }
}

impl ModelStore for CountingStore {
    fn load_bundle(&self, entity: &str) -> Result<ForecastBundle> {
        if entity != self.entity {
            return Err(ForecastError::NotFound(entity.to_string()));
        }
        self.bundle_reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);
        Ok(ForecastBundle {
            predictor: Box::new(CountingModel {
                calls: Arc::clone(&self.predictor_calls),
                fail_on_call: self.fail_on_call,
            }),
            normalizer: Normalizer::min_max(500.0, 2500.0),
            sequence_length: 12,
            accuracy: 88.12,
            model_kind: "LSTM".to_string(),
        })
    }

    fn load_series(&self, entity: &str) -> Result<SeriesSnapshot> {
        if entity != self.entity {
            return Err(ForecastError::NotFound(entity.to_string()));
        }
        Ok(SeriesSnapshot::new(entity, monthly_points(&self.last, 24, 1000.0)).unwrap())
    }

    fn list_entities(&self) -> Result<Vec<String>> {
        Ok(vec![self.entity.clone()])
    }
}
