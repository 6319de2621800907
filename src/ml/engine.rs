use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use metrics::histogram;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::bundle::ForecastBundle;
use super::series::{parse_date, SeriesSnapshot};
use crate::error::{ForecastError, ModelError, Result, Stage};
use crate::registry::{LoadedModel, ModelInfo, ModelRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub entity: String,
    pub target_date: NaiveDate,
    pub predicted_value: f64,
    pub model_accuracy: f64,
    pub model_kind: String,
    pub steps: u32,
}

pub struct ForecastEngine {
    registry: Arc<ModelRegistry>,
}

impl ForecastEngine {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Forecast from an ISO-8601 date string. The entity is resolved before
    /// the date is parsed, so an unknown entity is always `NotFound`.
    pub async fn forecast(&self, entity: &str, target_date: &str) -> Result<Forecast> {
        let started = Instant::now();
        let model = self.registry.get_or_load(entity).await?;
        let target = parse_date(target_date).ok_or_else(|| {
            ForecastError::InvalidDate(format!("{:?} is not an ISO-8601 date", target_date))
        })?;
        self.run(entity, &model, target, started)
    }

    pub async fn forecast_on(&self, entity: &str, target: NaiveDate) -> Result<Forecast> {
        let started = Instant::now();
        let model = self.registry.get_or_load(entity).await?;
        self.run(entity, &model, target, started)
    }

    fn run(&self, entity: &str, model: &LoadedModel, target: NaiveDate, started: Instant) -> Result<Forecast> {
        let outcome = recursive_forecast(entity, &model.bundle, &model.series, target);
        histogram!("forecast_duration_seconds").record(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(forecast) => info!(
                entity,
                target = %forecast.target_date,
                steps = forecast.steps,
                predicted = forecast.predicted_value,
                "Forecast complete"
            ),
            Err(e) => warn!("Forecast for {} on {} failed: {}", entity, target, e),
        }
        outcome
    }

    /// Observed history for an entity, loading its bundle if needed.
    pub async fn history(&self, entity: &str) -> Result<Arc<SeriesSnapshot>> {
        let model = self.registry.get_or_load(entity).await?;
        Ok(Arc::clone(&model.series))
    }

    pub async fn available_entities(&self) -> Result<Vec<String>> {
        let store = Arc::clone(self.registry.store());
        tokio::task::spawn_blocking(move || store.list_entities())
            .await
            .map_err(|e| ForecastError::load("*", format!("listing task failed: {}", e)))?
    }

    /// Per-entity summaries for the listing. An entity whose components
    /// cannot be read is left out rather than failing the whole listing.
    pub async fn describe_entities(&self) -> Result<BTreeMap<String, ModelInfo>> {
        let store = Arc::clone(self.registry.store());
        tokio::task::spawn_blocking(move || {
            let mut infos = BTreeMap::new();
            for entity in store.list_entities()? {
                match store.describe(&entity) {
                    Ok(info) => {
                        infos.insert(entity, info);
                    }
                    Err(e) => warn!("Skipping {} in model listing: {}", entity, e),
                }
            }
            Ok(infos)
        })
        .await
        .map_err(|e| ForecastError::load("*", format!("listing task failed: {}", e)))?
    }
}

/// Whole calendar months between two dates; day of month is ignored.
pub fn month_steps(last: NaiveDate, target: NaiveDate) -> i64 {
    (target.year() as i64 - last.year() as i64) * 12 + (target.month() as i64 - last.month() as i64)
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Feeds each prediction back into a fixed-width window until `target` is reached.
/// Never touches the bundle or the series; the window is local to the call.
pub fn recursive_forecast(
    entity: &str,
    bundle: &ForecastBundle,
    series: &SeriesSnapshot,
    target: NaiveDate,
) -> Result<Forecast> {
    let last = series.last_date();
    if target <= last {
        return Err(ForecastError::InvalidDate(format!(
            "Date must be after {}",
            last.format("%Y-%m-%d")
        )));
    }

    let steps = month_steps(last, target);
    if steps <= 0 {
        return Err(ForecastError::InvalidDate(format!(
            "{} is in the same month as the last observation {}",
            target, last
        )));
    }
    let steps = u32::try_from(steps)
        .map_err(|_| ForecastError::InvalidDate(format!("{} is too far ahead", target)))?;

    let failed = |stage: Stage, e: ModelError| ForecastError::PredictionFailed {
        entity: entity.to_string(),
        stage,
        reason: e.to_string(),
    };

    let width = bundle.sequence_length;
    if width == 0 {
        return Err(failed(
            Stage::Normalize,
            ModelError::InferenceError("sequence_length is 0, window would be empty".to_string()),
        ));
    }
    let raw = series.tail(width).ok_or_else(|| {
        failed(
            Stage::Normalize,
            ModelError::WindowMismatch {
                expected: width,
                actual: series.len(),
            },
        )
    })?;
    let mut window = raw
        .iter()
        .map(|&v| bundle.normalizer.forward(v))
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|e| failed(Stage::Normalize, e))?;

    debug!(entity, steps, width, "Starting recursive forecast");
    for step in 1..=steps {
        let next = bundle
            .predictor
            .predict(&window)
            .and_then(|v| {
                if v.is_finite() {
                    Ok(v)
                } else {
                    Err(ModelError::NonFinite(v))
                }
            })
            .map_err(|e| failed(Stage::Predict { step }, e))?;
        trace!(step, next, "Scaled prediction");

        window.rotate_left(1);
        window[width - 1] = next;
    }

    // steps >= 1, so the newest slot holds the final prediction.
    let scaled = window[width - 1];
    let predicted = bundle
        .normalizer
        .inverse(scaled)
        .map_err(|e| failed(Stage::Denormalize, e))?;

    Ok(Forecast {
        entity: entity.to_string(),
        target_date: target,
        predicted_value: round2(predicted),
        model_accuracy: bundle.accuracy,
        model_kind: bundle.model_kind.clone(),
        steps,
    })
}
