use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use metrics::counter;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::storage::ModelStore;
use crate::error::{ForecastError, Result};
use crate::ml::{ForecastBundle, SeriesSnapshot};

/// A bundle together with the history that seeds its window.
#[derive(Debug)]
pub struct LoadedModel {
    pub bundle: Arc<ForecastBundle>,
    pub series: Arc<SeriesSnapshot>,
}

/// Per-process cache of loaded entities. Entries are never reloaded or evicted.
///
/// Each entity gets its own `OnceCell`: the first caller claims it and loads,
/// concurrent callers wait on the same cell and receive the same `Arc`.
/// The load is driven by a spawned task, so it finishes and fills the cell
/// even when the caller that started it is dropped.
/// A failed load leaves the cell empty so the next caller tries again.
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    entries: DashMap<String, Arc<OnceCell<Arc<LoadedModel>>>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    pub async fn get_or_load(&self, entity: &str) -> Result<Arc<LoadedModel>> {
        // Clone the cell out so no shard lock is held across the await.
        let cell = Arc::clone(self.entries.entry(entity.to_string()).or_default().value());

        if let Some(model) = cell.get() {
            counter!("registry_cache_hits_total").increment(1);
            return Ok(Arc::clone(model));
        }

        // The load runs in its own task so a caller that gives up (timeout,
        // dropped request) does not cancel it; waiters still get its result.
        let init = Arc::clone(&cell);
        let store = Arc::clone(&self.store);
        let key = entity.to_string();
        let result = tokio::spawn(async move {
            let loaded = init
                .get_or_try_init(|| Self::load(store, key))
                .await
                .map(Arc::clone);
            drop(init);
            loaded
        })
        .await
        .map_err(|e| ForecastError::load(entity, format!("load task failed: {}", e)))
        .and_then(|loaded| loaded);

        if result.is_err() {
            drop(cell);
            // Only drop the slot when nobody else is waiting on it.
            self.entries
                .remove_if(entity, |_, slot| !slot.initialized() && Arc::strong_count(slot) == 1);
        }

        result
    }

    /// Entities whose bundle is resident.
    pub fn cached_entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    async fn load(store: Arc<dyn ModelStore>, entity: String) -> Result<Arc<LoadedModel>> {
        debug!("Loading forecast bundle for {}", entity);
        let started = Instant::now();
        let key = entity.clone();

        let loaded = tokio::task::spawn_blocking(move || -> Result<LoadedModel> {
            let bundle = store.load_bundle(&key)?;
            let series = store.load_series(&key)?;
            if series.len() < bundle.sequence_length {
                return Err(ForecastError::load(
                    &key,
                    format!(
                        "series has {} points, model needs {}",
                        series.len(),
                        bundle.sequence_length
                    ),
                ));
            }
            Ok(LoadedModel {
                bundle: Arc::new(bundle),
                series: Arc::new(series),
            })
        })
        .await
        .map_err(|e| ForecastError::load(&entity, format!("load task failed: {}", e)))
        .and_then(|loaded| loaded);

        match loaded {
            Ok(model) => {
                counter!("registry_loads_total").increment(1);
                info!(
                    entity = %entity,
                    kind = %model.bundle.model_kind,
                    seq_length = model.bundle.sequence_length,
                    points = model.series.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Forecast bundle loaded"
                );
                Ok(Arc::new(model))
            }
            Err(e) => {
                counter!("registry_load_failures_total").increment(1);
                warn!("Failed to load bundle for {}: {}", entity, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{LinearAutoregressor, Normalizer, SeriesPoint};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakyStore {
        reads: AtomicUsize,
        fail_first: usize,
    }

    impl ModelStore for FlakyStore {
        fn load_bundle(&self, entity: &str) -> Result<ForecastBundle> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if entity != "Matale" {
                return Err(ForecastError::NotFound(entity.to_string()));
            }
            if n < self.fail_first {
                return Err(ForecastError::load(entity, "disk hiccup"));
            }
            Ok(ForecastBundle {
                predictor: Box::new(LinearAutoregressor::new(vec![1.0], 0.0).unwrap()),
                normalizer: Normalizer::min_max(0.0, 1.0),
                sequence_length: 1,
                accuracy: 90.0,
                model_kind: "LSTM".to_string(),
            })
        }

        fn load_series(&self, entity: &str) -> Result<SeriesSnapshot> {
            let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
            Ok(SeriesSnapshot::new(entity, vec![SeriesPoint { date, value: 0.5 }]).unwrap())
        }

        fn list_entities(&self) -> Result<Vec<String>> {
            Ok(vec!["Matale".to_string()])
        }
    }

    #[tokio::test]
    async fn failed_loads_are_not_cached() {
        let store = Arc::new(FlakyStore {
            fail_first: 1,
            ..Default::default()
        });
        let registry = ModelRegistry::new(store.clone());

        let first = registry.get_or_load("Matale").await;
        assert!(matches!(first, Err(ForecastError::LoadError { .. })));
        assert!(registry.cached_entities().is_empty());

        let second = registry.get_or_load("Matale").await.unwrap();
        let third = registry.get_or_load("Matale").await.unwrap();
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_entities(), vec!["Matale"]);
    }

    #[tokio::test]
    async fn unknown_entities_do_not_linger() {
        let registry = ModelRegistry::new(Arc::new(FlakyStore::default()));
        for _ in 0..3 {
            assert!(matches!(
                registry.get_or_load("Atlantis").await,
                Err(ForecastError::NotFound(_))
            ));
        }
        assert!(registry.entries.is_empty());
    }
}
