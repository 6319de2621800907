pub mod responses;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, FamilyConfig};
use crate::error::{ForecastError, Result};
use crate::ml::ForecastEngine;
use crate::registry::{FileModelStore, ModelRegistry, ModelStore};

pub use responses::{EntitiesResponse, ErrorResponse, ForecastResponse, HistoryResponse};

struct Family {
    config: FamilyConfig,
    engine: ForecastEngine,
}

/// One forecast engine per configured model family, built once at startup
/// and shared by every caller for the life of the process.
pub struct ForecastService {
    families: HashMap<String, Family>,
}

impl ForecastService {
    pub fn from_config(config: &Config) -> Self {
        let mut service = Self {
            families: HashMap::new(),
        };
        for family in &config.families {
            let store = FileModelStore::new(
                &family.model_dir,
                &family.value_column,
                &family.default_model_type,
            );
            service.add_family(family.clone(), Arc::new(store));
        }
        service
    }

    /// Registers a family backed by an arbitrary store.
    pub fn add_family(&mut self, config: FamilyConfig, store: Arc<dyn ModelStore>) {
        info!("Registering model family {}", config.name);
        let engine = ForecastEngine::new(Arc::new(ModelRegistry::new(store)));
        self.families
            .insert(config.name.clone(), Family { config, engine });
    }

    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.families.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn engine(&self, family: &str) -> Result<&ForecastEngine> {
        self.family(family).map(|f| &f.engine)
    }

    fn family(&self, name: &str) -> Result<&Family> {
        self.families
            .get(name)
            .ok_or_else(|| ForecastError::UnknownFamily(name.to_string()))
    }

    pub async fn predict(&self, family: &str, entity: &str, target_date: &str) -> Result<ForecastResponse> {
        let family = self.family(family)?;
        let forecast = family.engine.forecast(entity, target_date).await?;
        Ok(ForecastResponse::from_forecast(&family.config.entity_label, &forecast))
    }

    pub async fn entities(&self, family: &str) -> Result<EntitiesResponse> {
        let family = self.family(family)?;
        Ok(EntitiesResponse {
            family: family.config.name.clone(),
            available_models: family.engine.available_entities().await?,
            models_info: family.engine.describe_entities().await?,
        })
    }

    pub async fn history(&self, family: &str, entity: &str) -> Result<HistoryResponse> {
        let family = self.family(family)?;
        let series = family.engine.history(entity).await?;
        Ok(HistoryResponse {
            entity_label: family.config.entity_label.clone(),
            entity: entity.to_string(),
            history: series.points().to_vec(),
            statistics: series.calculate_statistics(),
        })
    }
}
