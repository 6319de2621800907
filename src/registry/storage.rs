use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ForecastError, Result};
use crate::ml::{ForecastBundle, ModelSpec, Normalizer, SeriesSnapshot};

pub const COMPONENTS_FILE: &str = "model_components.json";
pub const MODEL_FILE: &str = "model.json";
pub const SERIES_FILE: &str = "latest_data.csv";

/// Persistence collaborator the registry loads from. Calls may block.
pub trait ModelStore: Send + Sync + 'static {
    fn load_bundle(&self, entity: &str) -> Result<ForecastBundle>;

    fn load_series(&self, entity: &str) -> Result<SeriesSnapshot>;

    fn list_entities(&self) -> Result<Vec<String>>;

    /// Accuracy, kind and parameters of an entity's bundle. Stores that can
    /// read this cheaply should override it; the default loads the bundle.
    fn describe(&self, entity: &str) -> Result<ModelInfo> {
        let bundle = self.load_bundle(entity)?;
        Ok(ModelInfo {
            accuracy: bundle.accuracy,
            model_type: bundle.model_kind,
            parameters: ModelParams {
                seq_length: bundle.sequence_length,
                extra: Map::new(),
            },
        })
    }
}

/// What the listing endpoint reports per entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub accuracy: f64,
    pub model_type: String,
    pub parameters: ModelParams,
}

/// Training parameters stored with a bundle. Only `seq_length` is used for
/// forecasting; anything else is carried through for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub seq_length: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ModelComponents {
    scaler: Normalizer,
    params: ModelParams,
    accuracy: f64,
    #[serde(default)]
    model_type: Option<String>,
}

/// One directory per entity under a root fixed at construction.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    root: PathBuf,
    value_column: String,
    default_model_type: String,
}

impl FileModelStore {
    pub fn new(
        root: impl Into<PathBuf>,
        value_column: impl Into<String>,
        default_model_type: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let root = match fs::canonicalize(&root) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Model directory {} is not accessible: {}", root.display(), e);
                root
            }
        };
        info!("Model store rooted at {}", root.display());

        Self {
            root,
            value_column: value_column.into(),
            default_model_type: default_model_type.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entity_dir(&self, entity: &str) -> Result<PathBuf> {
        let plain = !entity.is_empty()
            && entity != "."
            && entity != ".."
            && !entity.contains(['/', '\\']);
        if !plain {
            return Err(ForecastError::NotFound(entity.to_string()));
        }
        let dir = self.root.join(entity);
        if !dir.is_dir() {
            return Err(ForecastError::NotFound(entity.to_string()));
        }
        Ok(dir)
    }

    fn read_components(&self, entity: &str, dir: &Path) -> Result<ModelComponents> {
        serde_json::from_str(&read_required(entity, &dir.join(COMPONENTS_FILE))?)
            .map_err(|e| ForecastError::load(entity, format!("{}: {}", COMPONENTS_FILE, e)))
    }
}

fn read_required(entity: &str, path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ForecastError::NotFound(entity.to_string()),
        _ => ForecastError::load(entity, format!("{}: {}", path.display(), e)),
    })
}

impl ModelStore for FileModelStore {
    fn load_bundle(&self, entity: &str) -> Result<ForecastBundle> {
        let dir = self.entity_dir(entity)?;
        debug!("Loading bundle for {} from {}", entity, dir.display());

        let components = self.read_components(entity, &dir)?;

        // Components without weights is a broken bundle, not a missing one.
        let model_path = dir.join(MODEL_FILE);
        let raw_model = fs::read_to_string(&model_path)
            .map_err(|e| ForecastError::load(entity, format!("{}: {}", model_path.display(), e)))?;
        let spec: ModelSpec = serde_json::from_str(&raw_model)
            .map_err(|e| ForecastError::load(entity, format!("{}: {}", MODEL_FILE, e)))?;
        let predictor = spec
            .build()
            .map_err(|e| ForecastError::load(entity, format!("{}: {}", MODEL_FILE, e)))?;

        let bundle = ForecastBundle {
            predictor,
            normalizer: components.scaler,
            sequence_length: components.params.seq_length,
            accuracy: components.accuracy,
            model_kind: components
                .model_type
                .unwrap_or_else(|| self.default_model_type.clone()),
        };
        bundle.validate().map_err(|e| ForecastError::load(entity, e))?;
        Ok(bundle)
    }

    fn load_series(&self, entity: &str) -> Result<SeriesSnapshot> {
        let dir = self.entity_dir(entity)?;
        let path = dir.join(SERIES_FILE);
        let file = fs::File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ForecastError::NotFound(entity.to_string()),
            _ => ForecastError::load(entity, format!("{}: {}", path.display(), e)),
        })?;
        SeriesSnapshot::from_csv(entity, file, &self.value_column)
            .map_err(|e| ForecastError::load(entity, format!("{}: {}", SERIES_FILE, e)))
    }

    fn list_entities(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ForecastError::load(
                    "*",
                    format!("{}: {}", self.root.display(), e),
                ))
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(COMPONENTS_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    fn describe(&self, entity: &str) -> Result<ModelInfo> {
        let dir = self.entity_dir(entity)?;
        let components = self.read_components(entity, &dir)?;
        Ok(ModelInfo {
            accuracy: components.accuracy,
            model_type: components
                .model_type
                .unwrap_or_else(|| self.default_model_type.clone()),
            parameters: components.params,
        })
    }
}
