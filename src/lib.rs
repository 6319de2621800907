//! Recursive multi-step price forecasting over lazily loaded per-entity models.
//!
//! Each entity (a district or a pepper grade) owns a persisted bundle: a
//! sequence predictor, the scaler it was trained with and its recent monthly
//! history. [`ModelRegistry`] loads a bundle once per process and
//! [`ForecastEngine`] rolls the predictor forward month by month to a target
//! date.

pub mod config;
pub mod error;
pub mod ml;
pub mod registry;
pub mod service;

pub use config::{Config, FamilyConfig};
pub use error::{ForecastError, ModelError, Result, Stage};
pub use ml::{Forecast, ForecastBundle, ForecastEngine, Normalizer, SequenceModel, SeriesSnapshot};
pub use registry::{FileModelStore, LoadedModel, ModelInfo, ModelRegistry, ModelStore};
pub use service::ForecastService;
