pub mod bundle;
pub mod engine;
pub mod models;
pub mod normalizer;
pub mod series;

pub use bundle::ForecastBundle;
pub use engine::{month_steps, Forecast, ForecastEngine};
pub use models::{LSTMModel, LinearAutoregressor, ModelSpec, SequenceModel};
pub use normalizer::Normalizer;
pub use series::{SeriesPoint, SeriesSnapshot, SeriesStats};
