pub mod model_registry;
pub mod storage;

pub use model_registry::{LoadedModel, ModelRegistry};
pub use storage::{FileModelStore, ModelInfo, ModelParams, ModelStore};
