use std::fmt;

use thiserror::Error;

/// Where in the recursive loop a forecast failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Predict { step: u32 },
    Denormalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Normalize => write!(f, "normalize"),
            Stage::Predict { step } => write!(f, "predict(step {})", step),
            Stage::Denormalize => write!(f, "denormalize"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("No model found for {0}")]
    NotFound(String),

    #[error("Invalid target date: {0}")]
    InvalidDate(String),

    #[error("Error loading {entity} model: {message}")]
    LoadError {
        entity: String,
        message: String,
    },

    #[error("Prediction failed for {entity} at {stage}: {reason}")]
    PredictionFailed {
        entity: String,
        stage: Stage,
        reason: String,
    },

    #[error("Unknown model family: {0}")]
    UnknownFamily(String),
}

impl ForecastError {
    pub fn load(entity: &str, message: impl Into<String>) -> Self {
        ForecastError::LoadError {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Status code a request-handling layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::NotFound(_) | ForecastError::UnknownFamily(_) => 404,
            ForecastError::InvalidDate(_) => 400,
            ForecastError::LoadError { .. } | ForecastError::PredictionFailed { .. } => 500,
        }
    }
}

/// Failure raised by a predictor or normalizer while evaluating one value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Input window has {actual} values, model expects {expected}")]
    WindowMismatch { expected: usize, actual: usize },

    #[error("Non-finite value produced: {0}")]
    NonFinite(f64),

    #[error("Inference failed: {0}")]
    InferenceError(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
