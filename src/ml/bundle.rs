use super::models::SequenceModel;
use super::normalizer::Normalizer;

/// Everything needed to forecast one entity. Immutable once loaded.
#[derive(Debug)]
pub struct ForecastBundle {
    pub predictor: Box<dyn SequenceModel>,
    pub normalizer: Normalizer,
    pub sequence_length: usize,
    pub accuracy: f64,
    pub model_kind: String,
}

impl ForecastBundle {
    /// Checks that the parts agree with each other.
    pub fn validate(&self) -> Result<(), String> {
        if self.sequence_length == 0 {
            return Err("seq_length must be at least 1".to_string());
        }
        if !self.accuracy.is_finite() {
            return Err(format!("accuracy is not a number: {}", self.accuracy));
        }
        self.normalizer.validate()?;
        if let Some(width) = self.predictor.window_len() {
            if width != self.sequence_length {
                return Err(format!(
                    "{} model expects a window of {}, seq_length is {}",
                    self.predictor.kind(),
                    width,
                    self.sequence_length
                ));
            }
        }
        Ok(())
    }
}
