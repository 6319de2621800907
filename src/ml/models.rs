use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;

/// A single-step sequence predictor: maps a scaled window to the next scaled value.
pub trait SequenceModel: Send + Sync + fmt::Debug {
    fn predict(&self, window: &[f64]) -> Result<f64, ModelError>;

    fn kind(&self) -> &'static str;

    /// Window width the model was built for, when it is fixed by the weights.
    fn window_len(&self) -> Option<usize> {
        None
    }
}

/// On-disk description of a predictor (`model.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Lstm {
        layers: Vec<LstmLayerSpec>,
        dense: DenseSpec,
    },
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

/// Keras layout: `kernel` is `input_dim x 4*units`, `recurrent_kernel` is `units x 4*units`,
/// gate blocks ordered input, forget, cell, output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerSpec {
    pub units: usize,
    pub kernel: Vec<Vec<f64>>,
    pub recurrent_kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseSpec {
    pub kernel: Vec<f64>,
    pub bias: f64,
}

impl ModelSpec {
    pub fn build(self) -> Result<Box<dyn SequenceModel>, String> {
        match self {
            ModelSpec::Lstm { layers, dense } => Ok(Box::new(LSTMModel::from_spec(layers, dense)?)),
            ModelSpec::Linear {
                coefficients,
                intercept,
            } => Ok(Box::new(LinearAutoregressor::new(coefficients, intercept)?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LSTMModel {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub layers: Vec<LstmLayer>,
    pub output_weights: DVector<f64>,
    pub output_bias: f64,
}

#[derive(Debug, Clone)]
pub struct LstmLayer {
    pub units: usize,
    pub input_weights: DMatrix<f64>,
    pub hidden_weights: DMatrix<f64>,
    pub biases: DVector<f64>,
}

impl LstmLayer {
    fn from_spec(spec: LstmLayerSpec, input_dim: usize, index: usize) -> Result<Self, String> {
        let units = spec.units;
        let gates = 4 * units;
        if units == 0 {
            return Err(format!("layer {}: units must be positive", index));
        }
        if spec.kernel.len() != input_dim || spec.kernel.iter().any(|row| row.len() != gates) {
            return Err(format!(
                "layer {}: kernel must be {}x{}",
                index, input_dim, gates
            ));
        }
        if spec.recurrent_kernel.len() != units
            || spec.recurrent_kernel.iter().any(|row| row.len() != gates)
        {
            return Err(format!(
                "layer {}: recurrent_kernel must be {}x{}",
                index, units, gates
            ));
        }
        if spec.bias.len() != gates {
            return Err(format!("layer {}: bias must have {} values", index, gates));
        }

        // Stored transposed so a step is `W x + U h + b`.
        let input_weights = DMatrix::from_fn(gates, input_dim, |r, c| spec.kernel[c][r]);
        let hidden_weights = DMatrix::from_fn(gates, units, |r, c| spec.recurrent_kernel[c][r]);
        let biases = DVector::from_vec(spec.bias);

        Ok(Self {
            units,
            input_weights,
            hidden_weights,
            biases,
        })
    }

    /// Runs the layer over a whole sequence and returns every hidden state.
    fn forward(&self, inputs: &[DVector<f64>]) -> Vec<DVector<f64>> {
        let n = self.units;
        let mut h = DVector::zeros(n);
        let mut c = DVector::zeros(n);
        let mut outputs = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z = &self.input_weights * x + &self.hidden_weights * &h + &self.biases;
            let i = z.rows(0, n).map(sigmoid);
            let f = z.rows(n, n).map(sigmoid);
            let g = z.rows(2 * n, n).map(f64::tanh);
            let o = z.rows(3 * n, n).map(sigmoid);

            c = f.component_mul(&c) + i.component_mul(&g);
            h = o.component_mul(&c.map(f64::tanh));
            outputs.push(h.clone());
        }

        outputs
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LSTMModel {
    pub fn from_spec(layers: Vec<LstmLayerSpec>, dense: DenseSpec) -> Result<Self, String> {
        if layers.is_empty() {
            return Err("lstm model has no layers".to_string());
        }

        let input_size = 1;
        let num_layers = layers.len();
        let mut input_dim = input_size;
        let mut built = Vec::with_capacity(num_layers);
        for (index, spec) in layers.into_iter().enumerate() {
            let layer = LstmLayer::from_spec(spec, input_dim, index)?;
            input_dim = layer.units;
            built.push(layer);
        }

        let hidden_size = input_dim;
        if dense.kernel.len() != hidden_size {
            return Err(format!(
                "dense kernel has {} weights, last lstm layer has {} units",
                dense.kernel.len(),
                hidden_size
            ));
        }

        Ok(Self {
            input_size,
            hidden_size,
            num_layers,
            layers: built,
            output_weights: DVector::from_vec(dense.kernel),
            output_bias: dense.bias,
        })
    }
}

impl SequenceModel for LSTMModel {
    fn predict(&self, window: &[f64]) -> Result<f64, ModelError> {
        if window.is_empty() {
            return Err(ModelError::InferenceError("empty input window".to_string()));
        }
        debug!(steps = window.len(), layers = self.num_layers, "Running LSTM inference");

        let mut sequence: Vec<DVector<f64>> = window
            .iter()
            .map(|&v| DVector::from_element(self.input_size, v))
            .collect();
        for layer in &self.layers {
            sequence = layer.forward(&sequence);
        }

        let last = sequence
            .last()
            .ok_or_else(|| ModelError::InferenceError("lstm produced no output".to_string()))?;
        let value = self.output_weights.dot(last) + self.output_bias;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ModelError::NonFinite(value))
        }
    }

    fn kind(&self) -> &'static str {
        "lstm"
    }
}

/// `intercept + sum(coefficients[i] * window[i])`, coefficients ordered oldest first.
#[derive(Debug, Clone)]
pub struct LinearAutoregressor {
    pub coefficients: DVector<f64>,
    pub intercept: f64,
}

impl LinearAutoregressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, String> {
        if coefficients.is_empty() {
            return Err("linear model has no coefficients".to_string());
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err("linear model has non-finite weights".to_string());
        }
        Ok(Self {
            coefficients: DVector::from_vec(coefficients),
            intercept,
        })
    }
}

impl SequenceModel for LinearAutoregressor {
    fn predict(&self, window: &[f64]) -> Result<f64, ModelError> {
        if window.len() != self.coefficients.len() {
            return Err(ModelError::WindowMismatch {
                expected: self.coefficients.len(),
                actual: window.len(),
            });
        }
        let x = DVector::from_column_slice(window);
        let value = self.coefficients.dot(&x) + self.intercept;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ModelError::NonFinite(value))
        }
    }

    fn kind(&self) -> &'static str {
        "linear"
    }

    fn window_len(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}
