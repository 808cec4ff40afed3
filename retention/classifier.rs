use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// A binary probabilistic model over a fixed-width feature vector.
///
/// Implementations are shared read-only between concurrent requests, so prediction
/// takes `&self` and must not mutate internal state.
pub trait Classifier: Send + Sync {
    /// Number of features the model consumes.
    fn input_width(&self) -> usize;

    /// Probability of the positive (persist) class for one sample of width
    /// [`Classifier::input_width`]. May be non-finite on numerical failure; callers sanitize.
    fn predict_proba(&self, features: ArrayView1<f64>) -> f64;
}

// --- Public Data Structures ---
// These structs define the human-readable format of the trained network when
// serialized to a TOML file.

/// Element-wise activation applied after a layer's affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Tanh,
    /// The logistic function; the output layer of a binary classifier uses this.
    Sigmoid,
    Linear,
}

/// One fully connected layer: `activation(x · weights + bias)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Shape `[inputs, outputs]`.
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
}

/// A trained feed-forward network, loaded from and saved to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub input_width: usize,
    pub layers: Vec<DenseLayer>,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The model file defines no layers.")]
    NoLayers,
    #[error(
        "Layer {layer} expects {expected} inputs but receives {found}. The weight matrices do not chain."
    )]
    LayerInputMismatch {
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[error("Layer {layer} has {outputs} outputs but a bias of length {bias}.")]
    BiasMismatch {
        layer: usize,
        outputs: usize,
        bias: usize,
    },
    #[error("The final layer must produce a single probability, but it has {0} outputs.")]
    OutputWidth(usize),
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Tanh => z.tanh(),
            Activation::Sigmoid => {
                // Clamp to keep exp() from overflowing; NaN passes through untouched.
                let z = z.clamp(-700.0, 700.0);
                1.0 / (1.0 + f64::exp(-z))
            }
            Activation::Linear => z,
        }
    }
}

impl DenseNetwork {
    /// Saves the network to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a network from a TOML file and checks that its layers chain.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let network: Self = toml::from_str(&toml_string)?;
        network.validate()?;
        Ok(network)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let mut width = self.input_width;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.nrows() != width {
                return Err(ModelError::LayerInputMismatch {
                    layer: i,
                    expected: layer.weights.nrows(),
                    found: width,
                });
            }
            if layer.bias.len() != layer.weights.ncols() {
                return Err(ModelError::BiasMismatch {
                    layer: i,
                    outputs: layer.weights.ncols(),
                    bias: layer.bias.len(),
                });
            }
            width = layer.weights.ncols();
        }
        match self.layers.last() {
            None => Err(ModelError::NoLayers),
            Some(_) if width != 1 => Err(ModelError::OutputWidth(width)),
            Some(_) => Ok(()),
        }
    }
}

impl Classifier for DenseNetwork {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> f64 {
        let mut h = features.to_owned();
        for layer in &self.layers {
            let activation = layer.activation;
            h = (h.dot(&layer.weights) + &layer.bias).mapv_into(|z| activation.apply(z));
        }
        h.first().copied().unwrap_or(f64::NAN)
    }
}
