use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::network::spec::Architecture;

pub const MODEL_TYPE: &str = "MLPClassifier";

/// Weights (`in_dim` rows of `out_dim` values) and biases of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

/// Portable description of a trained classifier.
///
/// On disk this is a flat JSON object:
///
/// ```json
/// {
///   "model_type": "MLPClassifier",
///   "input_size": 64,
///   "hidden_sizes": [128, 64],
///   "output_size": 10,
///   "activation": "relu",
///   "classes": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
///   "weights1": [[...], ...], "bias1": [...],
///   "weights2": [[...], ...], "bias2": [...],
///   "weights3": [[...], ...], "bias3": [...]
/// }
/// ```
///
/// Layer `k` (1-based, input to output) is stored under `weightsk`/`biask`.
/// These names and the ordering are the compatibility contract with other
/// consumers of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawArtifact", try_from = "RawArtifact")]
pub struct ModelArtifact {
    pub model_type: String,
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
    pub activation: ActivationFunction,
    pub layers: Vec<LayerParams>,
    pub classes: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct RawArtifact {
    model_type: String,
    input_size: usize,
    hidden_sizes: Vec<usize>,
    output_size: usize,
    activation: ActivationFunction,
    classes: Vec<usize>,
    #[serde(flatten)]
    params: BTreeMap<String, Value>,
}

impl From<ModelArtifact> for RawArtifact {
    fn from(a: ModelArtifact) -> RawArtifact {
        let mut params = BTreeMap::new();
        for (k, layer) in a.layers.into_iter().enumerate() {
            params.insert(format!("weights{}", k + 1), Value::from(layer.weights));
            params.insert(format!("bias{}", k + 1), Value::from(layer.biases));
        }
        RawArtifact {
            model_type: a.model_type,
            input_size: a.input_size,
            hidden_sizes: a.hidden_sizes,
            output_size: a.output_size,
            activation: a.activation,
            classes: a.classes,
            params,
        }
    }
}

impl TryFrom<RawArtifact> for ModelArtifact {
    type Error = String;

    fn try_from(mut raw: RawArtifact) -> std::result::Result<ModelArtifact, String> {
        let num_layers = raw.hidden_sizes.len() + 1;
        let mut layers = Vec::with_capacity(num_layers);
        for k in 1..=num_layers {
            let weights = take_param::<Vec<Vec<f64>>>(&mut raw.params, &format!("weights{k}"))?;
            let biases = take_param::<Vec<f64>>(&mut raw.params, &format!("bias{k}"))?;
            layers.push(LayerParams { weights, biases });
        }
        Ok(ModelArtifact {
            model_type: raw.model_type,
            input_size: raw.input_size,
            hidden_sizes: raw.hidden_sizes,
            output_size: raw.output_size,
            activation: raw.activation,
            layers,
            classes: raw.classes,
        })
    }
}

fn take_param<T: serde::de::DeserializeOwned>(params: &mut BTreeMap<String, Value>, key: &str) -> std::result::Result<T, String> {
    let value = params.remove(key).ok_or_else(|| format!("missing field `{key}`"))?;
    serde_json::from_value(value).map_err(|e| format!("field `{key}`: {e}"))
}

impl ModelArtifact {
    /// Export: captures `network` and the label of each of its outputs.
    ///
    /// `classes` must be strictly ascending with one entry per output unit.
    /// Callers outside the crate export through [`TrainedModel::to_artifact`].
    ///
    /// [`TrainedModel::to_artifact`]: crate::train::TrainedModel::to_artifact
    pub(crate) fn from_network(network: &Network, classes: &[usize]) -> Result<ModelArtifact> {
        check_classes(classes, network.output_size())?;
        let arch = network.architecture();
        let layers = network
            .layers()
            .iter()
            .map(|l| LayerParams {
                weights: l.weights.to_rows(),
                biases: l.biases.row(0).to_vec(),
            })
            .collect();
        Ok(ModelArtifact {
            model_type: MODEL_TYPE.to_string(),
            input_size: arch.input_size,
            hidden_sizes: arch.hidden_sizes,
            output_size: arch.output_size,
            activation: network.activation(),
            layers,
            classes: classes.to_vec(),
        })
    }

    pub fn architecture(&self) -> Architecture {
        Architecture::new(self.input_size, self.hidden_sizes.clone(), self.output_size)
    }

    /// Import: rebuilds the network, checking every matrix against the
    /// declared sizes.
    pub fn to_network(&self) -> Result<Network> {
        if self.model_type != MODEL_TYPE {
            return Err(NnError::InvalidArtifact(format!(
                "unsupported model_type '{}', expected '{MODEL_TYPE}'",
                self.model_type
            )));
        }
        let arch = self.architecture();
        arch.validate()?;
        check_classes(&self.classes, self.output_size)?;

        let dims = arch.layer_dims();
        if dims.len() != self.layers.len() {
            return Err(NnError::InvalidArtifact(format!(
                "declared {} layers but found {}",
                dims.len(),
                self.layers.len()
            )));
        }

        let mut layers = Vec::with_capacity(dims.len());
        for (k, ((in_dim, out_dim), params)) in dims.into_iter().zip(&self.layers).enumerate() {
            let name = k + 1;
            if params.weights.len() != in_dim {
                return Err(NnError::InvalidArtifact(format!(
                    "weights{name} has {} rows, expected {in_dim}",
                    params.weights.len()
                )));
            }
            if let Some(row) = params.weights.iter().position(|r| r.len() != out_dim) {
                return Err(NnError::InvalidArtifact(format!(
                    "weights{name} row {row} has {} values, expected {out_dim}",
                    params.weights[row].len()
                )));
            }
            if params.biases.len() != out_dim {
                return Err(NnError::InvalidArtifact(format!(
                    "bias{name} has {} values, expected {out_dim}",
                    params.biases.len()
                )));
            }
            layers.push(Layer::from_parts(
                Matrix::from_data(params.weights.clone()),
                Matrix::row_vector(params.biases.clone()),
            ));
        }

        Network::from_layers(layers, self.activation)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<ModelArtifact> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes the artifact as pretty-printed JSON. The file is closed on
    /// every exit path.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        tracing::info!("Model saved to {}", path.display());
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<ModelArtifact> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn check_classes(classes: &[usize], output_size: usize) -> Result<()> {
    if classes.len() != output_size {
        return Err(NnError::InvalidArtifact(format!(
            "{} class labels for {} outputs",
            classes.len(),
            output_size
        )));
    }
    if classes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(NnError::InvalidArtifact("classes must be strictly ascending".into()));
    }
    Ok(())
}
