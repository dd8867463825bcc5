use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::model::artifact::ModelArtifact;
use crate::network::network::Network;
use crate::train::loop_fn::argmax;

/// Result of classifying one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Most probable class label.
    pub label: usize,
    /// Probability of `label`.
    pub confidence: f64,
    /// One probability per class, in the order of [`Predictor::classes`].
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone)]
struct LoadedModel {
    network: Network,
    classes: Vec<usize>,
}

/// Standalone single-example inference over an imported model.
///
/// Needs only a [`ModelArtifact`]; it never touches the trainer or the
/// optimizer. A predictor starts unloaded and reports `ModelNotLoaded`
/// until a model is imported.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    model: Option<LoadedModel>,
}

impl Predictor {
    pub fn new() -> Predictor {
        Predictor { model: None }
    }

    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Predictor> {
        let mut predictor = Predictor::new();
        predictor.load(artifact)?;
        Ok(predictor)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Predictor> {
        Predictor::from_artifact(&ModelArtifact::load_json(path)?)
    }

    pub(crate) fn from_network(network: Network, classes: Vec<usize>) -> Predictor {
        Predictor { model: Some(LoadedModel { network, classes }) }
    }

    /// Imports `artifact`. On failure the previously loaded model, if any,
    /// stays in place.
    pub fn load(&mut self, artifact: &ModelArtifact) -> Result<()> {
        let network = artifact.to_network()?;
        tracing::info!(
            "Model loaded: input {}, hidden {:?}, output {}, activation {}",
            artifact.input_size,
            artifact.hidden_sizes,
            artifact.output_size,
            artifact.activation
        );
        self.model = Some(LoadedModel { network, classes: artifact.classes.clone() });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn input_size(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.network.input_size())
    }

    pub fn classes(&self) -> Option<&[usize]> {
        self.model.as_ref().map(|m| m.classes.as_slice())
    }

    pub fn predict(&self, input: &[f64]) -> Result<Prediction> {
        let model = self.model.as_ref().ok_or(NnError::ModelNotLoaded)?;
        let expected = model.network.input_size();
        if input.len() != expected {
            return Err(NnError::shape("predict input", expected, input.len()));
        }

        let probabilities = model
            .network
            .predict_proba(&Matrix::row_vector(input.to_vec()))
            .row(0)
            .to_vec();
        let best = argmax(&probabilities);
        tracing::debug!("predicted class {} with p={:.4}", model.classes[best], probabilities[best]);

        Ok(Prediction {
            label: model.classes[best],
            confidence: probabilities[best],
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::Architecture;

    fn artifact() -> ModelArtifact {
        let net = Network::new(&Architecture::new(6, vec![4], 3), ActivationFunction::ReLU, 17).unwrap();
        ModelArtifact::from_network(&net, &[2, 5, 7]).unwrap()
    }

    #[test]
    fn unloaded_predictor_refuses() {
        let p = Predictor::new();
        assert!(!p.is_loaded());
        assert!(matches!(p.predict(&[0.0; 6]), Err(NnError::ModelNotLoaded)));
    }

    #[test]
    fn wrong_input_length_reports_dimensions() {
        let p = Predictor::from_artifact(&artifact()).unwrap();
        match p.predict(&[1.0; 5]) {
            Err(NnError::ShapeMismatch { expected, actual, .. }) => assert_eq!((expected, actual), (6, 5)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn prediction_maps_output_to_class_label() {
        let p = Predictor::from_artifact(&artifact()).unwrap();
        let out = p.predict(&[1.0, 0.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.probabilities.len(), 3);
        assert!([2, 5, 7].contains(&out.label));
        let max = out.probabilities.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(out.confidence, max);
        assert!((out.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn failed_load_keeps_previous_model() {
        let mut p = Predictor::from_artifact(&artifact()).unwrap();
        let mut broken = artifact();
        broken.layers[0].biases.clear();
        assert!(p.load(&broken).is_err());
        assert!(p.is_loaded());
        assert_eq!(p.input_size(), Some(6));
    }
}
