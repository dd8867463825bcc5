use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::math::matrix::Matrix;

/// Activation applied element-wise after every hidden layer.
///
/// The serialized tags (`relu`, `tanh`, `logistic`, `identity`) are the
/// `activation` field of the model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    #[serde(rename = "relu")]
    ReLU,
    Tanh,
    Logistic,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Logistic => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    ///
    /// ReLU uses 1 where `x > 0` and 0 otherwise (including at exactly 0).
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Logistic => {
                let s = self.function(x);
                s * (1.0 - s)
            }
            ActivationFunction::Identity => 1.0,
        }
    }

    /// Numerator of the Glorot bound for weights feeding this activation.
    pub fn init_factor(&self) -> f64 {
        match self {
            ActivationFunction::Logistic => 2.0,
            _ => 6.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationFunction::ReLU => "relu",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Logistic => "logistic",
            ActivationFunction::Identity => "identity",
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relu" => Ok(ActivationFunction::ReLU),
            "tanh" => Ok(ActivationFunction::Tanh),
            "logistic" => Ok(ActivationFunction::Logistic),
            "identity" => Ok(ActivationFunction::Identity),
            other => Err(format!("unknown activation '{other}'")),
        }
    }
}

/// Row-wise softmax over a batch of logits.
///
/// Each row is shifted by its maximum before exponentiation so large logits
/// cannot overflow; every output row sums to 1.
pub fn softmax_rows(logits: &Matrix) -> Matrix {
    let mut out = logits.clone();
    for r in 0..out.rows {
        let row = out.row_mut(r);
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for x in row.iter_mut() {
            *x = (*x - max).exp();
            sum += *x;
        }
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
    out
}
