use std::collections::BTreeMap;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// One labeled pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Vec<f64>,
    pub label: usize,
}

/// Validated, immutable collection of examples.
///
/// Invariants: non-empty, every input has `input_size` values and every
/// label lies in `[0, num_targets)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    examples: Vec<Example>,
    input_size: usize,
    num_targets: usize,
}

impl Dataset {
    pub fn new(examples: Vec<Example>, num_targets: usize) -> Result<Dataset> {
        let input_size = match examples.first() {
            Some(first) => first.input.len(),
            None => return Err(NnError::NoData { failures: vec![] }),
        };
        for (index, ex) in examples.iter().enumerate() {
            if ex.input.len() != input_size {
                return Err(NnError::shape(format!("input of record {index}"), input_size, ex.input.len()));
            }
            if ex.label >= num_targets {
                return Err(NnError::LabelEncoding {
                    index,
                    reason: format!("label {} outside [0, {})", ex.label, num_targets),
                });
            }
        }
        Ok(Dataset { examples, input_size, num_targets })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Width of the one-hot targets the examples were encoded with.
    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Distinct labels present, ascending.
    pub fn classes(&self) -> Vec<usize> {
        self.class_counts().into_keys().collect()
    }

    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for ex in &self.examples {
            *counts.entry(ex.label).or_insert(0) += 1;
        }
        counts
    }

    /// Inputs of the given examples stacked one per row.
    pub fn features(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.input_size);
        for &i in indices {
            data.extend_from_slice(&self.examples[i].input);
        }
        Matrix::from_vec(indices.len(), self.input_size, data)
    }

    pub fn labels(&self, indices: &[usize]) -> Vec<usize> {
        indices.iter().map(|&i| self.examples[i].label).collect()
    }
}

/// Converts a one-hot target to the index of its single `1`.
pub fn one_hot_to_label(target: &[f64], record: usize) -> Result<usize> {
    let mut ones = target.iter().enumerate().filter(|(_, v)| **v == 1.0).map(|(i, _)| i);
    match (ones.next(), ones.next()) {
        (Some(label), None) => Ok(label),
        (None, _) => Err(NnError::LabelEncoding {
            index: record,
            reason: "one-hot target holds no entry equal to 1".into(),
        }),
        (Some(_), Some(_)) => Err(NnError::LabelEncoding {
            index: record,
            reason: format!(
                "one-hot target holds {} entries equal to 1",
                target.iter().filter(|&&v| v == 1.0).count()
            ),
        }),
    }
}
