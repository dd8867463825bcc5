use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};

/// Layer widths of a fully connected classifier, input to output.
///
/// Fields:
/// - `input_size`   — length of one input vector (pixel count)
/// - `hidden_sizes` — width of every hidden layer, in order
/// - `output_size`  — number of classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
}

impl Architecture {
    pub fn new(input_size: usize, hidden_sizes: Vec<usize>, output_size: usize) -> Architecture {
        Architecture { input_size, hidden_sizes, output_size }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(NnError::Architecture("input_size must be at least 1".into()));
        }
        if let Some(pos) = self.hidden_sizes.iter().position(|&h| h == 0) {
            return Err(NnError::Architecture(format!("hidden layer {} has width 0", pos + 1)));
        }
        if self.output_size < 2 {
            return Err(NnError::Architecture(format!(
                "output_size must be at least 2 for a softmax classifier, got {}",
                self.output_size
            )));
        }
        Ok(())
    }

    /// `(in_dim, out_dim)` of every layer; consecutive pairs chain by construction.
    pub fn layer_dims(&self) -> Vec<(usize, usize)> {
        let mut sizes = Vec::with_capacity(self.hidden_sizes.len() + 2);
        sizes.push(self.input_size);
        sizes.extend_from_slice(&self.hidden_sizes);
        sizes.push(self.output_size);
        sizes.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn num_layers(&self) -> usize {
        self.hidden_sizes.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_dims_chain() {
        let arch = Architecture::new(64, vec![128, 64], 10);
        assert_eq!(arch.layer_dims(), vec![(64, 128), (128, 64), (64, 10)]);
        assert_eq!(arch.num_layers(), 3);
    }

    #[test]
    fn no_hidden_layers_is_a_single_linear_softmax() {
        let arch = Architecture::new(4, vec![], 3);
        assert!(arch.validate().is_ok());
        assert_eq!(arch.layer_dims(), vec![(4, 3)]);
    }

    #[test]
    fn rejects_zero_widths_and_single_class() {
        assert!(matches!(Architecture::new(0, vec![4], 2).validate(), Err(NnError::Architecture(_))));
        assert!(matches!(Architecture::new(4, vec![4, 0], 2).validate(), Err(NnError::Architecture(_))));
        assert!(matches!(Architecture::new(4, vec![4], 1).validate(), Err(NnError::Architecture(_))));
    }
}
