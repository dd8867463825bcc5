use crate::math::matrix::Matrix;
use crate::network::gradients::Gradients;
use crate::network::network::Network;

/// First and second moment estimates for every parameter, plus the step
/// counter. Lives for one training run and is never exported.
#[derive(Debug, Clone)]
pub struct OptimizerState {
    pub first_moments: Gradients,
    pub second_moments: Gradients,
    pub step: u64,
}

/// Adaptive moment estimation.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    state: OptimizerState,
}

impl Adam {
    pub fn new(network: &Network, learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Adam {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            state: OptimizerState {
                first_moments: Gradients::zeros_like(network),
                second_moments: Gradients::zeros_like(network),
                step: 0,
            },
        }
    }

    /// Default decay constants: β1 = 0.9, β2 = 0.999, ε = 1e-8.
    pub fn with_defaults(network: &Network, learning_rate: f64) -> Adam {
        Adam::new(network, learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    /// Applies one update to every layer of `network` from `grads`.
    ///
    /// The step counter increments once per call and is never reset.
    pub fn step(&mut self, network: &mut Network, grads: &Gradients) {
        self.state.step += 1;
        let t = self.state.step as i32;
        let correction1 = 1.0 - self.beta1.powi(t);
        let correction2 = 1.0 - self.beta2.powi(t);
        // Folding the bias corrections into the step size is equivalent to
        // correcting each moment before the division.
        let step_size = self.learning_rate * correction2.sqrt() / correction1;
        let eps_hat = self.epsilon * correction2.sqrt();

        let state = &mut self.state;
        for (k, layer) in network.layers_mut().iter_mut().enumerate() {
            let w_step = moment_step(
                &mut state.first_moments.weights[k],
                &mut state.second_moments.weights[k],
                &grads.weights[k],
                self.beta1,
                self.beta2,
                step_size,
                eps_hat,
            );
            let b_step = moment_step(
                &mut state.first_moments.biases[k],
                &mut state.second_moments.biases[k],
                &grads.biases[k],
                self.beta1,
                self.beta2,
                step_size,
                eps_hat,
            );
            layer.apply_steps(&w_step, &b_step);
        }
    }
}

/// Updates one tensor's moments in place and returns the parameter step.
fn moment_step(
    m: &mut Matrix,
    v: &mut Matrix,
    grad: &Matrix,
    beta1: f64,
    beta2: f64,
    step_size: f64,
    eps_hat: f64,
) -> Matrix {
    assert_eq!(m.shape(), grad.shape(), "gradient shape does not match moment state");
    let mut step = Matrix::zeros(grad.rows, grad.cols);
    let iter = m
        .as_mut_slice()
        .iter_mut()
        .zip(v.as_mut_slice().iter_mut())
        .zip(grad.as_slice())
        .zip(step.as_mut_slice().iter_mut());
    for (((m_i, v_i), &g), s) in iter {
        *m_i = beta1 * *m_i + (1.0 - beta1) * g;
        *v_i = beta2 * *v_i + (1.0 - beta2) * g * g;
        *s = step_size * *m_i / (v_i.sqrt() + eps_hat);
    }
    step
}
