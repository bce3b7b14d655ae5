//! Feed-forward deviation scoring network.
//!
//! The three depth variants share one representation: a stack of fully
//! connected layers, ReLU on every hidden layer and a linear unit on top.
//! Gradients are computed analytically so the training loop can run without
//! an autodiff engine.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::NetworkDepth;
use crate::models::base_model::Scorer;

/// Fully connected layer `y = x W + b`, with an optional ReLU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Shape `(fan_in, fan_out)`
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
    pub relu: bool,
}

impl DenseLayer {
    /// Weights and biases uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
    pub fn new(fan_in: usize, fan_out: usize, relu: bool, rng: &mut StdRng) -> Self {
        let bound = if fan_in > 0 {
            1.0 / (fan_in as f64).sqrt()
        } else {
            0.0
        };
        let dist = Uniform::new_inclusive(-bound, bound);
        let weight = Array2::from_shape_fn((fan_in, fan_out), |_| rng.sample(dist));
        let bias = Array1::from_shape_fn(fan_out, |_| rng.sample(dist));
        DenseLayer { weight, bias, relu }
    }

    pub fn fan_in(&self) -> usize {
        self.weight.nrows()
    }

    pub fn fan_out(&self) -> usize {
        self.weight.ncols()
    }

    pub fn forward(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut z = x.dot(&self.weight) + &self.bias;
        if self.relu {
            z.mapv_inplace(|v| v.max(0.0));
        }
        z
    }
}

/// Gradient of the loss with respect to one layer's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGradients {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Layer inputs and final output of one forward pass, kept for backprop.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// `activations[0]` is the input, `activations[i + 1]` the output of layer `i`.
    activations: Vec<Array2<f64>>,
}

impl ForwardPass {
    pub fn scores(&self) -> Array1<f64> {
        self.activations
            .last()
            .map(|out| out.column(0).to_owned())
            .unwrap_or_else(|| Array1::zeros(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationNetwork {
    depth: NetworkDepth,
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl DeviationNetwork {
    /// Build a freshly initialized network for `input_dim` features.
    pub fn new(input_dim: usize, depth: NetworkDepth, rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(depth.hidden_widths().len() + 1);
        let mut fan_in = input_dim;
        for &width in depth.hidden_widths() {
            layers.push(DenseLayer::new(fan_in, width, true, rng));
            fan_in = width;
        }
        layers.push(DenseLayer::new(fan_in, 1, false, rng));
        DeviationNetwork {
            depth,
            input_dim,
            layers,
        }
    }

    pub fn depth(&self) -> NetworkDepth {
        self.depth
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weight.len() + l.bias.len())
            .sum()
    }

    /// One line per layer, e.g. `Dense(21 -> 20, relu)`.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .layers
            .iter()
            .map(|l| {
                format!(
                    "Dense({} -> {}, {})",
                    l.fan_in(),
                    l.fan_out(),
                    if l.relu { "relu" } else { "linear" }
                )
            })
            .collect();
        lines.push(format!("Total params: {}", self.num_parameters()));
        lines.join("\n")
    }

    pub fn forward(&self, x: ArrayView2<f64>) -> ForwardPass {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut current = x.to_owned();
        for layer in &self.layers {
            let next = layer.forward(current.view());
            activations.push(current);
            current = next;
        }
        activations.push(current);
        ForwardPass { activations }
    }

    /// Gradients of the loss for every layer, given `d loss / d score` per row.
    pub fn backward(&self, pass: &ForwardPass, grad_scores: &Array1<f64>) -> Vec<LayerGradients> {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut upstream = grad_scores.clone().insert_axis(Axis(1));
        for (i, layer) in self.layers.iter().enumerate().rev() {
            if layer.relu {
                Zip::from(&mut upstream)
                    .and(&pass.activations[i + 1])
                    .for_each(|g, &a| {
                        if a <= 0.0 {
                            *g = 0.0;
                        }
                    });
            }
            let input = &pass.activations[i];
            grads.push(LayerGradients {
                weight: input.t().dot(&upstream),
                bias: upstream.sum_axis(Axis(0)),
            });
            if i > 0 {
                upstream = upstream.dot(&layer.weight.t());
            }
        }
        grads.reverse();
        grads
    }
}

impl Scorer for DeviationNetwork {
    fn score_block(&self, x: ArrayView2<f64>) -> Array1<f64> {
        self.forward(x).scores()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_architectures() {
        let shapes = |net: &DeviationNetwork| -> Vec<(usize, usize, bool)> {
            net.layers()
                .iter()
                .map(|l| (l.fan_in(), l.fan_out(), l.relu))
                .collect()
        };
        let deep = DeviationNetwork::new(21, NetworkDepth::Four, &mut rng());
        assert_eq!(
            shapes(&deep),
            vec![(21, 1000, true), (1000, 250, true), (250, 20, true), (20, 1, false)]
        );
        let shallow = DeviationNetwork::new(21, NetworkDepth::Two, &mut rng());
        assert_eq!(shapes(&shallow), vec![(21, 20, true), (20, 1, false)]);
        let linear = DeviationNetwork::new(21, NetworkDepth::One, &mut rng());
        assert_eq!(shapes(&linear), vec![(21, 1, false)]);
        assert_eq!(linear.num_parameters(), 22);
    }

    #[test]
    fn test_forward_is_pure() {
        let net = DeviationNetwork::new(3, NetworkDepth::Two, &mut rng());
        let x = array![[0.1, 0.2, 0.3], [1.0, -1.0, 0.5]];
        let a = net.score_block(x.view());
        let b = net.score_block(x.view());
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert!((net.score_row(&[1.0, -1.0, 0.5]) - a[1]).abs() < 1e-12);
    }

    #[test]
    fn test_linear_forward() {
        let mut net = DeviationNetwork::new(2, NetworkDepth::One, &mut rng());
        net.layers_mut()[0].weight = array![[2.0], [-1.0]];
        net.layers_mut()[0].bias = array![0.5];
        let scores = net.score_block(array![[1.0, 1.0], [0.0, 3.0]].view());
        assert_eq!(scores, array![1.5, -2.5]);
    }

    /// Backprop against central finite differences of `sum(w_i * score_i)`.
    #[test]
    fn test_backward_matches_finite_differences() {
        let net = DeviationNetwork::new(4, NetworkDepth::Two, &mut rng());
        let x = array![[0.3, -0.2, 0.9, 0.1], [-0.5, 0.4, 0.2, 0.7], [0.8, 0.8, -0.3, 0.0]];
        let upstream = array![1.0, -0.5, 2.0];
        let objective = |n: &DeviationNetwork| n.score_block(x.view()).dot(&upstream);

        let pass = net.forward(x.view());
        let grads = net.backward(&pass, &upstream);
        let eps = 1e-6;
        for (li, layer) in net.layers().iter().enumerate() {
            for ((r, c), _) in layer.weight.indexed_iter() {
                let mut plus = net.clone();
                plus.layers_mut()[li].weight[[r, c]] += eps;
                let mut minus = net.clone();
                minus.layers_mut()[li].weight[[r, c]] -= eps;
                let numeric = (objective(&plus) - objective(&minus)) / (2.0 * eps);
                assert!(
                    (numeric - grads[li].weight[[r, c]]).abs() < 1e-5,
                    "layer {} weight ({}, {})",
                    li,
                    r,
                    c
                );
            }
            for j in 0..layer.bias.len() {
                let mut plus = net.clone();
                plus.layers_mut()[li].bias[j] += eps;
                let mut minus = net.clone();
                minus.layers_mut()[li].bias[j] -= eps;
                let numeric = (objective(&plus) - objective(&minus)) / (2.0 * eps);
                assert!((numeric - grads[li].bias[j]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_sparse_scoring_matches_dense() {
        use crate::data::matrix::{CsrMatrix, FeatureMatrix};
        let net = DeviationNetwork::new(5, NetworkDepth::Two, &mut rng());
        let x = Array2::from_shape_fn((1100, 5), |(r, c)| if (r + c) % 4 == 0 { (r % 7) as f64 } else { 0.0 });
        let dense = net.score_matrix(&FeatureMatrix::Dense(x.clone()));
        let sparse = net.score_matrix(&FeatureMatrix::Sparse(CsrMatrix::from_dense(x.view())));
        assert_eq!(dense.len(), 1100);
        for (a, b) in dense.iter().zip(sparse.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
