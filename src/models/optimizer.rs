use ndarray::{Array1, Array2, Zip};

use crate::models::network::{DeviationNetwork, LayerGradients};

/// RMSprop with L2 weight decay.
///
/// Per parameter: `g += weight_decay * w`, `v = alpha * v + (1 - alpha) * g^2`,
/// `w -= lr * g / (sqrt(v) + eps)`.
#[derive(Debug, Clone)]
pub struct RmsProp {
    pub learning_rate: f64,
    pub alpha: f64,
    pub eps: f64,
    pub weight_decay: f64,
    square_avg: Vec<(Array2<f64>, Array1<f64>)>,
}

impl RmsProp {
    pub fn new(learning_rate: f64, weight_decay: f64) -> Self {
        Self {
            learning_rate,
            alpha: 0.99,
            eps: 1e-8,
            weight_decay,
            square_avg: Vec::new(),
        }
    }

    /// Apply one update to every layer of `network`.
    pub fn step(&mut self, network: &mut DeviationNetwork, grads: &[LayerGradients]) {
        if self.square_avg.len() != network.layers().len() {
            self.square_avg = network
                .layers()
                .iter()
                .map(|l| (Array2::zeros(l.weight.raw_dim()), Array1::zeros(l.bias.raw_dim())))
                .collect();
        }
        let (lr, alpha, eps, wd) = (self.learning_rate, self.alpha, self.eps, self.weight_decay);
        let update = move |w: &mut f64, v: &mut f64, &g: &f64| {
            let g = g + wd * *w;
            *v = alpha * *v + (1.0 - alpha) * g * g;
            *w -= lr * g / (v.sqrt() + eps);
        };
        for ((layer, (v_w, v_b)), grad) in network
            .layers_mut()
            .iter_mut()
            .zip(self.square_avg.iter_mut())
            .zip(grads)
        {
            Zip::from(&mut layer.weight)
                .and(v_w)
                .and(&grad.weight)
                .for_each(update);
            Zip::from(&mut layer.bias)
                .and(v_b)
                .and(&grad.bias)
                .for_each(update);
        }
    }
}
