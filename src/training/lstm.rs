//! ==============================================================================
//! lstm.rs - stacked lstm regressor
//! ==============================================================================
//!
//! architecture (defaults):
//!
//! ```text
//!     window [steps x 5]
//!         │
//!         ▼
//!     LSTM(64, full sequence) ──▶ Dropout(0.2)
//!         │
//!         ▼
//!     LSTM(32, last step)     ──▶ Dropout(0.2)
//!         │
//!         ▼
//!     Dense(5)                ──▶ next row (scaled)
//! ```
//!
//! gate layout in every weight block is [input, forget, cell, output].
//! gradients are computed by backprop through time over the whole window.
//!
//! ==============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// glorot-uniform initialisation
fn glorot(rng: &mut StdRng, fan_in: usize, fan_out: usize, len: usize) -> Vec<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    (0..len).map(|_| rng.random_range(-limit..limit)).collect()
}

// ==============================================================================
// lstm layer
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmWeights {
    /// (4 * hidden) x input
    pub w: Vec<f64>,
    /// (4 * hidden) x hidden
    pub u: Vec<f64>,
    /// 4 * hidden
    pub b: Vec<f64>,
}

impl LstmWeights {
    fn zeros_like(other: &Self) -> Self {
        Self {
            w: vec![0.0; other.w.len()],
            u: vec![0.0; other.u.len()],
            b: vec![0.0; other.b.len()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    pub input_size: usize,
    pub hidden_size: usize,
    pub weights: LstmWeights,
}

/// activations kept from the forward pass for one timestep
struct StepCache {
    x: Vec<f64>,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    i: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    o: Vec<f64>,
    tanh_c: Vec<f64>,
}

impl LstmLayer {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let gates = 4 * hidden_size;
        let mut b = vec![0.0; gates];
        // forget gate starts open
        b[hidden_size..2 * hidden_size].fill(1.0);
        Self {
            input_size,
            hidden_size,
            weights: LstmWeights {
                w: glorot(rng, input_size, gates, gates * input_size),
                u: glorot(rng, hidden_size, gates, gates * hidden_size),
                b,
            },
        }
    }

    /// Runs the whole sequence from zero state; returns every hidden state.
    fn forward(&self, inputs: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<StepCache>) {
        let hs = self.hidden_size;
        let is = self.input_size;
        let LstmWeights { w, u, b } = &self.weights;

        let mut h = vec![0.0; hs];
        let mut c = vec![0.0; hs];
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut caches = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z: Vec<f64> = (0..4 * hs)
                .map(|r| b[r] + dot(&w[r * is..(r + 1) * is], x) + dot(&u[r * hs..(r + 1) * hs], &h))
                .collect();

            let i: Vec<f64> = z[..hs].iter().map(|&v| sigmoid(v)).collect();
            let f: Vec<f64> = z[hs..2 * hs].iter().map(|&v| sigmoid(v)).collect();
            let g: Vec<f64> = z[2 * hs..3 * hs].iter().map(|&v| v.tanh()).collect();
            let o: Vec<f64> = z[3 * hs..].iter().map(|&v| sigmoid(v)).collect();

            let c_new: Vec<f64> = (0..hs).map(|k| f[k] * c[k] + i[k] * g[k]).collect();
            let tanh_c: Vec<f64> = c_new.iter().map(|v| v.tanh()).collect();
            let h_new: Vec<f64> = (0..hs).map(|k| o[k] * tanh_c[k]).collect();

            caches.push(StepCache {
                x: x.clone(),
                h_prev: std::mem::replace(&mut h, h_new),
                c_prev: std::mem::replace(&mut c, c_new),
                i,
                f,
                g,
                o,
                tanh_c,
            });
            outputs.push(h.clone());
        }

        (outputs, caches)
    }

    /// Backprop through time. `d_outputs[t]` is dL/dh_t from above.
    /// Accumulates into `grads` and returns dL/dx_t for every step.
    fn backward(
        &self,
        caches: &[StepCache],
        d_outputs: &[Vec<f64>],
        grads: &mut LstmWeights,
    ) -> Vec<Vec<f64>> {
        let hs = self.hidden_size;
        let is = self.input_size;
        let LstmWeights { w, u, .. } = &self.weights;

        let mut dh_next = vec![0.0; hs];
        let mut dc_next = vec![0.0; hs];
        let mut dz = vec![0.0; 4 * hs];
        let mut d_inputs = vec![vec![0.0; is]; caches.len()];

        for t in (0..caches.len()).rev() {
            let s = &caches[t];
            for k in 0..hs {
                let dh = d_outputs[t][k] + dh_next[k];
                let dc = dh * s.o[k] * (1.0 - s.tanh_c[k] * s.tanh_c[k]) + dc_next[k];

                dz[k] = dc * s.g[k] * s.i[k] * (1.0 - s.i[k]);
                dz[hs + k] = dc * s.c_prev[k] * s.f[k] * (1.0 - s.f[k]);
                dz[2 * hs + k] = dc * s.i[k] * (1.0 - s.g[k] * s.g[k]);
                dz[3 * hs + k] = dh * s.tanh_c[k] * s.o[k] * (1.0 - s.o[k]);

                dc_next[k] = dc * s.f[k];
            }

            dh_next.fill(0.0);
            let dx = &mut d_inputs[t];
            for (r, &d) in dz.iter().enumerate() {
                grads.b[r] += d;
                let w_row = r * is;
                for j in 0..is {
                    grads.w[w_row + j] += d * s.x[j];
                    dx[j] += d * w[w_row + j];
                }
                let u_row = r * hs;
                for j in 0..hs {
                    grads.u[u_row + j] += d * s.h_prev[j];
                    dh_next[j] += d * u[u_row + j];
                }
            }
        }

        d_inputs
    }
}

// ==============================================================================
// dense output
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    /// output x input
    pub w: Vec<f64>,
    pub b: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub input_size: usize,
    pub output_size: usize,
    pub weights: DenseWeights,
}

impl Dense {
    pub fn new(input_size: usize, output_size: usize, rng: &mut StdRng) -> Self {
        Self {
            input_size,
            output_size,
            weights: DenseWeights {
                w: glorot(rng, input_size, output_size, input_size * output_size),
                b: vec![0.0; output_size],
            },
        }
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        let n = self.input_size;
        (0..self.output_size)
            .map(|r| self.weights.b[r] + dot(&self.weights.w[r * n..(r + 1) * n], x))
            .collect()
    }

    fn backward(&self, x: &[f64], dy: &[f64], grads: &mut DenseWeights) -> Vec<f64> {
        let n = self.input_size;
        let mut dx = vec![0.0; n];
        for (r, &d) in dy.iter().enumerate() {
            grads.b[r] += d;
            for j in 0..n {
                grads.w[r * n + j] += d * x[j];
                dx[j] += d * self.weights.w[r * n + j];
            }
        }
        dx
    }
}

// ==============================================================================
// stacked model
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    /// one entry per stacked lstm layer, bottom first
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
    pub dropout: f64,
}

impl ModelConfig {
    pub fn new(features: usize) -> Self {
        Self {
            input_size: features,
            hidden_sizes: vec![64, 32],
            output_size: features,
            dropout: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceModel {
    pub config: ModelConfig,
    pub layers: Vec<LstmLayer>,
    pub head: Dense,
}

/// gradient buffers shaped like a [`SequenceModel`]
pub struct Gradients {
    layers: Vec<LstmWeights>,
    head: DenseWeights,
}

/// Everything the backward pass needs from one forward pass.
struct Trace {
    caches: Vec<Vec<StepCache>>,
    /// dropout scale per layer and step; the top layer has a single step
    masks: Vec<Vec<Vec<f64>>>,
    features: Vec<f64>,
    output: Vec<f64>,
}

impl SequenceModel {
    pub fn new(config: ModelConfig, rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut input = config.input_size;
        for &hidden in &config.hidden_sizes {
            layers.push(LstmLayer::new(input, hidden, rng));
            input = hidden;
        }
        let head = Dense::new(input, config.output_size, rng);
        Self {
            config,
            layers,
            head,
        }
    }

    pub fn zero_gradients(&self) -> Gradients {
        Gradients {
            layers: self
                .layers
                .iter()
                .map(|l| LstmWeights::zeros_like(&l.weights))
                .collect(),
            head: DenseWeights {
                w: vec![0.0; self.head.weights.w.len()],
                b: vec![0.0; self.head.weights.b.len()],
            },
        }
    }

    /// Inference: dropout disabled.
    pub fn predict(&self, window: &[Vec<f64>]) -> Vec<f64> {
        self.trace(window, None).output
    }

    fn dropout_mask(&self, len: usize, rng: &mut Option<&mut StdRng>) -> Vec<f64> {
        let p = self.config.dropout;
        match rng {
            Some(rng) if p > 0.0 => (0..len)
                .map(|_| if rng.random::<f64>() < p { 0.0 } else { 1.0 / (1.0 - p) })
                .collect(),
            _ => vec![1.0; len],
        }
    }

    fn trace(&self, window: &[Vec<f64>], mut dropout_rng: Option<&mut StdRng>) -> Trace {
        let mut seq: Vec<Vec<f64>> = window.to_vec();
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(self.layers.len());
        let top = self.layers.len().saturating_sub(1);

        for (li, layer) in self.layers.iter().enumerate() {
            let (outputs, layer_caches) = layer.forward(&seq);
            caches.push(layer_caches);

            let kept: Vec<Vec<f64>> = if li == top {
                outputs.last().cloned().into_iter().collect()
            } else {
                outputs
            };
            let layer_masks: Vec<Vec<f64>> = kept
                .iter()
                .map(|h| self.dropout_mask(h.len(), &mut dropout_rng))
                .collect();
            seq = kept
                .iter()
                .zip(&layer_masks)
                .map(|(h, m)| h.iter().zip(m).map(|(a, b)| a * b).collect())
                .collect();
            masks.push(layer_masks);
        }

        let features = seq.pop().unwrap_or_else(|| vec![0.0; self.head.input_size]);
        let output = self.head.forward(&features);
        Trace {
            caches,
            masks,
            features,
            output,
        }
    }

    fn backward(&self, trace: &Trace, d_output: &[f64], grads: &mut Gradients) {
        let d_features = self.head.backward(&trace.features, d_output, &mut grads.head);

        let top = self.layers.len().saturating_sub(1);
        // gradient w.r.t. the (post-dropout) outputs of the current layer
        let mut d_seq: Vec<Vec<f64>> = vec![d_features];

        for li in (0..self.layers.len()).rev() {
            let caches = &trace.caches[li];
            let masks = &trace.masks[li];
            let steps = caches.len();
            let hidden = self.layers[li].hidden_size;

            let d_outputs: Vec<Vec<f64>> = if li == top {
                let mut d = vec![vec![0.0; hidden]; steps];
                if let (Some(last), Some(upstream)) = (d.last_mut(), d_seq.first()) {
                    for k in 0..hidden {
                        last[k] = upstream[k] * masks[0][k];
                    }
                }
                d
            } else {
                d_seq
                    .iter()
                    .zip(masks)
                    .map(|(d, m)| d.iter().zip(m).map(|(a, b)| a * b).collect())
                    .collect()
            };

            d_seq = self.layers[li].backward(caches, &d_outputs, &mut grads.layers[li]);
        }
    }

    /// Forward + backward for one sample. Returns the squared error sum;
    /// gradients are scaled by `scale` (for a mean over a batch).
    pub fn accumulate(
        &self,
        sample_input: &[Vec<f64>],
        target: &[f64],
        scale: f64,
        grads: &mut Gradients,
        dropout_rng: Option<&mut StdRng>,
    ) -> f64 {
        let trace = self.trace(sample_input, dropout_rng);
        let diff: Vec<f64> = trace.output.iter().zip(target).map(|(y, t)| y - t).collect();
        let d_output: Vec<f64> = diff.iter().map(|d| 2.0 * d * scale).collect();
        self.backward(&trace, &d_output, grads);
        diff.iter().map(|d| d * d).sum()
    }

    /// Parameter tensors in a fixed order, paired with [`Gradients::tensors`].
    pub fn tensors_mut(&mut self) -> Vec<&mut Vec<f64>> {
        let mut out = Vec::new();
        for layer in &mut self.layers {
            let LstmWeights { w, u, b } = &mut layer.weights;
            out.extend([w, u, b]);
        }
        out.push(&mut self.head.weights.w);
        out.push(&mut self.head.weights.b);
        out
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl Gradients {
    pub fn tensors(&self) -> Vec<&Vec<f64>> {
        let mut out = Vec::new();
        for layer in &self.layers {
            out.extend([&layer.w, &layer.u, &layer.b]);
        }
        out.push(&self.head.w);
        out.push(&self.head.b);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tiny_model(seed: u64) -> SequenceModel {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = ModelConfig {
            input_size: 3,
            hidden_sizes: vec![4, 3],
            output_size: 2,
            dropout: 0.0,
        };
        SequenceModel::new(config, &mut rng)
    }

    fn window(seed: u64, steps: usize, width: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..steps)
            .map(|_| (0..width).map(|_| rng.random_range(0.0..1.0)).collect())
            .collect()
    }

    fn loss(model: &SequenceModel, input: &[Vec<f64>], target: &[f64]) -> f64 {
        model
            .predict(input)
            .iter()
            .zip(target)
            .map(|(y, t)| (y - t) * (y - t))
            .sum()
    }

    #[test]
    fn shapes_follow_config() {
        let model = tiny_model(1);
        assert_eq!(model.layers.len(), 2);
        assert_eq!(model.layers[0].weights.w.len(), 4 * 4 * 3);
        assert_eq!(model.layers[1].weights.u.len(), 4 * 3 * 3);
        assert_eq!(model.head.weights.w.len(), 2 * 3);
        assert_eq!(model.predict(&window(2, 5, 3)).len(), 2);
    }

    #[test]
    fn forget_bias_starts_at_one() {
        let model = tiny_model(3);
        let b = &model.layers[0].weights.b;
        assert!(b[..4].iter().all(|&v| v == 0.0));
        assert!(b[4..8].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn gradients_match_finite_differences() {
        let model = tiny_model(7);
        let input = window(8, 4, 3);
        let target = vec![0.3, -0.2];

        let mut grads = model.zero_gradients();
        model.accumulate(&input, &target, 1.0, &mut grads, None);
        let analytic: Vec<Vec<f64>> = grads.tensors().into_iter().cloned().collect();

        let eps = 1e-6;
        for (ti, tensor) in analytic.iter().enumerate() {
            for idx in [0, tensor.len() / 2, tensor.len() - 1] {
                let mut plus = model.clone();
                plus.tensors_mut()[ti][idx] += eps;
                let mut minus = model.clone();
                minus.tensors_mut()[ti][idx] -= eps;

                let numeric =
                    (loss(&plus, &input, &target) - loss(&minus, &input, &target)) / (2.0 * eps);
                let diff = (numeric - tensor[idx]).abs();
                assert!(
                    diff < 1e-6 + 1e-4 * numeric.abs(),
                    "tensor {ti} index {idx}: numeric {numeric} analytic {}",
                    tensor[idx]
                );
            }
        }
    }

    #[test]
    fn dropout_only_applies_with_rng() {
        let mut model = tiny_model(11);
        model.config.dropout = 0.5;
        let input = window(12, 6, 3);

        assert_eq!(model.predict(&input), model.predict(&input));

        let mut rng = StdRng::seed_from_u64(13);
        let trace = model.trace(&input, Some(&mut rng));
        let scales: Vec<f64> = trace.masks.iter().flatten().flatten().copied().collect();
        assert!(scales.iter().all(|&s| s == 0.0 || s == 2.0));
        assert!(scales.contains(&0.0));
    }

    #[test]
    fn save_and_load() {
        let model = tiny_model(21);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        model.save(&path).unwrap();
        let loaded = SequenceModel::load(&path).unwrap();

        let input = window(22, 3, 3);
        assert_eq!(loaded.config, model.config);
        let (a, b) = (model.predict(&input), loaded.predict(&input));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
