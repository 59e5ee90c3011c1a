//! Exact Gaussian-process regression with an RBF kernel.
//!
//! Inputs live in the unit cube, outputs are standardised, and the length
//! scale is the median pairwise input distance. No hyper-parameter fitting.

use ndarray::{Array1, Array2, ArrayView1};

const NUGGET: f64 = 1e-6;
const MAX_JITTER: f64 = 1e-1;
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct GaussianProcess {
    inputs: Array2<f64>,
    targets: Vec<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
    chol: Array2<f64>,
    alpha: Array1<f64>,
}

impl GaussianProcess {
    /// `None` when there is no data or the kernel matrix stays singular
    /// under every jitter level.
    pub fn fit(inputs: &[Vec<f64>], targets: &[f64]) -> Option<Self> {
        let n = inputs.len();
        if n == 0 || n != targets.len() {
            return None;
        }
        let dim = inputs[0].len();
        let x = Array2::from_shape_fn((n, dim), |(i, j)| inputs[i][j]);

        let y_mean = targets.iter().sum::<f64>() / n as f64;
        let var = targets.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if var.sqrt() > 1e-8 { var.sqrt() } else { 1.0 };
        let y = Array1::from_iter(targets.iter().map(|t| (t - y_mean) / y_std));

        let length_scale = median_distance(&x).unwrap_or(0.5).max(1e-3);
        let kernel = Array2::from_shape_fn((n, n), |(i, j)| rbf(x.row(i), x.row(j), length_scale));

        let mut jitter = NUGGET;
        let chol = loop {
            let mut k = kernel.clone();
            for i in 0..n {
                k[[i, i]] += jitter;
            }
            if let Some(l) = cholesky(&k) {
                break l;
            }
            jitter *= 10.0;
            if jitter > MAX_JITTER {
                return None;
            }
        };
        let alpha = back_substitute(&chol, &forward_substitute(&chol, &y));

        Some(Self {
            inputs: x,
            targets: targets.to_vec(),
            length_scale,
            y_mean,
            y_std,
            chol,
            alpha,
        })
    }

    /// Refit with one more observation (used for fantasy points).
    pub fn with_observation(&self, input: &[f64], target: f64) -> Option<Self> {
        let mut inputs: Vec<Vec<f64>> = self.inputs.rows().into_iter().map(|r| r.to_vec()).collect();
        inputs.push(input.to_vec());
        let mut targets = self.targets.clone();
        targets.push(target);
        Self::fit(&inputs, &targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Posterior mean and standard deviation in the original output scale.
    pub fn predict(&self, input: &[f64]) -> (f64, f64) {
        let point = ArrayView1::from(input);
        let k_star = Array1::from_iter(self.inputs.rows().into_iter().map(|r| rbf(r, point, self.length_scale)));
        let mean = k_star.dot(&self.alpha);
        let v = forward_substitute(&self.chol, &k_star);
        let variance = (1.0 - v.dot(&v)).max(VARIANCE_FLOOR);
        (self.y_mean + self.y_std * mean, self.y_std * variance.sqrt())
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, length_scale: f64) -> f64 {
    let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-d2 / (2.0 * length_scale * length_scale)).exp()
}

fn median_distance(x: &Array2<f64>) -> Option<f64> {
    let n = x.nrows();
    let mut distances = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = x
                .row(i)
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            if d > 0.0 {
                distances.push(d);
            }
        }
    }
    if distances.is_empty() {
        return None;
    }
    distances.sort_by(f64::total_cmp);
    Some(distances[distances.len() / 2])
}

/// Lower-triangular `L` with `L·Lᵀ = a`; `None` if `a` is not positive
/// definite.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L·x = b`.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `Lᵀ·x = b`.
fn back_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}
