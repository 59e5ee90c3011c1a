//! Early stopping on a flat hypervolume curve.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 15;
pub const DEFAULT_EPSILON: f64 = 1e-4;

/// Watches the median hypervolume over a sliding window. The run has
/// plateaued when the median has not improved by more than `epsilon`
/// (relative to the best median so far) for `window` generations.
#[derive(Clone, Debug)]
pub struct PlateauDetector {
    window: usize,
    epsilon: f64,
    history: VecDeque<f64>,
    best_median: Option<f64>,
    last_improvement: usize,
    stopped: bool,
}

impl Default for PlateauDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_EPSILON)
    }
}

impl PlateauDetector {
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self {
            window: window.max(1),
            epsilon: epsilon.max(0.0),
            history: VecDeque::with_capacity(window.max(1)),
            best_median: None,
            last_improvement: 0,
            stopped: false,
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Record the hypervolume of `generation`; returns true once the run
    /// should stop. Non-finite values are skipped.
    pub fn update(&mut self, hypervolume: f64, generation: usize) -> bool {
        if self.stopped {
            return true;
        }
        if !hypervolume.is_finite() {
            return false;
        }
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(hypervolume);

        let best = match self.best_median {
            Some(best) => best,
            None => {
                self.best_median = Some(hypervolume);
                self.last_improvement = generation;
                return false;
            }
        };
        if self.history.len() < self.window {
            return false;
        }

        let current = median(&self.history);
        if current - best > self.epsilon * best.abs() && current > best {
            self.best_median = Some(current);
            self.last_improvement = generation;
            return false;
        }
        if generation.saturating_sub(self.last_improvement) >= self.window {
            self.stopped = true;
        }
        self.stopped
    }
}

fn median(values: &VecDeque<f64>) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}
