use rand::prelude::*;

use super::{Individual, PopulationUpdate, SearchContext};
use crate::variation::operators::{default_indpb, MUTATION_ETA, SBX_ETA};
use crate::variation::{polynomial_mutation, sbx_crossover, DecisionVector};

/// Floor applied to zero weights in the Tchebycheff scalarisation.
const WEIGHT_FLOOR: f64 = 1e-6;

/// MOEA/D with Tchebycheff decomposition. Subproblem `i` owns
/// `population[i]` and shares offspring with its `T` nearest weights.
#[derive(Debug, Default)]
pub struct Moead {
    population: Vec<Individual>,
    weights: Vec<Vec<f64>>,
    neighbours: Vec<Vec<usize>>,
    ideal: Vec<f64>,
}

impl Moead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        if self.population.is_empty() {
            let n = ctx.population_size();
            self.weights = weight_vectors(n, ctx.objective_count);
            self.neighbours = neighbourhoods(&self.weights, neighbourhood_size(n));
            self.ideal = vec![f64::INFINITY; ctx.objective_count];
            return (0..self.weights.len()).map(|_| ctx.bounds.uniform(&mut ctx.rng)).collect();
        }

        let indpb = default_indpb(ctx.bounds.dimension());
        let mut children = Vec::with_capacity(self.population.len());
        for i in 0..self.population.len() {
            let hood = &self.neighbours[i];
            let picked: Vec<usize> = hood.choose_multiple(&mut ctx.rng, 2).copied().collect();
            let a = &self.population[picked[0]].vector;
            let b = &self.population[*picked.get(1).unwrap_or(&i)].vector;
            let (c1, c2) = sbx_crossover(a, b, &ctx.bounds, SBX_ETA, &mut ctx.rng);
            let mut child = if ctx.rng.gen_bool(0.5) { c1 } else { c2 };
            polynomial_mutation(&mut child, &ctx.bounds, MUTATION_ETA, indpb, &mut ctx.rng);
            children.push(child);
        }
        children
    }

    pub fn tell(&mut self, _ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        let update = PopulationUpdate::feasible_of(&batch, !self.population.is_empty());
        for ind in &batch {
            self.observe(ind);
        }
        if self.population.is_empty() {
            self.population = batch;
            return update;
        }

        for (i, child) in batch.into_iter().enumerate() {
            for &j in &self.neighbours[i] {
                if self.improves(&child, j) {
                    self.population[j] = child.clone();
                }
            }
        }
        update
    }

    fn observe(&mut self, ind: &Individual) {
        if !ind.is_feasible() {
            return;
        }
        for (z, f) in self.ideal.iter_mut().zip(&ind.objectives) {
            if f.is_finite() {
                *z = z.min(*f);
            }
        }
    }

    /// Lower violation first, then a strictly smaller Tchebycheff value.
    fn improves(&self, child: &Individual, j: usize) -> bool {
        let incumbent = &self.population[j];
        match child.violation.total_cmp(&incumbent.violation) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => {
                let w = &self.weights[j];
                tchebycheff(&child.objectives, w, &self.ideal) < tchebycheff(&incumbent.objectives, w, &self.ideal)
            }
        }
    }
}

pub fn tchebycheff(objectives: &[f64], weight: &[f64], ideal: &[f64]) -> f64 {
    objectives
        .iter()
        .zip(weight)
        .zip(ideal)
        .map(|((f, w), z)| {
            let z = if z.is_finite() { *z } else { 0.0 };
            w.max(WEIGHT_FLOOR) * (f - z).abs()
        })
        .fold(0.0, f64::max)
}

pub fn neighbourhood_size(n: usize) -> usize {
    (n / 5).clamp(2, 10)
}

/// `n` weight vectors on the unit simplex: an even split for two
/// objectives, a Das-Dennis lattice truncated to `n` beyond that.
pub fn weight_vectors(n: usize, m: usize) -> Vec<Vec<f64>> {
    match (n, m) {
        (_, 0) => vec![Vec::new(); n],
        (_, 1) => vec![vec![1.0]; n],
        (1, _) => vec![vec![1.0 / m as f64; m]],
        (_, 2) => (0..n)
            .map(|i| {
                let f = i as f64 / (n - 1) as f64;
                vec![f, 1.0 - f]
            })
            .collect(),
        _ => {
            let mut h = 1;
            while binomial(h + m - 1, m - 1) < n {
                h += 1;
            }
            let mut out = Vec::new();
            let mut current = Vec::with_capacity(m);
            das_dennis(h, m, h, &mut current, &mut out);
            out.truncate(n);
            out
        }
    }
}

fn das_dennis(h: usize, m: usize, left: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<f64>>) {
    if current.len() == m - 1 {
        current.push(left);
        out.push(current.iter().map(|&c| c as f64 / h as f64).collect());
        current.pop();
        return;
    }
    for k in 0..=left {
        current.push(k);
        das_dennis(h, m, left - k, current, out);
        current.pop();
    }
}

fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n - k);
    (0..k).fold(1usize, |acc, i| acc * (n - i) / (i + 1))
}

/// The `t` nearest weights (Euclidean) of each weight, itself included.
pub fn neighbourhoods(weights: &[Vec<f64>], t: usize) -> Vec<Vec<usize>> {
    let t = t.min(weights.len());
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let mut order: Vec<(f64, usize)> = weights
                .iter()
                .enumerate()
                .map(|(j, v)| {
                    let d: f64 = w.iter().zip(v).map(|(a, b)| (a - b).powi(2)).sum();
                    (d, j)
                })
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let mut hood: Vec<usize> = order.into_iter().take(t).map(|(_, j)| j).collect();
            if !hood.contains(&i) {
                hood.push(i);
            }
            hood
        })
        .collect()
}
