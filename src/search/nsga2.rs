use rand::prelude::*;

use super::dominance::{assign_rank_and_crowding, tournament};
use super::{Individual, PopulationUpdate, SearchContext};
use crate::variation::operators::{default_indpb, MUTATION_ETA, SBX_ETA};
use crate::variation::{polynomial_mutation, sbx_crossover, DecisionVector};

pub const CROSSOVER_PROB: f64 = 0.9;

/// Elitist μ+λ NSGA-II under constrained dominance.
#[derive(Debug, Default)]
pub struct Nsga2 {
    population: Vec<Individual>,
}

impl Nsga2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        let n = ctx.population_size();
        if self.population.is_empty() {
            return (0..n).map(|_| ctx.bounds.uniform(&mut ctx.rng)).collect();
        }
        offspring(&self.population, n, ctx)
    }

    pub fn tell(&mut self, ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        let initial = self.population.is_empty();
        let update = PopulationUpdate::feasible_of(&batch, !initial);
        let mut merged = std::mem::take(&mut self.population);
        merged.extend(batch);
        self.population = select_survivors(merged, ctx.population_size());
        update
    }
}

/// `n` children by tournament, SBX and polynomial mutation.
pub(super) fn offspring(parents: &[Individual], n: usize, ctx: &mut SearchContext) -> Vec<DecisionVector> {
    let indpb = default_indpb(ctx.bounds.dimension());
    let mut children = Vec::with_capacity(n);
    while children.len() < n {
        let a = &parents[tournament(parents, &mut ctx.rng)].vector;
        let b = &parents[tournament(parents, &mut ctx.rng)].vector;
        let (mut c1, mut c2) = if ctx.rng.gen_bool(CROSSOVER_PROB) {
            sbx_crossover(a, b, &ctx.bounds, SBX_ETA, &mut ctx.rng)
        } else {
            (a.clone(), b.clone())
        };
        polynomial_mutation(&mut c1, &ctx.bounds, MUTATION_ETA, indpb, &mut ctx.rng);
        polynomial_mutation(&mut c2, &ctx.bounds, MUTATION_ETA, indpb, &mut ctx.rng);
        children.push(c1);
        if children.len() < n {
            children.push(c2);
        }
    }
    children
}

/// Fill front by front; the last front that does not fit is truncated by
/// descending crowding distance.
pub(super) fn select_survivors(mut merged: Vec<Individual>, n: usize) -> Vec<Individual> {
    let fronts = assign_rank_and_crowding(&mut merged);
    let mut keep: Vec<usize> = Vec::with_capacity(n);
    for front in fronts {
        if keep.len() + front.len() <= n {
            keep.extend(front);
            continue;
        }
        let mut front = front;
        front.sort_by(|&a, &b| merged[b].crowding.total_cmp(&merged[a].crowding));
        front.truncate(n - keep.len());
        keep.extend(front);
        break;
    }
    keep.sort_unstable();

    let mut slots: Vec<Option<Individual>> = merged.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}
