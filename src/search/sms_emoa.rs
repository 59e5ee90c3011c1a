use rand::prelude::*;

use super::dominance::{assign_rank_and_crowding, tournament};
use super::{Individual, PopulationUpdate, SearchContext};
use crate::indicator::archive::REFERENCE_PADDING;
use crate::indicator::contributions;
use crate::variation::operators::{default_indpb, MUTATION_ETA, SBX_ETA};
use crate::variation::{polynomial_mutation, sbx_crossover, DecisionVector};

/// Steady-state SMS-EMOA: one child per cycle, then the member with the
/// smallest exclusive hypervolume contribution in the worst front leaves.
#[derive(Debug, Default)]
pub struct SmsEmoa {
    population: Vec<Individual>,
    worst: Option<Vec<f64>>,
    born_this_generation: usize,
}

impl SmsEmoa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        if self.population.is_empty() {
            let n = ctx.population_size();
            return (0..n).map(|_| ctx.bounds.uniform(&mut ctx.rng)).collect();
        }
        let a = &self.population[tournament(&self.population, &mut ctx.rng)].vector;
        let b = &self.population[tournament(&self.population, &mut ctx.rng)].vector;
        let (mut child, _) = sbx_crossover(a, b, &ctx.bounds, SBX_ETA, &mut ctx.rng);
        let indpb = default_indpb(ctx.bounds.dimension());
        polynomial_mutation(&mut child, &ctx.bounds, MUTATION_ETA, indpb, &mut ctx.rng);
        vec![child]
    }

    pub fn tell(&mut self, ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        let initial = self.population.is_empty();
        for ind in &batch {
            self.observe(ind);
        }
        let mut update = PopulationUpdate::feasible_of(&batch, false);
        self.population.extend(batch);
        while self.population.len() > ctx.population_size() {
            self.reduce();
        }
        assign_rank_and_crowding(&mut self.population);

        if !initial {
            self.born_this_generation += 1;
            if self.born_this_generation >= ctx.population_size() {
                self.born_this_generation = 0;
                update.advanced = true;
            }
        }
        update
    }

    fn observe(&mut self, ind: &Individual) {
        if !ind.is_feasible() || ind.objectives.iter().any(|o| !o.is_finite()) {
            return;
        }
        match &mut self.worst {
            Some(worst) => {
                for (w, o) in worst.iter_mut().zip(&ind.objectives) {
                    *w = w.max(*o);
                }
            }
            None => self.worst = Some(ind.objectives.clone()),
        }
    }

    fn reduce(&mut self) {
        let fronts = assign_rank_and_crowding(&mut self.population);
        let Some(last) = fronts.last() else {
            return;
        };
        let victim = if last.iter().any(|&i| !self.population[i].is_feasible()) {
            // infeasible front: worst violation leaves
            last.iter()
                .copied()
                .max_by(|&a, &b| self.population[a].violation.total_cmp(&self.population[b].violation))
        } else {
            self.least_contributor(last).or_else(|| self.least_crowded(last))
        };
        match victim {
            Some(i) => {
                self.population.remove(i);
            }
            None => {
                self.population.pop();
            }
        }
    }

    fn least_crowded(&self, front: &[usize]) -> Option<usize> {
        front
            .iter()
            .copied()
            .min_by(|&a, &b| self.population[a].crowding.total_cmp(&self.population[b].crowding))
    }

    fn least_contributor(&self, front: &[usize]) -> Option<usize> {
        let reference: Vec<f64> = self.worst.as_ref()?.iter().map(|w| w + REFERENCE_PADDING).collect();
        let points: Vec<Vec<f64>> = front.iter().map(|&i| self.population[i].objectives.clone()).collect();
        match contributions(&points, &reference) {
            Ok(contrib) => contrib
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| front[k]),
            Err(_) => self.least_crowded(front),
        }
    }
}
