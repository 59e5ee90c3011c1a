use super::{Individual, PopulationUpdate, SearchContext};
use crate::variation::DecisionVector;

/// Uniform sampling baseline; one population-sized batch per generation.
#[derive(Debug, Default)]
pub struct RandomSearch;

impl RandomSearch {
    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        (0..ctx.population_size())
            .map(|_| ctx.bounds.uniform(&mut ctx.rng))
            .collect()
    }

    pub fn tell(&mut self, _ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        PopulationUpdate::feasible_of(&batch, true)
    }
}
