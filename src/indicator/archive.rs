//! Pareto archive of feasible, mutually non-dominated individuals.

use super::{dominates, hypervolume};
use crate::error::IndicatorComputationError;
use crate::search::Individual;

/// Offset added to the worst archived objective values when the reference
/// point is fixed.
pub const REFERENCE_PADDING: f64 = 1.0;

/// The reference point is fixed once, from the first non-empty archive, so
/// the archived hypervolume never decreases.
#[derive(Clone, Debug, Default)]
pub struct Archive {
    members: Vec<Individual>,
    reference: Option<Vec<f64>>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `ind` if it is feasible and nothing archived dominates or
    /// equals it; members it dominates are dropped.
    pub fn offer(&mut self, ind: &Individual) -> bool {
        if !ind.is_feasible() || ind.objectives.iter().any(|o| !o.is_finite()) {
            return false;
        }
        if self
            .members
            .iter()
            .any(|m| m.objectives == ind.objectives || dominates(&m.objectives, &ind.objectives))
        {
            return false;
        }
        self.members
            .retain(|m| !dominates(&ind.objectives, &m.objectives));
        self.members.push(ind.clone());
        true
    }

    /// Fix the reference point from the current members, if not yet fixed.
    pub fn fix_reference(&mut self) {
        if self.reference.is_some() || self.members.is_empty() {
            return;
        }
        let dim = self.members[0].objectives.len();
        let worst = (0..dim)
            .map(|k| {
                self.members
                    .iter()
                    .map(|m| m.objectives[k])
                    .fold(f64::NEG_INFINITY, f64::max)
                    + REFERENCE_PADDING
            })
            .collect();
        self.reference = Some(worst);
    }

    pub fn reference(&self) -> Option<&[f64]> {
        self.reference.as_deref()
    }

    pub fn hypervolume(&self) -> Result<f64, IndicatorComputationError> {
        let reference = self
            .reference
            .as_ref()
            .ok_or(IndicatorComputationError::EmptyFront)?;
        hypervolume(&self.front(), reference)
    }

    pub fn front(&self) -> Vec<Vec<f64>> {
        self.members.iter().map(|m| m.objectives.clone()).collect()
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member with the lowest value of objective `k`; ties go to the
    /// lexicographically smaller objective vector.
    pub fn best(&self, k: usize) -> Option<&Individual> {
        self.members.iter().min_by(|a, b| {
            a.objectives[k].total_cmp(&b.objectives[k]).then_with(|| {
                a.objectives
                    .iter()
                    .zip(&b.objectives)
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        })
    }
}
