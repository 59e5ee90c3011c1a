//! Constrained dominance, non-dominated sorting and crowding.

use std::cmp::Ordering;

use rand::prelude::*;

use super::Individual;
use crate::indicator::dominates;

/// Deb's constrained dominance: feasible beats infeasible, lower violation
/// wins among infeasible individuals (`+∞` last), Pareto dominance among
/// feasible ones.
pub fn constrained_dominates(a: &Individual, b: &Individual) -> bool {
    match (a.is_feasible(), b.is_feasible()) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => a.violation.total_cmp(&b.violation) == Ordering::Less,
        (true, true) => dominates(&a.objectives, &b.objectives),
    }
}

/// `Less` when `a` constrained-dominates `b`, `Greater` for the converse,
/// `Equal` when neither does.
pub fn constrained_cmp(a: &Individual, b: &Individual) -> Ordering {
    if constrained_dominates(a, b) {
        Ordering::Less
    } else if constrained_dominates(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Lower rank first, then larger crowding distance.
pub fn crowded_cmp(a: &Individual, b: &Individual) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| b.crowding.total_cmp(&a.crowding))
}

/// Rank `population` into fronts under constrained dominance. Sets
/// `rank` on every individual and returns the fronts as index lists.
pub fn fast_non_dominated_sort(population: &mut [Individual]) -> Vec<Vec<usize>> {
    let n = population.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut counts = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![Vec::new()];

    for p in 0..n {
        for q in (p + 1)..n {
            if constrained_dominates(&population[p], &population[q]) {
                dominated_by[p].push(q);
                counts[q] += 1;
            } else if constrained_dominates(&population[q], &population[p]) {
                dominated_by[q].push(p);
                counts[p] += 1;
            }
        }
    }
    for p in 0..n {
        if counts[p] == 0 {
            population[p].rank = 0;
            fronts[0].push(p);
        }
    }

    let mut i = 0;
    while !fronts[i].is_empty() {
        let mut next = Vec::new();
        for &p in &fronts[i] {
            for &q in &dominated_by[p] {
                counts[q] -= 1;
                if counts[q] == 0 {
                    population[q].rank = i + 1;
                    next.push(q);
                }
            }
        }
        i += 1;
        fronts.push(next);
    }
    fronts.pop();
    fronts
}

/// Crowding distance within one front. Boundary points get `+∞`;
/// objectives with no finite spread add nothing.
pub fn crowding_distance(population: &mut [Individual], front: &[usize]) {
    for &i in front {
        population[i].crowding = 0.0;
    }
    if front.len() <= 2 {
        for &i in front {
            population[i].crowding = f64::INFINITY;
        }
        return;
    }
    let m = population[front[0]].objectives.len();
    let mut order = front.to_vec();
    for k in 0..m {
        order.sort_by(|&a, &b| population[a].objectives[k].total_cmp(&population[b].objectives[k]));
        let first = order[0];
        let last = order[order.len() - 1];
        population[first].crowding = f64::INFINITY;
        population[last].crowding = f64::INFINITY;
        let span = population[last].objectives[k] - population[first].objectives[k];
        if !span.is_finite() || span <= 0.0 {
            continue;
        }
        for w in 1..order.len() - 1 {
            let gap = population[order[w + 1]].objectives[k] - population[order[w - 1]].objectives[k];
            if gap.is_finite() {
                population[order[w]].crowding += gap / span;
            }
        }
    }
}

/// Rank and crowd the whole population.
pub fn assign_rank_and_crowding(population: &mut [Individual]) -> Vec<Vec<usize>> {
    let fronts = fast_non_dominated_sort(population);
    for front in &fronts {
        crowding_distance(population, front);
    }
    fronts
}

/// Binary tournament under the crowded comparison; returns an index.
pub fn tournament(population: &[Individual], rng: &mut dyn RngCore) -> usize {
    let a = rng.gen_range(0..population.len());
    let b = rng.gen_range(0..population.len());
    match crowded_cmp(&population[a], &population[b]) {
        Ordering::Greater => b,
        _ => a,
    }
}
