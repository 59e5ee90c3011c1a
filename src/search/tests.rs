use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dominance::*;
use super::epsilon::build_schedule;
use super::gp::GaussianProcess;
use super::moead::{neighbourhood_size, neighbourhoods, tchebycheff, weight_vectors};
use super::nsga2::select_survivors;
use super::qehvi::Surrogate;
use super::*;
use crate::fixtures::{camera_pipeline, CAMERA_PIPELINE};
use crate::indicator::dominates;
use crate::model::{parse_model, VariableKind};
use crate::oracle::Oracle;
use crate::variation::Bounds;
use crate::verifier::AnalyticVerifier;

fn ind(objectives: Vec<f64>, violation: f64) -> Individual {
    Individual::evaluated(vec![], objectives, violation)
}

fn tagged(tag: f64, objectives: Vec<f64>, violation: f64) -> Individual {
    Individual::evaluated(vec![tag], objectives, violation)
}

fn tags(population: &[Individual]) -> Vec<f64> {
    population.iter().map(|i| i.vector[0]).collect()
}

/// One duration variable on [0, 10].
fn line_context(objective_count: usize, search: SearchSettings) -> SearchContext {
    let bounds = Bounds::new(vec![0.0], vec![10.0], vec![VariableKind::Duration]);
    SearchContext::new(bounds, objective_count, search)
}

fn scenario_oracle() -> Oracle {
    Oracle::new(camera_pipeline(), Box::new(AnalyticVerifier::new()), 2).unwrap()
}

fn settings(algorithm: Algorithm) -> SearchSettings {
    SearchSettings {
        algorithm,
        population: 8,
        generations: 4,
        batch: 2,
        seed: 7,
        plateau_window: 0,
        epsilon_levels: 3,
        qehvi: QehviSettings {
            candidates: 16,
            mc_samples: 8,
            ref_slack: 1.0,
        },
        ..SearchSettings::default()
    }
}

// ─── Dominance ─────────────────────────────────────────────────────

#[test]
fn test_feasible_always_beats_infeasible() {
    let good = ind(vec![100.0, 100.0], 0.0);
    let bad = ind(vec![0.0, 0.0], 0.5);
    assert!(constrained_dominates(&good, &bad));
    assert!(!constrained_dominates(&bad, &good));
    assert_eq!(constrained_cmp(&good, &bad), Ordering::Less);
}

#[test]
fn test_lower_violation_wins_and_infinity_is_last() {
    let slight = ind(vec![5.0], 1.0);
    let severe = ind(vec![1.0], 10.0);
    let unverified = ind(vec![f64::INFINITY], f64::INFINITY);
    assert!(constrained_dominates(&slight, &severe));
    assert!(constrained_dominates(&severe, &unverified));
    assert!(!constrained_dominates(&unverified, &unverified));
}

#[test]
fn test_constrained_comparison_is_consistent() {
    let mut rng = StdRng::seed_from_u64(3);
    let pool: Vec<Individual> = (0..40)
        .map(|_| {
            let violation = match rng.gen_range(0..4) {
                0 => f64::INFINITY,
                1 => rng.gen_range(0.1..5.0),
                _ => 0.0,
            };
            ind(vec![rng.gen_range(0..5) as f64, rng.gen_range(0..5) as f64], violation)
        })
        .collect();
    for a in &pool {
        assert_eq!(constrained_cmp(a, a), Ordering::Equal);
        for b in &pool {
            let ab = constrained_cmp(a, b);
            assert_eq!(ab, constrained_cmp(b, a).reverse());
            if a.is_feasible() && !b.is_feasible() {
                assert_eq!(ab, Ordering::Less);
            }
        }
    }
}

#[test]
fn test_non_dominated_sort_ranks_fronts() {
    let mut pop = vec![
        ind(vec![1.0, 4.0], 0.0),
        ind(vec![2.0, 2.0], 0.0),
        ind(vec![3.0, 3.0], 0.0),
        ind(vec![4.0, 1.0], 0.0),
        ind(vec![0.0, 0.0], 2.0),
    ];
    let fronts = fast_non_dominated_sort(&mut pop);
    assert_eq!(fronts, vec![vec![0, 1, 3], vec![2], vec![4]]);
    assert_eq!(pop[2].rank, 1);
    assert_eq!(pop[4].rank, 2);
}

#[test]
fn test_crowding_marks_boundaries() {
    let mut pop = vec![
        ind(vec![1.0, 4.0], 0.0),
        ind(vec![2.0, 2.0], 0.0),
        ind(vec![4.0, 1.0], 0.0),
    ];
    assign_rank_and_crowding(&mut pop);
    assert!(pop[0].crowding.is_infinite());
    assert!(pop[2].crowding.is_infinite());
    // (4-1)/3 + (4-1)/3
    assert!((pop[1].crowding - 2.0).abs() < 1e-12);
    assert_eq!(crowded_cmp(&pop[0], &pop[1]), Ordering::Less);
}

// ─── Strategy helpers ──────────────────────────────────────────────

#[test]
fn test_algorithm_names_round_trip() {
    for algorithm in Algorithm::ALL {
        assert_eq!(algorithm.to_string().parse::<Algorithm>(), Ok(algorithm));
    }
    assert_eq!("NSGA-II".parse::<Algorithm>(), Ok(Algorithm::Nsga2));
    assert_eq!("epsilon-constraint".parse::<Algorithm>(), Ok(Algorithm::Epsilon));
    assert!("annealing".parse::<Algorithm>().is_err());
}

#[test]
fn test_weight_vectors() {
    let two = weight_vectors(5, 2);
    assert_eq!(two[0], vec![0.0, 1.0]);
    assert_eq!(two[2], vec![0.5, 0.5]);
    assert_eq!(two[4], vec![1.0, 0.0]);

    let three = weight_vectors(10, 3);
    assert_eq!(three.len(), 10);
    for w in &three {
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_neighbourhoods() {
    assert_eq!(neighbourhood_size(5), 2);
    assert_eq!(neighbourhood_size(20), 4);
    assert_eq!(neighbourhood_size(200), 10);

    let hoods = neighbourhoods(&weight_vectors(5, 2), 2);
    assert_eq!(hoods[0], vec![0, 1]);
    assert_eq!(hoods[2], vec![2, 1]);
}

#[test]
fn test_tchebycheff_floors_zero_weights() {
    let value = tchebycheff(&[3.0, 5.0], &[0.0, 1.0], &[1.0, 1.0]);
    assert_eq!(value, 4.0);
    let floored = tchebycheff(&[3.0, 1.0], &[0.0, 1.0], &[1.0, 1.0]);
    assert!((floored - 2e-6).abs() < 1e-15);
}

#[test]
fn test_epsilon_schedule_spans_quantiles() {
    let objectives: Vec<Vec<f64>> = (1..=10).map(|v| vec![0.0, v as f64]).collect();
    let views: Vec<&[f64]> = objectives.iter().map(|o| o.as_slice()).collect();
    let schedule = build_schedule(&views, 2, 4);
    let expected = [8.2, 6.4, 4.6, 2.8];
    assert_eq!(schedule.len(), 5);
    assert!(schedule[0][0].is_infinite());
    for (row, want) in schedule[1..].iter().zip(expected) {
        assert!((row[0] - want).abs() < 1e-9, "{:?}", schedule);
    }
}

#[test]
fn test_epsilon_schedule_degenerate_cases() {
    assert_eq!(build_schedule(&[], 1, 10), vec![Vec::<f64>::new()]);
    let none = build_schedule(&[], 2, 10);
    assert_eq!(none.len(), 1);
    assert!(none[0][0].is_infinite());
}

#[test]
fn test_gp_interpolates_observations() {
    let xs = vec![vec![0.0], vec![0.3], vec![0.6], vec![1.0]];
    let ys = vec![1.0, 3.0, 2.0, 5.0];
    let gp = GaussianProcess::fit(&xs, &ys).unwrap();
    for (x, y) in xs.iter().zip(&ys) {
        let (mean, std) = gp.predict(x);
        assert!((mean - y).abs() < 5e-2, "mean {} at {:?}", mean, x);
        assert!(std < 0.1);
    }
    let (_, far) = gp.predict(&[5.0]);
    assert!(far > 1.0);

    let grown = gp.with_observation(&[0.8], 4.0).unwrap();
    assert_eq!(grown.len(), 5);
}

#[test]
fn test_gp_survives_duplicate_inputs() {
    let xs = vec![vec![0.5, 0.5], vec![0.5, 0.5], vec![0.1, 0.9]];
    let gp = GaussianProcess::fit(&xs, &[1.0, 1.0, 2.0]);
    assert!(gp.is_some());
}

// ─── Survivor selection and replacement ───────────────────────────

/// Front A, B, C, D plus E dominated by all of them.
fn crowded_front() -> Vec<Individual> {
    vec![
        tagged(0.0, vec![0.0, 4.0], 0.0),
        tagged(1.0, vec![1.0, 3.0], 0.0),
        tagged(2.0, vec![1.1, 2.9], 0.0),
        tagged(3.0, vec![4.0, 0.0], 0.0),
        tagged(4.0, vec![5.0, 5.0], 0.0),
    ]
}

#[test]
fn test_nsga2_cuts_last_front_by_crowding() {
    // B crowds 0.55, C 1.5, A and D are boundaries
    let survivors = select_survivors(crowded_front(), 3);
    assert_eq!(tags(&survivors), vec![0.0, 2.0, 3.0]);

    let whole_front = select_survivors(crowded_front(), 4);
    assert_eq!(tags(&whole_front), vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_nsga2_prefers_feasible_front() {
    let mut merged = crowded_front();
    merged.push(tagged(5.0, vec![-1.0, -1.0], 0.5));
    let survivors = select_survivors(merged, 5);
    assert!(survivors.iter().all(|i| i.is_feasible()));
}

#[test]
fn test_sms_emoa_drops_dominated_then_least_contributor() {
    let mut search = settings(Algorithm::SmsEmoa);
    search.population = 3;
    let mut ctx = line_context(2, search);
    let mut sms = SmsEmoa::new();
    // reference (6, 6): exclusive volumes A 2, B 0.1, C 0.29, D 5.8
    sms.tell(&mut ctx, crowded_front());
    assert_eq!(tags(sms.population()), vec![0.0, 2.0, 3.0]);
}

#[test]
fn test_sms_emoa_removes_worst_violation_first() {
    let mut search = settings(Algorithm::SmsEmoa);
    search.population = 2;
    let mut ctx = line_context(2, search);
    let mut sms = SmsEmoa::new();
    sms.tell(
        &mut ctx,
        vec![
            tagged(0.0, vec![1.0, 1.0], 0.0),
            tagged(1.0, vec![0.0, 0.0], 3.0),
            tagged(2.0, vec![0.0, 0.0], 1.0),
        ],
    );
    assert_eq!(tags(sms.population()), vec![0.0, 2.0]);
}

#[test]
fn test_moead_replaces_only_on_strict_improvement() {
    let mut search = settings(Algorithm::Moead);
    search.population = 2;
    let mut ctx = line_context(2, search);
    let mut moead = Moead::new();
    assert_eq!(moead.ask(&mut ctx).len(), 2);
    assert_eq!(moead.weights(), &[vec![0.0, 1.0], vec![1.0, 0.0]]);
    moead.tell(
        &mut ctx,
        vec![tagged(0.0, vec![1.0, 1.0], 0.0), tagged(1.0, vec![1.0, 1.0], 0.0)],
    );

    // equal Tchebycheff values keep the incumbents
    moead.tell(
        &mut ctx,
        vec![tagged(2.0, vec![1.0, 1.0], 0.0), tagged(3.0, vec![1.0, 1.0], 0.0)],
    );
    assert_eq!(tags(moead.population()), vec![0.0, 1.0]);

    // better objectives never outweigh a higher violation
    moead.tell(&mut ctx, vec![tagged(4.0, vec![0.0, 0.0], 1.0)]);
    assert_eq!(tags(moead.population()), vec![0.0, 1.0]);

    // ideal moves to (0.5, 1); only the (1, 0) subproblem gains
    moead.tell(&mut ctx, vec![tagged(5.0, vec![0.5, 2.0], 0.0)]);
    assert_eq!(tags(moead.population()), vec![0.0, 5.0]);
}

// ─── qEHVI surrogate ───────────────────────────────────────────────

/// Front (1, 3), (3, 1) and a dominated (3, 3), observed at unit
/// coordinates 0, 0.1 and 0.2.
fn observed_context() -> SearchContext {
    let mut ctx = line_context(2, settings(Algorithm::Qehvi));
    ctx.history = vec![
        tagged(0.0, vec![1.0, 3.0], 0.0),
        tagged(1.0, vec![3.0, 1.0], 0.0),
        tagged(2.0, vec![3.0, 3.0], 0.0),
    ];
    ctx
}

#[test]
fn test_qehvi_acquisition_favours_unexplored_region() {
    let surrogate = Surrogate::fit(&observed_context()).unwrap();
    assert_eq!(surrogate.front.len(), 2);
    let mut rng = StdRng::seed_from_u64(1);
    let on_front = surrogate.acquisition(&[0.0], 64, &mut rng);
    let unexplored = surrogate.acquisition(&[1.0], 64, &mut rng);
    assert!(on_front >= 0.0);
    assert!(unexplored > 0.0);
    assert!(on_front < 0.1 * unexplored, "{} vs {}", on_front, unexplored);
}

#[test]
fn test_qehvi_believed_point_loses_its_improvement() {
    let mut surrogate = Surrogate::fit(&observed_context()).unwrap();
    let before = surrogate.acquisition(&[1.0], 64, &mut StdRng::seed_from_u64(2));
    surrogate.believe(&[1.0]);
    let after = surrogate.acquisition(&[1.0], 64, &mut StdRng::seed_from_u64(2));

    assert!(surrogate.objectives.as_ref().unwrap().iter().all(|gp| gp.len() == 4));
    // the posterior mean near (2.33, 2.33) joins the front
    assert_eq!(surrogate.front.len(), 3);
    assert!(after < 0.1 * before, "{} vs {}", after, before);
}

#[test]
fn test_qehvi_batch_has_requested_size_within_bounds() {
    let mut ctx = observed_context();
    let surrogate = Surrogate::fit(&ctx).unwrap();
    let batch = surrogate.select(&mut ctx, 3);
    assert_eq!(batch.len(), 3);
    assert!(batch.iter().all(|x| x.len() == 1 && (0.0..=10.0).contains(&x[0])));
}

// ─── Runs on the scenario ──────────────────────────────────────────

fn assert_mutually_non_dominated(report: &RunReport) {
    let front = report.archive.front();
    for a in &front {
        for b in &front {
            assert!(!dominates(a, b));
        }
    }
}

#[test]
fn test_every_algorithm_completes_on_scenario() {
    let oracle = scenario_oracle();
    for algorithm in Algorithm::ALL {
        let report = run(&oracle, settings(algorithm)).unwrap();
        assert_eq!(report.status, RunStatus::Completed, "{}", algorithm);
        assert!(report.evaluations > 0);
        assert!(!report.archive.is_empty(), "{} archived nothing", algorithm);
        assert!(report.archive.members().iter().all(|m| m.is_feasible()));
        assert_mutually_non_dominated(&report);
        assert!(report.selected().is_some());
    }
}

#[test]
fn test_nsga2_trace_covers_every_generation() {
    let report = run(&scenario_oracle(), settings(Algorithm::Nsga2)).unwrap();
    assert_eq!(report.generations, 4);
    assert_eq!(report.trace.len(), 4);
    // initial population plus one offspring batch per generation
    assert_eq!(report.evaluations, 8 * 5);

    let hv: Vec<f64> = report.trace.iter().map(|t| t.hypervolume).collect();
    for pair in hv.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
    assert_eq!(report.trace.last().map(|t| t.igd_plus), Some(0.0));
}

#[test]
fn test_runs_are_reproducible() {
    let a = run(&scenario_oracle(), settings(Algorithm::SmsEmoa)).unwrap();
    let b = run(&scenario_oracle(), settings(Algorithm::SmsEmoa)).unwrap();
    assert_eq!(a.archive.front(), b.archive.front());
    assert_eq!(a.evaluations, b.evaluations);
}

#[test]
fn test_sms_emoa_advances_after_population_children() {
    let report = run(&scenario_oracle(), settings(Algorithm::SmsEmoa)).unwrap();
    // 8 initial samples, then 8 single-child cycles per generation
    assert_eq!(report.evaluations, 8 + 4 * 8);
}

struct EpsilonRun {
    strategy: EpsilonConstraint,
    offered: usize,
    /// Individuals evaluated after the warm-up.
    searched: Vec<Individual>,
}

fn drive_epsilon(oracle: &Oracle, search: SearchSettings) -> EpsilonRun {
    let bounds = Bounds::from_spec(oracle.model().optimisation());
    let mut ctx = SearchContext::new(bounds, oracle.objective_count(), search);
    let mut strategy = EpsilonConstraint::new();
    let mut offered = 0;
    let mut searched = Vec::new();
    while !strategy.is_done(&ctx) {
        let warmed_up = !strategy.schedule().is_empty();
        let mut batch = strategy.ask(&mut ctx);
        if batch.is_empty() {
            break;
        }
        for x in &mut batch {
            ctx.bounds.repair(x);
        }
        let results = oracle.evaluate_batch(&batch).unwrap();
        let individuals: Vec<Individual> = batch
            .into_iter()
            .zip(&results)
            .map(|(v, r)| Individual::from_result(v, r))
            .collect();
        ctx.history.extend(individuals.iter().cloned());
        if warmed_up {
            searched.extend(individuals.iter().cloned());
        }
        let update = strategy.tell(&mut ctx, individuals);
        assert!(update.archive_candidates.len() <= 1);
        offered += update.archive_candidates.len();
        if update.advanced {
            ctx.generation += 1;
        }
    }
    EpsilonRun {
        strategy,
        offered,
        searched,
    }
}

#[test]
fn test_epsilon_one_level_adds_unconstrained_row() {
    let oracle = scenario_oracle();
    let mut search = settings(Algorithm::Epsilon);
    search.epsilon_levels = 1;
    search.generations = 6;
    let run = drive_epsilon(&oracle, search);

    let schedule = run.strategy.schedule();
    assert!(!schedule.is_empty() && schedule.len() <= 2);
    assert!(schedule[0][0].is_infinite());
    assert!(run.offered <= schedule.len());
    assert_eq!(run.offered, run.strategy.champions().len());
    assert!(run.strategy.champions().iter().all(|c| c.is_feasible()));
}

#[test]
fn test_epsilon_single_objective_is_plain_minimisation() {
    let source = CAMERA_PIPELINE
        .replace(r#"{ "direction": "min", "metric": "worst_end2end_latency" }"#, "")
        .replace(r#""max_core_utilisation" },"#, r#""max_core_utilisation" }"#);
    let model = parse_model(&source).unwrap();
    let oracle = Oracle::new(model, Box::new(AnalyticVerifier::new()), 2).unwrap();
    let mut search = settings(Algorithm::Epsilon);
    search.generations = 5;
    let run = drive_epsilon(&oracle, search);

    assert_eq!(run.strategy.schedule(), &[Vec::<f64>::new()]);
    assert_eq!(run.offered, 1);
    let champion = &run.strategy.champions()[0];
    assert!(champion.is_feasible());
    for ind in run.searched.iter().filter(|i| i.is_feasible()) {
        assert!(champion.objectives[0] <= ind.objectives[0]);
    }
}

#[test]
fn test_budget_stops_the_run() {
    let mut search = settings(Algorithm::Random);
    search.max_evaluations = Some(5);
    let report = run(&scenario_oracle(), search).unwrap();
    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(report.evaluations, 5);
}

#[test]
fn test_timeout_stops_the_run() {
    let mut search = settings(Algorithm::Nsga2);
    search.timeout = Some(Duration::ZERO);
    let report = run(&scenario_oracle(), search).unwrap();
    assert_eq!(report.status, RunStatus::TimedOut);
    assert_eq!(report.evaluations, 0);
    assert!(report.archive.is_empty());
    assert!(report.selected().is_none());
}

#[test]
fn test_flat_hypervolume_plateaus() {
    let fixed = CAMERA_PIPELINE
        .replace(r#""lo": "25ms", "hi": "80ms""#, r#""lo": "40ms", "hi": "40ms""#)
        .replace(r#""lo": "40ms", "hi": "160ms""#, r#""lo": "60ms", "hi": "60ms""#);
    let model = parse_model(&fixed).unwrap();
    let oracle = Oracle::new(model, Box::new(AnalyticVerifier::new()), 1).unwrap();
    let mut search = settings(Algorithm::Random);
    search.generations = 10;
    search.plateau_window = 1;
    let report = run(&oracle, search).unwrap();
    assert_eq!(report.status, RunStatus::Plateaued);
    assert_eq!(report.generations, 2);
    assert_eq!(report.archive.len(), 1);
    // every vector is the same candidate
    assert_eq!(report.stats.misses, 1);
}

#[test]
fn test_verifier_runs_once_per_distinct_candidate() {
    let verifier = Arc::new(AnalyticVerifier::new());
    let oracle = Oracle::new(camera_pipeline(), Box::new(verifier.clone()), 2).unwrap();
    let report = run(&oracle, settings(Algorithm::Moead)).unwrap();
    assert_eq!(report.evaluation_failures, 0);
    assert_eq!(verifier.invocations() as u64, report.stats.misses);
    assert_eq!(report.stats.hits + report.stats.misses, report.evaluations as u64);
}
