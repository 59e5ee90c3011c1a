use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Args;
use tempora::export::RunExport;
use tempora::oracle::Utilisation;
use tempora::search::Algorithm;
use tempora::verifier::Backend;
use tempora::{Oracle, RunReport};

use super::{fail, load_config, load_model};

#[derive(Args)]
pub struct OptimiseArgs {
    /// Model file (JSON) with an optimisation block
    pub model: PathBuf,
    /// nsga2, sms-emoa, moead, epsilon, qehvi or random
    #[arg(long)]
    pub algorithm: Option<Algorithm>,
    #[arg(long)]
    pub generations: Option<usize>,
    #[arg(long)]
    pub population: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Evaluation threads (0 = one per core)
    #[arg(long)]
    pub workers: Option<usize>,
    /// Stop after this many evaluations
    #[arg(long, value_name = "N")]
    pub max_evaluations: Option<usize>,
    /// Stop after this many seconds of wall-clock time
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,
    /// max_core_utilisation measure: sum or response-ratio
    #[arg(long)]
    pub utilisation: Option<Utilisation>,
    /// Verifier backend: analytic or uppaal
    #[arg(long)]
    pub backend: Option<Backend>,
    /// Path to verifyta (uppaal backend)
    #[arg(long, value_name = "PATH")]
    pub verifyta: Option<PathBuf>,
    /// Run configuration (default: nearest tempora.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Write the run report as JSON
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub fn cmd_optimise(args: OptimiseArgs) {
    let model = load_model(&args.model);
    let mut config = load_config(&args.model, args.config.as_deref());

    let search = &mut config.search;
    if let Some(algorithm) = args.algorithm {
        search.algorithm = algorithm;
    }
    if let Some(n) = args.generations {
        search.generations = n;
    }
    if let Some(n) = args.population {
        search.population = n;
    }
    if let Some(seed) = args.seed {
        search.seed = seed;
    }
    if args.max_evaluations.is_some() {
        search.max_evaluations = args.max_evaluations;
    }
    if let Some(secs) = args.timeout {
        match timeout(secs) {
            Ok(limit) => search.timeout = Some(limit),
            Err(msg) => {
                eprintln!("error: invalid --timeout: {}", msg);
                process::exit(1);
            }
        }
    }
    if let Some(metric) = args.utilisation {
        config.utilisation = metric;
    }
    if let Some(n) = args.workers {
        config.workers = n;
    }
    if let Some(backend) = args.backend {
        config.verifier.backend = backend;
    }
    if args.verifyta.is_some() {
        config.verifier.path = args.verifyta;
    }

    let oracle = match Oracle::new(model, config.verifier.build(), config.workers) {
        Ok(o) => o.with_utilisation(config.utilisation.build()),
        Err(e) => fail(e),
    };
    eprintln!(
        "Optimising {} with {} ({} variables, {} objectives, {} workers)...",
        args.model.display(),
        config.search.algorithm,
        oracle.dimension(),
        oracle.objective_count(),
        oracle.workers()
    );
    let report = match tempora::run(&oracle, config.search) {
        Ok(r) => r,
        Err(e) => fail(e),
    };

    print_report(&oracle, &report);

    if let Some(path) = args.output {
        let saved = RunExport::new(&report, &oracle).and_then(|export| export.save_json(&path));
        match saved {
            Ok(()) => eprintln!("Report written to {}", path.display()),
            Err(e) => fail(e),
        }
    }
}

fn timeout(secs: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{} ({})", e, secs))
}

fn print_report(oracle: &Oracle, report: &RunReport) {
    let spec = oracle.model().optimisation();
    eprintln!(
        "Search {} after {} generations, {} evaluations ({} failed) in {:.2}s",
        report.status,
        report.generations,
        report.evaluations,
        report.evaluation_failures,
        report.elapsed.as_secs_f64()
    );

    if report.archive.is_empty() {
        eprintln!("No feasible configuration found.");
    } else {
        let header: Vec<&str> = spec
            .variables
            .iter()
            .map(|v| v.name.as_str())
            .chain(spec.objectives.iter().map(|o| o.name.as_str()))
            .collect();
        println!("{}", header.join("  "));
        let mut members: Vec<_> = report.archive.members().iter().collect();
        members.sort_by(|a, b| a.objectives[0].total_cmp(&b.objectives[0]));
        for ind in members {
            let vars = spec.variables.iter().zip(&ind.vector).map(|(v, &x)| format!("{}", v.quantise(x)));
            let objs = spec
                .objectives
                .iter()
                .zip(&ind.objectives)
                .map(|(o, &y)| format!("{:.4}", o.from_minimised(y)));
            println!("{}", vars.chain(objs).collect::<Vec<_>>().join("  "));
        }
    }

    if let Some(last) = report.trace.last() {
        eprintln!(
            "Hypervolume {:.4}, IGD+ {:.4} at generation {}",
            last.hypervolume, last.igd_plus, last.generation
        );
    }
    eprint!("{}", report.stats);
}
