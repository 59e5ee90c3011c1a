use std::path::PathBuf;
use std::process;

use clap::Args;
use tempora::verifier::{Backend, Verifier};

use super::{load_config, load_model};

#[derive(Args)]
pub struct VerifyArgs {
    /// Model file (JSON)
    pub model: PathBuf,
    /// Verifier backend: analytic or uppaal (default: from tempora.toml)
    #[arg(long)]
    pub backend: Option<Backend>,
    /// Path to verifyta (uppaal backend)
    #[arg(long, value_name = "PATH")]
    pub verifyta: Option<PathBuf>,
    /// Run configuration (default: nearest tempora.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn cmd_verify(args: VerifyArgs) {
    let model = load_model(&args.model);
    let mut settings = load_config(&args.model, args.config.as_deref()).verifier;
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if args.verifyta.is_some() {
        settings.path = args.verifyta;
    }

    let net = match tempora::compile(&model) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let verifier = settings.build();
    eprintln!(
        "Verifying {} with {} ({} queries)...",
        args.model.display(),
        verifier.name(),
        net.queries.len()
    );
    let response = match verifier.verify(&net) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    for result in &response.results {
        let verdict = if result.satisfied { "satisfied" } else { "VIOLATED" };
        match result.witness {
            Some(w) if w.is_finite() => println!("  {:<9} {}  (worst {:.0}ms)", verdict, result.name, w),
            Some(_) => println!("  {:<9} {}  (unbounded)", verdict, result.name),
            None => println!("  {:<9} {}", verdict, result.name),
        }
    }
    let satisfied = response.results.iter().filter(|r| r.satisfied).count();
    eprintln!(
        "{} of {} queries satisfied in {:.3}s",
        satisfied,
        response.results.len(),
        response.elapsed().as_secs_f64()
    );
    if !response.all_satisfied() {
        process::exit(1);
    }
}
