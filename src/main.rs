use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(
    name = "tempora",
    version,
    about = "Compile timing models to timed automata and search their parameters"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a model to an UPPAAL network and query file
    Compile(cli::compile::CompileArgs),
    /// Compile and verify a model, printing each query verdict
    Verify(cli::verify::VerifyArgs),
    /// Search the model's decision variables for Pareto-optimal settings
    #[command(alias = "optimize")]
    Optimise(cli::optimise::OptimiseArgs),
    /// Show the content fingerprint of a model (BLAKE3)
    Fingerprint(cli::fingerprint::FingerprintArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile(args) => cli::compile::cmd_compile(args),
        Command::Verify(args) => cli::verify::cmd_verify(args),
        Command::Optimise(args) => cli::optimise::cmd_optimise(args),
        Command::Fingerprint(args) => cli::fingerprint::cmd_fingerprint(args),
    }
}
