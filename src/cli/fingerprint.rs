use std::path::PathBuf;

use clap::Args;
use tempora::oracle::{encode, Fingerprint};

use super::load_model;

#[derive(Args)]
pub struct FingerprintArgs {
    /// Model file (JSON)
    pub model: PathBuf,
    /// Show the full 256-bit hash instead of the short form
    #[arg(long)]
    pub full: bool,
}

pub fn cmd_fingerprint(args: FingerprintArgs) {
    let model = load_model(&args.model);
    let fingerprint = Fingerprint::of(&model);
    if args.full {
        println!("{} {}", fingerprint.to_hex(), args.model.display());
    } else {
        println!("{} {}", fingerprint, args.model.display());
    }

    let spec = model.optimisation();
    if !spec.variables.is_empty() {
        for (var, value) in spec.variables.iter().zip(encode(&model)) {
            eprintln!("  {} = {}", var.name, value);
        }
    }
}
