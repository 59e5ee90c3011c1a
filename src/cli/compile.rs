use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{load_model, sibling, write_file};

#[derive(Args)]
pub struct CompileArgs {
    /// Model file (JSON)
    pub model: PathBuf,
    /// Output network file (default: <model>.xml)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Output query file (default: <model>.q)
    #[arg(long, value_name = "PATH")]
    pub queries: Option<PathBuf>,
}

pub fn cmd_compile(args: CompileArgs) {
    let model = load_model(&args.model);
    let net = match tempora::compile(&model) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let xml_path = args.output.unwrap_or_else(|| sibling(&args.model, "xml"));
    let q_path = args.queries.unwrap_or_else(|| sibling(&args.model, "q"));
    let xml = match tempora::compile::render_xml(&net) {
        Ok(xml) => xml,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    write_file(&xml_path, &xml);
    write_file(&q_path, &tempora::compile::render_queries(&net));

    eprintln!(
        "Compiled {} -> {} ({} automata), {} ({} queries)",
        args.model.display(),
        xml_path.display(),
        net.automata.len(),
        q_path.display(),
        net.queries.len()
    );
}
