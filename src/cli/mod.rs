pub mod compile;
pub mod fingerprint;
pub mod optimise;
pub mod verify;

use std::path::{Path, PathBuf};
use std::process;

use tempora::config::SearchConfig;
use tempora::error::Error;
use tempora::TimingModel;

/// Read and validate a model file, rendering diagnostics against its source.
pub fn load_model(path: &Path) -> TimingModel {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    match tempora::parse_model(&source) {
        Ok(model) => model,
        Err(e) => {
            let filename = path.to_string_lossy();
            e.diagnostic().render(&filename, &source);
            process::exit(1);
        }
    }
}

/// Load `--config` if given, else the nearest tempora.toml above the model,
/// else defaults.
pub fn load_config(model: &Path, explicit: Option<&Path>) -> SearchConfig {
    let found = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => SearchConfig::find(model_dir(model)),
    };
    let Some(path) = found else {
        return SearchConfig::default();
    };
    match SearchConfig::load(&path) {
        Ok(config) => config,
        Err(diag) => {
            match std::fs::read_to_string(&path) {
                Ok(source) => diag.render(&path.to_string_lossy(), &source),
                Err(_) => eprintln!("error: {}", diag.message),
            }
            process::exit(1);
        }
    }
}

fn model_dir(model: &Path) -> &Path {
    match model.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// `<model>.<ext>` next to the model file.
pub fn sibling(model: &Path, ext: &str) -> PathBuf {
    model.with_extension(ext)
}

pub fn write_file(path: &Path, contents: &str) {
    if let Err(e) = std::fs::write(path, contents) {
        eprintln!("error: cannot write '{}': {}", path.display(), e);
        process::exit(1);
    }
}

pub fn fail(err: Error) -> ! {
    eprintln!("error: {}", err);
    process::exit(1);
}
