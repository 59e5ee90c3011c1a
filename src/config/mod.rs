pub mod project;

pub use project::{SearchConfig, CONFIG_FILE};
