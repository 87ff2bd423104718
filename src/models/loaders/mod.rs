pub mod toml_loader;

pub use toml_loader::{load_job_ids, parse_job_ids};
