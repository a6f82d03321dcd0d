//! Command-line interface for scorewatch.

mod commands;
pub mod icons;

pub use commands::{is_json_logging, is_verbose, run};
