//! Command-line interface.

mod commands;

pub use commands::{exit_code, is_verbose, run, InvalidInput};
