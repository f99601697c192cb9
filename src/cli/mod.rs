//! CLI support for tarragon
//!
//! Provides programmatic access to the `tarragon` command line functionality
//! so other tools can embed it.

mod check;
mod convert;
mod docs;

pub use check::{
    CheckOptions, CheckResult, execute_check, render_tokens, render_tree,
};
pub use convert::{json_to_value, value_to_json};
pub use docs::{function_doc, function_list};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown function: '{0}'\nRun 'tarragon functions' to see available functions.")]
    UnknownFunction(String),
}
