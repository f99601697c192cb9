//! Diagnostics raised while tokenizing, parsing and evaluating expressions.
//!
//! Every diagnostic carries an HTTP-style status code so that callers embedding
//! the expression language can forward it unchanged. Syntax problems detected
//! by this crate always use [`SYNTAX_ERROR`].

use thiserror::Error;

/// Status code for syntax problems (unbalanced brackets, unknown functions, ...)
pub const SYNTAX_ERROR: u16 = 422;

/// Status code for calls to functions whose module is not licensed
pub const NOT_LICENSED: u16 = 403;

/// A syntax error with the 1-based source position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {row}, column {column})")]
pub struct ParseError {
    pub status: u16,
    pub message: String,
    pub row: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, row: usize, column: usize) -> Self {
        ParseError {
            status: SYNTAX_ERROR,
            message: message.into(),
            row,
            column,
        }
    }
}

/// An error raised while evaluating an expression tree.
///
/// Functions raise these through [`Function::apply`](crate::registry::Function::apply);
/// the evaluator passes them through untouched except for filling in the
/// position of the failing node when the function did not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    pub status: u16,
    pub message: String,
    /// `(row, column)` of the node that raised the error, if known
    pub position: Option<(usize, usize)>,
}

impl EvalError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        EvalError {
            status,
            message: message.into(),
            position: None,
        }
    }

    /// A 422 error, used for misuse of built-in constructs
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(SYNTAX_ERROR, message)
    }

    /// Wrong number of arguments for a construct or function
    pub fn arity(name: &str, expected: &str, got: usize) -> Self {
        Self::syntax(format!(
            "{name}() expects {expected} argument(s), got {got}"
        ))
    }

    pub fn at(mut self, row: usize, column: usize) -> Self {
        self.position = Some((row, column));
        self
    }

    /// Attach a position unless one is already present
    pub(crate) fn or_at(self, row: usize, column: usize) -> Self {
        match self.position {
            Some(_) => self,
            None => self.at(row, column),
        }
    }
}

/// Any diagnostic produced by the one-shot [`eval`](crate::eval) entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn status(&self) -> u16 {
        match self {
            Error::Parse(e) => e.status,
            Error::Eval(e) => e.status,
        }
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Error::Parse(e) => Some((e.row, e.column)),
            Error::Eval(e) => e.position,
        }
    }
}
