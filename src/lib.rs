pub mod ast;
pub mod cli;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod value;

pub use ast::{Construct, Expr, ExprTree, NodeId, Token, TokenKind};
pub use error::{Error, EvalError, ParseError};
pub use evaluator::{EvalContext, EvaluationHints, Evaluator, MapContext};
pub use lexer::{Lexer, LexerOptions, Position, tokenize};
pub use parser::{ParseResult, Parser};
pub use registry::{Function, License, Registry};
pub use value::Value;

/// Parse `source` strictly and evaluate it once with a fresh evaluator.
///
/// # Examples
///
/// ```
/// use tarragon::{MapContext, Registry, Value};
///
/// let registry = Registry::with_builtins();
/// let mut ctx = MapContext::new().with("name", Value::from("world"));
///
/// let out = tarragon::eval(&registry, "concat('hello ', upper(name))", &mut ctx).unwrap();
/// assert_eq!(out, Value::from("hello WORLD"));
/// ```
pub fn eval(registry: &Registry, source: &str, ctx: &mut dyn EvalContext) -> Result<Value, Error> {
    let tree = Parser::new(registry).parse(source)?;
    let mut hints = EvaluationHints::new();
    let value = Evaluator::new().evaluate(&tree, ctx, &Value::Null, &mut hints)?;
    Ok(value)
}
