//! Execute expressions against JSON input

use super::{CliError, json_to_value, value_to_json};
use crate::{
    EvaluationHints, Evaluator, Lexer, LexerOptions, MapContext, ParseResult, Parser, Registry,
    output::{to_source, to_tree_string},
};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to evaluate
    pub expression: String,
    /// JSON input string
    pub input: Option<String>,
    /// Only validate syntax, don't evaluate
    pub syntax_only: bool,
    /// Drop malformed fragments instead of failing
    pub lenient: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Expression evaluated successfully
    Success {
        output: serde_json::Value,
        hints: EvaluationHints,
    },
}

/// Parse and evaluate an expression.
///
/// The top-level keys of the JSON input become variables and the whole
/// document is the caller (`this`). Without input the expression runs
/// against an empty context.
pub fn execute_check(registry: &Registry, options: &CheckOptions) -> Result<CheckResult, CliError> {
    let mut result = ParseResult::default();
    Parser::new(registry).parse_into(&options.expression, &mut result, options.lenient)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let document = match &options.input {
        Some(json) => json_to_value(serde_json::from_str(json)?),
        None => crate::Value::Null,
    };
    let mut ctx = MapContext::from_object(document.clone());
    let mut hints = EvaluationHints::new();

    let value = Evaluator::new().evaluate(&result.tree, &mut ctx, &document, &mut hints)?;

    Ok(CheckResult::Success {
        output: value_to_json(value),
        hints,
    })
}

/// One line per token: position, kind and content
pub fn render_tokens(expression: &str, options: LexerOptions) -> Result<String, CliError> {
    let mut out = String::new();
    for token in Lexer::with_options(expression, options) {
        let token = token?;
        let text = if options.include_quotes {
            token.content.clone()
        } else {
            token.to_string()
        };
        out.push_str(&format!(
            "{}:{}\t{:?}\t{text}\n",
            token.row, token.column, token.kind
        ));
    }
    Ok(out)
}

/// Tree outline followed by the re-rendered source
pub fn render_tree(registry: &Registry, expression: &str, lenient: bool) -> Result<String, CliError> {
    let mut result = ParseResult::default();
    Parser::new(registry).parse_into(expression, &mut result, lenient)?;
    Ok(format!(
        "{}\n{}\n",
        to_tree_string(&result.tree),
        to_source(&result.tree)
    ))
}
