//! Classification of identifiers into constructs, functions and values.

use tracing::trace;

use crate::{
    ast::{Construct, Expr},
    error::ParseError,
    registry::Registry,
    value::Value,
};

/// Namespaces opened by calls of namespace-declaring functions, keyed by the
/// nesting level of the call whose argument list opened them.
///
/// Lives for exactly one parse.
#[derive(Debug, Clone, Default)]
pub struct NamespaceStack {
    frames: Vec<(usize, String)>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `namespace` at `level`, replacing frames at that level or deeper
    pub fn push(&mut self, level: usize, namespace: &str) {
        self.exit(level);
        self.frames.push((level, namespace.to_string()));
    }

    /// Drop every frame registered at `level` or deeper
    pub fn exit(&mut self, level: usize) {
        self.frames.retain(|(l, _)| *l < level);
    }

    /// Dot-joined prefix of the frames visible at `level`, outermost first
    pub fn prefix(&self, level: usize) -> Option<String> {
        let visible: Vec<&str> = self
            .frames
            .iter()
            .filter(|(l, _)| *l <= level)
            .map(|(_, ns)| ns.as_str())
            .collect();
        if visible.is_empty() {
            None
        } else {
            Some(visible.join("."))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn reserved(word: &str) -> Option<Expr> {
    let construct = |c| Some(Expr::Control(c));
    match word {
        "cache" => construct(Construct::Cache),
        "if" => construct(Construct::If),
        "is" => construct(Construct::Is),
        "each" => construct(Construct::Each),
        "filter" => construct(Construct::Filter),
        "map" => construct(Construct::Map),
        "reduce" => construct(Construct::Reduce),
        "any" => construct(Construct::Any),
        "all" => construct(Construct::All),
        "none" => construct(Construct::None),
        "true" => Some(Expr::Constant {
            value: Value::Boolean(true),
            quote: None,
        }),
        "false" => Some(Expr::Constant {
            value: Value::Boolean(false),
            quote: None,
        }),
        "data" => Some(Expr::Value("data".to_string())),
        "null" => Some(Expr::Null),
        _ => None,
    }
}

/// Resolve `word` at nesting `level`.
///
/// Reserved words win over registered functions, and a lookup qualified with
/// the visible namespaces wins over the bare name. Anything else becomes a
/// [`Expr::Value`] looked up at evaluation time. Namespaces are opened by the
/// tree builder when it enters a call, not here.
pub fn resolve(
    registry: &Registry,
    word: Option<&str>,
    level: usize,
    scopes: &NamespaceStack,
    row: usize,
    column: usize,
) -> Result<Expr, ParseError> {
    let Some(word) = word else {
        return Ok(Expr::Null);
    };

    if word == "slice" {
        return Err(ParseError::new(
            "Invalid expression: slice() has been removed, use the paging predicate page(pageSize, page) on the query instead",
            row,
            column,
        ));
    }

    if let Some(expr) = reserved(word) {
        return Ok(expr);
    }

    let qualified = scopes
        .prefix(level)
        .map(|prefix| format!("{prefix}.{word}"));
    let function = qualified
        .as_deref()
        .and_then(|name| registry.get(name))
        .or_else(|| registry.get(word));

    match function {
        Some(function) => {
            trace!(word, resolved = function.name(), level, "resolved function");
            Ok(Expr::FunctionCall {
                name: function.name().to_string(),
                function,
            })
        }
        None => Ok(Expr::Value(word.to_string())),
    }
}
