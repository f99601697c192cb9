use std::mem;

use tracing::{debug, trace};

use crate::{
    ast::{Expr, ExprTree, NodeId, Token, TokenKind},
    error::ParseError,
    lexer::{Lexer, LexerOptions, Position},
    registry::Registry,
    resolver::{self, NamespaceStack},
    value::Value,
};

/// Output of a parse: the tokens consumed so far and the tree built so far.
///
/// Both are filled in even when parsing fails, so callers can report how far
/// the parser got.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub tokens: Vec<Token>,
    pub tree: ExprTree,
}

impl ParseResult {
    pub fn into_tree(self) -> ExprTree {
        self.tree
    }
}

/// Builds expression trees, resolving identifiers against a [`Registry`].
///
/// # Examples
///
/// ```
/// use tarragon::{ast::Expr, parser::Parser, registry::Registry};
///
/// let registry = Registry::with_builtins();
/// let tree = Parser::new(&registry).parse("concat('a', 'b')").unwrap();
///
/// let call = tree.program().unwrap();
/// assert!(matches!(tree.kind(call), Expr::FunctionCall { name, .. } if name == "concat"));
/// assert_eq!(tree.children(call).len(), 2);
/// ```
pub struct Parser<'r> {
    registry: &'r Registry,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Parser { registry }
    }

    /// Parse in strict mode
    pub fn parse(&self, source: &str) -> Result<ExprTree, ParseError> {
        let mut result = ParseResult::default();
        self.parse_into(source, &mut result, false)?;
        Ok(result.into_tree())
    }

    /// Parse `source` into `result`.
    ///
    /// With `silence_tokenizer_errors` malformed fragments are dropped by the
    /// lexer instead of failing the parse. Tree-building errors are raised
    /// either way.
    pub fn parse_into(
        &self,
        source: &str,
        result: &mut ParseResult,
        silence_tokenizer_errors: bool,
    ) -> Result<(), ParseError> {
        let mut lexer = Lexer::with_options(
            source,
            LexerOptions {
                lenient: silence_tokenizer_errors,
                include_quotes: false,
            },
        );
        let mut builder = TreeBuilder::new(self.registry);
        let outcome = builder.run(&mut lexer);

        result.tokens = mem::take(&mut builder.tokens);
        result.tree = builder.tree;
        outcome
    }
}

/// Single left-to-right pass over the tokens with an insertion point.
struct TreeBuilder<'r> {
    registry: &'r Registry,
    tree: ExprTree,
    tokens: Vec<Token>,
    /// Node new children are attached to
    current: NodeId,
    /// Most recently produced node, the target of a following `(`
    last: Option<NodeId>,
    level: usize,
    scopes: NamespaceStack,
    /// Unclosed `(` and `[` tokens
    open: Vec<Token>,
    previous: Option<Token>,
}

impl<'r> TreeBuilder<'r> {
    fn new(registry: &'r Registry) -> Self {
        let tree = ExprTree::new();
        let current = tree.root();
        TreeBuilder {
            registry,
            tree,
            tokens: Vec::new(),
            current,
            last: None,
            level: 0,
            scopes: NamespaceStack::new(),
            open: Vec::new(),
            previous: None,
        }
    }

    fn run(&mut self, lexer: &mut Lexer) -> Result<(), ParseError> {
        for token in lexer.by_ref() {
            let token = token?;
            trace!(kind = ?token.kind, content = %token.content, level = self.level, "token");
            self.tokens.push(token.clone());
            self.accept(&token)?;
            self.previous = Some(token);
        }
        self.finish(Lexer::position(lexer))
    }

    fn accept(&mut self, token: &Token) -> Result<(), ParseError> {
        match token.kind {
            TokenKind::Number => {
                let value = parse_number(token)?;
                self.produce(Expr::Constant { value, quote: None }, token);
            }
            TokenKind::String => {
                let value = Value::String(token.content.clone());
                self.produce(
                    Expr::Constant {
                        value,
                        quote: token.quote,
                    },
                    token,
                );
            }
            TokenKind::Identifier => self.identifier(token)?,
            TokenKind::OpenParen => {
                let target = self.call_target(token)?;
                self.descend(target, token);
            }
            TokenKind::OpenBracket => {
                let array = self
                    .tree
                    .push(self.current, Expr::Array, token.row, token.column);
                self.descend(array, token);
            }
            TokenKind::CloseParen | TokenKind::CloseBracket => self.close(token)?,
            TokenKind::Semicolon => self.last = None,
            TokenKind::Comma => self.last = Some(self.current),
        }
        Ok(())
    }

    fn produce(&mut self, kind: Expr, token: &Token) {
        let id = self.tree.push(self.current, kind, token.row, token.column);
        self.last = Some(id);
    }

    fn identifier(&mut self, token: &Token) -> Result<(), ParseError> {
        let expr = resolver::resolve(
            self.registry,
            Some(&token.content),
            self.level,
            &self.scopes,
            token.row,
            token.column,
        )?;

        // `call().field`: only directly after the call itself, not after a
        // separator
        if matches!(expr, Expr::Value(_))
            && token.content.starts_with('.')
            && let Some(previous) = self.tree.last_child(self.current)
            && self.last == Some(previous)
            && self.chains_onto(previous)
        {
            self.last = self.tree.chain_last_child(
                self.current,
                token.content.clone(),
                token.row,
                token.column,
            );
            return Ok(());
        }

        self.produce(expr, token);
        Ok(())
    }

    /// Function calls, and method calls on dotted values
    fn chains_onto(&self, id: NodeId) -> bool {
        match self.tree.kind(id) {
            Expr::Value(_) => self.tree.node(id).has_arguments,
            kind => kind.is_call(),
        }
    }

    /// Node the contents of a `(` are attached to
    fn call_target(&mut self, token: &Token) -> Result<NodeId, ParseError> {
        if let Some(previous) = &self.previous {
            match previous.kind {
                TokenKind::Identifier => {
                    if let Some(last) = self.last.filter(|l| *l != self.current) {
                        if self.tree.kind(last).accepts_arguments() {
                            return Ok(last);
                        }
                        return Err(ParseError::new(
                            format!("Invalid expression: unknown function {}", previous.content),
                            previous.row,
                            previous.column,
                        ));
                    }
                }
                TokenKind::Number | TokenKind::String => {
                    return Err(ParseError::new(
                        format!("Invalid expression: unexpected '(' after constant {previous}"),
                        token.row,
                        token.column,
                    ));
                }
                _ => {}
            }
        }

        // A bracket without a function is an execution group
        Ok(self
            .tree
            .push(self.current, Expr::Group, token.row, token.column))
    }

    fn descend(&mut self, target: NodeId, token: &Token) {
        if token.is(TokenKind::OpenParen) && !matches!(self.tree.kind(target), Expr::Group) {
            self.tree.open_arguments(target);
        }
        // Entering a namespace-declaring call scopes its argument list
        if let Expr::FunctionCall { function, .. } = self.tree.kind(target) {
            if let Some(namespace) = function.namespace_identifier() {
                self.scopes.push(self.level, namespace);
            }
        }
        self.open.push(token.clone());
        self.current = target;
        self.last = Some(target);
        self.level += 1;
    }

    fn close(&mut self, token: &Token) -> Result<(), ParseError> {
        let mismatched = || {
            ParseError::new(
                format!("Invalid expression: mismatched closing bracket '{}'", token.content),
                token.row,
                token.column,
            )
        };

        let open = self.open.pop().ok_or_else(mismatched)?;
        let expected = match token.kind {
            TokenKind::CloseParen => TokenKind::OpenParen,
            _ => TokenKind::OpenBracket,
        };
        if open.kind != expected {
            return Err(ParseError::new(
                format!(
                    "Invalid expression: '{}' opened at line {}, column {} is closed by '{}'",
                    open.content, open.row, open.column, token.content
                ),
                token.row,
                token.column,
            ));
        }

        let parent = self.tree.parent(self.current).ok_or_else(mismatched)?;
        self.last = Some(self.current);
        self.current = parent;
        self.level -= 1;
        self.scopes.exit(self.level);
        Ok(())
    }

    fn finish(&self, end: Position) -> Result<(), ParseError> {
        if let Some(open) = self.open.last() {
            let missing = match open.kind {
                TokenKind::OpenParen => ')',
                _ => ']',
            };
            return Err(ParseError::new(
                format!(
                    "Invalid expression: missing '{missing}' for '{}' opened at line {}, column {}",
                    open.content, open.row, open.column
                ),
                end.row,
                end.column,
            ));
        }

        debug!(
            tokens = self.tokens.len(),
            nodes = self.tree.len(),
            "parsed expression"
        );
        Ok(())
    }
}

fn parse_number(token: &Token) -> Result<Value, ParseError> {
    let text = token.content.as_str();
    let invalid = || {
        ParseError::new(
            format!("Invalid expression: invalid number {text}"),
            token.row,
            token.column,
        )
    };

    if !text.contains('.')
        && let Ok(n) = text.parse::<i64>()
    {
        return Ok(Value::Integer(n));
    }
    text.parse::<f64>().map(Value::Float).map_err(|_| invalid())
}
