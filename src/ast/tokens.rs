use std::fmt;

/// Classification of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Decimal number
    ///
    /// # Examples
    /// ```text
    /// 42
    /// -3
    /// 2.75
    /// ```
    Number,

    /// Identifier: function name, reserved word or value reference.
    ///
    /// Identifiers may contain dots, and a leading dot marks a chained
    /// access off a preceding function call.
    ///
    /// # Examples
    /// ```text
    /// concat
    /// me.name
    /// .name
    /// ```
    Identifier,

    /// Quoted string literal, single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'User'
    /// ```
    String,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,

    /// `;` statement separator
    Semicolon,

    /// `,` argument separator
    Comma,
}

/// A token with its text and the 1-based position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal text. For strings this is the unescaped content, without
    /// quotes unless the lexer was asked to keep them.
    pub content: String,
    pub row: usize,
    pub column: usize,
    /// Quote character of a string literal
    pub quote: Option<char>,
}

impl Token {
    pub fn new(kind: TokenKind, content: impl Into<String>, row: usize, column: usize) -> Self {
        Token {
            kind,
            content: content.into(),
            row,
            column,
            quote: None,
        }
    }

    pub fn string(content: impl Into<String>, quote: char, row: usize, column: usize) -> Self {
        Token {
            quote: Some(quote),
            ..Token::new(TokenKind::String, content, row, column)
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quote {
            Some(q) => write!(f, "{q}{}{q}", self.content),
            None => write!(f, "{}", self.content),
        }
    }
}
