use tracing::debug;

use crate::{
    ast::{Token, TokenKind},
    error::ParseError,
};

/// Lexer configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerOptions {
    /// Drop unexpected characters and accept unterminated strings instead of
    /// raising a syntax error
    pub lenient: bool,
    /// Keep the surrounding quotes in the content of string tokens
    pub include_quotes: bool,
}

/// A 1-based position in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

/// Lazy tokenizer over an expression string.
///
/// Yields tokens in source order. In strict mode the first malformed fragment
/// is yielded as an error and the lexer is exhausted afterwards.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    row: usize,
    column: usize,
    options: LexerOptions,
    failed: bool,
}

/// Tokenize a whole expression eagerly in strict mode.
///
/// # Examples
///
/// ```
/// use tarragon::{ast::TokenKind, lexer::tokenize};
///
/// let tokens = tokenize("concat('a', b)", false).unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::Identifier,
///         TokenKind::OpenParen,
///         TokenKind::String,
///         TokenKind::Comma,
///         TokenKind::Identifier,
///         TokenKind::CloseParen,
///     ]
/// );
/// assert_eq!(tokens[2].quote, Some('\''));
/// assert_eq!(tokens[4].column, 13);
/// ```
pub fn tokenize(source: &str, include_quotes_in_token: bool) -> Result<Vec<Token>, ParseError> {
    Lexer::with_options(
        source,
        LexerOptions {
            lenient: false,
            include_quotes: include_quotes_in_token,
        },
    )
    .collect()
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self::with_options(input, LexerOptions::default())
    }

    pub fn with_options(input: &str, options: LexerOptions) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            row: 1,
            column: 1,
            options,
            failed: false,
        }
    }

    /// Position of the next unread character (end of input once exhausted)
    pub fn position(&self) -> Position {
        Position {
            row: self.row,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.row += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_' || ch == '.'
    }

    fn is_identifier_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '.'
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_identifier_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self) -> String {
        let mut number = String::new();
        let mut is_float = false;

        if self.current_char() == Some('-') {
            number.push('-');
            self.advance();
        }

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        number
    }

    /// Reads a quoted string. Returns the unescaped content and whether the
    /// closing quote was found.
    fn read_string(&mut self, quote: char) -> (String, bool) {
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return (result, true);
                }
                '\\' => {
                    self.advance(); // Consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some(other) => result.push(other),
                        None => return (result, false),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
        (result, false)
    }

    fn punctuation(ch: char) -> Option<TokenKind> {
        match ch {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '[' => Some(TokenKind::OpenBracket),
            ']' => Some(TokenKind::CloseBracket),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        }
    }

    /// Next token, `Ok(None)` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            self.skip_whitespace();

            let (row, column) = (self.row, self.column);
            let Some(ch) = self.current_char() else {
                return Ok(None);
            };

            if let Some(kind) = Self::punctuation(ch) {
                self.advance();
                return Ok(Some(Token::new(kind, ch, row, column)));
            }

            match ch {
                '"' | '\'' => {
                    let (content, terminated) = self.read_string(ch);
                    if !terminated && !self.options.lenient {
                        return Err(ParseError::new(
                            format!("Invalid expression: unterminated string starting with {ch}"),
                            row,
                            column,
                        ));
                    }
                    let content = if self.options.include_quotes {
                        format!("{ch}{content}{ch}")
                    } else {
                        content
                    };
                    return Ok(Some(Token::string(content, ch, row, column)));
                }
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek_char(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    let number = self.read_number();
                    return Ok(Some(Token::new(TokenKind::Number, number, row, column)));
                }
                c if Self::is_identifier_start(c) => {
                    let ident = self.read_identifier();
                    return Ok(Some(Token::new(TokenKind::Identifier, ident, row, column)));
                }
                other => {
                    if !self.options.lenient {
                        return Err(ParseError::new(
                            format!("Invalid expression: unexpected character '{other}'"),
                            row,
                            column,
                        ));
                    }
                    debug!(%other, row, column, "dropping unexpected character");
                    self.advance();
                }
            }
        }
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[test]
fn test_punctuation() {
    let kinds: Vec<_> = Lexer::new("()[],;")
        .map(|t| t.unwrap().kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::OpenBracket,
            TokenKind::CloseBracket,
            TokenKind::Comma,
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn test_strict_mode_stops_after_error() {
    let mut lexer = Lexer::new("a # b");
    assert!(lexer.next().unwrap().is_ok());
    assert!(lexer.next().unwrap().is_err());
    assert!(lexer.next().is_none());
}
