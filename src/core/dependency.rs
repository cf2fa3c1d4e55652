//! Dependency expressions from the header's dependency row
//!
//! A cell holds zero or more `;`-separated calls, each exactly one of:
//!
//! ```text
//! _ref("Items", "id")       the cell value must appear in Items.id
//! _key_ref("Items", "id")   every key/element of a table cell must appear in Items.id
//! ```
//!
//! The text is tokenized and parsed; nothing is ever evaluated.

use std::iter::Peekable;
use std::str::Chars;

pub const REF_FN: &str = "_ref";
pub const KEY_REF_FN: &str = "_key_ref";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// The cell's scalar value must exist in the target column
    Value,
    /// Every key (map) or element (list) of a table cell must exist in the target column
    Key,
}

/// A parsed `_ref`/`_key_ref` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub kind: RefKind,
    pub sheet: String,
    pub field: String,
}

/// Error in a dependency expression
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyParseError {
    pub message: String,
    pub position: usize,
}

impl DependencyParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for DependencyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed dependency expression at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for DependencyParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Text(String),
    OpenParen,
    CloseParen,
    Comma,
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, DependencyParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.position;
            let token = match self.peek() {
                None => break,
                Some('(') => {
                    self.advance();
                    Token::OpenParen
                }
                Some(')') => {
                    self.advance();
                    Token::CloseParen
                }
                Some(',') => {
                    self.advance();
                    Token::Comma
                }
                Some('"') | Some('\'') => self.read_string()?,
                Some(c) if c.is_alphabetic() || c == '_' => self.read_identifier(),
                Some(c) => {
                    return Err(DependencyParseError::new(
                        format!("unexpected character '{}'", c),
                        start,
                    ))
                }
            };
            tokens.push((token, start));
        }
        Ok(tokens)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_string(&mut self) -> Result<Token, DependencyParseError> {
        let start = self.position;
        let quote = self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(DependencyParseError::new("unterminated string", start)),
                Some(c) if Some(c) == quote => return Ok(Token::Text(value)),
                Some(c) => value.push(c),
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::Identifier(name)
    }
}

/// Recursive descent over `call := IDENT '(' STRING ',' STRING ')'`
struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    end: usize,
}

impl Parser {
    fn next(&mut self, expected: &str) -> Result<(Token, usize), DependencyParseError> {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| DependencyParseError::new(format!("expected {}", expected), self.end))?;
        self.index += 1;
        Ok(token)
    }

    fn expect(&mut self, want: Token, label: &str) -> Result<(), DependencyParseError> {
        let (token, pos) = self.next(label)?;
        if token == want {
            Ok(())
        } else {
            Err(DependencyParseError::new(format!("expected {}", label), pos))
        }
    }

    fn text(&mut self) -> Result<String, DependencyParseError> {
        match self.next("a string literal")? {
            (Token::Text(s), _) => Ok(s),
            (_, pos) => Err(DependencyParseError::new(
                "arguments must be string literals",
                pos,
            )),
        }
    }

    fn call(&mut self) -> Result<Dependency, DependencyParseError> {
        let kind = match self.next("_ref or _key_ref")? {
            (Token::Identifier(name), _) if name == REF_FN => RefKind::Value,
            (Token::Identifier(name), _) if name == KEY_REF_FN => RefKind::Key,
            (_, pos) => {
                return Err(DependencyParseError::new(
                    format!("only {} and {} are supported", REF_FN, KEY_REF_FN),
                    pos,
                ))
            }
        };
        self.expect(Token::OpenParen, "'('")?;
        let sheet = self.text()?;
        self.expect(Token::Comma, "','")?;
        let field = self.text()?;
        self.expect(Token::CloseParen, "')'")?;

        if let Some((_, pos)) = self.tokens.get(self.index) {
            return Err(DependencyParseError::new("unexpected trailing input", *pos));
        }
        Ok(Dependency { kind, sheet, field })
    }
}

/// Parse a single `_ref(...)` / `_key_ref(...)` call
pub fn parse_dependency(text: &str) -> Result<Dependency, DependencyParseError> {
    let tokens = Tokenizer::new(text).tokenize()?;
    let mut parser = Parser {
        tokens,
        index: 0,
        end: text.chars().count(),
    };
    parser.call()
}

/// Parse a whole dependency cell; blank segments are skipped
pub fn parse_dependencies(cell: &str) -> Result<Vec<Dependency>, DependencyParseError> {
    cell.split(';')
        .filter(|part| !part.trim().is_empty())
        .map(parse_dependency)
        .collect()
}
