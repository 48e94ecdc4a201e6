//! Predicate expression tokenizer.
//!
//! Converts an expression string into a sequence of [`Token`]s, each tagged
//! with the byte offset where it starts so the parser can report precise
//! error positions.
//!
//! # Disambiguation Rules
//!
//! - A name followed by `(` is a function name, or a node type test for
//!   `text`, `node`, `comment` and `processing-instruction`.
//! - `and` and `or` are operators when the preceding token ends an operand,
//!   and plain names otherwise.
//! - `*` is always a name test; the language has no arithmetic.

use std::fmt;

use crate::error::PatternError;

/// Names recognized as node type tests when followed by `(`.
const NODE_TYPE_NAMES: &[&str] = &["comment", "text", "processing-instruction", "node"];

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[` (nested predicates are rejected by the parser)
    LeftBracket,
    /// `]`
    RightBracket,
    /// `.` -- the context node.
    Dot,
    /// `..` -- the parent node (rejected by the parser).
    DotDot,
    /// `@` -- attribute axis abbreviation.
    At,
    /// `,` -- argument separator.
    Comma,
    /// `/` -- child step separator.
    Slash,
    /// `//` -- descendant-or-self step abbreviation.
    DoubleSlash,
    /// `*` -- any name.
    Star,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `and` operator.
    And,
    /// `or` operator.
    Or,
    /// A numeric literal (e.g., `42`, `3.5`, `.5`).
    Number(f64),
    /// A string literal (e.g., `"hello"` or `'world'`).
    Literal(String),
    /// A name used as a name test (e.g., `item`, `svg:rect`).
    Name(String),
    /// A name that appeared before `(`.
    FunctionName(String),
    /// A node type keyword that appeared before `(`.
    NodeType(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::At => f.write_str("@"),
            Self::Comma => f.write_str(","),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::Star => f.write_str("*"),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::LessThan => f.write_str("<"),
            Self::LessThanEqual => f.write_str("<="),
            Self::GreaterThan => f.write_str(">"),
            Self::GreaterThanEqual => f.write_str(">="),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Literal(s) => write!(f, "\"{s}\""),
            Self::Name(s) | Self::FunctionName(s) | Self::NodeType(s) => f.write_str(s),
        }
    }
}

/// A token and the byte offset where it starts.
pub type Spanned = (Token, usize);

/// Expression tokenizer.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given expression string.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenizes the entire input.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for an unterminated string literal or an
    /// unexpected character.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, PatternError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }
            let start = self.pos;
            let token = self.next_raw_token()?;
            tokens.push((token, start));
        }
        disambiguate(&mut tokens);
        Ok(tokens)
    }

    fn next_raw_token(&mut self) -> Result<Token, PatternError> {
        let bytes = self.input.as_bytes();
        let ch = bytes[self.pos];
        let next = bytes.get(self.pos + 1).copied();

        let (token, len) = match (ch, next) {
            (b'(', _) => (Token::LeftParen, 1),
            (b')', _) => (Token::RightParen, 1),
            (b'[', _) => (Token::LeftBracket, 1),
            (b']', _) => (Token::RightBracket, 1),
            (b'@', _) => (Token::At, 1),
            (b',', _) => (Token::Comma, 1),
            (b'*', _) => (Token::Star, 1),
            (b'=', _) => (Token::Equal, 1),
            (b'!', Some(b'=')) => (Token::NotEqual, 2),
            (b'<', Some(b'=')) => (Token::LessThanEqual, 2),
            (b'<', _) => (Token::LessThan, 1),
            (b'>', Some(b'=')) => (Token::GreaterThanEqual, 2),
            (b'>', _) => (Token::GreaterThan, 1),
            (b'/', Some(b'/')) => (Token::DoubleSlash, 2),
            (b'/', _) => (Token::Slash, 1),
            (b'.', Some(b'.')) => (Token::DotDot, 2),
            (b'.', Some(b'0'..=b'9')) | (b'0'..=b'9', _) => return self.read_number(),
            (b'.', _) => (Token::Dot, 1),
            (b'"' | b'\'', _) => return self.read_string_literal(ch),
            _ if is_name_start_char(ch) => return Ok(self.read_name()),
            _ => {
                let found = self.input[self.pos..].chars().next().unwrap_or('?');
                return Err(self.error(format!("unexpected character '{found}'")));
            }
        };
        self.pos += len;
        Ok(token)
    }

    /// Reads `Digits ('.' Digits?)?` or `'.' Digits`.
    fn read_number(&mut self) -> Result<Token, PatternError> {
        let start = self.pos;
        self.advance_while(|b| b.is_ascii_digit());
        if self.input.as_bytes().get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.advance_while(|b| b.is_ascii_digit());
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| PatternError::new(format!("invalid number literal: {text}"), start))
    }

    fn read_string_literal(&mut self, quote: u8) -> Result<Token, PatternError> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        self.advance_while(|b| b != quote);
        if self.pos >= self.input.len() {
            return Err(PatternError::new("unterminated string literal", start));
        }
        let content = self.input[content_start..self.pos].to_string();
        self.pos += 1;
        Ok(Token::Literal(content))
    }

    /// Reads an `NCName`, or a `QName` when a single `:` joins two names.
    fn read_name(&mut self) -> Token {
        let start = self.pos;
        self.advance_while(is_name_char);
        let bytes = self.input.as_bytes();
        if bytes.get(self.pos) == Some(&b':')
            && bytes.get(self.pos + 1).is_some_and(|&b| is_name_start_char(b))
        {
            self.pos += 1;
            self.advance_while(is_name_char);
        }
        Token::Name(self.input[start..self.pos].to_string())
    }

    fn advance_while(&mut self, pred: impl Fn(u8) -> bool) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && pred(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        self.advance_while(|b| b.is_ascii_whitespace());
    }

    fn error(&self, message: String) -> PatternError {
        PatternError::new(message, self.pos)
    }
}

/// Reclassifies names according to the tokens around them.
fn disambiguate(tokens: &mut [Spanned]) {
    for i in 0..tokens.len() {
        let Token::Name(name) = &tokens[i].0 else {
            continue;
        };
        let preceding_is_operand = i > 0 && is_operand_ending(&tokens[i - 1].0);
        let replacement = if preceding_is_operand {
            match name.as_str() {
                "and" => Some(Token::And),
                "or" => Some(Token::Or),
                _ => None,
            }
        } else if matches!(tokens.get(i + 1), Some((Token::LeftParen, _))) {
            if NODE_TYPE_NAMES.contains(&name.as_str()) {
                Some(Token::NodeType(name.clone()))
            } else {
                Some(Token::FunctionName(name.clone()))
            }
        } else {
            None
        };
        if let Some(token) = replacement {
            tokens[i].0 = token;
        }
    }
}

/// Returns `true` if the given token could end an operand.
fn is_operand_ending(token: &Token) -> bool {
    matches!(
        token,
        Token::RightParen
            | Token::RightBracket
            | Token::Dot
            | Token::DotDot
            | Token::Number(_)
            | Token::Literal(_)
            | Token::Name(_)
            | Token::Star
    )
}

/// ASCII letters, `_`, and any non-ASCII byte (so Unicode names pass through
/// whole).
fn is_name_start_char(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start_char(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}
