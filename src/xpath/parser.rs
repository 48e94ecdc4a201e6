//! Predicate expression parser.
//!
//! A recursive descent parser over the [`Lexer`]'s token stream producing an
//! [`Expr`]. Function names and arities are checked here, so a parsed
//! expression can always be evaluated.
//!
//! # Operator Precedence
//!
//! From lowest to highest:
//! 1. `or`
//! 2. `and`
//! 3. `=`, `!=` (equality)
//! 4. `<`, `<=`, `>`, `>=` (relational)
//! 5. Primary expressions and relative location paths

use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, Step};
use super::lexer::{Lexer, Spanned, Token};
use crate::error::PatternError;

/// Parses an expression string into an AST.
///
/// # Errors
///
/// Returns [`PatternError`] if the input is not a valid expression; the
/// position is a byte offset into `input`.
///
/// # Examples
///
/// ```
/// use xmlscan::xpath::parser::parse;
///
/// assert!(parse("@type = 'video' and not(@hidden)").is_ok());
/// assert!(parse("position() = 1").is_err());
/// ```
pub fn parse(input: &str) -> Result<Expr, PatternError> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(PatternError::new("empty expression", 0));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected token '{token}' after expression")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Length of the input, reported for errors at end of input.
    end: usize,
}

impl Parser {
    // --- Token access helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), PatternError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{token}', found {}",
                self.describe_current()
            )))
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{token}'"),
            None => "end of expression".to_string(),
        }
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, pos)| *pos)
    }

    fn error(&self, message: String) -> PatternError {
        PatternError::new(message, self.position())
    }

    // --- Grammar productions ---

    fn parse_or(&mut self) -> Result<Expr, PatternError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, PatternError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, PatternError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Eq,
                Some(Token::NotEqual) => BinaryOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, PatternError> {
        let mut left = self.parse_unit()?;
        loop {
            let op = match self.peek() {
                Some(Token::LessThan) => BinaryOp::Lt,
                Some(Token::LessThanEqual) => BinaryOp::Lte,
                Some(Token::GreaterThan) => BinaryOp::Gt,
                Some(Token::GreaterThanEqual) => BinaryOp::Gte,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unit()?;
            left = binary(op, left, right);
        }
    }

    /// Parses a primary expression or a relative location path.
    fn parse_unit(&mut self) -> Result<Expr, PatternError> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Literal(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Expr::String(s))
            }
            Some(Token::LeftParen) => {
                self.pos += 1;
                let expr = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::FunctionName(_)) => self.parse_function_call(),
            Some(Token::Slash | Token::DoubleSlash) => {
                Err(self.error("absolute paths are not supported in predicates".to_string()))
            }
            Some(_) => self.parse_relative_path(),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }

    fn parse_function_call(&mut self) -> Result<Expr, PatternError> {
        let start = self.position();
        let Some(Token::FunctionName(name)) = self.peek().cloned() else {
            return Err(self.error("expected function name".to_string()));
        };
        let function = Function::from_name(&name)
            .ok_or_else(|| PatternError::new(format!("unknown function '{name}()'"), start))?;
        self.pos += 1;
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !self.eat(&Token::RightParen) {
            loop {
                args.push(self.parse_or()?);
                if self.eat(&Token::RightParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(PatternError::new(
                format!("{name}() takes {}, got {}", describe_arity(min, max), args.len()),
                start,
            ));
        }
        if function.takes_node_set() && args.iter().any(|arg| !matches!(arg, Expr::Path { .. })) {
            return Err(PatternError::new(
                format!("{name}() expects a location path argument"),
                start,
            ));
        }
        Ok(Expr::FunctionCall { function, args })
    }

    fn parse_relative_path(&mut self) -> Result<Expr, PatternError> {
        let mut steps = Vec::new();
        loop {
            let step = self.parse_step()?;
            let is_attribute = step.axis == Axis::Attribute;
            steps.push(step);

            let descend = if self.eat(&Token::Slash) {
                false
            } else if self.eat(&Token::DoubleSlash) {
                true
            } else {
                break;
            };
            if is_attribute {
                return Err(self.error("an attribute step must be the last step".to_string()));
            }
            if descend {
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    node_test: NodeTest::Node,
                });
            }
        }
        if self.check(&Token::LeftBracket) {
            return Err(self.error("nested predicates are not supported".to_string()));
        }
        Ok(Expr::Path { steps })
    }

    fn parse_step(&mut self) -> Result<Step, PatternError> {
        let start = self.position();
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("expected a location step".to_string()));
        };
        self.pos += 1;
        let step = match token {
            Token::Dot => Step {
                axis: Axis::SelfAxis,
                node_test: NodeTest::Node,
            },
            Token::At => {
                let node_test = match self.peek().cloned() {
                    Some(Token::Name(name)) => {
                        self.pos += 1;
                        NodeTest::Name(local_name(&name, self.position())?)
                    }
                    Some(Token::Star) => {
                        self.pos += 1;
                        NodeTest::Wildcard
                    }
                    _ => {
                        return Err(self.error(format!(
                            "expected attribute name after '@', found {}",
                            self.describe_current()
                        )))
                    }
                };
                Step {
                    axis: Axis::Attribute,
                    node_test,
                }
            }
            Token::Name(name) => Step {
                axis: Axis::Child,
                node_test: NodeTest::Name(local_name(&name, start)?),
            },
            Token::Star => Step {
                axis: Axis::Child,
                node_test: NodeTest::Wildcard,
            },
            Token::NodeType(kind) => {
                self.expect(&Token::LeftParen)?;
                self.expect(&Token::RightParen)?;
                let node_test = match kind.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    _ => {
                        return Err(PatternError::new(
                            format!("unsupported node test '{kind}()'"),
                            start,
                        ))
                    }
                };
                Step {
                    axis: Axis::Child,
                    node_test,
                }
            }
            Token::DotDot => {
                return Err(PatternError::new("reverse axes are not supported", start));
            }
            other => {
                return Err(PatternError::new(
                    format!("unexpected token '{other}'"),
                    start,
                ))
            }
        };
        Ok(step)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Rejects qualified names; element and attribute tests use local names.
fn local_name(name: &str, position: usize) -> Result<String, PatternError> {
    if name.contains(':') {
        return Err(PatternError::new(
            format!("namespace prefixes are not supported: '{name}'"),
            position,
        ));
    }
    Ok(name.to_string())
}

fn describe_arity(min: usize, max: usize) -> String {
    match (min, max) {
        (0, 0) => "no arguments".to_string(),
        (1, 1) => "1 argument".to_string(),
        (a, b) if a == b => format!("{a} arguments"),
        (a, b) => format!("{a} to {b} arguments"),
    }
}
