//! Abstract syntax tree for predicate expressions.
//!
//! The primary type is [`Expr`]. Location paths are sequences of [`Step`]s,
//! each an [`Axis`] and a [`NodeTest`]; steps never carry predicates of
//! their own.

use std::fmt;

/// A predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (e.g., `42`, `3.14`).
    Number(f64),

    /// A string literal (e.g., `"hello"` or `'world'`).
    String(String),

    /// A binary operation (e.g., `@a = 'x'`, `p and q`).
    BinaryOp {
        /// The operator.
        op: BinaryOp,
        /// The left-hand operand.
        left: Box<Expr>,
        /// The right-hand operand.
        right: Box<Expr>,
    },

    /// A call to one of the built-in functions.
    FunctionCall {
        /// The function.
        function: Function,
        /// The argument expressions, already checked against the arity.
        args: Vec<Expr>,
    },

    /// A location path relative to the context node (e.g., `item/@id`).
    Path {
        /// The steps in the path, evaluated left to right.
        steps: Vec<Step>,
    },
}

impl Expr {
    /// Returns `true` if the expression can be evaluated from a start tag's
    /// attributes alone, without the element's content.
    ///
    /// That holds when every location path in it is a single attribute step
    /// and no function reads the context node implicitly.
    #[must_use]
    pub fn is_attribute_only(&self) -> bool {
        match self {
            Self::Number(_) | Self::String(_) => true,
            Self::BinaryOp { left, right, .. } => left.is_attribute_only() && right.is_attribute_only(),
            Self::FunctionCall { function, args } => {
                !(args.is_empty() && function.defaults_to_context())
                    && args.iter().all(Self::is_attribute_only)
            }
            Self::Path { steps } => matches!(steps.as_slice(), [step] if step.axis == Axis::Attribute),
        }
    }
}

/// Binary operators, lowest precedence last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `and`
    And,
    /// `or`
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

/// A single location step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The axis to traverse.
    pub axis: Axis,
    /// Which nodes on that axis are kept.
    pub node_test: NodeTest,
}

/// The forward axes a step can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Children of the context node.
    Child,
    /// The context node itself (`.`).
    SelfAxis,
    /// The context node and all its descendants (the first half of `//`).
    DescendantOrSelf,
    /// Attributes of the context element (`@`).
    Attribute,
}

/// A node test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Nodes with this local name.
    Name(String),
    /// `*` -- any element (or any attribute on the attribute axis).
    Wildcard,
    /// `text()` -- text and CDATA nodes.
    Text,
    /// `node()` -- any node.
    Node,
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Wildcard => f.write_str("*"),
            Self::Text => f.write_str("text()"),
            Self::Node => f.write_str("node()"),
        }
    }
}

/// The built-in function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `not(boolean)`
    Not,
    /// `true()`
    True,
    /// `false()`
    False,
    /// `boolean(object)`
    Boolean,
    /// `count(node-set)`
    Count,
    /// `string(object?)`
    String,
    /// `string-length(string?)`
    StringLength,
    /// `normalize-space(string?)`
    NormalizeSpace,
    /// `number(object?)`
    Number,
    /// `contains(string, string)`
    Contains,
    /// `starts-with(string, string)`
    StartsWith,
    /// `name(node-set?)`
    Name,
    /// `local-name(node-set?)`
    LocalName,
}

impl Function {
    /// Looks up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            "boolean" => Self::Boolean,
            "count" => Self::Count,
            "string" => Self::String,
            "string-length" => Self::StringLength,
            "normalize-space" => Self::NormalizeSpace,
            "number" => Self::Number,
            "contains" => Self::Contains,
            "starts-with" => Self::StartsWith,
            "name" => Self::Name,
            "local-name" => Self::LocalName,
            _ => return None,
        })
    }

    /// Returns the accepted argument count range, inclusive.
    #[must_use]
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::True | Self::False => (0, 0),
            Self::Not | Self::Boolean | Self::Count => (1, 1),
            Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number
            | Self::Name
            | Self::LocalName => (0, 1),
            Self::Contains | Self::StartsWith => (2, 2),
        }
    }

    /// Returns `true` for functions whose argument must be a location path.
    #[must_use]
    pub fn takes_node_set(self) -> bool {
        matches!(self, Self::Count | Self::Name | Self::LocalName)
    }

    /// Returns `true` for functions that read the context node when called
    /// without arguments.
    #[must_use]
    pub fn defaults_to_context(self) -> bool {
        self.arity() == (0, 1)
    }
}
