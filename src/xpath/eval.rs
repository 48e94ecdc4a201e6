//! Predicate expression evaluator.
//!
//! Expressions are evaluated against either a built element
//! ([`Context::Node`]) or the attributes of a start tag whose content has not
//! been read yet ([`Context::StartTag`]). The second form only sees
//! attribute steps taken directly from the context element; every other path
//! evaluates to an empty node-set there, which is why the scanner uses it
//! only for [attribute-only](super::ast::Expr::is_attribute_only) predicates.
//!
//! Evaluation never fails: function names and arities were checked by the
//! parser, and type conversions follow the XPath 1.0 coercion rules.

use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, Step};
use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Context<'a> {
    /// A materialized element.
    Node {
        /// The document holding the element.
        doc: &'a Document,
        /// The context element.
        node: NodeId,
    },
    /// The attributes of a start tag, before the element is built.
    StartTag(&'a [Attribute]),
}

/// A member of a node-set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// A node of the context document.
    Node(NodeId),
    /// An attribute, borrowed from its element.
    Attr(&'a Attribute),
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// A node-set, in document order.
    Nodes(Vec<Item<'a>>),
    /// A string.
    String(String),
    /// A number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
}

impl Value<'_> {
    /// Converts the value to a boolean per the `boolean()` function.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Nodes(items) => !items.is_empty(),
            Self::String(s) => !s.is_empty(),
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Boolean(b) => *b,
        }
    }
}

/// Evaluates `expr` in `context`.
#[must_use]
pub fn evaluate<'a>(expr: &Expr, context: Context<'a>) -> Value<'a> {
    Evaluator { context }.eval(expr)
}

struct Evaluator<'a> {
    context: Context<'a>,
}

impl<'a> Evaluator<'a> {
    fn eval(&self, expr: &Expr) -> Value<'a> {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::String(s) => Value::String(s.clone()),
            Expr::BinaryOp { op, left, right } => Value::Boolean(self.eval_binary(*op, left, right)),
            Expr::FunctionCall { function, args } => self.eval_function(*function, args),
            Expr::Path { steps } => Value::Nodes(self.eval_path(steps)),
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> bool {
        match op {
            BinaryOp::And => self.eval(left).to_boolean() && self.eval(right).to_boolean(),
            BinaryOp::Or => self.eval(left).to_boolean() || self.eval(right).to_boolean(),
            _ => self.compare(op, &self.eval(left), &self.eval(right)),
        }
    }

    // --- Location paths ---

    fn eval_path(&self, steps: &[Step]) -> Vec<Item<'a>> {
        let (doc, node) = match self.context {
            Context::Node { doc, node } => (doc, node),
            Context::StartTag(attributes) => {
                return match steps {
                    [step] if step.axis == Axis::Attribute => attributes
                        .iter()
                        .filter(|a| attribute_matches(a, &step.node_test))
                        .map(Item::Attr)
                        .collect(),
                    _ => Vec::new(),
                };
            }
        };

        let mut current = vec![node];
        for (i, step) in steps.iter().enumerate() {
            if step.axis == Axis::Attribute {
                // The parser only allows the attribute step last.
                debug_assert_eq!(i + 1, steps.len());
                return current
                    .iter()
                    .flat_map(|&n| doc.attributes(n))
                    .filter(|a| attribute_matches(a, &step.node_test))
                    .map(Item::Attr)
                    .collect();
            }
            let mut next = Vec::new();
            for &n in &current {
                match step.axis {
                    Axis::Child => next.extend(
                        doc.children(n)
                            .filter(|&c| node_matches(doc, c, &step.node_test)),
                    ),
                    Axis::SelfAxis => {
                        if node_matches(doc, n, &step.node_test) {
                            next.push(n);
                        }
                    }
                    Axis::DescendantOrSelf => {
                        next.push(n);
                        next.extend(doc.descendants(n));
                    }
                    Axis::Attribute => {}
                }
            }
            // Overlapping descendant sets can repeat nodes; arena ids follow
            // document order within a subtree.
            next.sort_unstable();
            next.dedup();
            current = next;
        }
        current.into_iter().map(Item::Node).collect()
    }

    // --- Conversions ---

    fn doc(&self) -> Option<&'a Document> {
        match self.context {
            Context::Node { doc, .. } => Some(doc),
            Context::StartTag(_) => None,
        }
    }

    fn item_string(&self, item: Item<'a>) -> String {
        match item {
            Item::Attr(attr) => attr.value.clone(),
            Item::Node(node) => self.doc().map_or_else(String::new, |doc| {
                match &doc.node(node).kind {
                    NodeKind::Element { .. } => doc.text_content(node),
                    _ => doc.node_text(node).unwrap_or_default().to_string(),
                }
            }),
        }
    }

    fn item_name(&self, item: Item<'a>, qualified: bool) -> String {
        match item {
            Item::Attr(attr) => match (&attr.prefix, qualified) {
                (Some(prefix), true) => format!("{prefix}:{}", attr.name),
                _ => attr.name.clone(),
            },
            Item::Node(node) => self.doc().map_or_else(String::new, |doc| {
                let name = doc.node_name(node).unwrap_or_default();
                match (doc.node_prefix(node), qualified) {
                    (Some(prefix), true) => format!("{prefix}:{name}"),
                    _ => name.to_string(),
                }
            }),
        }
    }

    fn string_value(&self, value: &Value<'a>) -> String {
        match value {
            Value::Nodes(items) => items
                .first()
                .map_or_else(String::new, |&item| self.item_string(item)),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    fn number_value(&self, value: &Value<'a>) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            _ => parse_number(&self.string_value(value)),
        }
    }

    /// The context item used by functions called without arguments.
    fn context_value(&self) -> Value<'a> {
        match self.context {
            Context::Node { node, .. } => Value::Nodes(vec![Item::Node(node)]),
            Context::StartTag(_) => Value::Nodes(Vec::new()),
        }
    }

    // --- Comparisons ---

    fn compare(&self, op: BinaryOp, left: &Value<'a>, right: &Value<'a>) -> bool {
        match (left, right) {
            (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|&a| {
                let a = self.item_string(a);
                r.iter()
                    .any(|&b| compare_atoms(op, &Value::String(a.clone()), &Value::String(self.item_string(b))))
            }),
            (Value::Nodes(items), Value::Boolean(_)) => {
                compare_atoms(op, &Value::Boolean(!items.is_empty()), right)
            }
            (Value::Boolean(_), Value::Nodes(items)) => {
                compare_atoms(op, left, &Value::Boolean(!items.is_empty()))
            }
            (Value::Nodes(items), other) => items
                .iter()
                .any(|&item| compare_atoms(op, &self.atomize(item, other), other)),
            (other, Value::Nodes(items)) => items
                .iter()
                .any(|&item| compare_atoms(op, other, &self.atomize(item, other))),
            _ => compare_atoms(op, left, right),
        }
    }

    /// Converts a node-set member to the type of the value it is compared to.
    fn atomize(&self, item: Item<'a>, other: &Value<'a>) -> Value<'a> {
        let s = self.item_string(item);
        match other {
            Value::Number(_) => Value::Number(parse_number(&s)),
            _ => Value::String(s),
        }
    }

    // --- Functions ---

    #[allow(clippy::cast_precision_loss)]
    fn eval_function(&self, function: Function, args: &[Expr]) -> Value<'a> {
        let arg = |i: usize| args.get(i).map_or_else(|| self.context_value(), |e| self.eval(e));
        let string_arg = |i: usize| self.string_value(&arg(i));

        match function {
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Not => Value::Boolean(!arg(0).to_boolean()),
            Function::Boolean => Value::Boolean(arg(0).to_boolean()),
            Function::Count => match arg(0) {
                Value::Nodes(items) => Value::Number(items.len() as f64),
                _ => Value::Number(f64::NAN),
            },
            Function::String => Value::String(string_arg(0)),
            Function::StringLength => Value::Number(string_arg(0).chars().count() as f64),
            Function::NormalizeSpace => {
                Value::String(string_arg(0).split_whitespace().collect::<Vec<_>>().join(" "))
            }
            Function::Number => Value::Number(self.number_value(&arg(0))),
            Function::Contains => Value::Boolean(string_arg(0).contains(&string_arg(1))),
            Function::StartsWith => Value::Boolean(string_arg(0).starts_with(&string_arg(1))),
            Function::Name | Function::LocalName => {
                let qualified = function == Function::Name;
                match arg(0) {
                    Value::Nodes(items) => Value::String(
                        items
                            .first()
                            .map_or_else(String::new, |&item| self.item_name(item, qualified)),
                    ),
                    _ => Value::String(String::new()),
                }
            }
        }
    }
}

fn node_matches(doc: &Document, node: NodeId, test: &NodeTest) -> bool {
    match (test, &doc.node(node).kind) {
        (NodeTest::Node, _) => true,
        (NodeTest::Text, NodeKind::Text { .. } | NodeKind::CData { .. }) => true,
        (NodeTest::Wildcard, NodeKind::Element { .. }) => true,
        (NodeTest::Name(wanted), NodeKind::Element { name, .. }) => name == wanted,
        _ => false,
    }
}

fn attribute_matches(attr: &Attribute, test: &NodeTest) -> bool {
    if attr.is_namespace_decl() {
        return false;
    }
    match test {
        NodeTest::Wildcard | NodeTest::Node => true,
        NodeTest::Name(name) => attr.name == *name,
        NodeTest::Text => false,
    }
}

/// Compares two non-node-set values.
fn compare_atoms(op: BinaryOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    let number = |v: &Value<'_>| match v {
        Value::Number(n) => *n,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::String(s) => parse_number(s),
        Value::Nodes(_) => f64::NAN,
    };
    let string = |v: &Value<'_>| match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::Boolean(b) => b.to_string(),
        Value::Nodes(_) => String::new(),
    };

    #[allow(clippy::float_cmp)]
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                left.to_boolean() == right.to_boolean()
            } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                number(left) == number(right)
            } else {
                string(left) == string(right)
            };
            equal == (op == BinaryOp::Eq)
        }
        BinaryOp::Lt => number(left) < number(right),
        BinaryOp::Lte => number(left) <= number(right),
        BinaryOp::Gt => number(left) > number(right),
        BinaryOp::Gte => number(left) >= number(right),
        BinaryOp::And | BinaryOp::Or => false,
    }
}

/// Formats an `f64` per the XPath number-to-string rules: integers without
/// a decimal point, `NaN`, `Infinity`, and `0` for negative zero.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Parses a string per `number()`: optional `-`, digits, optional fraction,
/// surrounding whitespace allowed. Anything else is `NaN`.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits != "."
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if valid {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}
