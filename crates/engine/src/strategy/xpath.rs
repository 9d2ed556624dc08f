// ABOUTME: A compiled XPath 1.0 subset evaluated directly over scraper's ego-tree DOM.
// ABOUTME: Covers location paths, unions, attribute and text() steps, and the common predicate forms.

//! XPath subset.
//!
//! Supported:
//! - absolute (`/`, `//`) and relative (`.`, `./`, `.//`, `..`, `name/...`) location paths
//! - node tests: element names, `*`, `text()`, `node()`, and a trailing `@attr` / `@*` step
//! - predicates: `[n]`, `[last()]`, `[@a]`, `[@a='v']`, `[@a!='v']`, `[text()='v']`,
//!   `[.='v']`, `contains(x, 'v')`, `starts-with(x, 'v')`, `not(...)`, `and`, `or`, parentheses
//! - unions with `|`
//! - an outer `string(...)` or `normalize-space(...)` wrapper
//!
//! Axis specifiers (`child::`, `following-sibling::`) and arithmetic are not supported; an
//! expression using them fails to compile.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node};
use thiserror::Error;

/// An XPath expression that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid xpath at offset {position}: {message}")]
pub struct XPathError {
    pub position: usize,
    pub message: String,
}

/// One result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum XPathMatch<'a> {
    Element(ElementRef<'a>),
    /// A text node, attribute value, or the result of a string wrapper.
    Value(String),
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    source: String,
    wrapper: Wrapper,
    branches: Vec<Path>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrapper {
    None,
    String,
    NormalizeSpace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Nodes {
        axis: Axis,
        test: NodeTest,
        predicates: Vec<Predicate>,
    },
    /// `@name`, or `@*` when `None`. Only valid as the last step.
    Attribute(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    DescendantOrSelf,
    Parent,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    Test(Cond),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cond {
    Exists(Operand),
    Compare {
        operand: Operand,
        value: String,
        negate: bool,
    },
    Contains(Operand, String),
    StartsWith(Operand, String),
    Not(Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Attr(String),
    Text,
    Context,
}

impl XPath {
    pub fn compile(expression: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: expression.len(),
        };
        let (wrapper, branches) = parser.parse_expression()?;
        Ok(Self {
            source: expression.to_string(),
            wrapper,
            branches,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates against the whole document.
    pub fn select<'a>(&self, html: &'a Html) -> Vec<XPathMatch<'a>> {
        self.evaluate(html.tree.root())
    }

    /// Evaluates with `context` as the context node. Results are in document order.
    pub fn evaluate<'a>(&self, context: NodeRef<'a, Node>) -> Vec<XPathMatch<'a>> {
        let root = context.ancestors().last().unwrap_or(context);
        let order: HashMap<NodeId, usize> = root
            .descendants()
            .enumerate()
            .map(|(idx, node)| (node.id(), idx))
            .collect();

        let mut hits: Vec<Hit<'a>> = Vec::new();
        let mut seen = HashSet::new();
        for path in &self.branches {
            for hit in eval_path(path, context, root, &order) {
                let fresh = match hit {
                    Hit::Node(node) => seen.insert(node.id()),
                    Hit::Attr(..) => true,
                };
                if fresh {
                    hits.push(hit);
                }
            }
        }
        if self.branches.len() > 1 {
            hits.sort_by_key(|hit| order.get(&hit.owner().id()).copied().unwrap_or(usize::MAX));
        }

        match self.wrapper {
            Wrapper::None => hits.into_iter().filter_map(Hit::into_match).collect(),
            Wrapper::String | Wrapper::NormalizeSpace => {
                let Some(first) = hits.first() else {
                    return Vec::new();
                };
                let mut value = match first {
                    Hit::Node(node) => string_value(*node),
                    Hit::Attr(_, value) => value.to_string(),
                };
                if self.wrapper == Wrapper::NormalizeSpace {
                    value = value.split_whitespace().collect::<Vec<_>>().join(" ");
                }
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![XPathMatch::Value(value)]
                }
            }
        }
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPath::compile(s)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Hit<'a> {
    Node(NodeRef<'a, Node>),
    Attr(NodeRef<'a, Node>, &'a str),
}

impl<'a> Hit<'a> {
    fn owner(&self) -> NodeRef<'a, Node> {
        match self {
            Hit::Node(node) | Hit::Attr(node, _) => *node,
        }
    }

    fn into_match(self) -> Option<XPathMatch<'a>> {
        match self {
            Hit::Attr(_, value) => Some(XPathMatch::Value(value.to_string())),
            Hit::Node(node) => match node.value() {
                Node::Element(_) => ElementRef::wrap(node).map(XPathMatch::Element),
                Node::Text(text) => Some(XPathMatch::Value(String::from(&**text))),
                _ => None,
            },
        }
    }
}

fn eval_path<'a>(
    path: &Path,
    context: NodeRef<'a, Node>,
    root: NodeRef<'a, Node>,
    order: &HashMap<NodeId, usize>,
) -> Vec<Hit<'a>> {
    let mut current = vec![if path.absolute { root } else { context }];

    for step in &path.steps {
        match step {
            Step::Attribute(name) => {
                let mut values = Vec::new();
                for node in &current {
                    let Node::Element(el) = node.value() else {
                        continue;
                    };
                    match name {
                        Some(name) => {
                            if let Some(value) = el.attr(name) {
                                values.push(Hit::Attr(*node, value));
                            }
                        }
                        None => values.extend(el.attrs().map(|(_, value)| Hit::Attr(*node, value))),
                    }
                }
                return values;
            }
            Step::Nodes {
                axis,
                test,
                predicates,
            } => {
                let mut next = Vec::new();
                let mut seen = HashSet::new();
                for node in &current {
                    let mut selected: Vec<NodeRef<'a, Node>> = axis_nodes(*node, *axis)
                        .into_iter()
                        .filter(|candidate| test.matches(*candidate))
                        .collect();
                    for predicate in predicates {
                        let size = selected.len();
                        selected = selected
                            .into_iter()
                            .enumerate()
                            .filter(|(idx, candidate)| predicate.matches(*candidate, idx + 1, size))
                            .map(|(_, candidate)| candidate)
                            .collect();
                    }
                    for candidate in selected {
                        if seen.insert(candidate.id()) {
                            next.push(candidate);
                        }
                    }
                }
                next.sort_by_key(|node| order.get(&node.id()).copied().unwrap_or(usize::MAX));
                current = next;
            }
        }
    }

    current.into_iter().map(Hit::Node).collect()
}

fn axis_nodes(node: NodeRef<'_, Node>, axis: Axis) -> Vec<NodeRef<'_, Node>> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::DescendantOrSelf => node.descendants().collect(),
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::SelfNode => vec![node],
    }
}

impl NodeTest {
    fn matches(&self, node: NodeRef<'_, Node>) -> bool {
        match (self, node.value()) {
            (NodeTest::AnyNode, _) => true,
            (NodeTest::Text, Node::Text(_)) => true,
            (NodeTest::AnyElement, Node::Element(_)) => true,
            (NodeTest::Name(name), Node::Element(el)) => el.name().eq_ignore_ascii_case(name),
            _ => false,
        }
    }
}

impl Predicate {
    fn matches(&self, node: NodeRef<'_, Node>, position: usize, size: usize) -> bool {
        match self {
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
            Predicate::Test(cond) => cond.holds(node),
        }
    }
}

impl Cond {
    fn holds(&self, node: NodeRef<'_, Node>) -> bool {
        match self {
            Cond::Exists(Operand::Context) => true,
            Cond::Exists(Operand::Text) => direct_texts(node).any(|t| !t.trim().is_empty()),
            Cond::Exists(Operand::Attr(name)) => attribute(node, name).is_some(),
            Cond::Compare {
                operand,
                value,
                negate,
            } => {
                let value = value.trim();
                operand_values(node, operand)
                    .iter()
                    .any(|v| (v.trim() == value) != *negate)
            }
            Cond::Contains(operand, needle) => operand_values(node, operand)
                .first()
                .is_some_and(|v| v.contains(needle.as_str())),
            Cond::StartsWith(operand, prefix) => operand_values(node, operand)
                .first()
                .is_some_and(|v| v.starts_with(prefix.as_str())),
            Cond::Not(inner) => !inner.holds(node),
            Cond::And(a, b) => a.holds(node) && b.holds(node),
            Cond::Or(a, b) => a.holds(node) || b.holds(node),
        }
    }
}

fn attribute<'a>(node: NodeRef<'a, Node>, name: &str) -> Option<&'a str> {
    match node.value() {
        Node::Element(el) => el.attr(name),
        _ => None,
    }
}

fn direct_texts<'a>(node: NodeRef<'a, Node>) -> impl Iterator<Item = &'a str> {
    node.children().filter_map(|child| match child.value() {
        Node::Text(text) => Some(&**text),
        _ => None,
    })
}

fn operand_values(node: NodeRef<'_, Node>, operand: &Operand) -> Vec<String> {
    match operand {
        Operand::Attr(name) => attribute(node, name).map(str::to_string).into_iter().collect(),
        Operand::Text => direct_texts(node).map(str::to_string).collect(),
        Operand::Context => vec![string_value(node)],
    }
}

/// Concatenation of every descendant text node.
fn string_value(node: NodeRef<'_, Node>) -> String {
    node.descendants()
        .filter_map(|n| match n.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Lexing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    Pipe,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Eq,
    NotEq,
    Name(String),
    Literal(String),
    Number(usize),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, XPathError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |position: usize, message: &str| XPathError {
        position,
        message: message.to_string(),
    };

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let single = match c {
            '/' if next == Some('/') => {
                tokens.push((pos, Token::DoubleSlash));
                i += 2;
                continue;
            }
            '.' if next == Some('.') => {
                tokens.push((pos, Token::DotDot));
                i += 2;
                continue;
            }
            '!' if next == Some('=') => {
                tokens.push((pos, Token::NotEq));
                i += 2;
                continue;
            }
            '/' => Some(Token::Slash),
            '.' => Some(Token::Dot),
            '@' => Some(Token::At),
            '*' => Some(Token::Star),
            '|' => Some(Token::Pipe),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((pos, token));
            i += 1;
            continue;
        }

        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' || c == '"' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].1 != c {
                end += 1;
            }
            if end >= chars.len() {
                return Err(err(pos, "unterminated string literal"));
            }
            let literal: String = chars[start..end].iter().map(|(_, c)| *c).collect();
            tokens.push((pos, Token::Literal(literal)));
            i = end + 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let n = digits
                .parse::<usize>()
                .map_err(|_| err(pos, "position out of range"))?;
            tokens.push((pos, Token::Number(n)));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && {
                let c = chars[i].1;
                c.is_alphanumeric() || c == '-' || c == '_'
            } {
                i += 1;
            }
            let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            tokens.push((pos, Token::Name(name)));
        } else {
            return Err(err(pos, &format!("unexpected character `{c}`")));
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn peek_name(&self, offset: usize) -> Option<&str> {
        match self.peek_at(offset) {
            Some(Token::Name(name)) => Some(name),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        XPathError {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    fn expect_literal(&mut self) -> Result<String, XPathError> {
        match self.peek() {
            Some(Token::Literal(value)) => {
                let value = value.clone();
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error("expected string literal")),
        }
    }

    fn is_call(&self, name: &str) -> bool {
        self.peek_name(0) == Some(name) && self.peek_at(1) == Some(&Token::LParen)
    }

    fn parse_expression(&mut self) -> Result<(Wrapper, Vec<Path>), XPathError> {
        let wrapper = if self.is_call("string") {
            Wrapper::String
        } else if self.is_call("normalize-space") {
            Wrapper::NormalizeSpace
        } else {
            Wrapper::None
        };

        let branches = if wrapper == Wrapper::None {
            self.parse_union()?
        } else {
            self.pos += 2;
            let branches = self.parse_union()?;
            self.expect(Token::RParen)?;
            branches
        };

        if self.pos < self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok((wrapper, branches))
    }

    fn parse_union(&mut self) -> Result<Vec<Path>, XPathError> {
        let mut paths = vec![self.parse_path()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            paths.push(self.parse_path()?);
        }
        Ok(paths)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_))
        )
    }

    fn parse_path(&mut self) -> Result<Path, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(Path {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            let deep = match self.peek() {
                Some(Token::Slash) => false,
                Some(Token::DoubleSlash) => true,
                _ => break,
            };
            if matches!(steps.last(), Some(Step::Attribute(_))) {
                return Err(self.error("attribute step must be last"));
            }
            self.pos += 1;
            if deep {
                steps.push(descendant_or_self());
            }
            steps.push(self.parse_step()?);
        }

        Ok(Path { absolute, steps })
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        let (axis, test) = match self.advance() {
            Some(Token::Dot) => (Axis::SelfNode, NodeTest::AnyNode),
            Some(Token::DotDot) => (Axis::Parent, NodeTest::AnyNode),
            Some(Token::At) => {
                return match self.advance() {
                    Some(Token::Name(name)) => Ok(Step::Attribute(Some(name.to_ascii_lowercase()))),
                    Some(Token::Star) => Ok(Step::Attribute(None)),
                    _ => Err(self.error("expected attribute name")),
                };
            }
            Some(Token::Star) => (Axis::Child, NodeTest::AnyElement),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    self.expect(Token::RParen)?;
                    let test = match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::AnyNode,
                        other => return Err(self.error(format!("unsupported node test `{other}()`"))),
                    };
                    (Axis::Child, test)
                } else {
                    (Axis::Child, NodeTest::Name(name.to_ascii_lowercase()))
                }
            }
            _ => return Err(self.error("expected location step")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_predicate()?);
            self.expect(Token::RBracket)?;
        }

        Ok(Step::Nodes {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, XPathError> {
        if let (Some(Token::Number(n)), Some(Token::RBracket)) = (self.peek(), self.peek_at(1)) {
            let n = *n;
            self.pos += 1;
            return Ok(Predicate::Position(n));
        }
        if self.is_call("last")
            && self.peek_at(2) == Some(&Token::RParen)
            && self.peek_at(3) == Some(&Token::RBracket)
        {
            self.pos += 3;
            return Ok(Predicate::Last);
        }
        Ok(Predicate::Test(self.parse_or()?))
    }

    fn parse_or(&mut self) -> Result<Cond, XPathError> {
        let mut cond = self.parse_and()?;
        while self.peek_name(0) == Some("or") {
            self.pos += 1;
            cond = Cond::Or(Box::new(cond), Box::new(self.parse_and()?));
        }
        Ok(cond)
    }

    fn parse_and(&mut self) -> Result<Cond, XPathError> {
        let mut cond = self.parse_unary()?;
        while self.peek_name(0) == Some("and") {
            self.pos += 1;
            cond = Cond::And(Box::new(cond), Box::new(self.parse_unary()?));
        }
        Ok(cond)
    }

    fn parse_unary(&mut self) -> Result<Cond, XPathError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let cond = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(cond);
        }
        if self.is_call("not") {
            self.pos += 2;
            let cond = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(Cond::Not(Box::new(cond)));
        }
        for (name, contains) in [("contains", true), ("starts-with", false)] {
            if self.is_call(name) {
                self.pos += 2;
                let operand = self.parse_operand()?;
                self.expect(Token::Comma)?;
                let value = self.expect_literal()?;
                self.expect(Token::RParen)?;
                return Ok(if contains {
                    Cond::Contains(operand, value)
                } else {
                    Cond::StartsWith(operand, value)
                });
            }
        }

        let operand = self.parse_operand()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(Cond::Exists(operand)),
        };
        self.pos += 1;
        let value = self.expect_literal()?;
        Ok(Cond::Compare {
            operand,
            value,
            negate,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, XPathError> {
        match self.advance() {
            Some(Token::At) => match self.advance() {
                Some(Token::Name(name)) => Ok(Operand::Attr(name.to_ascii_lowercase())),
                _ => Err(self.error("expected attribute name")),
            },
            Some(Token::Dot) => Ok(Operand::Context),
            Some(Token::Name(name)) if name == "text" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Operand::Text)
            }
            _ => Err(self.error("expected `@attr`, `text()` or `.`")),
        }
    }
}

fn descendant_or_self() -> Step {
    Step::Nodes {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::AnyNode,
        predicates: Vec::new(),
    }
}
