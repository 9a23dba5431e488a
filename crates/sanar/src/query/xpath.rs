//! XPath 1.0 subset evaluation over a [`UiTree`].
//!
//! Covers location paths with the common axes, node tests, predicates with
//! positions, boolean and comparison operators, unions, parenthesised
//! filter expressions (`(//a)[2]`) and the string functions locators use in
//! practice (`contains`, `starts-with`, `normalize-space`, `concat` ...).
//! Text nodes follow their element's children within a parent; mixed content
//! ordering is not preserved by the tree.

use crate::result::{SanarError, SanarResult};
use crate::tree::{NodeId, UiTree};

/// A compiled XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct XPathQuery {
    expr: Expr,
}

impl XPathQuery {
    /// Compile an expression.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::InvalidLocator`] on syntax errors, unknown
    /// functions or wrong function arity.
    pub fn parse(source: &str) -> SanarResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing tokens"));
        }
        Ok(Self { expr })
    }

    /// Matching elements in document order.
    ///
    /// Expressions that select attributes, text or scalar values match no
    /// elements.
    #[must_use]
    pub fn select(&self, tree: &UiTree) -> Vec<NodeId> {
        let eval = Evaluator { tree };
        let ctx = Context {
            node: Node::Root,
            position: 1,
            size: 1,
        };
        match eval.eval(&self.expr, &ctx) {
            Value::Nodes(nodes) => nodes
                .into_iter()
                .filter_map(|n| match n {
                    Node::Element(id) => Some(id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    Star,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Name(String),
    Axis(String),
    Literal(String),
    Number(f64),
}

fn tokenize(source: &str) -> SanarResult<Vec<Token>> {
    let err = |message: String| SanarError::InvalidLocator {
        locator: source.to_string(),
        message,
    };
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '@' => Token::At,
            ',' => Token::Comma,
            '|' => Token::Pipe,
            '*' => Token::Star,
            '=' => Token::Eq,
            '!' if next == Some('=') => {
                i += 1;
                Token::Neq
            }
            '<' if next == Some('=') => {
                i += 1;
                Token::Le
            }
            '<' => Token::Lt,
            '>' if next == Some('=') => {
                i += 1;
                Token::Ge
            }
            '>' => Token::Gt,
            '.' if next == Some('.') => {
                i += 1;
                Token::DotDot
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => Token::Dot,
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| err("unterminated string literal".into()))?;
                let literal: String = chars[i + 1..i + 1 + end].iter().collect();
                i += end + 1;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|ch| ch.is_ascii_digit() || **ch == '.')
                    .count();
                let text: String = chars[i..i + len].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("bad number '{text}'")))?;
                i += len - 1;
                Token::Number(number)
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
                    .count();
                let name: String = chars[i..i + len].iter().collect();
                i += len;
                let mut j = i;
                while chars.get(j).is_some_and(|ch| ch.is_whitespace()) {
                    j += 1;
                }
                if chars.get(j) == Some(&':') && chars.get(j + 1) == Some(&':') {
                    i = j + 2;
                    tokens.push(Token::Axis(name));
                } else {
                    tokens.push(Token::Name(name));
                }
                continue;
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        };
        tokens.push(token);
        i += 1;
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Union(Vec<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    Path(Path),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Contains,
    StartsWith,
    EndsWith,
    NormalizeSpace,
    String,
    StringLength,
    Concat,
    Translate,
    Not,
    True,
    False,
    Position,
    Last,
    Count,
    Name,
}

impl Function {
    fn lookup(name: &str) -> Option<(Self, usize, usize)> {
        let entry = match name {
            "contains" => (Self::Contains, 2, 2),
            "starts-with" => (Self::StartsWith, 2, 2),
            "ends-with" => (Self::EndsWith, 2, 2),
            "normalize-space" => (Self::NormalizeSpace, 0, 1),
            "string" => (Self::String, 0, 1),
            "string-length" => (Self::StringLength, 0, 1),
            "concat" => (Self::Concat, 2, usize::MAX),
            "translate" => (Self::Translate, 3, 3),
            "not" => (Self::Not, 1, 1),
            "true" => (Self::True, 0, 0),
            "false" => (Self::False, 0, 0),
            "position" => (Self::Position, 0, 0),
            "last" => (Self::Last, 0, 0),
            "count" => (Self::Count, 1, 1),
            "name" | "local-name" => (Self::Name, 0, 1),
            _ => return None,
        };
        Some(entry)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    start: Start,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
enum Start {
    Root,
    Context,
    Filter(Box<Expr>, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    const fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    SelfAxis,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        let axis = match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            "self" => Self::SelfAxis,
            "attribute" => Self::Attribute,
            _ => return None,
        };
        Some(axis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> SanarError {
        SanarError::InvalidLocator {
            locator: self.source.to_string(),
            message: format!("{message} at token {}", self.pos),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> SanarResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> SanarResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> SanarResult<Expr> {
        let mut left = self.comparison()?;
        while self.eat_keyword("and") {
            let right = self.comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> SanarResult<Expr> {
        let mut left = self.union()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Neq) => CompareOp::Neq,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.union()?;
            left = Expr::Compare(Box::new(left), op, Box::new(right));
        }
    }

    fn union(&mut self) -> SanarResult<Expr> {
        let first = self.path_expr()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.eat(&Token::Pipe) {
            parts.push(self.path_expr()?);
        }
        Ok(Expr::Union(parts))
    }

    fn path_expr(&mut self) -> SanarResult<Expr> {
        match self.peek().cloned() {
            Some(Token::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                let predicates = self.predicates()?;
                let steps = self.continuation()?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(inner);
                }
                Ok(Expr::Path(Path {
                    start: Start::Filter(Box::new(inner), predicates),
                    steps,
                }))
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen)
                    && !matches!(name.as_str(), "text" | "node") =>
            {
                self.call(&name)
            }
            _ => self.location_path(),
        }
    }

    fn call(&mut self, name: &str) -> SanarResult<Expr> {
        let (function, min, max) =
            Function::lookup(name).ok_or_else(|| self.error(&format!("unknown function {name}()")))?;
        self.pos += 2;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }
        if args.len() < min || args.len() > max {
            return Err(self.error(&format!("wrong number of arguments to {name}()")));
        }
        Ok(Expr::Call(function, args))
    }

    fn location_path(&mut self) -> SanarResult<Expr> {
        let (start, mut steps) = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.at_step() {
                    return Ok(Expr::Path(Path {
                        start: Start::Root,
                        steps: Vec::new(),
                    }));
                }
                (Start::Root, Vec::new())
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                (Start::Root, vec![Step::descendant_or_self()])
            }
            _ if self.at_step() => (Start::Context, Vec::new()),
            _ => return Err(self.error("expected expression")),
        };
        steps.push(self.step()?);
        steps.extend(self.continuation()?);
        Ok(Expr::Path(Path { start, steps }))
    }

    fn continuation(&mut self) -> SanarResult<Vec<Step>> {
        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn at_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::Axis(_)
                    | Token::Name(_)
                    | Token::Star
            )
        )
    }

    fn step(&mut self) -> SanarResult<Step> {
        let axis = match self.peek().cloned() {
            Some(Token::Dot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::SelfAxis,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::Axis(name)) => {
                self.pos += 1;
                Axis::from_name(&name).ok_or_else(|| self.error(&format!("unknown axis {name}")))?
            }
            _ => Axis::Child,
        };
        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 2;
                self.expect(&Token::RParen, "')'")?;
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    _ => return Err(self.error("unexpected function in path")),
                }
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                NodeTest::Name(name)
            }
            _ => return Err(self.error("expected node test")),
        };
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicates(&mut self) -> SanarResult<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(&Token::RBracket, "']'")?;
        }
        Ok(predicates)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Node {
    Root,
    Element(NodeId),
    Attribute(NodeId, usize),
    Text(NodeId, usize),
}

impl Node {
    fn order_key(self) -> (usize, u8, usize) {
        match self {
            Self::Root => (0, 0, 0),
            Self::Element(id) => (id.0 + 1, 0, 0),
            Self::Attribute(id, i) => (id.0 + 1, 1, i),
            Self::Text(id, i) => (id.0 + 1, 2, i),
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<Node>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Context {
    node: Node,
    position: usize,
    size: usize,
}

struct Evaluator<'t> {
    tree: &'t UiTree,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, ctx: &Context) -> Value {
        match expr {
            Expr::Or(a, b) => Value::Bool(self.boolean(a, ctx) || self.boolean(b, ctx)),
            Expr::And(a, b) => Value::Bool(self.boolean(a, ctx) && self.boolean(b, ctx)),
            Expr::Compare(a, op, b) => {
                let left = self.eval(a, ctx);
                let right = self.eval(b, ctx);
                Value::Bool(self.compare(&left, *op, &right))
            }
            Expr::Union(parts) => {
                let mut nodes = Vec::new();
                for part in parts {
                    if let Value::Nodes(found) = self.eval(part, ctx) {
                        nodes.extend(found);
                    }
                }
                Value::Nodes(document_order(nodes))
            }
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Call(function, args) => self.call(*function, args, ctx),
            Expr::Path(path) => Value::Nodes(self.path(path, ctx)),
        }
    }

    fn boolean(&self, expr: &Expr, ctx: &Context) -> bool {
        self.to_bool(&self.eval(expr, ctx))
    }

    fn string(&self, expr: &Expr, ctx: &Context) -> String {
        self.to_string(&self.eval(expr, ctx))
    }

    fn to_bool(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|n| self.string_value(*n))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.to_string(other)),
        }
    }

    fn string_value(&self, node: Node) -> String {
        match node {
            Node::Root => self
                .tree
                .roots()
                .iter()
                .map(|r| self.tree.text_content(*r))
                .collect::<Vec<_>>()
                .join(" "),
            Node::Element(id) => self.tree.text_content(id),
            Node::Attribute(id, i) => self.tree.element(id).attributes[i].1.clone(),
            Node::Text(id, i) => self.tree.element(id).text_nodes[i].clone(),
        }
    }

    fn compare(&self, left: &Value, op: CompareOp, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let xs = self.string_value(*x);
                b.iter().any(|y| {
                    compare_atoms(&Value::Str(xs.clone()), op, &Value::Str(self.string_value(*y)), self)
                })
            }),
            (Value::Nodes(nodes), other) => match other {
                Value::Bool(_) => compare_atoms(&Value::Bool(!nodes.is_empty()), op, other, self),
                _ => nodes
                    .iter()
                    .any(|n| compare_atoms(&Value::Str(self.string_value(*n)), op, other, self)),
            },
            (other, Value::Nodes(nodes)) => match other {
                Value::Bool(_) => compare_atoms(other, op, &Value::Bool(!nodes.is_empty()), self),
                _ => nodes
                    .iter()
                    .any(|n| compare_atoms(other, op, &Value::Str(self.string_value(*n)), self)),
            },
            _ => compare_atoms(left, op, right, self),
        }
    }

    fn call(&self, function: Function, args: &[Expr], ctx: &Context) -> Value {
        let arg_string = |i: usize| -> String {
            args.get(i).map_or_else(
                || self.string_value(ctx.node),
                |a| self.string(a, ctx),
            )
        };
        match function {
            Function::Contains => Value::Bool(arg_string(0).contains(&arg_string(1))),
            Function::StartsWith => Value::Bool(arg_string(0).starts_with(&arg_string(1))),
            Function::EndsWith => Value::Bool(arg_string(0).ends_with(&arg_string(1))),
            Function::NormalizeSpace => Value::Str(crate::tree::normalize_space(&arg_string(0))),
            Function::String => Value::Str(arg_string(0)),
            Function::StringLength => {
                #[allow(clippy::cast_precision_loss)]
                let len = arg_string(0).chars().count() as f64;
                Value::Num(len)
            }
            Function::Concat => Value::Str(args.iter().map(|a| self.string(a, ctx)).collect()),
            Function::Translate => {
                let from: Vec<char> = arg_string(1).chars().collect();
                let to: Vec<char> = arg_string(2).chars().collect();
                let out = arg_string(0)
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Value::Str(out)
            }
            Function::Not => Value::Bool(!args.first().is_some_and(|a| self.boolean(a, ctx))),
            Function::True => Value::Bool(true),
            Function::False => Value::Bool(false),
            #[allow(clippy::cast_precision_loss)]
            Function::Position => Value::Num(ctx.position as f64),
            #[allow(clippy::cast_precision_loss)]
            Function::Last => Value::Num(ctx.size as f64),
            Function::Count => {
                let count = match args.first().map(|a| self.eval(a, ctx)) {
                    Some(Value::Nodes(nodes)) => nodes.len(),
                    _ => 0,
                };
                #[allow(clippy::cast_precision_loss)]
                Value::Num(count as f64)
            }
            Function::Name => {
                let node = match args.first().map(|a| self.eval(a, ctx)) {
                    Some(Value::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => None,
                    None => Some(ctx.node),
                };
                let name = match node {
                    Some(Node::Element(id)) => self.tree.element(id).tag.clone(),
                    Some(Node::Attribute(id, i)) => self.tree.element(id).attributes[i].0.clone(),
                    _ => String::new(),
                };
                Value::Str(name)
            }
        }
    }

    fn path(&self, path: &Path, ctx: &Context) -> Vec<Node> {
        let mut current = match &path.start {
            Start::Root => vec![Node::Root],
            Start::Context => vec![ctx.node],
            Start::Filter(expr, predicates) => match self.eval(expr, ctx) {
                Value::Nodes(nodes) => self.filter(document_order(nodes), predicates),
                _ => Vec::new(),
            },
        };
        for step in &path.steps {
            let mut next = Vec::new();
            for node in &current {
                let candidates: Vec<Node> = self
                    .axis(*node, step.axis)
                    .into_iter()
                    .filter(|n| self.test(*n, &step.test))
                    .collect();
                next.extend(self.filter(candidates, &step.predicates));
            }
            current = document_order(next);
        }
        current
    }

    fn filter(&self, mut nodes: Vec<Node>, predicates: &[Expr]) -> Vec<Node> {
        for predicate in predicates {
            let size = nodes.len();
            nodes = nodes
                .into_iter()
                .enumerate()
                .filter(|(i, node)| {
                    let ctx = Context {
                        node: *node,
                        position: i + 1,
                        size,
                    };
                    match self.eval(predicate, &ctx) {
                        #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
                        Value::Num(n) => n == (i + 1) as f64,
                        other => self.to_bool(&other),
                    }
                })
                .map(|(_, node)| node)
                .collect();
        }
        nodes
    }

    fn test(&self, node: Node, test: &NodeTest) -> bool {
        match (test, node) {
            (NodeTest::Node, _) => true,
            (NodeTest::Text, Node::Text(..)) => true,
            (NodeTest::Any, Node::Element(_) | Node::Attribute(..)) => true,
            (NodeTest::Name(name), Node::Element(id)) => self.tree.element(id).is(name),
            (NodeTest::Name(name), Node::Attribute(id, i)) => {
                self.tree.element(id).attributes[i].0.eq_ignore_ascii_case(name)
            }
            _ => false,
        }
    }

    /// Nodes along `axis`, in proximity order (reverse axes nearest first)
    fn axis(&self, node: Node, axis: Axis) -> Vec<Node> {
        let tree = self.tree;
        match (axis, node) {
            (Axis::SelfAxis, _) => vec![node],
            (Axis::Child, Node::Root) => tree.roots().iter().map(|r| Node::Element(*r)).collect(),
            (Axis::Child, Node::Element(id)) => self.children(id),
            (Axis::Descendant, Node::Root) => self.all_below(tree.roots()),
            (Axis::Descendant, Node::Element(id)) => self.all_below(&tree.element(id).children),
            (Axis::DescendantOrSelf, Node::Root | Node::Element(_)) => {
                let mut out = vec![node];
                out.extend(self.axis(node, Axis::Descendant));
                out
            }
            (Axis::Parent, Node::Element(id)) => {
                vec![tree.parent(id).map_or(Node::Root, Node::Element)]
            }
            (Axis::Parent, Node::Attribute(id, _) | Node::Text(id, _)) => vec![Node::Element(id)],
            (Axis::Ancestor | Axis::AncestorOrSelf, Node::Element(id)) => {
                let mut out = Vec::new();
                if axis == Axis::AncestorOrSelf {
                    out.push(node);
                }
                out.extend(tree.ancestors(id).map(Node::Element));
                out.push(Node::Root);
                out
            }
            (Axis::AncestorOrSelf, Node::Root) => vec![Node::Root],
            (Axis::FollowingSibling, Node::Element(id)) => tree
                .siblings(id)
                .iter()
                .skip_while(|s| **s != id)
                .skip(1)
                .map(|s| Node::Element(*s))
                .collect(),
            (Axis::PrecedingSibling, Node::Element(id)) => tree
                .siblings(id)
                .iter()
                .take_while(|s| **s != id)
                .copied()
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .map(Node::Element)
                .collect(),
            (Axis::Following, Node::Element(id)) => {
                let last = tree.descendants(id).last().copied().unwrap_or(id);
                tree.ids()
                    .filter(|other| *other > last)
                    .map(Node::Element)
                    .collect()
            }
            (Axis::Preceding, Node::Element(id)) => {
                let ancestors: Vec<NodeId> = tree.ancestors(id).collect();
                tree.ids()
                    .take_while(|other| *other < id)
                    .filter(|other| !ancestors.contains(other))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .map(Node::Element)
                    .collect()
            }
            (Axis::Attribute, Node::Element(id)) => (0..tree.element(id).attributes.len())
                .map(|i| Node::Attribute(id, i))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn children(&self, id: NodeId) -> Vec<Node> {
        let element = self.tree.element(id);
        element
            .children
            .iter()
            .map(|c| Node::Element(*c))
            .chain((0..element.text_nodes.len()).map(|i| Node::Text(id, i)))
            .collect()
    }

    fn all_below(&self, tops: &[NodeId]) -> Vec<Node> {
        let mut out = Vec::new();
        for top in tops {
            for id in std::iter::once(*top).chain(self.tree.descendants(*top)) {
                out.push(Node::Element(id));
                let texts = self.tree.element(id).text_nodes.len();
                out.extend((0..texts).map(|i| Node::Text(id, i)));
            }
        }
        out
    }
}

fn compare_atoms(left: &Value, op: CompareOp, right: &Value, eval: &Evaluator<'_>) -> bool {
    match op {
        CompareOp::Eq | CompareOp::Neq => {
            let equal = if matches!(left, Value::Bool(_)) || matches!(right, Value::Bool(_)) {
                eval.to_bool(left) == eval.to_bool(right)
            } else if matches!(left, Value::Num(_)) || matches!(right, Value::Num(_)) {
                #[allow(clippy::float_cmp)]
                let eq = eval.to_number(left) == eval.to_number(right);
                eq
            } else {
                eval.to_string(left) == eval.to_string(right)
            };
            (op == CompareOp::Eq) == equal
        }
        CompareOp::Lt => eval.to_number(left) < eval.to_number(right),
        CompareOp::Le => eval.to_number(left) <= eval.to_number(right),
        CompareOp::Gt => eval.to_number(left) > eval.to_number(right),
        CompareOp::Ge => eval.to_number(left) >= eval.to_number(right),
    }
}

fn document_order(mut nodes: Vec<Node>) -> Vec<Node> {
    nodes.sort_by_key(|n| n.order_key());
    nodes.dedup();
    nodes
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}
