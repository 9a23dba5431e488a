//! CSS selector evaluation over a [`UiTree`].
//!
//! Supports the subset healing needs: type, `#id`, `.class`, attribute
//! selectors (`=`, `*=`, `^=`, `$=`, `~=`), `:nth-of-type()`, `:nth-child()`,
//! `:first-of-type`, `:last-of-type`, the Playwright text pseudo-classes
//! `:has-text()` and `:text-is()`, selector lists and all four combinators.

use crate::result::{SanarError, SanarResult};
use crate::tree::{NodeId, UiTree};

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssSelector {
    alternatives: Vec<Complex>,
}

/// Compound selectors joined by combinators, stored left to right
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    head: Compound,
    tail: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeTest>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeTest {
    name: String,
    op: AttributeOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    NthOfType(usize),
    NthChild(usize),
    LastOfType,
    HasText(String),
    TextIs(String),
}

impl CssSelector {
    /// Parse a selector list.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::InvalidLocator`] for syntax outside the
    /// supported subset.
    pub fn parse(source: &str) -> SanarResult<Self> {
        let mut parser = Parser {
            src: source,
            pos: 0,
        };
        let mut alternatives = vec![parser.complex()?];
        loop {
            parser.skip_ws();
            if parser.eat(',') {
                alternatives.push(parser.complex()?);
            } else if parser.done() {
                break;
            } else {
                return Err(parser.error("unexpected character"));
            }
        }
        Ok(Self { alternatives })
    }

    /// All matching elements in document order
    #[must_use]
    pub fn select(&self, tree: &UiTree) -> Vec<NodeId> {
        tree.ids().filter(|id| self.matches(tree, *id)).collect()
    }

    /// Whether `id` matches any alternative
    #[must_use]
    pub fn matches(&self, tree: &UiTree, id: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(tree, id))
    }
}

impl Complex {
    fn matches(&self, tree: &UiTree, id: NodeId) -> bool {
        // Right-to-left: the last compound is the subject.
        let mut chain: Vec<(Option<Combinator>, &Compound)> = vec![(None, &self.head)];
        for (comb, compound) in &self.tail {
            chain.push((Some(*comb), compound));
        }
        match_from(tree, id, &chain)
    }
}

fn match_from(tree: &UiTree, id: NodeId, chain: &[(Option<Combinator>, &Compound)]) -> bool {
    let Some(((comb, compound), rest)) = chain.split_last() else {
        return true;
    };
    if !compound.matches(tree, id) {
        return false;
    }
    let Some(comb) = comb else {
        return true;
    };
    match comb {
        Combinator::Child => tree
            .parent(id)
            .is_some_and(|p| match_from(tree, p, rest)),
        Combinator::Descendant => tree.ancestors(id).any(|a| match_from(tree, a, rest)),
        Combinator::Adjacent => tree
            .previous_sibling(id)
            .is_some_and(|s| match_from(tree, s, rest)),
        Combinator::Sibling => tree
            .siblings(id)
            .iter()
            .take_while(|s| **s != id)
            .any(|s| match_from(tree, *s, rest)),
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches(&self, tree: &UiTree, id: NodeId) -> bool {
        let element = tree.element(id);
        if let Some(tag) = &self.tag {
            if !element.is(tag) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if element.attr("id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|c| element.classes().any(|have| have == c))
        {
            return false;
        }
        let attrs_ok = self.attributes.iter().all(|test| {
            let Some(value) = element.attr(&test.name) else {
                return false;
            };
            match &test.op {
                AttributeOp::Exists => true,
                AttributeOp::Equals(v) => value == v,
                AttributeOp::Contains(v) => !v.is_empty() && value.contains(v.as_str()),
                AttributeOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
                AttributeOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
                AttributeOp::Word(v) => value.split_whitespace().any(|w| w == v),
            }
        });
        if !attrs_ok {
            return false;
        }
        self.pseudos.iter().all(|pseudo| match pseudo {
            Pseudo::NthOfType(n) => tree.index_of_type(id).0 == *n,
            Pseudo::NthChild(n) => tree.index_of_child(id) == *n,
            Pseudo::LastOfType => {
                let (index, total) = tree.index_of_type(id);
                index == total
            }
            Pseudo::HasText(text) => tree
                .text_content(id)
                .to_lowercase()
                .contains(&text.to_lowercase()),
            Pseudo::TextIs(text) => element.own_text() == *text,
        })
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> SanarError {
        SanarError::InvalidLocator {
            locator: self.src.to_string(),
            message: format!("{message} at offset {}", self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        rest.len() != trimmed.len()
    }

    fn complex(&mut self) -> SanarResult<Complex> {
        self.skip_ws();
        let head = self.compound()?;
        let mut tail = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let comb = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(',') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.error("expected combinator")),
            };
            if comb != Combinator::Descendant {
                self.pos += 1;
                self.skip_ws();
            }
            tail.push((comb, self.compound()?));
        }
        Ok(Complex { head, tail })
    }

    fn compound(&mut self) -> SanarResult<Compound> {
        let mut compound = Compound::default();
        if self.eat('*') {
            compound.tag = None;
        } else if self.peek().is_some_and(is_ident_start) {
            compound.tag = Some(self.ident()?);
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() && !self.src[..self.pos].ends_with('*') {
            return Err(self.error("empty selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> SanarResult<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                self.pos += escaped.len_utf8();
                out.push(escaped);
            } else if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                self.pos += c.len_utf8();
                out.push(c);
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    fn string(&mut self) -> SanarResult<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                // unquoted attribute value / pseudo argument
                let rest = &self.src[self.pos..];
                let end = rest.find([']', ')']).unwrap_or(rest.len());
                let value = rest[..end].trim().to_string();
                self.pos += end;
                return Ok(value);
            }
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                self.pos += escaped.len_utf8();
                out.push(escaped);
            } else {
                out.push(c);
            }
        }
    }

    fn attribute(&mut self) -> SanarResult<AttributeTest> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let op_char = self.peek();
        let op = if self.eat(']') {
            return Ok(AttributeTest {
                name,
                op: AttributeOp::Exists,
            });
        } else if self.eat('=') {
            '='
        } else if let Some(c @ ('*' | '^' | '$' | '~')) = op_char {
            self.pos += 1;
            if !self.eat('=') {
                return Err(self.error("expected '='"));
            }
            c
        } else {
            return Err(self.error("bad attribute operator"));
        };
        self.skip_ws();
        let value = self.string()?;
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        let op = match op {
            '*' => AttributeOp::Contains(value),
            '^' => AttributeOp::Prefix(value),
            '$' => AttributeOp::Suffix(value),
            '~' => AttributeOp::Word(value),
            _ => AttributeOp::Equals(value),
        };
        Ok(AttributeTest { name, op })
    }

    fn pseudo(&mut self) -> SanarResult<Pseudo> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-of-type" => return Ok(Pseudo::NthOfType(1)),
            "first-child" => return Ok(Pseudo::NthChild(1)),
            "last-of-type" => return Ok(Pseudo::LastOfType),
            _ => {}
        }
        if !self.eat('(') {
            return Err(self.error("expected '('"));
        }
        self.skip_ws();
        let arg = self.string()?;
        self.skip_ws();
        if !self.eat(')') {
            return Err(self.error("expected ')'"));
        }
        let index = || {
            arg.trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| self.error("expected positive index"))
        };
        match name.as_str() {
            "nth-of-type" => Ok(Pseudo::NthOfType(index()?)),
            "nth-child" => Ok(Pseudo::NthChild(index()?)),
            "has-text" => Ok(Pseudo::HasText(arg)),
            "text-is" => Ok(Pseudo::TextIs(arg)),
            _ => Err(self.error("unsupported pseudo-class")),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || c == '\\'
}
