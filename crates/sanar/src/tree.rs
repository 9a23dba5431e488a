//! UI tree snapshots parsed into a queryable element tree.
//!
//! A snapshot is the serialized markup an adapter returns: rendered HTML for
//! web technologies, Appium page-source XML for mobile. The parser is lenient
//! (unclosed elements are closed at end of input, mismatched end tags pop to
//! the nearest matching ancestor) but rejects input that yields no elements,
//! which is how adapters signal an unavailable tree.
//!
//! Nodes are stored in document (pre-order) order, so [`NodeId`] ordering is
//! document ordering.

use crate::result::{SanarError, SanarResult};
use std::fmt::Write as _;

/// Elements whose content is never parsed as markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// HTML elements that never have children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements dropped when preparing a tree for a prompt
const PROMPT_SKIPPED_ELEMENTS: &[&str] = &["script", "style", "svg", "noscript", "template"];

/// Attributes kept when preparing a tree for a prompt
const PROMPT_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "class",
    "role",
    "placeholder",
    "value",
    "href",
    "title",
    "alt",
    "for",
    "aria-label",
    "data-testid",
    "resource-id",
    "content-desc",
    "text",
    "clickable",
    "enabled",
];

/// Index of an element inside a [`UiTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// A single element of the UI tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written in the snapshot
    pub tag: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
    /// Direct text children, trimmed, in order
    pub text_nodes: Vec<String>,
    /// Child elements in order
    pub children: Vec<NodeId>,
    /// Parent element, `None` for roots
    pub parent: Option<NodeId>,
}

impl Element {
    fn new(tag: String, attributes: Vec<(String, String)>, parent: Option<NodeId>) -> Self {
        Self {
            tag,
            attributes,
            text_nodes: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    /// Look up an attribute (name compared case-insensitively)
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the attribute is present
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Whitespace-separated class list
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// Whether the tag matches `name` (case-insensitive)
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }

    /// Direct text joined with single spaces
    #[must_use]
    pub fn own_text(&self) -> String {
        self.text_nodes.join(" ")
    }
}

/// Parsed UI tree snapshot
#[derive(Debug, Clone, Default)]
pub struct UiTree {
    nodes: Vec<Element>,
    roots: Vec<NodeId>,
}

impl UiTree {
    /// Parse a markup snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::TreeParse`] when a tag is left unterminated or
    /// the input contains no elements at all.
    pub fn parse(markup: &str) -> SanarResult<Self> {
        Parser::new(markup).run()
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level elements
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Element by id
    #[must_use]
    pub fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    /// All element ids in document order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Parent of `id`
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).parent
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Descendants of `id` in document order (excluding `id`)
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.element(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.element(next).children.iter().rev().copied());
        }
        out
    }

    /// Siblings of `id` including itself, in order
    #[must_use]
    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.parent(id) {
            Some(parent) => &self.element(parent).children,
            None => &self.roots,
        }
    }

    /// Element sibling immediately before `id`
    #[must_use]
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.siblings(id);
        let pos = siblings.iter().position(|s| *s == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    /// 1-based position of `id` among siblings sharing its tag, plus the count
    #[must_use]
    pub fn index_of_type(&self, id: NodeId) -> (usize, usize) {
        let tag = &self.element(id).tag;
        let mut index = 0;
        let mut total = 0;
        for sibling in self.siblings(id) {
            if self.element(*sibling).tag.eq_ignore_ascii_case(tag) {
                total += 1;
                if *sibling == id {
                    index = total;
                }
            }
        }
        (index, total)
    }

    /// 1-based position of `id` among all element siblings
    #[must_use]
    pub fn index_of_child(&self, id: NodeId) -> usize {
        self.siblings(id)
            .iter()
            .position(|s| *s == id)
            .map_or(0, |p| p + 1)
    }

    /// Text of the element and all its descendants, whitespace-normalized
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = Vec::new();
        self.collect_text(id, &mut parts);
        normalize_space(&parts.join(" "))
    }

    fn collect_text<'a>(&'a self, id: NodeId, parts: &mut Vec<&'a str>) {
        let element = self.element(id);
        if RAW_TEXT_ELEMENTS[..2].iter().any(|t| element.is(t)) {
            return;
        }
        // Text nodes and children interleave in the source; approximate by
        // own text first, which is what matching on visible text needs.
        parts.extend(element.text_nodes.iter().map(String::as_str));
        for child in &element.children {
            self.collect_text(*child, parts);
        }
    }

    /// Compact markup for a generative prompt.
    ///
    /// Drops scripts, styles and comments, keeps only attributes useful for
    /// locating elements and truncates the result to `max_chars`.
    #[must_use]
    pub fn to_prompt_markup(&self, max_chars: usize) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.write_prompt(*root, 0, &mut out);
            if out.len() >= max_chars {
                break;
            }
        }
        truncate_chars(&out, max_chars)
    }

    fn write_prompt(&self, id: NodeId, depth: usize, out: &mut String) {
        let element = self.element(id);
        if PROMPT_SKIPPED_ELEMENTS.iter().any(|t| element.is(t)) {
            return;
        }
        let indent = "  ".repeat(depth.min(20));
        let _ = write!(out, "{indent}<{}", element.tag);
        for (name, value) in &element.attributes {
            if PROMPT_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name)) && !value.is_empty()
            {
                let _ = write!(out, " {name}=\"{}\"", value.replace('"', "&quot;"));
            }
        }
        out.push('>');
        let text = element.own_text();
        if !text.is_empty() {
            out.push_str(&truncate_chars(&text, 80));
        }
        if element.children.is_empty() {
            let _ = writeln!(out, "</{}>", element.tag);
            return;
        }
        out.push('\n');
        for child in &element.children {
            self.write_prompt(*child, depth + 1, out);
        }
        let _ = writeln!(out, "{indent}</{}>", element.tag);
    }
}

/// Collapse runs of whitespace and trim
#[must_use]
pub fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Decode the handful of entities serialized snapshots actually contain
#[must_use]
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(end) = tail.find(';').filter(|e| *e <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Element>,
    roots: Vec<NodeId>,
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            nodes: Vec::new(),
            roots: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> SanarError {
        SanarError::TreeParse {
            message: format!("{} (at byte {})", message.into(), self.pos),
        }
    }

    fn run(mut self) -> SanarResult<UiTree> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(after) = rest.strip_prefix("<!--") {
                let end = after.find("-->").map_or(self.src.len(), |e| self.pos + 4 + e + 3);
                self.pos = end;
            } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
                let len = after.find("]]>").unwrap_or(after.len());
                self.push_text(&after[..len]);
                self.pos = (self.pos + 9 + len + 3).min(self.src.len());
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest.find('>').ok_or_else(|| self.error("unterminated declaration"))?;
                self.pos += end + 1;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.open_tag()?;
            } else {
                let skip = usize::from(rest.starts_with('<'));
                let len = rest[skip..].find('<').map_or(rest.len(), |p| p + skip);
                let text = &rest[..len];
                self.push_text(text);
                self.pos += len;
            }
        }
        if self.nodes.is_empty() {
            return Err(SanarError::TreeParse {
                message: "snapshot contains no elements".to_string(),
            });
        }
        Ok(UiTree {
            nodes: self.nodes,
            roots: self.roots,
        })
    }

    fn push_text(&mut self, raw: &str) {
        let text = normalize_space(&decode_entities(raw));
        if text.is_empty() {
            return;
        }
        if let Some(top) = self.stack.last() {
            self.nodes[top.0].text_nodes.push(text);
        }
    }

    fn close_tag(&mut self) -> SanarResult<()> {
        let rest = self.rest();
        let end = rest.find('>').ok_or_else(|| self.error("unterminated end tag"))?;
        let name = rest[2..end].trim();
        self.pos += end + 1;
        if let Some(depth) = self
            .stack
            .iter()
            .rposition(|id| self.nodes[id.0].tag.eq_ignore_ascii_case(name))
        {
            self.stack.truncate(depth);
        }
        Ok(())
    }

    fn open_tag(&mut self) -> SanarResult<()> {
        let start = self.pos;
        self.pos += 1;
        let name_len = self
            .rest()
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .ok_or_else(|| self.error("unterminated start tag"))?;
        let tag = self.rest()[..name_len].to_string();
        self.pos += name_len;

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                self.pos = start;
                return Err(self.error(format!("unterminated <{tag}> tag")));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            attributes.push(self.attribute()?);
        };

        let parent = self.stack.last().copied();
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element::new(tag.clone(), attributes, parent));
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }

        let lower = tag.to_ascii_lowercase();
        if self_closing || VOID_ELEMENTS.contains(&lower.as_str()) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) {
            let closing = format!("</{lower}");
            let rest = self.rest();
            let end = rest.to_ascii_lowercase().find(&closing).unwrap_or(rest.len());
            if matches!(lower.as_str(), "textarea" | "title") {
                let text = normalize_space(&decode_entities(&rest[..end]));
                if !text.is_empty() {
                    self.nodes[id.0].text_nodes.push(text);
                }
            }
            self.pos += end;
            if self.pos < self.src.len() {
                let gt = self.rest().find('>').map_or(self.rest().len(), |g| g + 1);
                self.pos += gt;
            }
            return Ok(());
        }
        self.stack.push(id);
        Ok(())
    }

    fn attribute(&mut self) -> SanarResult<(String, String)> {
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        if name_len == 0 {
            return Err(self.error("malformed attribute"));
        }
        let name = rest[..name_len].to_string();
        self.pos += name_len;
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Ok((name, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        let rest = self.rest();
        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or_else(|| self.error(format!("unterminated value for '{name}'")))?;
                self.pos += end + 2;
                &rest[1..=end]
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                &rest[..end]
            }
        };
        Ok((name, decode_entities(value)))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }
}
