//! Literal fragments recovered from a failed locator.
//!
//! A stale locator usually still names what the author meant: an id that
//! was renamed, a label that moved into another attribute. Those fragments
//! seed candidates that do not depend on the tree, and score tree elements
//! by similarity.

use regex::Regex;
use std::sync::OnceLock;

use crate::locator::{
    css_string, is_css_ident, xpath_string, Dialect, Hint, HintKind, Locator, Strategy,
};

struct Patterns {
    css_id: Regex,
    css_class: Regex,
    css_attribute: Regex,
    css_text: Regex,
    css_tag: Regex,
    xpath_attribute: Regex,
    xpath_contains_attribute: Regex,
    xpath_text: Regex,
    xpath_tag: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                css_id: Regex::new(r"#((?:\\.|[\w-])+)").ok()?,
                css_class: Regex::new(r"\.(-?[_a-zA-Z][\w-]*)").ok()?,
                css_attribute: Regex::new(
                    r#"\[\s*([\w:-]+)\s*[*^$~|]?=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s]+))\s*\]"#,
                )
                .ok()?,
                css_text: Regex::new(r#":(?:has-text|text-is|contains)\(\s*(?:"([^"]*)"|'([^']*)')\s*\)"#)
                    .ok()?,
                css_tag: Regex::new(r"(?:^|[\s>+~])([a-zA-Z][\w-]*)[^\s>+~]*\s*$").ok()?,
                xpath_attribute: Regex::new(r#"@([\w:.-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")"#).ok()?,
                xpath_contains_attribute: Regex::new(
                    r#"(?:contains|starts-with)\(\s*@([\w:.-]+)\s*,\s*(?:'([^']*)'|"([^"]*)")\s*\)"#,
                )
                .ok()?,
                xpath_text: Regex::new(
                    r#"(?:text\(\)|normalize-space\([^)]*\)|\.)\s*(?:=|,)\s*(?:'([^']*)'|"([^"]*)")"#,
                )
                .ok()?,
                xpath_tag: Regex::new(r"/(?:[\w-]+::)?([a-zA-Z_][\w.-]*)\s*(?:\[|$|\))").ok()?,
            })
        })
        .as_ref()
}

/// Extract hints from a locator, strongest first, without duplicates
#[must_use]
pub fn extract(locator: &Locator) -> Vec<Hint> {
    let value = locator.value().trim();
    let mut hints = Vec::new();
    match locator.strategy() {
        Strategy::Id | Strategy::IdOrName => {
            hints.push(Hint::new(HintKind::Id, strip_resource_prefix(value)));
        }
        Strategy::Name => hints.push(Hint::new(HintKind::Name, value)),
        Strategy::Text | Strategy::LinkText | Strategy::AccessibilityId => {
            hints.push(Hint::new(HintKind::Text, value));
        }
        Strategy::ClassName => hints.push(Hint::new(HintKind::Class, value)),
        Strategy::TestId => {
            hints.push(Hint::new(HintKind::Attribute, format!("data-testid={value}")));
        }
        Strategy::Css => extract_css(value, &mut hints),
        Strategy::XPath => extract_xpath(value, &mut hints),
    }
    let mut seen = Vec::new();
    hints.retain(|h| {
        if h.value.is_empty() || seen.contains(h) {
            return false;
        }
        seen.push(h.clone());
        true
    });
    hints
}

fn first_group(caps: &regex::Captures<'_>, from: usize) -> String {
    (from..caps.len())
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn extract_css(value: &str, hints: &mut Vec<Hint>) {
    let Some(p) = patterns() else {
        return;
    };
    // attribute values may contain '#' or '.', so read them first and
    // blank them out before scanning for ids and classes
    let mut scrubbed = value.to_string();
    for caps in p.css_attribute.captures_iter(value) {
        let name = caps[1].to_ascii_lowercase();
        let attr_value = first_group(&caps, 2);
        hints.push(attribute_hint(&name, &attr_value));
        scrubbed = scrubbed.replace(&caps[0], " ");
    }
    for caps in p.css_text.captures_iter(value) {
        hints.push(Hint::new(HintKind::Text, first_group(&caps, 1)));
        scrubbed = scrubbed.replace(&caps[0], " ");
    }
    for caps in p.css_id.captures_iter(&scrubbed) {
        hints.insert(0, Hint::new(HintKind::Id, caps[1].replace('\\', "")));
    }
    for caps in p.css_class.captures_iter(&scrubbed) {
        hints.push(Hint::new(HintKind::Class, &caps[1]));
    }
    if let Some(caps) = p.css_tag.captures(&scrubbed) {
        hints.push(Hint::new(HintKind::Tag, caps[1].to_ascii_lowercase()));
    }
}

fn extract_xpath(value: &str, hints: &mut Vec<Hint>) {
    let Some(p) = patterns() else {
        return;
    };
    for caps in p
        .xpath_attribute
        .captures_iter(value)
        .chain(p.xpath_contains_attribute.captures_iter(value))
    {
        let name = caps[1].to_ascii_lowercase();
        let attr_value = first_group(&caps, 2);
        if name == "class" {
            hints.extend(
                attr_value
                    .split_whitespace()
                    .map(|c| Hint::new(HintKind::Class, c)),
            );
        } else {
            hints.push(attribute_hint(&name, &attr_value));
        }
    }
    for caps in p.xpath_text.captures_iter(value) {
        hints.push(Hint::new(HintKind::Text, first_group(&caps, 1)));
    }
    if let Some(caps) = p.xpath_tag.captures_iter(value).last() {
        let tag = &caps[1];
        if !matches!(tag, "text" | "node" | "contains" | "normalize-space") {
            hints.push(Hint::new(HintKind::Tag, tag));
        }
    }
}

fn attribute_hint(name: &str, value: &str) -> Hint {
    match name {
        "id" => Hint::new(HintKind::Id, value),
        "resource-id" => Hint::new(HintKind::Id, strip_resource_prefix(value)),
        "name" => Hint::new(HintKind::Name, value),
        "text" | "aria-label" | "content-desc" | "label" | "title" => Hint::new(HintKind::Text, value),
        _ => Hint::new(HintKind::Attribute, format!("{name}={value}")),
    }
}

/// `com.app:id/login` → `login`
fn strip_resource_prefix(value: &str) -> &str {
    value.rsplit_once(":id/").map_or(value, |(_, id)| id)
}

/// Candidates built from hints alone, written in `dialect`.
///
/// They re-express each fragment through the attributes it most often
/// migrates to (an id that became a `name` or `data-testid`, a label that is
/// now visible text).
#[must_use]
pub fn candidates(hints: &[Hint], dialect: Dialect) -> Vec<String> {
    let mut out = Vec::new();
    for hint in hints {
        let v = hint.value.as_str();
        match (dialect, hint.kind) {
            (Dialect::XPath, HintKind::Id | HintKind::Name) => {
                let quoted = xpath_string(v);
                out.push(format!(
                    "xpath=//*[@resource-id={quoted} or contains(@resource-id, {})]",
                    xpath_string(&format!(":id/{v}"))
                ));
                out.push(format!("xpath=//*[@content-desc={quoted}]"));
            }
            (Dialect::XPath, HintKind::Text) => {
                let quoted = xpath_string(v);
                out.push(format!("xpath=//*[@text={quoted} or @content-desc={quoted}]"));
            }
            (Dialect::XPath, HintKind::Attribute) => {
                if let Some((name, value)) = v.split_once('=') {
                    out.push(format!("xpath=//*[@{name}={}]", xpath_string(value)));
                }
            }
            (Dialect::XPath, _) => {}
            (_, HintKind::Id) => {
                if is_css_ident(v) {
                    out.push(format!("css=#{v}"));
                }
                out.push(format!("css=[name={}]", css_string(v)));
                out.push(format!("css=[data-testid={}]", css_string(v)));
            }
            (_, HintKind::Name) => {
                out.push(format!("css=[name={}]", css_string(v)));
                out.push(format!("css=[id={}]", css_string(v)));
            }
            (Dialect::Playwright, HintKind::Text) => {
                out.push(format!("text={v}"));
                out.push(format!("css=[aria-label={}]", css_string(v)));
            }
            (_, HintKind::Text) => {
                out.push(format!("xpath=//*[normalize-space(text())={}]", xpath_string(v)));
                out.push(format!("css=[aria-label={}]", css_string(v)));
            }
            (_, HintKind::Class) if is_css_ident(v) => out.push(format!("css=.{v}")),
            (_, HintKind::Attribute) => {
                if let Some((name, value)) = v.split_once('=') {
                    out.push(format!("css=[{name}={}]", css_string(value)));
                }
            }
            _ => {}
        }
    }
    out
}
