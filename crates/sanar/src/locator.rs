//! Locator strings and the strategies they encode.
//!
//! A locator is a plain string as it appears in a test script, tagged by an
//! optional strategy prefix (`css=`, `xpath=`, `id:` ...). Bare strings fall
//! back to the default strategy of the owning technology.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::adapter::{Technology, WebLibrary};

/// Locator strategy encoded by a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// CSS selector (Playwright extensions allowed for Browser)
    Css,
    /// XPath expression
    XPath,
    /// `id` attribute (`resource-id` on mobile)
    Id,
    /// `name` attribute
    Name,
    /// SeleniumLibrary default: `id` or `name`
    IdOrName,
    /// Visible text
    Text,
    /// `aria-label` on web, `content-desc` on mobile
    AccessibilityId,
    /// Class name (element class on mobile)
    ClassName,
    /// `data-testid` attribute
    TestId,
    /// Link text (`<a>` only)
    LinkText,
}

impl Strategy {
    /// Canonical prefix used when rendering
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Id | Self::IdOrName => "id",
            Self::Name => "name",
            Self::Text => "text",
            Self::AccessibilityId => "accessibility_id",
            Self::ClassName => "class",
            Self::TestId => "data-testid",
            Self::LinkText => "link",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        let strategy = match prefix.to_ascii_lowercase().as_str() {
            "css" => Self::Css,
            "xpath" => Self::XPath,
            "id" => Self::Id,
            "name" => Self::Name,
            "identifier" => Self::IdOrName,
            "text" => Self::Text,
            "accessibility_id" | "accessibility id" => Self::AccessibilityId,
            "class" => Self::ClassName,
            "data-testid" | "data-test-id" => Self::TestId,
            "link" => Self::LinkText,
            _ => return None,
        };
        Some(strategy)
    }
}

/// Selector dialect the candidate synthesizer writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// CSS plus Playwright text pseudo-classes (`:has-text`, `:text-is`)
    Playwright,
    /// Plain CSS
    Css,
    /// XPath 1.0 subset
    XPath,
}

impl Dialect {
    /// Strategy of locators written in this dialect
    #[must_use]
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::Playwright | Self::Css => Strategy::Css,
            Self::XPath => Strategy::XPath,
        }
    }

    /// Whether text pseudo-classes are available
    #[must_use]
    pub const fn supports_text(self) -> bool {
        matches!(self, Self::Playwright | Self::XPath)
    }
}

/// A parsed locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    value: String,
}

impl Locator {
    /// Create a locator from its parts
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Create a CSS locator
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    /// Parse a locator string as written in a script.
    ///
    /// Recognises `prefix=value` and SeleniumLibrary's `prefix:value`. Strings
    /// starting with `/`, `(/` or `./` are XPath regardless of technology.
    #[must_use]
    pub fn parse(raw: &str, technology: Technology) -> Self {
        let raw = raw.trim();
        if raw.starts_with('/') || raw.starts_with("(/") || raw.starts_with("./") {
            return Self::xpath(raw);
        }
        if let Some((prefix, value)) = split_prefix(raw) {
            if let Some(strategy) = Strategy::from_prefix(prefix.trim()) {
                return Self::new(strategy, value.trim_start());
            }
        }
        let default = match technology {
            Technology::Web(WebLibrary::Browser) => Strategy::Css,
            Technology::Web(WebLibrary::Selenium) => Strategy::IdOrName,
            Technology::Mobile => Strategy::Id,
        };
        Self::new(default, raw)
    }

    /// Strategy of this locator
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Value without prefix
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Prefixed string form (`css=...`)
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}={}", self.strategy.prefix(), self.value)
    }

    /// Literal fragments a stale locator still carries: ids, names, text,
    /// classes and attribute values.
    ///
    /// Used to seed candidates and to score elements by similarity to what
    /// the test author originally targeted.
    #[must_use]
    pub fn hints(&self) -> Vec<Hint> {
        crate::synth::hints::extract(self)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A literal fragment extracted from a locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hint {
    /// What the fragment was used as
    pub kind: HintKind,
    /// The fragment itself
    pub value: String,
}

impl Hint {
    /// Create a hint
    #[must_use]
    pub fn new(kind: HintKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Kind of a [`Hint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    /// `id` (or `resource-id`)
    Id,
    /// `name`
    Name,
    /// Visible text
    Text,
    /// Class name
    Class,
    /// Tag name
    Tag,
    /// Any other attribute, stored as `attr=value`
    Attribute,
}

/// Split `prefix=value` / `prefix:value` when the prefix is a bare word
fn split_prefix(raw: &str) -> Option<(&str, &str)> {
    let sep = raw.find(['=', ':'])?;
    let prefix = &raw[..sep];
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ';
    if prefix.is_empty() || !prefix.chars().all(word) {
        return None;
    }
    Some((prefix, &raw[sep + 1..]))
}

/// Quote a string for a CSS attribute value
#[must_use]
pub fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a string for XPath 1.0 (which has no escape sequences)
#[must_use]
pub fn xpath_string(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Whether `s` can be written as a bare CSS identifier
#[must_use]
pub fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let first_ok = first.is_ascii_alphabetic() || first == '_' || (first == '-' && s.len() > 1);
    let second_ok = !(first == '-' && s[1..].starts_with(|c: char| c.is_ascii_digit()));
    first_ok && second_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER: Technology = Technology::Web(WebLibrary::Browser);
    const SELENIUM: Technology = Technology::Web(WebLibrary::Selenium);

    mod parse_tests {
        use super::*;

        #[test]
        fn test_prefixed_css() {
            let loc = Locator::parse("css=input#username", BROWSER);
            assert_eq!(loc.strategy(), Strategy::Css);
            assert_eq!(loc.value(), "input#username");
        }

        #[test]
        fn test_selenium_colon_prefix() {
            let loc = Locator::parse("xpath://div[@id='a']", SELENIUM);
            assert_eq!(loc.strategy(), Strategy::XPath);
            assert_eq!(loc.value(), "//div[@id='a']");
        }

        #[test]
        fn test_bare_xpath() {
            let loc = Locator::parse("//button[text()='Go']", SELENIUM);
            assert_eq!(loc.strategy(), Strategy::XPath);
        }

        #[test]
        fn test_bare_defaults_by_technology() {
            assert_eq!(Locator::parse("main", BROWSER).strategy(), Strategy::Css);
            assert_eq!(
                Locator::parse("main", SELENIUM).strategy(),
                Strategy::IdOrName
            );
            assert_eq!(
                Locator::parse("login", Technology::Mobile).strategy(),
                Strategy::Id
            );
        }

        #[test]
        fn test_css_pseudo_is_not_a_prefix() {
            let loc = Locator::parse("a:hover", BROWSER);
            assert_eq!(loc.strategy(), Strategy::Css);
            assert_eq!(loc.value(), "a:hover");
        }

        #[test]
        fn test_css_attribute_is_not_a_prefix() {
            let loc = Locator::parse("[data-x=1]", BROWSER);
            assert_eq!(loc.strategy(), Strategy::Css);
        }

        #[test]
        fn test_accessibility_id() {
            let loc = Locator::parse("accessibility_id=Login", Technology::Mobile);
            assert_eq!(loc.strategy(), Strategy::AccessibilityId);
            assert_eq!(loc.render(), "accessibility_id=Login");
        }
    }

    mod quoting_tests {
        use super::*;

        #[test]
        fn test_xpath_string_variants() {
            assert_eq!(xpath_string("plain"), "'plain'");
            assert_eq!(xpath_string("it's"), "\"it's\"");
            assert_eq!(
                xpath_string("it's \"x\""),
                "concat('it', \"'\", 's \"x\"')"
            );
        }

        #[test]
        fn test_css_string_escapes() {
            assert_eq!(css_string("a\"b"), "\"a\\\"b\"");
        }

        #[test]
        fn test_css_ident() {
            assert!(is_css_ident("username"));
            assert!(is_css_ident("user-name_2"));
            assert!(!is_css_ident("2fa"));
            assert!(!is_css_ident("-1x"));
            assert!(!is_css_ident("a:b"));
            assert!(!is_css_ident(""));
        }
    }
}
