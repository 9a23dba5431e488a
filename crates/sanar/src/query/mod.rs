//! Locator evaluation against a parsed [`UiTree`].
//!
//! CSS and XPath locators run through their own engines; attribute-style
//! strategies (`id=`, `name=`, `text=` ...) compile to an equivalent XPath
//! expression for the target technology.

pub mod css;
pub mod xpath;

pub use css::CssSelector;
pub use xpath::XPathQuery;

use crate::adapter::Technology;
use crate::locator::{xpath_string, Locator, Strategy};
use crate::result::SanarResult;
use crate::tree::{NodeId, UiTree};

/// A compiled locator
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// CSS selector
    Css(CssSelector),
    /// XPath expression
    XPath(XPathQuery),
}

impl Query {
    /// Compile `locator` for `technology`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SanarError::InvalidLocator`] when the value is not
    /// valid in its dialect.
    pub fn compile(locator: &Locator, technology: Technology) -> SanarResult<Self> {
        let value = locator.value();
        let mobile = technology == Technology::Mobile;
        let quoted = xpath_string(value);
        let expr = match locator.strategy() {
            Strategy::Css => return CssSelector::parse(value).map(Self::Css),
            Strategy::XPath => return XPathQuery::parse(value).map(Self::XPath),
            Strategy::Id if mobile => {
                let suffix = xpath_string(&format!(":id/{value}"));
                format!(
                    "//*[@resource-id={quoted} or @id={quoted} or ends-with(@resource-id, {suffix})]"
                )
            }
            Strategy::Id => format!("//*[@id={quoted}]"),
            Strategy::Name => format!("//*[@name={quoted}]"),
            Strategy::IdOrName => format!("//*[@id={quoted} or @name={quoted}]"),
            Strategy::Text if mobile => format!("//*[@text={quoted} or @label={quoted}]"),
            Strategy::Text => format!("//*[normalize-space(text())={quoted}]"),
            Strategy::AccessibilityId if mobile => {
                format!("//*[@content-desc={quoted} or @name={quoted}]")
            }
            Strategy::AccessibilityId => format!("//*[@aria-label={quoted}]"),
            Strategy::ClassName if mobile => format!("//*[@class={quoted} or name()={quoted}]"),
            Strategy::ClassName => format!(
                "//*[contains(concat(' ', normalize-space(@class), ' '), {})]",
                xpath_string(&format!(" {value} "))
            ),
            Strategy::TestId => format!("//*[@data-testid={quoted}]"),
            Strategy::LinkText => format!("//a[normalize-space(.)={quoted}]"),
        };
        XPathQuery::parse(&expr).map(Self::XPath)
    }

    /// Parse a raw locator string and compile it
    ///
    /// # Errors
    ///
    /// See [`Query::compile`].
    pub fn parse(raw: &str, technology: Technology) -> SanarResult<Self> {
        Self::compile(&Locator::parse(raw, technology), technology)
    }

    /// Matching elements in document order
    #[must_use]
    pub fn select(&self, tree: &UiTree) -> Vec<NodeId> {
        match self {
            Self::Css(selector) => selector.select(tree),
            Self::XPath(query) => query.select(tree),
        }
    }

    /// Number of matching elements
    #[must_use]
    pub fn count(&self, tree: &UiTree) -> usize {
        self.select(tree).len()
    }
}
