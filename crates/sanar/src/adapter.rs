//! UI automation technologies and the adapter contract used to query them.
//!
//! Every check returns `Result<_, CheckFailure>` so callers can tell "false
//! because the query failed" apart from "false because it is genuinely
//! false". [`CheckFailure::default_verdict`] supplies the conservative
//! boolean each failure collapses to when a plain answer is needed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::locator::Dialect;
use crate::query::Query;
use crate::tree::{NodeId, UiTree};

/// Placeholder returned by [`UiTreeAdapter::snapshot`] when no tree exists
pub const UNAVAILABLE_SNAPSHOT: &str = "<!-- sanar: UI tree unavailable -->";

/// Web automation libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebLibrary {
    /// Browser library (Playwright)
    Browser,
    /// SeleniumLibrary
    Selenium,
}

/// Supported automation technologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    /// Web UI driven by a browser library
    Web(WebLibrary),
    /// Native mobile UI driven by AppiumLibrary
    Mobile,
}

impl Technology {
    /// Resolve the technology from a keyword's owning library name.
    ///
    /// Returns `None` for libraries that do not drive a UI (BuiltIn,
    /// Collections ...), which are never healed.
    #[must_use]
    pub fn from_library(library: &str) -> Option<Self> {
        match library.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(Self::Web(WebLibrary::Browser)),
            "seleniumlibrary" | "selenium" => Some(Self::Web(WebLibrary::Selenium)),
            "appiumlibrary" | "appium" => Some(Self::Mobile),
            _ => None,
        }
    }

    /// Canonical library name
    #[must_use]
    pub const fn library_name(self) -> &'static str {
        match self {
            Self::Web(WebLibrary::Browser) => "Browser",
            Self::Web(WebLibrary::Selenium) => "SeleniumLibrary",
            Self::Mobile => "AppiumLibrary",
        }
    }

    /// Dialect the synthesizer writes candidates in
    #[must_use]
    pub const fn dialect(self) -> Dialect {
        match self {
            Self::Web(WebLibrary::Browser) => Dialect::Playwright,
            Self::Web(WebLibrary::Selenium) => Dialect::Css,
            Self::Mobile => Dialect::XPath,
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.library_name())
    }
}

/// Why a check produced no answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckFailure {
    /// No UI is available to query
    #[error("UI adapter unavailable")]
    AdapterAbsent,

    /// The locator is not valid in its dialect
    #[error("unparsable locator '{locator}': {message}")]
    Unparsable {
        /// Offending locator
        locator: String,
        /// Parser message
        message: String,
    },

    /// The underlying query raised
    #[error("query failed: {message}")]
    QueryFailed {
        /// Error message
        message: String,
    },
}

impl CheckFailure {
    /// Boolean a failed check collapses to.
    ///
    /// Only an absent adapter answers `true`: with nothing to query there is
    /// no evidence against a candidate. A query that errored always answers
    /// `false`.
    #[must_use]
    pub const fn default_verdict(&self) -> bool {
        matches!(self, Self::AdapterAbsent)
    }
}

/// Collapse a check result to a plain boolean
#[must_use]
pub fn verdict(result: &Result<bool, CheckFailure>) -> bool {
    match result {
        Ok(value) => *value,
        Err(failure) => failure.default_verdict(),
    }
}

/// What an adapter knows about one matched element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMetadata {
    /// Tag (element class on mobile)
    pub tag: String,
    /// Attributes by name
    pub attributes: BTreeMap<String, String>,
    /// Direct text
    pub text: String,
    /// Whether the element is displayed
    pub visible: bool,
    /// Whether the element accepts clicks
    pub clickable: bool,
}

/// Query surface over the live UI of one technology
pub trait UiTreeAdapter {
    /// Technology this adapter drives
    fn technology(&self) -> Technology;

    /// Serialized UI tree, or [`UNAVAILABLE_SNAPSHOT`] when none is available
    fn snapshot(&self) -> String;

    /// Number of elements `locator` matches
    fn match_count(&self, locator: &str) -> Result<usize, CheckFailure>;

    /// Whether the first element `locator` matches is visible and enabled
    fn is_clickable(&self, locator: &str) -> Result<bool, CheckFailure>;

    /// Metadata of every match
    fn element_metadata(&self, locator: &str) -> Result<Vec<ElementMetadata>, CheckFailure>;

    /// Whether `locator` matches at least one element
    fn is_valid(&self, locator: &str) -> Result<bool, CheckFailure> {
        self.match_count(locator).map(|n| n >= 1)
    }

    /// Whether `locator` matches exactly one element
    fn is_unique(&self, locator: &str) -> Result<bool, CheckFailure> {
        self.match_count(locator).map(|n| n == 1)
    }
}

/// Adapter answering checks from a captured snapshot.
///
/// Serves hosts that hand over page source instead of a live driver, and
/// the offline CLI. Markup that fails to parse makes every check fail with
/// [`CheckFailure::QueryFailed`]; [`SnapshotAdapter::absent`] models a
/// technology with no UI at all.
#[derive(Debug, Clone)]
pub struct SnapshotAdapter {
    technology: Technology,
    markup: Option<String>,
    tree: Result<UiTree, String>,
}

impl SnapshotAdapter {
    /// Adapter over `markup`
    #[must_use]
    pub fn new(technology: Technology, markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let tree = UiTree::parse(&markup).map_err(|e| e.to_string());
        Self {
            technology,
            markup: Some(markup),
            tree,
        }
    }

    /// Adapter with no UI to query
    #[must_use]
    pub fn absent(technology: Technology) -> Self {
        Self {
            technology,
            markup: None,
            tree: Err(UNAVAILABLE_SNAPSHOT.to_string()),
        }
    }

    /// Parsed tree, if the snapshot parsed
    #[must_use]
    pub fn tree(&self) -> Option<&UiTree> {
        self.tree.as_ref().ok()
    }

    fn matches(&self, locator: &str) -> Result<(&UiTree, Vec<NodeId>), CheckFailure> {
        if self.markup.is_none() {
            return Err(CheckFailure::AdapterAbsent);
        }
        let tree = self.tree.as_ref().map_err(|message| CheckFailure::QueryFailed {
            message: message.clone(),
        })?;
        let query =
            Query::parse(locator, self.technology).map_err(|e| CheckFailure::Unparsable {
                locator: locator.to_string(),
                message: e.to_string(),
            })?;
        Ok((tree, query.select(tree)))
    }

    fn metadata(&self, tree: &UiTree, id: NodeId) -> ElementMetadata {
        let element = tree.element(id);
        let visible = is_visible(tree, id);
        ElementMetadata {
            tag: element.tag.clone(),
            attributes: element.attributes.iter().cloned().collect(),
            text: element.own_text(),
            visible,
            clickable: visible && is_enabled(tree, id, self.technology),
        }
    }
}

impl UiTreeAdapter for SnapshotAdapter {
    fn technology(&self) -> Technology {
        self.technology
    }

    fn snapshot(&self) -> String {
        self.markup
            .clone()
            .unwrap_or_else(|| UNAVAILABLE_SNAPSHOT.to_string())
    }

    fn match_count(&self, locator: &str) -> Result<usize, CheckFailure> {
        self.matches(locator).map(|(_, ids)| ids.len())
    }

    fn is_clickable(&self, locator: &str) -> Result<bool, CheckFailure> {
        let (tree, ids) = self.matches(locator)?;
        Ok(ids
            .first()
            .is_some_and(|id| self.metadata(tree, *id).clickable))
    }

    fn element_metadata(&self, locator: &str) -> Result<Vec<ElementMetadata>, CheckFailure> {
        let (tree, ids) = self.matches(locator)?;
        Ok(ids.iter().map(|id| self.metadata(tree, *id)).collect())
    }
}

/// Visible unless the element or an ancestor is hidden
pub(crate) fn is_visible(tree: &UiTree, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(tree.ancestors(id))
        .all(|node| !hides(tree, node))
}

fn hides(tree: &UiTree, id: NodeId) -> bool {
    let element = tree.element(id);
    if element.has_attr("hidden")
        || element.attr("aria-hidden") == Some("true")
        || element.attr("displayed") == Some("false")
        || element.attr("visible") == Some("false")
    {
        return true;
    }
    if element.is("input") && element.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    element.attr("style").is_some_and(|style| {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}

fn is_enabled(tree: &UiTree, id: NodeId, technology: Technology) -> bool {
    let element = tree.element(id);
    match technology {
        Technology::Mobile => {
            element.attr("enabled") != Some("false") && element.attr("clickable") != Some("false")
        }
        Technology::Web(_) => {
            let disabled_here =
                element.has_attr("disabled") || element.attr("aria-disabled") == Some("true");
            // a disabled fieldset disables its form controls
            let disabled_fieldset = tree
                .ancestors(id)
                .any(|a| tree.element(a).is("fieldset") && tree.element(a).has_attr("disabled"));
            !disabled_here && !disabled_fieldset
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SELENIUM: Technology = Technology::Web(WebLibrary::Selenium);

    const PAGE: &str = r#"<div>
        <button id="save">Save</button>
        <button id="delete" disabled>Delete</button>
        <div style="display: none"><button id="ghost">Ghost</button></div>
        <input type="hidden" id="token">
        <fieldset disabled><input id="locked"></fieldset>
        <span class="tag">a</span><span class="tag">b</span>
    </div>"#;

    mod technology_tests {
        use super::*;

        #[test]
        fn test_from_library() {
            assert_eq!(
                Technology::from_library("Browser"),
                Some(Technology::Web(WebLibrary::Browser))
            );
            assert_eq!(Technology::from_library("SeleniumLibrary"), Some(SELENIUM));
            assert_eq!(
                Technology::from_library("AppiumLibrary"),
                Some(Technology::Mobile)
            );
            assert_eq!(Technology::from_library("BuiltIn"), None);
        }

        #[test]
        fn test_dialects() {
            assert_eq!(SELENIUM.dialect(), Dialect::Css);
            assert_eq!(Technology::Mobile.dialect(), Dialect::XPath);
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_match_count_and_uniqueness() {
            let adapter = SnapshotAdapter::new(SELENIUM, PAGE);
            assert_eq!(adapter.match_count("css:span.tag"), Ok(2));
            assert_eq!(adapter.is_unique("css:span.tag"), Ok(false));
            assert_eq!(adapter.is_unique("save"), Ok(true));
            assert_eq!(adapter.is_valid("missing"), Ok(false));
        }

        #[test]
        fn test_clickability_heuristics() {
            let adapter = SnapshotAdapter::new(SELENIUM, PAGE);
            assert_eq!(adapter.is_clickable("id:save"), Ok(true));
            assert_eq!(adapter.is_clickable("id:delete"), Ok(false));
            assert_eq!(adapter.is_clickable("id:ghost"), Ok(false));
            assert_eq!(adapter.is_clickable("id:token"), Ok(false));
            assert_eq!(adapter.is_clickable("id:locked"), Ok(false));
            assert_eq!(adapter.is_clickable("id:missing"), Ok(false));
        }

        #[test]
        fn test_mobile_clickability() {
            let adapter = SnapshotAdapter::new(
                Technology::Mobile,
                r#"<hierarchy>
                <android.widget.Button resource-id="app:id/ok" clickable="true" enabled="true"/>
                <android.widget.TextView resource-id="app:id/label" clickable="false"/>
                </hierarchy>"#,
            );
            assert_eq!(adapter.is_clickable("id=ok"), Ok(true));
            assert_eq!(adapter.is_clickable("id=label"), Ok(false));
        }

        #[test]
        fn test_metadata() {
            let adapter = SnapshotAdapter::new(SELENIUM, PAGE);
            let meta = adapter.element_metadata("id:delete").unwrap();
            assert_eq!(meta.len(), 1);
            assert_eq!(meta[0].tag, "button");
            assert_eq!(meta[0].text, "Delete");
            assert!(meta[0].visible);
            assert!(!meta[0].clickable);
            assert_eq!(meta[0].attributes.get("id").map(String::as_str), Some("delete"));
        }
    }

    mod failure_tests {
        use super::*;

        #[test]
        fn test_absent_adapter() {
            let adapter = SnapshotAdapter::absent(SELENIUM);
            assert_eq!(adapter.snapshot(), UNAVAILABLE_SNAPSHOT);
            let result = adapter.is_unique("id:x");
            assert_eq!(result, Err(CheckFailure::AdapterAbsent));
            assert!(verdict(&result));
        }

        #[test]
        fn test_unparsable_locator_is_false() {
            let adapter = SnapshotAdapter::new(SELENIUM, PAGE);
            let result = adapter.is_valid("css:div[");
            assert!(matches!(result, Err(CheckFailure::Unparsable { .. })));
            assert!(!verdict(&result));
        }

        #[test]
        fn test_broken_snapshot_is_query_failure() {
            let adapter = SnapshotAdapter::new(SELENIUM, "no markup here");
            let result = adapter.is_valid("id:x");
            assert!(matches!(result, Err(CheckFailure::QueryFailed { .. })));
            assert!(!verdict(&result));
        }
    }
}
