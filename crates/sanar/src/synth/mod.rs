//! Candidate locator synthesis.
//!
//! Turns a UI tree snapshot and a failed locator into an ordered, capped,
//! duplicate-free list of replacement candidates. Pure: no adapter calls,
//! no I/O. Candidates built from the failed locator's own fragments come
//! first, then one uniqueness-first selector per plausible tree element,
//! most similar to the failed locator first.

pub mod hints;
mod selector;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::adapter::{is_visible, Technology};
use crate::locator::{Hint, HintKind, Locator};
use crate::tree::{NodeId, UiTree};
use selector::SelectorBuilder;

/// Default cap on candidates per generation round
pub const DEFAULT_MAX_CANDIDATES: usize = 12;

/// Elements that are never candidates themselves
const STRUCTURAL_TAGS: &[&str] = &[
    "html", "head", "body", "meta", "link", "script", "style", "title", "base", "br", "hr",
    "noscript", "template", "hierarchy",
];

/// What the failed keyword was trying to do to its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionIntent {
    /// Typing into a field
    TextEntry,
    /// Clicking, tapping or toggling
    Click,
    /// Choosing from a list or dropdown
    Select,
    /// Reading text or attributes
    Read,
    /// Anything else
    Generic,
}

impl ActionIntent {
    /// Infer the intent from a keyword name such as `Input Text` or
    /// `SeleniumLibrary.Click Button`
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        let name = keyword
            .rsplit('.')
            .next()
            .unwrap_or(keyword)
            .replace('_', " ")
            .to_lowercase();
        let name = name.trim();
        let any = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if any(&["checkbox", "radio button", "click", "tap", "hover", "mouse over", "submit form"]) {
            Self::Click
        } else if any(&[
            "input text",
            "input password",
            "input value",
            "type text",
            "type secret",
            "fill text",
            "fill secret",
            "clear element text",
            "clear text",
            "press keys",
        ]) {
            Self::TextEntry
        } else if any(&["from list", "select options", "list selection", "selected list"]) {
            Self::Select
        } else if name.starts_with("get ")
            || any(&[
                "text should",
                "should contain",
                "value should",
                "attribute value should",
            ])
        {
            Self::Read
        } else {
            Self::Generic
        }
    }

    /// Whether the element plausibly serves this intent
    #[must_use]
    pub fn accepts(self, tree: &UiTree, id: NodeId, technology: Technology) -> bool {
        let element = tree.element(id);
        let role = element.attr("role").unwrap_or_default();
        if technology == Technology::Mobile {
            let tag = element.tag.as_str();
            let has = |needles: &[&str]| needles.iter().any(|n| tag.contains(n));
            return match self {
                Self::TextEntry => has(&["EditText", "TextField", "SearchField", "TextView"])
                    && !tag.starts_with("android.widget.TextView"),
                Self::Click => {
                    element.attr("clickable") == Some("true")
                        || has(&["Button", "CheckBox", "Switch", "Cell"])
                }
                Self::Select => has(&["Spinner", "ListView", "RecyclerView", "Picker"]),
                Self::Read => {
                    !element.attr("text").unwrap_or_default().is_empty()
                        || element.has_attr("content-desc")
                }
                Self::Generic => true,
            };
        }
        let input_type = element
            .attr("type")
            .unwrap_or("text")
            .to_ascii_lowercase();
        match self {
            Self::TextEntry => {
                element.is("textarea")
                    || (element.is("input")
                        && !matches!(
                            input_type.as_str(),
                            "button" | "submit" | "reset" | "checkbox" | "radio" | "hidden"
                                | "image" | "file" | "range" | "color"
                        ))
                    || element
                        .attr("contenteditable")
                        .is_some_and(|v| v != "false")
                    || matches!(role, "textbox" | "searchbox" | "combobox")
            }
            Self::Click => {
                ["button", "a", "summary", "option"]
                    .iter()
                    .any(|t| element.is(t))
                    || (element.is("input")
                        && matches!(
                            input_type.as_str(),
                            "button" | "submit" | "reset" | "checkbox" | "radio" | "image"
                        ))
                    || matches!(
                        role,
                        "button" | "link" | "checkbox" | "radio" | "switch" | "tab" | "menuitem"
                            | "option"
                    )
                    || element.has_attr("onclick")
            }
            Self::Select => {
                ["select", "option", "datalist", "ul", "ol"]
                    .iter()
                    .any(|t| element.is(t))
                    || matches!(role, "listbox" | "combobox" | "option" | "menu")
            }
            Self::Read => !element.own_text().is_empty() || element.has_attr("value"),
            Self::Generic => true,
        }
    }
}

impl fmt::Display for ActionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextEntry => "text entry",
            Self::Click => "click",
            Self::Select => "select",
            Self::Read => "read",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Ordered, duplicate-free, capped list of candidate locators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    items: Vec<String>,
    cap: usize,
}

impl Default for CandidateList {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CANDIDATES)
    }
}

impl CandidateList {
    /// Empty list holding at most `cap` candidates
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
        }
    }

    /// Build from candidates in priority order
    #[must_use]
    pub fn from_candidates<I, S>(candidates: I, cap: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new(cap);
        for candidate in candidates {
            list.push(candidate);
        }
        list
    }

    /// Append a candidate.
    ///
    /// Returns `false` (and drops it) when it is blank, already present or
    /// the list is full.
    pub fn push(&mut self, candidate: impl Into<String>) -> bool {
        let candidate = candidate.into();
        let candidate = candidate.trim();
        if candidate.is_empty() || self.is_full() || self.contains(candidate) {
            return false;
        }
        self.items.push(candidate.to_string());
        true
    }

    /// Whether the cap is reached
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.cap
    }

    /// Whether `candidate` is present
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        self.items.iter().any(|c| c == candidate)
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of candidates
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Candidates in priority order
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// Iterate in priority order
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    /// Take the highest-priority candidate
    pub fn pop_front(&mut self) -> Option<String> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Drop every candidate in `excluded`
    pub fn exclude(&mut self, excluded: &[String]) {
        self.items.retain(|c| !excluded.contains(c));
    }

    /// Keep only candidates satisfying `keep`, preserving order
    pub fn retain(&mut self, keep: impl FnMut(&String) -> bool) {
        self.items.retain(keep);
    }

    /// Consume into a plain vector
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Heuristic candidate generator for one technology
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    technology: Technology,
    max_candidates: usize,
}

impl Synthesizer {
    /// Synthesizer with the default cap
    #[must_use]
    pub const fn new(technology: Technology) -> Self {
        Self {
            technology,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Set the candidate cap
    #[must_use]
    pub const fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Produce candidates for `failed_locator` from a serialized snapshot.
    ///
    /// Never fails: a snapshot that does not parse yields only the
    /// candidates derived from the failed locator itself.
    #[must_use]
    pub fn synthesize(&self, snapshot: &str, failed_locator: &str, intent: ActionIntent) -> CandidateList {
        let tree = match UiTree::parse(snapshot) {
            Ok(tree) => Some(tree),
            Err(e) => {
                debug!(error = %e, "snapshot unusable, hint candidates only");
                None
            }
        };
        self.synthesize_tree(tree.as_ref(), failed_locator, intent)
    }

    /// Produce candidates from an already parsed tree
    #[must_use]
    pub fn synthesize_tree(
        &self,
        tree: Option<&UiTree>,
        failed_locator: &str,
        intent: ActionIntent,
    ) -> CandidateList {
        let failed = Locator::parse(failed_locator, self.technology);
        let hints = failed.hints();
        let dialect = self.technology.dialect();
        let stale = [failed_locator.trim().to_string(), failed.render()];

        let mut list = CandidateList::new(self.max_candidates);
        // hint candidates never take more than half the slots
        let hint_budget = self.max_candidates.div_ceil(2);
        let hinted = hints::candidates(&hints, dialect)
            .into_iter()
            .filter(|c| !stale.contains(c))
            .take(hint_budget);
        for candidate in hinted {
            list.push(candidate);
        }

        let Some(tree) = tree else {
            return list;
        };
        let mut targets: Vec<NodeId> = tree
            .ids()
            .filter(|id| {
                !STRUCTURAL_TAGS.iter().any(|t| tree.element(*id).is(t))
                    && is_visible(tree, *id)
                    && intent.accepts(tree, *id, self.technology)
            })
            .collect();
        if targets.is_empty() {
            targets.extend(fallback_element(tree));
        }
        let scores: Vec<(NodeId, f64)> = targets
            .into_iter()
            .map(|id| (id, similarity(tree, id, &hints)))
            .collect();
        let mut ranked = scores;
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let builder = SelectorBuilder::new(tree, dialect);
        for (id, _) in ranked {
            if list.is_full() {
                break;
            }
            let candidate = builder.candidate(id);
            if !stale.contains(&candidate) {
                list.push(candidate);
            }
        }
        debug!(
            locator = failed_locator,
            intent = %intent,
            candidates = list.len(),
            "synthesized candidates"
        );
        list
    }
}

/// The most generic top-level element: `body` when present, else the first root
fn fallback_element(tree: &UiTree) -> Option<NodeId> {
    tree.ids()
        .find(|id| tree.element(*id).is("body"))
        .or_else(|| tree.roots().first().copied())
}

/// Lowercase alphanumerics only, so `user-name` and `userName` compare equal
fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Sørensen–Dice coefficient over character bigrams
fn dice(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let left = bigrams(a);
    let mut right = bigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let total = left.len() + right.len();
    let mut shared = 0usize;
    for pair in &left {
        if let Some(pos) = right.iter().position(|p| p == pair) {
            right.swap_remove(pos);
            shared += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let score = (2 * shared) as f64 / total as f64;
    score
}

/// How closely an element resembles what the failed locator described
fn similarity(tree: &UiTree, id: NodeId, hints: &[Hint]) -> f64 {
    let element = tree.element(id);
    let mut keys: Vec<String> = [
        "id",
        "resource-id",
        "name",
        "data-testid",
        "aria-label",
        "content-desc",
        "placeholder",
        "text",
        "title",
    ]
    .iter()
    .filter_map(|attr| element.attr(attr))
    .map(|v| normalize(v.rsplit_once(":id/").map_or(v, |(_, id)| id)))
    .collect();
    keys.push(normalize(&element.own_text()));
    keys.extend(element.classes().map(normalize));

    let mut best = 0.0_f64;
    for hint in hints {
        if hint.kind == HintKind::Tag {
            if element.is(&hint.value) {
                best += 0.1;
            }
            continue;
        }
        let needle = normalize(hint.value.rsplit_once('=').map_or(&hint.value, |(_, v)| v));
        for key in &keys {
            best = best.max(dice(&needle, key));
        }
    }
    best
}
