//! Uniqueness-first selector construction.
//!
//! For one element, try identifying attributes in order of stability and
//! accept the first selector that matches exactly that element in the tree.
//! When no attribute is unique, anchor on structure: the nearest uniquely
//! selectable ancestor plus a child path, then the previous sibling, and
//! finally an `nth-of-type` path from the root.

use crate::locator::{css_string, is_css_ident, xpath_string, Dialect};
use crate::query::{CssSelector, XPathQuery};
use crate::tree::{NodeId, UiTree};

/// Own text longer than this is not used as a selector
const MAX_TEXT_CHARS: usize = 60;

/// Progressive class qualification stops after this many classes
const MAX_CLASSES: usize = 3;

pub(crate) struct SelectorBuilder<'t> {
    tree: &'t UiTree,
    dialect: Dialect,
}

impl<'t> SelectorBuilder<'t> {
    pub(crate) const fn new(tree: &'t UiTree, dialect: Dialect) -> Self {
        Self { tree, dialect }
    }

    /// Prefixed, uniquely matching locator for `id`
    pub(crate) fn candidate(&self, id: NodeId) -> String {
        let selector = self
            .simple(id)
            .or_else(|| self.under_ancestor(id))
            .or_else(|| self.after_sibling(id))
            .unwrap_or_else(|| self.full_path(id));
        match self.dialect {
            Dialect::XPath => format!("xpath={selector}"),
            Dialect::Css | Dialect::Playwright => format!("css={selector}"),
        }
    }

    fn is_unique_for(&self, selector: &str, id: NodeId) -> bool {
        let matched = match self.dialect {
            Dialect::XPath => XPathQuery::parse(selector).map(|q| q.select(self.tree)),
            Dialect::Css | Dialect::Playwright => {
                CssSelector::parse(selector).map(|s| s.select(self.tree))
            }
        };
        matched.is_ok_and(|ids| ids == [id])
    }

    /// Attribute, class and text based selector, without structure
    fn simple(&self, id: NodeId) -> Option<String> {
        self.attempts(id)
            .into_iter()
            .find(|selector| self.is_unique_for(selector, id))
    }

    fn attempts(&self, id: NodeId) -> Vec<String> {
        let element = self.tree.element(id);
        let tag = element.tag.as_str();
        let mut out = Vec::new();
        let mobile = self.dialect == Dialect::XPath;

        let id_attrs: &[&str] = if mobile { &["resource-id", "id"] } else { &["id"] };
        for attr in id_attrs {
            if let Some(value) = element.attr(attr).filter(|v| !v.is_empty()) {
                if !mobile && is_css_ident(value) {
                    out.push(format!("{tag}#{value}"));
                } else {
                    out.push(self.attribute(tag, attr, value));
                }
            }
        }
        let named: &[&str] = if mobile {
            &["name", "content-desc", "label"]
        } else {
            &[
                "name",
                "type",
                "placeholder",
                "role",
                "aria-label",
                "data-testid",
                "for",
                "title",
                "alt",
                "href",
            ]
        };
        for attr in named {
            if let Some(value) = element.attr(attr).filter(|v| !v.is_empty()) {
                out.push(self.attribute(tag, attr, value));
            }
        }

        if !mobile {
            let classes: Vec<&str> = element
                .classes()
                .filter(|c| is_css_ident(c))
                .take(MAX_CLASSES)
                .collect();
            for n in 1..=classes.len() {
                out.push(format!("{tag}.{}", classes[..n].join(".")));
            }
        }

        let text = if mobile {
            element.attr("text").unwrap_or_default().to_string()
        } else {
            element.own_text()
        };
        if !text.is_empty() && text.chars().count() <= MAX_TEXT_CHARS {
            match self.dialect {
                Dialect::Playwright => {
                    out.push(format!("{tag}:text-is({})", css_string(&text)));
                    out.push(format!("{tag}:has-text({})", css_string(&text)));
                }
                Dialect::XPath => {
                    let quoted = xpath_string(&text);
                    out.push(format!("//{tag}[@text={quoted}]"));
                    out.push(format!("//{tag}[contains(@text, {quoted})]"));
                }
                Dialect::Css => {}
            }
        }
        out
    }

    fn attribute(&self, tag: &str, name: &str, value: &str) -> String {
        match self.dialect {
            Dialect::XPath => format!("//{tag}[@{name}={}]", xpath_string(value)),
            Dialect::Css | Dialect::Playwright => format!("{tag}[{name}={}]", css_string(value)),
        }
    }

    /// Step selecting `id` among its siblings by tag and position
    fn segment(&self, id: NodeId) -> String {
        let tag = &self.tree.element(id).tag;
        let (index, total) = self.tree.index_of_type(id);
        match (self.dialect, total > 1) {
            (Dialect::XPath, true) => format!("{tag}[{index}]"),
            (Dialect::XPath, false) => tag.clone(),
            (_, true) => format!("{tag}:nth-of-type({index})"),
            (_, false) => tag.clone(),
        }
    }

    fn join(&self, parts: &[String]) -> String {
        match self.dialect {
            Dialect::XPath => parts.join("/"),
            Dialect::Css | Dialect::Playwright => parts.join(" > "),
        }
    }

    fn under_ancestor(&self, id: NodeId) -> Option<String> {
        let mut path = vec![self.segment(id)];
        for ancestor in self.tree.ancestors(id) {
            if let Some(anchor) = self.simple(ancestor) {
                path.reverse();
                let mut parts = vec![anchor];
                parts.extend(path);
                let selector = self.join(&parts);
                return self.is_unique_for(&selector, id).then_some(selector);
            }
            path.push(self.segment(ancestor));
        }
        None
    }

    fn after_sibling(&self, id: NodeId) -> Option<String> {
        let previous = self.tree.previous_sibling(id)?;
        let anchor = self.simple(previous)?;
        let tag = &self.tree.element(id).tag;
        let selector = match self.dialect {
            Dialect::XPath => format!("{anchor}/following-sibling::{tag}[1]"),
            Dialect::Css | Dialect::Playwright => format!("{anchor} + {tag}"),
        };
        self.is_unique_for(&selector, id).then_some(selector)
    }

    fn full_path(&self, id: NodeId) -> String {
        let mut parts: Vec<String> = std::iter::once(id)
            .chain(self.tree.ancestors(id))
            .map(|n| self.segment(n))
            .collect();
        parts.reverse();
        match self.dialect {
            Dialect::XPath => format!("/{}", parts.join("/")),
            Dialect::Css | Dialect::Playwright => parts.join(" > "),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn find(tree: &UiTree, pred: impl Fn(&crate::tree::Element) -> bool) -> NodeId {
        tree.ids().find(|id| pred(tree.element(*id))).unwrap()
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn test_id_wins() {
            let tree =
                UiTree::parse(r#"<form><input id="username" name="user"></form>"#).unwrap();
            let input = find(&tree, |e| e.is("input"));
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(input), "css=input#username");
        }

        #[test]
        fn test_non_ident_id_uses_attribute_form() {
            let tree = UiTree::parse(r#"<div><span id="1st"></span></div>"#).unwrap();
            let span = find(&tree, |e| e.is("span"));
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(span), "css=span[id=\"1st\"]");
        }

        #[test]
        fn test_duplicate_id_falls_through_to_name() {
            let tree = UiTree::parse(
                r#"<div><input id="x" name="first"><input id="x" name="second"></div>"#,
            )
            .unwrap();
            let second = find(&tree, |e| e.attr("name") == Some("second"));
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(second), "css=input[name=\"second\"]");
        }

        #[test]
        fn test_progressive_classes() {
            let tree = UiTree::parse(
                r#"<div><a class="btn">x</a><a class="btn primary">y</a></div>"#,
            )
            .unwrap();
            let primary = find(&tree, |e| e.classes().any(|c| c == "primary"));
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(primary), "css=a.btn.primary");
        }

        #[test]
        fn test_playwright_text() {
            let tree =
                UiTree::parse("<div><button>Save</button><button>Cancel</button></div>").unwrap();
            let cancel = find(&tree, |e| e.own_text() == "Cancel");
            let b = SelectorBuilder::new(&tree, Dialect::Playwright);
            assert_eq!(b.candidate(cancel), "css=button:text-is(\"Cancel\")");
        }
    }

    mod structural_tests {
        use super::*;

        #[test]
        fn test_unique_ancestor_with_child_path() {
            let tree = UiTree::parse(
                r#"<body><div id="left"><p><b>a</b></p></div><div id="right"><p><b>a</b></p></div></body>"#,
            )
            .unwrap();
            let right_b = tree
                .ids()
                .filter(|id| tree.element(*id).is("b"))
                .nth(1)
                .unwrap();
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(right_b), "css=div#right > p > b");
        }

        #[test]
        fn test_sibling_adjacency() {
            let tree = UiTree::parse(
                r#"<body><span></span><label for="q">Query</label><span></span></body>"#,
            )
            .unwrap();
            let after_label = tree
                .ids()
                .filter(|id| tree.element(*id).is("span"))
                .nth(1)
                .unwrap();
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(after_label), "css=label[for=\"q\"] + span");
        }

        #[test]
        fn test_nth_of_type_fallback() {
            let tree = UiTree::parse("<ul><li></li><li></li></ul>").unwrap();
            let second = tree
                .ids()
                .filter(|id| tree.element(*id).is("li"))
                .nth(1)
                .unwrap();
            let b = SelectorBuilder::new(&tree, Dialect::Css);
            assert_eq!(b.candidate(second), "css=ul > li:nth-of-type(2)");
            let x = SelectorBuilder::new(&tree, Dialect::XPath);
            assert_eq!(x.candidate(second), "xpath=/ul/li[2]");
        }
    }

    mod mobile_tests {
        use super::*;

        #[test]
        fn test_resource_id_first() {
            let tree = UiTree::parse(
                r#"<hierarchy><android.widget.Button resource-id="com.app:id/ok" text="OK"/></hierarchy>"#,
            )
            .unwrap();
            let button = find(&tree, |e| e.tag.ends_with("Button"));
            let b = SelectorBuilder::new(&tree, Dialect::XPath);
            assert_eq!(
                b.candidate(button),
                "xpath=//android.widget.Button[@resource-id='com.app:id/ok']"
            );
        }

        #[test]
        fn test_text_when_no_ids() {
            let tree = UiTree::parse(
                r#"<hierarchy><android.widget.TextView text="Total"/><android.widget.TextView text="Tax"/></hierarchy>"#,
            )
            .unwrap();
            let tax = find(&tree, |e| e.attr("text") == Some("Tax"));
            let b = SelectorBuilder::new(&tree, Dialect::XPath);
            assert_eq!(
                b.candidate(tax),
                "xpath=//android.widget.TextView[@text='Tax']"
            );
        }
    }
}
