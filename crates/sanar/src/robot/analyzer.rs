//! Argument-structure analysis.
//!
//! A locator argument is often built from a variable plus literal text,
//! e.g. `${MAIN_SELECTOR} img`. When such an argument is healed the edit has
//! to land in the right place: the variable's definition, the literal
//! suffix, or both.

use regex::Regex;
use std::sync::OnceLock;

use super::document::{escape_cell, escape_fragment, unescape_cell};

fn variable_reference() -> Option<&'static Regex> {
    static VARIABLE: OnceLock<Option<Regex>> = OnceLock::new();
    VARIABLE
        .get_or_init(|| Regex::new(r"\$\{[^{}]+\}").ok())
        .as_ref()
}

/// New value for a variable defined elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableUpdate {
    /// Variable as referenced, e.g. `${MAIN_SELECTOR}`
    pub name: String,
    /// Unescaped new value
    pub value: String,
}

/// How to rewrite one argument cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentEdit {
    /// New cell text, escaped
    pub argument: String,
    /// Companion variable change, if the variable's value moved
    pub update: Option<VariableUpdate>,
}

impl ArgumentEdit {
    fn literal(healed: &str) -> Self {
        Self {
            argument: escape_cell(healed),
            update: None,
        }
    }
}

/// Work out how `argument`, which resolved to `failed`, must change so
/// that it resolves to `healed`.
///
/// Without exactly one `${NAME}` reference the whole cell is replaced. With
/// one, the cell is split into prefix, variable and suffix:
///
/// - suffix still matches: only the variable's value changed
/// - variable value still leads the remainder: only the suffix changed
/// - otherwise both changed, and the remainder is split at the length of
///   the old variable value. This is an approximation; it is exact only
///   when the new value has the old value's length.
#[must_use]
pub fn analyze(argument: &str, failed: &str, healed: &str) -> ArgumentEdit {
    let references: Vec<_> = variable_reference()
        .map(|re| re.find_iter(argument).collect())
        .unwrap_or_default();
    let [reference] = references.as_slice() else {
        return ArgumentEdit::literal(healed);
    };
    let prefix_raw = &argument[..reference.start()];
    let name = reference.as_str();
    let prefix = unescape_cell(prefix_raw);
    let suffix = unescape_cell(&argument[reference.end()..]);

    let Some(old_value) = failed
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_suffix(suffix.as_str()))
    else {
        return ArgumentEdit::literal(healed);
    };
    if healed == failed {
        return ArgumentEdit {
            argument: argument.to_string(),
            update: None,
        };
    }
    let Some(rest) = healed.strip_prefix(prefix.as_str()) else {
        return ArgumentEdit::literal(healed);
    };
    let rebuilt = |new_suffix: &str| format!("{prefix_raw}{name}{}", escape_fragment(new_suffix, false));
    let update = |value: &str| {
        Some(VariableUpdate {
            name: name.to_string(),
            value: value.to_string(),
        })
    };

    if let Some(new_value) = rest.strip_suffix(suffix.as_str()) {
        return ArgumentEdit {
            argument: argument.to_string(),
            update: update(new_value),
        };
    }
    if let Some(new_suffix) = rest.strip_prefix(old_value) {
        return ArgumentEdit {
            argument: rebuilt(new_suffix),
            update: None,
        };
    }
    let mut cut = old_value.len().min(rest.len());
    while !rest.is_char_boundary(cut) {
        cut -= 1;
    }
    let (new_value, new_suffix) = rest.split_at(cut);
    ArgumentEdit {
        argument: rebuilt(new_suffix),
        update: update(new_value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn update(name: &str, value: &str) -> Option<VariableUpdate> {
        Some(VariableUpdate {
            name: name.into(),
            value: value.into(),
        })
    }

    #[test]
    fn test_variable_value_changed() {
        let edit = analyze("${MAIN_SELECTOR} img", "article.old img", "article.new img");
        assert_eq!(edit.argument, "${MAIN_SELECTOR} img");
        assert_eq!(edit.update, update("${MAIN_SELECTOR}", "article.new"));
    }

    #[test]
    fn test_suffix_changed() {
        let edit = analyze("${MAIN_SELECTOR} img", "article.old img", "article.old picture");
        assert_eq!(edit.argument, "${MAIN_SELECTOR} picture");
        assert_eq!(edit.update, None);
    }

    #[test]
    fn test_both_changed_split_at_old_length() {
        let edit = analyze("${ROOT} > span", "div.old > span", "div.new > b.label");
        assert_eq!(edit.argument, "${ROOT} > b.label");
        assert_eq!(edit.update, update("${ROOT}", "div.new"));
    }

    #[test]
    fn test_both_changed_unequal_lengths_is_approximate() {
        let edit = analyze("${ROOT} span", "main span", "section b");
        assert_eq!(edit.update, update("${ROOT}", "sect"));
        assert_eq!(edit.argument, "${ROOT}ion b");
    }

    #[test]
    fn test_prefix_kept() {
        let edit = analyze("css=${ID_SEL}", "css=#old", "css=#new");
        assert_eq!(edit.argument, "css=${ID_SEL}");
        assert_eq!(edit.update, update("${ID_SEL}", "#new"));
    }

    #[test]
    fn test_whole_variable_argument() {
        let edit = analyze("${LOGIN_BUTTON}", "id=login", "css=button#login");
        assert_eq!(edit.argument, "${LOGIN_BUTTON}");
        assert_eq!(edit.update, update("${LOGIN_BUTTON}", "css=button#login"));
    }

    #[test]
    fn test_literal_replaced_whole() {
        let edit = analyze("id=user-name", "id=user-name", "css=input#username");
        assert_eq!(edit.argument, "css=input#username");
        assert_eq!(edit.update, None);
    }

    #[test]
    fn test_two_variables_replaced_whole() {
        let edit = analyze("${A} ${B}", "x y", "css=#z");
        assert_eq!(edit.argument, "css=#z");
        assert_eq!(edit.update, None);
    }

    #[test]
    fn test_prefix_changed_replaced_whole() {
        let edit = analyze("css=${X}", "css=#a", "xpath=//b");
        assert_eq!(edit.argument, "xpath=//b");
        assert_eq!(edit.update, None);
    }

    #[test]
    fn test_unchanged_is_noop() {
        let edit = analyze("${X} img", "a img", "a img");
        assert_eq!(edit.argument, "${X} img");
        assert_eq!(edit.update, None);
    }

    #[test]
    fn test_healed_value_escaped() {
        let edit = analyze("id=a", "id=a", "css=#a\\:b");
        assert_eq!(edit.argument, "css=#a\\\\:b");
    }
}
