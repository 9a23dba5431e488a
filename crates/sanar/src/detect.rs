//! Locator-failure detection.
//!
//! A failure is healable only when its message carries phrasing the owning
//! library uses for "element not found". The allow-lists are deliberately
//! narrow: a locator failure worded differently is missed (no healing), but
//! a timeout, assertion or network error never triggers candidate
//! generation.

use regex::Regex;
use std::sync::OnceLock;

use crate::adapter::{Technology, WebLibrary};

/// Locator failure phrasing shared by the Robot Framework UI libraries
const SHARED_PHRASES: &[&str] = &[
    r"Element with locator '(?P<locator>.+?)' not found",
    r"Element '(?P<locator>.+?)' did not appear in",
    r"Page should have contained element '(?P<locator>.+?)' but did not",
];

const BROWSER_PHRASES: &[&str] = &[
    r#"(?s)Timeout \d+ms exceeded.*waiting for (?:locator|selector)\(["'](?P<locator>.+?)["']\)"#,
    r#"(?s)waiting for (?:locator|selector)\(["'](?P<locator>.+?)["']\).*Timeout \d+ms exceeded"#,
];

const SELENIUM_PHRASES: &[&str] = &[
    r"NoSuchElementException",
    r"Unable to locate element",
];

const APPIUM_PHRASES: &[&str] = &[
    r"Element locator '(?P<locator>.+?)' did not match any elements",
    r"An element could not be located on the page using the given search parameters",
    r"NoSuchElementError",
];

/// A recognised locator failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorFailure {
    /// Pattern that matched
    pub phrase: &'static str,
    /// Locator quoted in the message, when the phrase captures one
    pub locator: Option<String>,
}

struct Matchers {
    browser: Vec<(&'static str, Regex)>,
    selenium: Vec<(&'static str, Regex)>,
    appium: Vec<(&'static str, Regex)>,
}

fn compile(groups: &[&[&'static str]]) -> Vec<(&'static str, Regex)> {
    groups
        .iter()
        .flat_map(|group| group.iter())
        .filter_map(|phrase| {
            let re = Regex::new(&format!("(?i){phrase}")).ok()?;
            Some((*phrase, re))
        })
        .collect()
}

fn matchers() -> &'static Matchers {
    static MATCHERS: OnceLock<Matchers> = OnceLock::new();
    MATCHERS.get_or_init(|| Matchers {
        browser: compile(&[SHARED_PHRASES, BROWSER_PHRASES]),
        selenium: compile(&[SHARED_PHRASES, SELENIUM_PHRASES]),
        appium: compile(&[SHARED_PHRASES, APPIUM_PHRASES]),
    })
}

/// Classify an error message raised by a keyword of `technology`.
///
/// Returns `None` when the message is not recognisably a locator failure.
#[must_use]
pub fn detect(technology: Technology, error_message: &str) -> Option<LocatorFailure> {
    let m = matchers();
    let table = match technology {
        Technology::Web(WebLibrary::Browser) => &m.browser,
        Technology::Web(WebLibrary::Selenium) => &m.selenium,
        Technology::Mobile => &m.appium,
    };
    table.iter().find_map(|(phrase, re)| {
        let caps = re.captures(error_message)?;
        Some(LocatorFailure {
            phrase: *phrase,
            locator: caps.name("locator").map(|l| l.as_str().to_string()),
        })
    })
}

/// Whether `error_message` is a locator failure for `technology`
#[must_use]
pub fn is_locator_failure(technology: Technology, error_message: &str) -> bool {
    detect(technology, error_message).is_some()
}
