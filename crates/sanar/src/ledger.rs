//! Healing events recorded during a run.
//!
//! Entries are appended while the run is live and only read afterwards,
//! when the rewriter and the report assembler consume them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::result::{SanarError, SanarResult};

/// Where a failed keyword was called from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallSite {
    /// Suite file the running test belongs to
    pub suite_file: PathBuf,
    /// File containing the failing keyword call (suite or resource)
    pub source_file: PathBuf,
    /// Running test
    pub test_name: String,
    /// 1-based line of the keyword call
    pub lineno: usize,
}

impl CallSite {
    /// Call site inside a test of `suite_file`, called from the suite itself
    pub fn new(suite_file: impl Into<PathBuf>, test_name: impl Into<String>, lineno: usize) -> Self {
        let suite_file = suite_file.into();
        Self {
            source_file: suite_file.clone(),
            suite_file,
            test_name: test_name.into(),
            lineno,
        }
    }

    /// Set the file holding the call when it is not the suite
    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<PathBuf>) -> Self {
        self.source_file = source_file.into();
        self
    }
}

/// One completed healing event, healed or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Call site of the failed keyword
    pub call_site: CallSite,
    /// First argument as written in the source, before variable resolution
    pub locator_origin: String,
    /// Keyword name
    pub keyword: String,
    /// Resolved keyword arguments at failure time
    pub keyword_args: Vec<String>,
    /// Locator that failed
    pub failed_locator: String,
    /// Winning locator, empty when healing was exhausted
    pub healed_locator: String,
    /// Every candidate tried, in order
    pub tried_locators: Vec<String>,
}

impl ReportEntry {
    /// Whether a replacement was found
    #[must_use]
    pub fn is_healed(&self) -> bool {
        !self.healed_locator.is_empty()
    }

    /// Fields that make two entries the same event
    fn identity(&self) -> (&CallSite, &str, &str, &[String], &str) {
        (
            &self.call_site,
            &self.locator_origin,
            &self.keyword,
            &self.keyword_args,
            &self.failed_locator,
        )
    }
}

/// Drop entries describing an already seen event, keeping the first
#[must_use]
pub fn deduplicate(entries: &[ReportEntry]) -> Vec<ReportEntry> {
    let mut out: Vec<ReportEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !out.iter().any(|kept| kept.identity() == entry.identity()) {
            out.push(entry.clone());
        }
    }
    out
}

/// An edit the rewriter should make in one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorReplacement {
    /// File holding the keyword call
    pub file: PathBuf,
    /// Locator the call failed with
    pub failed_locator: String,
    /// Replacement locator
    pub healed_locator: String,
    /// First argument as written, when it differs from the failed locator
    pub raw_argument: Option<String>,
}

impl LocatorReplacement {
    /// Derive from a healed entry
    #[must_use]
    pub fn from_entry(entry: &ReportEntry) -> Option<Self> {
        if !entry.is_healed() {
            return None;
        }
        let raw = entry.locator_origin.trim();
        Some(Self {
            file: entry.call_site.source_file.clone(),
            failed_locator: entry.failed_locator.clone(),
            healed_locator: entry.healed_locator.clone(),
            raw_argument: (!raw.is_empty() && raw != entry.failed_locator).then(|| raw.to_string()),
        })
    }
}

/// Append-only collection of healing events for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealLedger {
    entries: Vec<ReportEntry>,
}

impl HealLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&mut self, entry: ReportEntry) {
        info!(
            keyword = %entry.keyword,
            locator = %entry.failed_locator,
            healed = %entry.healed_locator,
            tried = entry.tried_locators.len(),
            "healing event recorded"
        );
        self.entries.push(entry);
    }

    /// Entries in recording order
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with duplicates collapsed
    #[must_use]
    pub fn deduplicated(&self) -> Vec<ReportEntry> {
        deduplicate(&self.entries)
    }

    /// One replacement per distinct healed edit, grouped by file
    #[must_use]
    pub fn replacements(&self) -> BTreeMap<PathBuf, Vec<LocatorReplacement>> {
        let mut grouped: BTreeMap<PathBuf, Vec<LocatorReplacement>> = BTreeMap::new();
        for replacement in self.deduplicated().iter().filter_map(LocatorReplacement::from_entry) {
            let group = grouped.entry(replacement.file.clone()).or_default();
            // the first heal of a locator wins for the whole file
            let seen = group.iter().any(|r| {
                r.failed_locator == replacement.failed_locator
                    && r.raw_argument == replacement.raw_argument
            });
            if !seen {
                group.push(replacement);
            }
        }
        grouped
    }

    /// Write as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileWrite`] naming `path` on failure.
    pub fn save_json(&self, path: &Path) -> SanarResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SanarError::write(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| SanarError::write(path, e))
    }

    /// Read a ledger written by [`HealLedger::save_json`]
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileRead`] naming `path`, or a JSON error.
    pub fn load_json(path: &Path) -> SanarResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SanarError::read(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl FromIterator<ReportEntry> for HealLedger {
    fn from_iter<I: IntoIterator<Item = ReportEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
