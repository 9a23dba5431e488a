//! Machine-readable run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::ledger::ReportEntry;

/// Counts for one source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    /// Healing events in the file
    pub events: usize,
    /// Of which healed
    pub healed: usize,
}

/// Flat record of what a run healed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// When the summary was assembled
    pub generated_at: DateTime<Utc>,
    /// Distinct healing events
    pub total_events: usize,
    /// Events with a replacement
    pub healed: usize,
    /// Events that exhausted their budget
    pub unhealed: usize,
    /// Tests with at least one event, sorted
    pub affected_tests: Vec<String>,
    /// `affected_tests.len()`
    pub affected_test_count: usize,
    /// Files holding failing calls, sorted
    pub affected_files: Vec<PathBuf>,
    /// `affected_files.len()`
    pub affected_file_count: usize,
    /// Per-file event counts
    pub per_file: BTreeMap<PathBuf, FileCounts>,
}

impl Summary {
    /// Summarize already deduplicated entries
    #[must_use]
    pub fn from_entries(entries: &[ReportEntry]) -> Self {
        Self::at(entries, Utc::now())
    }

    /// Summary with a fixed timestamp
    #[must_use]
    pub fn at(entries: &[ReportEntry], generated_at: DateTime<Utc>) -> Self {
        let healed = entries.iter().filter(|e| e.is_healed()).count();
        let tests: BTreeSet<&str> = entries.iter().map(|e| e.call_site.test_name.as_str()).collect();
        let mut per_file: BTreeMap<PathBuf, FileCounts> = BTreeMap::new();
        for entry in entries {
            let counts = per_file.entry(entry.call_site.source_file.clone()).or_default();
            counts.events += 1;
            if entry.is_healed() {
                counts.healed += 1;
            }
        }
        let affected_tests: Vec<String> = tests.into_iter().map(str::to_string).collect();
        let affected_files: Vec<PathBuf> = per_file.keys().cloned().collect();
        Self {
            generated_at,
            total_events: entries.len(),
            healed,
            unhealed: entries.len() - healed,
            affected_test_count: affected_tests.len(),
            affected_tests,
            affected_file_count: affected_files.len(),
            affected_files,
            per_file,
        }
    }

    /// Fraction of events healed, 0.0 when there were none
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn heal_rate(&self) -> f64 {
        if self.total_events == 0 {
            return 0.0;
        }
        self.healed as f64 / self.total_events as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::CallSite;

    fn entry(file: &str, test: &str, healed: &str) -> ReportEntry {
        ReportEntry {
            call_site: CallSite::new(file, test, 3),
            locator_origin: "id=a".into(),
            keyword: "Click Element".into(),
            keyword_args: vec!["id=a".into()],
            failed_locator: "id=a".into(),
            healed_locator: healed.into(),
            tried_locators: vec![],
        }
    }

    #[test]
    fn test_counts() {
        let entries = [
            entry("a.robot", "Login", "css=#b"),
            entry("a.robot", "Logout", ""),
            entry("b.robot", "Login", "css=#c"),
        ];
        let summary = Summary::from_entries(&entries);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.healed, 2);
        assert_eq!(summary.unhealed, 1);
        assert_eq!(summary.affected_tests, vec!["Login", "Logout"]);
        assert_eq!(summary.affected_file_count, 2);
        assert_eq!(
            summary.per_file[&PathBuf::from("a.robot")],
            FileCounts { events: 2, healed: 1 }
        );
    }

    #[test]
    fn test_empty_run() {
        let summary = Summary::from_entries(&[]);
        assert_eq!(summary.total_events, 0);
        assert!(summary.affected_files.is_empty());
        assert!(summary.heal_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_shape() {
        let generated_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let summary = Summary::at(&[entry("a.robot", "Login", "css=#b")], generated_at);
        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["generated_at"], "2026-01-02T03:04:05Z");
        assert_eq!(json["affected_test_count"], 1);
        assert_eq!(json["per_file"]["a.robot"]["healed"], 1);
    }
}
