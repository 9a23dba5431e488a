//! Reports assembled after a run: summary, action log and per-file diffs.
//!
//! ```text
//! <output_dir>/
//! ├── summary.json
//! ├── action_log.html
//! ├── action_log.md
//! ├── healed/<mirrored scripts>
//! └── diffs/<mirrored scripts>.diff|.html
//! ```

pub mod action_log;
pub mod diff;
pub mod summary;

pub use diff::{diff_lines, DiffKind, DiffLine};
pub use summary::{FileCounts, Summary};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ledger::ReportEntry;
use crate::result::{SanarError, SanarResult};
use crate::robot::RewrittenFile;

/// Summary file name
pub const SUMMARY_FILE: &str = "summary.json";
/// HTML action log file name
pub const ACTION_LOG_HTML: &str = "action_log.html";
/// Markdown action log file name
pub const ACTION_LOG_MD: &str = "action_log.md";
/// Directory holding per-file diffs
pub const DIFFS_DIR: &str = "diffs";

/// Escape HTML special characters
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Rendered reports, before anything touches the disk
#[derive(Debug, Clone)]
pub struct Report {
    /// Machine-readable summary
    pub summary: Summary,
    /// HTML action log
    pub action_log_html: String,
    /// Markdown action log
    pub action_log_md: String,
}

/// Render summary and action logs for deduplicated entries
#[must_use]
pub fn assemble(entries: &[ReportEntry]) -> Report {
    Report {
        summary: Summary::from_entries(entries),
        action_log_html: action_log::render_html(entries),
        action_log_md: action_log::render_markdown(entries),
    }
}

/// Paths written by [`ReportAssembler::write`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    /// `summary.json`
    pub summary: PathBuf,
    /// `action_log.html`
    pub action_log_html: PathBuf,
    /// `action_log.md`
    pub action_log_md: PathBuf,
    /// Diff documents, unified and HTML, for every changed file
    pub diffs: Vec<PathBuf>,
}

/// Writes reports into the run's output directory
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    output_dir: PathBuf,
}

impl ReportAssembler {
    /// Write below `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Remove reports left by an earlier run. Healed scripts stay, they are
    /// the base for further heals.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileWrite`] for a file that exists but cannot
    /// be removed.
    pub fn clear(&self) -> SanarResult<()> {
        for name in [SUMMARY_FILE, ACTION_LOG_HTML, ACTION_LOG_MD] {
            let path = self.output_dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| SanarError::write(&path, e))?;
            }
        }
        let diffs = self.output_dir.join(DIFFS_DIR);
        if diffs.exists() {
            std::fs::remove_dir_all(&diffs).map_err(|e| SanarError::write(&diffs, e))?;
        }
        debug!(path = %self.output_dir.display(), "previous reports cleared");
        Ok(())
    }

    /// Write summary, action logs and a diff for each changed file.
    ///
    /// Summary and logs are written first so they survive a failing diff.
    ///
    /// # Errors
    ///
    /// Returns the first failure writing summary or logs. Diff failures are
    /// collected, naming the file involved, and returned together once every
    /// file has been tried.
    pub fn write(&self, entries: &[ReportEntry], files: &[RewrittenFile]) -> SanarResult<Artifacts> {
        let report = assemble(entries);
        let artifacts = Artifacts {
            summary: self.output_dir.join(SUMMARY_FILE),
            action_log_html: self.output_dir.join(ACTION_LOG_HTML),
            action_log_md: self.output_dir.join(ACTION_LOG_MD),
            diffs: Vec::new(),
        };
        write_file(&artifacts.summary, &serde_json::to_string_pretty(&report.summary)?)?;
        write_file(&artifacts.action_log_html, &report.action_log_html)?;
        write_file(&artifacts.action_log_md, &report.action_log_md)?;
        info!(
            events = report.summary.total_events,
            healed = report.summary.healed,
            path = %self.output_dir.display(),
            "reports written"
        );

        let mut artifacts = artifacts;
        let mut errors = Vec::new();
        for file in files {
            match self.write_diff(file) {
                Ok(paths) => artifacts.diffs.extend(paths),
                Err(e) => {
                    warn!(path = %file.source.display(), error = %e, "diff not written");
                    errors.push(e);
                }
            }
        }
        SanarError::from_failures(errors)?;
        Ok(artifacts)
    }

    /// Diff one healed file against its original; nothing for identical files
    fn write_diff(&self, file: &RewrittenFile) -> SanarResult<Vec<PathBuf>> {
        let original = std::fs::read_to_string(&file.source).map_err(|e| SanarError::read(&file.source, e))?;
        let healed = std::fs::read_to_string(&file.output).map_err(|e| SanarError::read(&file.output, e))?;
        let lines = diff_lines(&original, &healed);
        if !diff::has_changes(&lines) {
            debug!(path = %file.source.display(), "unchanged, no diff");
            return Ok(Vec::new());
        }
        let original_label = format!("original/{}", file.relative.display());
        let healed_label = format!("healed/{}", file.relative.display());
        let base = self.output_dir.join(DIFFS_DIR).join(&file.relative);
        let unified = with_suffix(&base, "diff");
        let html = with_suffix(&base, "html");
        write_file(&unified, &diff::render_unified(&lines, &original_label, &healed_label))?;
        write_file(&html, &diff::render_html(&lines, &original_label, &healed_label))?;
        debug!(path = %unified.display(), "diff written");
        Ok(vec![unified, html])
    }
}

/// `a/b.robot` + `diff` -> `a/b.robot.diff`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn write_file(path: &Path, contents: &str) -> SanarResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SanarError::write(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| SanarError::write(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::CallSite;
    use std::fs;

    fn entry(file: &Path) -> ReportEntry {
        ReportEntry {
            call_site: CallSite::new(file, "Login", 2),
            locator_origin: "id=a".into(),
            keyword: "Click Element".into(),
            keyword_args: vec!["id=a".into()],
            failed_locator: "id=a".into(),
            healed_locator: "css=#b".into(),
            tried_locators: vec!["css=#b".into()],
        }
    }

    fn rewritten(dir: &Path, name: &str, original: &str, healed: &str) -> RewrittenFile {
        let source = dir.join("src").join(name);
        let output = dir.join("out/healed").join(name);
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&source, original).unwrap();
        fs::write(&output, healed).unwrap();
        RewrittenFile {
            source,
            output,
            relative: PathBuf::from(name),
            replaced: 1,
            variables_updated: 0,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_html("\"q\" 'q'"), "&quot;q&quot; &#39;q&#39;");
    }

    mod write_tests {
        use super::*;

        #[test]
        fn test_all_artifacts_written() {
            let dir = tempfile::tempdir().unwrap();
            let file = rewritten(dir.path(), "login.robot", "T\n    Click Element    id=a\n", "T\n    Click Element    css=#b\n");
            let same = rewritten(dir.path(), "same.resource", "x\n", "x\n");
            let assembler = ReportAssembler::new(dir.path().join("out"));
            let artifacts = assembler.write(&[entry(&file.source)], &[file, same]).unwrap();

            assert!(artifacts.summary.is_file());
            assert!(artifacts.action_log_html.is_file());
            assert!(artifacts.action_log_md.is_file());
            assert_eq!(artifacts.diffs.len(), 2);
            let unified = fs::read_to_string(dir.path().join("out/diffs/login.robot.diff")).unwrap();
            assert!(unified.starts_with("--- original/login.robot\n+++ healed/login.robot\n"));
            assert!(unified.contains("-    Click Element    id=a\n+    Click Element    css=#b\n"));
            assert!(!dir.path().join("out/diffs/same.resource.diff").exists());
        }

        #[test]
        fn test_missing_side_reports_path_after_other_files() {
            let dir = tempfile::tempdir().unwrap();
            let mut broken = rewritten(dir.path(), "broken.robot", "a\n", "b\n");
            broken.output = dir.path().join("out/healed/gone.robot");
            let good = rewritten(dir.path(), "good.robot", "a\n", "b\n");
            let assembler = ReportAssembler::new(dir.path().join("out"));
            let err = assembler.write(&[], &[broken, good]).unwrap_err();
            assert!(matches!(&err, SanarError::FileRead { path, .. } if path.ends_with("gone.robot")));
            assert!(dir.path().join("out/diffs/good.robot.diff").is_file());
            assert!(dir.path().join("out/summary.json").is_file());
        }

        #[test]
        fn test_clear_keeps_healed_scripts() {
            let dir = tempfile::tempdir().unwrap();
            let file = rewritten(dir.path(), "login.robot", "a\n", "b\n");
            let assembler = ReportAssembler::new(dir.path().join("out"));
            assembler.write(&[], &[file.clone()]).unwrap();
            assembler.clear().unwrap();
            assert!(!dir.path().join("out/summary.json").exists());
            assert!(!dir.path().join("out/diffs").exists());
            assert!(file.output.is_file());
        }
    }
}
