//! Status output on stderr

use console::{style, Style, Term};
use sanar::Summary;

/// Styled status lines for command progress
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, color: Style, message: &str) -> String {
        let prefix = if self.use_color {
            color.bold().apply_to(symbol).to_string()
        } else {
            plain.to_string()
        };
        format!("{prefix} {message}")
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self
            .term
            .write_line(&self.prefixed("✓", "OK", Style::new().green(), message));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let _ = self
            .term
            .write_line(&self.prefixed("✗", "FAIL", Style::new().red(), message));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self
            .term
            .write_line(&self.prefixed("⚠", "WARN", Style::new().yellow(), message));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self
            .term
            .write_line(&self.prefixed("ℹ", "INFO", Style::new().blue(), message));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// One-line outcome of a heal run
    #[must_use]
    pub fn summary_line(&self, summary: &Summary, files: usize) -> String {
        let text = format!(
            "{} events, {} healed, {} unhealed, {} tests, {files} files rewritten",
            summary.total_events, summary.healed, summary.unhealed, summary.affected_test_count
        );
        if !self.use_color {
            return text;
        }
        let status = if summary.unhealed > 0 {
            Style::new().yellow().bold().apply_to("PARTIAL")
        } else {
            Style::new().green().bold().apply_to("HEALED")
        };
        format!("{status} {text}")
    }

    /// Print the heal summary
    pub fn summary(&self, summary: &Summary, files: usize) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(&self.summary_line(summary, files));
    }
}
