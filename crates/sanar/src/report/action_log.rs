//! Human-readable log of every healing event, grouped by source file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use super::escape_html;
use crate::ledger::ReportEntry;

fn group(entries: &[ReportEntry]) -> BTreeMap<&Path, Vec<&ReportEntry>> {
    let mut groups: BTreeMap<&Path, Vec<&ReportEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.call_site.source_file.as_path())
            .or_default()
            .push(entry);
    }
    groups
}

/// Anchor id for a file section
fn anchor(index: usize) -> String {
    format!("file-{}", index + 1)
}

/// Render the HTML action log with a table of contents
#[must_use]
pub fn render_html(entries: &[ReportEntry]) -> String {
    let groups = group(entries);
    let mut html = String::new();
    html.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Sanar Action Log</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
        th, td { border: 1px solid #ddd; padding: 6px; text-align: left; vertical-align: top; }
        th { background: #f5f5f5; }
        code { font-family: monospace; }
        tr.healed td.outcome { background: #e8f5e9; }
        tr.unhealed td.outcome { background: #ffebee; }
    </style>
</head>
<body>
<h1>Healing Action Log</h1>
"#,
    );

    if groups.is_empty() {
        html.push_str("<p>No healing events were recorded.</p>\n");
    } else {
        html.push_str("<h2>Files</h2>\n<ul>\n");
        for (i, (file, items)) in groups.iter().enumerate() {
            let _ = writeln!(
                html,
                r##"<li><a href="#{}">{}</a> ({} events)</li>"##,
                anchor(i),
                escape_html(&file.display().to_string()),
                items.len()
            );
        }
        html.push_str("</ul>\n");
    }

    for (i, (file, items)) in groups.iter().enumerate() {
        let _ = writeln!(
            html,
            r#"<h2 id="{}">{}</h2>
<table>
<tr><th>Test</th><th>Line</th><th>Keyword</th><th>Arguments</th><th>Failed locator</th><th>Healed locator</th><th>Tried</th></tr>"#,
            anchor(i),
            escape_html(&file.display().to_string())
        );
        for entry in items {
            let (class, healed) = if entry.is_healed() {
                ("healed", format!("<code>{}</code>", escape_html(&entry.healed_locator)))
            } else {
                ("unhealed", "not healed".to_string())
            };
            let args: Vec<String> = entry
                .keyword_args
                .iter()
                .map(|a| format!("<code>{}</code>", escape_html(a)))
                .collect();
            let tried: Vec<String> = entry
                .tried_locators
                .iter()
                .map(|t| format!("<li><code>{}</code></li>", escape_html(t)))
                .collect();
            let _ = writeln!(
                html,
                r#"<tr class="{class}"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td><td class="outcome">{healed}</td><td><ol>{}</ol></td></tr>"#,
                escape_html(&entry.call_site.test_name),
                entry.call_site.lineno,
                escape_html(&entry.keyword),
                args.join(", "),
                escape_html(&entry.failed_locator),
                tried.concat()
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str(
        r#"<footer>
    <p>Generated by Sanar</p>
</footer>
</body>
</html>
"#,
    );
    html
}

/// Inline code span that survives Markdown table cells
fn md_code(text: &str) -> String {
    let text = text.replace('|', "\\|").replace('\n', " ");
    if text.contains('`') {
        format!("`` {text} ``")
    } else {
        format!("`{text}`")
    }
}

fn md_text(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render the Markdown action log
#[must_use]
pub fn render_markdown(entries: &[ReportEntry]) -> String {
    let mut md = String::from("# Healing Action Log\n\n");
    let groups = group(entries);
    if groups.is_empty() {
        md.push_str("No healing events were recorded.\n");
        return md;
    }
    for (file, items) in groups {
        let _ = writeln!(md, "## {}\n", md_text(&file.display().to_string()));
        md.push_str("| Test | Line | Keyword | Arguments | Failed locator | Healed locator | Tried |\n");
        md.push_str("|---|---|---|---|---|---|---|\n");
        for entry in items {
            let healed = if entry.is_healed() {
                md_code(&entry.healed_locator)
            } else {
                "not healed".to_string()
            };
            let args: Vec<String> = entry.keyword_args.iter().map(|a| md_code(a)).collect();
            let tried: Vec<String> = entry.tried_locators.iter().map(|t| md_code(t)).collect();
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {healed} | {} |",
                md_text(&entry.call_site.test_name),
                entry.call_site.lineno,
                md_text(&entry.keyword),
                args.join(", "),
                md_code(&entry.failed_locator),
                tried.join(" → ")
            );
        }
        md.push('\n');
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CallSite;

    fn entry(file: &str, failed: &str, healed: &str) -> ReportEntry {
        ReportEntry {
            call_site: CallSite::new(file, "Valid Login", 9),
            locator_origin: failed.into(),
            keyword: "Input Text".into(),
            keyword_args: vec![failed.into(), "demo".into()],
            failed_locator: failed.into(),
            healed_locator: healed.into(),
            tried_locators: vec!["css=#x".into(), healed.into()],
        }
    }

    mod html_tests {
        use super::*;

        #[test]
        fn test_grouped_with_toc() {
            let html = render_html(&[entry("b.robot", "id=b", "css=#b"), entry("a.robot", "id=a", "")]);
            let toc_a = html.find(r##"href="#file-1">a.robot"##).unwrap();
            let toc_b = html.find(r##"href="#file-2">b.robot"##).unwrap();
            assert!(toc_a < toc_b);
            assert!(html.contains(r#"<h2 id="file-2">b.robot</h2>"#));
            assert!(html.contains("not healed"));
        }

        #[test]
        fn test_free_text_escaped() {
            let html = render_html(&[entry("a.robot", "xpath=//a[@title=\"<x>\"]", "css=a")]);
            assert!(html.contains("xpath=//a[@title=&quot;&lt;x&gt;&quot;]"));
            assert!(!html.contains("<x>"));
        }

        #[test]
        fn test_empty_run_still_renders() {
            let html = render_html(&[]);
            assert!(html.contains("No healing events were recorded."));
        }
    }

    mod markdown_tests {
        use super::*;

        #[test]
        fn test_table_rows() {
            let md = render_markdown(&[entry("a.robot", "id=a", "css=#b")]);
            assert!(md.contains("## a.robot"));
            assert!(md.contains("| Valid Login | 9 | Input Text | `id=a`, `demo` | `id=a` | `css=#b` | `css=#x` → `css=#b` |"));
        }

        #[test]
        fn test_pipes_escaped() {
            let md = render_markdown(&[entry("a.robot", "xpath=//a | //b", "css=a")]);
            assert!(md.contains("`xpath=//a \\| //b`"));
        }
    }
}
