//! Line diffs between original and healed scripts.

use std::fmt::Write as _;

use super::escape_html;

/// Lines of unchanged context around each hunk
pub const CONTEXT_LINES: usize = 3;

/// Kind of diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Present in both
    Equal,
    /// Only in the original
    Removed,
    /// Only in the healed file
    Added,
}

/// One line of a diff with its 1-based numbers on each side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Kind
    pub kind: DiffKind,
    /// Line text without terminator
    pub text: String,
    /// Number in the original, if present there
    pub old_no: Option<usize>,
    /// Number in the healed file, if present there
    pub new_no: Option<usize>,
}

/// Line-level diff via longest common subsequence.
///
/// Common leading and trailing lines are trimmed before the quadratic part,
/// so a handful of edited lines in a long script stays cheap.
#[must_use]
pub fn diff_lines(original: &str, healed: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = healed.lines().collect();

    let head = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let tail = old[head..]
        .iter()
        .rev()
        .zip(new[head..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old[head..old.len() - tail];
    let new_mid = &new[head..new.len() - tail];

    // lcs[i][j] = LCS length of old_mid[i..] and new_mid[j..]
    let mut lcs = vec![vec![0usize; new_mid.len() + 1]; old_mid.len() + 1];
    for i in (0..old_mid.len()).rev() {
        for j in (0..new_mid.len()).rev() {
            lcs[i][j] = if old_mid[i] == new_mid[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut o, mut n) = (0, 0);
    let mut push = |kind: DiffKind, text: &str, o: &mut usize, n: &mut usize| {
        let (old_no, new_no) = match kind {
            DiffKind::Equal => {
                *o += 1;
                *n += 1;
                (Some(*o), Some(*n))
            }
            DiffKind::Removed => {
                *o += 1;
                (Some(*o), None)
            }
            DiffKind::Added => {
                *n += 1;
                (None, Some(*n))
            }
        };
        out.push(DiffLine {
            kind,
            text: text.to_string(),
            old_no,
            new_no,
        });
    };

    for line in &old[..head] {
        push(DiffKind::Equal, *line, &mut o, &mut n);
    }
    let (mut i, mut j) = (0, 0);
    while i < old_mid.len() || j < new_mid.len() {
        if i < old_mid.len() && j < new_mid.len() && old_mid[i] == new_mid[j] {
            push(DiffKind::Equal, old_mid[i], &mut o, &mut n);
            i += 1;
            j += 1;
        } else if i < old_mid.len() && (j == new_mid.len() || lcs[i + 1][j] >= lcs[i][j + 1]) {
            push(DiffKind::Removed, old_mid[i], &mut o, &mut n);
            i += 1;
        } else {
            push(DiffKind::Added, new_mid[j], &mut o, &mut n);
            j += 1;
        }
    }
    for line in &old[old.len() - tail..] {
        push(DiffKind::Equal, *line, &mut o, &mut n);
    }
    out
}

/// Whether the diff has any change
#[must_use]
pub fn has_changes(lines: &[DiffLine]) -> bool {
    lines.iter().any(|l| l.kind != DiffKind::Equal)
}

/// Ranges of `lines` to show, each a change plus surrounding context
fn hunks(lines: &[DiffLine], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.kind == DiffKind::Equal {
            continue;
        }
        let start = i.saturating_sub(context);
        let end = (i + context + 1).min(lines.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// Unified diff text with `original`/`healed` file labels
#[must_use]
pub fn render_unified(lines: &[DiffLine], original_label: &str, healed_label: &str) -> String {
    let mut out = format!("--- {original_label}\n+++ {healed_label}\n");
    for (start, end) in hunks(lines, CONTEXT_LINES) {
        let hunk = &lines[start..end];
        let old_count = hunk.iter().filter(|l| l.kind != DiffKind::Added).count();
        let new_count = hunk.iter().filter(|l| l.kind != DiffKind::Removed).count();
        let old_start = first_number(lines, start, |l| l.old_no);
        let new_start = first_number(lines, start, |l| l.new_no);
        let _ = writeln!(
            out,
            "@@ -{},{old_count} +{},{new_count} @@",
            if old_count == 0 { old_start.saturating_sub(1) } else { old_start },
            if new_count == 0 { new_start.saturating_sub(1) } else { new_start },
        );
        for line in hunk {
            let marker = match line.kind {
                DiffKind::Equal => ' ',
                DiffKind::Removed => '-',
                DiffKind::Added => '+',
            };
            let _ = writeln!(out, "{marker}{}", line.text);
        }
    }
    out
}

/// Line number the hunk starting at `start` begins on for one side
fn first_number(lines: &[DiffLine], start: usize, side: impl Fn(&DiffLine) -> Option<usize>) -> usize {
    lines[start..]
        .iter()
        .find_map(&side)
        .or_else(|| lines[..start].iter().rev().find_map(&side).map(|n| n + 1))
        .unwrap_or(1)
}

/// Side-by-side HTML page, original on the left and healed on the right
#[must_use]
pub fn render_html(lines: &[DiffLine], original_label: &str, healed_label: &str) -> String {
    let mut html = String::new();
    html.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Sanar Diff</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        table { border-collapse: collapse; width: 100%; font-family: monospace; }
        td { padding: 0 6px; white-space: pre-wrap; vertical-align: top; }
        td.no { color: #888; text-align: right; width: 3em; }
        .removed { background: #ffebee; }
        .added { background: #e8f5e9; }
        tr.gap td { background: #f5f5f5; color: #888; }
    </style>
</head>
<body>
"#,
    );
    let _ = writeln!(
        html,
        r#"<table>
<tr><th colspan="2">Original: {}</th><th colspan="2">Healed: {}</th></tr>"#,
        escape_html(original_label),
        escape_html(healed_label)
    );

    for (n, (start, end)) in hunks(lines, CONTEXT_LINES).into_iter().enumerate() {
        if n > 0 || start > 0 {
            html.push_str("<tr class=\"gap\"><td colspan=\"4\">…</td></tr>\n");
        }
        let hunk = &lines[start..end];
        let mut k = 0;
        while k < hunk.len() {
            if hunk[k].kind == DiffKind::Equal {
                row(&mut html, Some(&hunk[k]), Some(&hunk[k]));
                k += 1;
                continue;
            }
            // pair a run of removals with the additions that follow it
            let removed: Vec<&DiffLine> = hunk[k..].iter().take_while(|l| l.kind == DiffKind::Removed).collect();
            k += removed.len();
            let added: Vec<&DiffLine> = hunk[k..].iter().take_while(|l| l.kind == DiffKind::Added).collect();
            k += added.len();
            for r in 0..removed.len().max(added.len()) {
                row(&mut html, removed.get(r).copied(), added.get(r).copied());
            }
        }
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn row(html: &mut String, left: Option<&DiffLine>, right: Option<&DiffLine>) {
    let cell = |line: Option<&DiffLine>, number: fn(&DiffLine) -> Option<usize>| match line {
        Some(l) => {
            let class = match l.kind {
                DiffKind::Equal => "",
                DiffKind::Removed => " class=\"removed\"",
                DiffKind::Added => " class=\"added\"",
            };
            format!(
                "<td class=\"no\">{}</td><td{class}>{}</td>",
                number(l).map(|n| n.to_string()).unwrap_or_default(),
                escape_html(&l.text)
            )
        }
        None => "<td class=\"no\"></td><td></td>".to_string(),
    };
    let _ = writeln!(html, "<tr>{}{}</tr>", cell(left, |l| l.old_no), cell(right, |l| l.new_no));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ORIGINAL: &str = "a\nb\nc\nd\ne\nf\ng\nh\ni\n";
    const HEALED: &str = "a\nb\nc\nd\nE\nf\ng\nh\ni\n";

    mod lcs_tests {
        use super::*;

        #[test]
        fn test_single_changed_line() {
            let lines = diff_lines(ORIGINAL, HEALED);
            let changed: Vec<_> = lines.iter().filter(|l| l.kind != DiffKind::Equal).collect();
            assert_eq!(changed.len(), 2);
            assert_eq!(changed[0].kind, DiffKind::Removed);
            assert_eq!(changed[0].text, "e");
            assert_eq!(changed[0].old_no, Some(5));
            assert_eq!(changed[1].kind, DiffKind::Added);
            assert_eq!(changed[1].new_no, Some(5));
        }

        #[test]
        fn test_identical_has_no_changes() {
            assert!(!has_changes(&diff_lines(ORIGINAL, ORIGINAL)));
        }

        #[test]
        fn test_insertion_and_deletion() {
            let lines = diff_lines("x\ny\n", "x\nnew\ny\n");
            let kinds: Vec<_> = lines.iter().map(|l| l.kind).collect();
            assert_eq!(kinds, vec![DiffKind::Equal, DiffKind::Added, DiffKind::Equal]);

            let lines = diff_lines("x\ny\nz\n", "x\nz\n");
            assert_eq!(lines[1].kind, DiffKind::Removed);
            assert_eq!(lines[1].text, "y");
        }

        proptest! {
            #[test]
            fn prop_sides_reconstruct_inputs(
                old in prop::collection::vec("[abc]", 0..12),
                new in prop::collection::vec("[abc]", 0..12),
            ) {
                let (original, healed) = (old.join("\n"), new.join("\n"));
                let lines = diff_lines(&original, &healed);
                let left: Vec<&str> = lines.iter().filter(|l| l.kind != DiffKind::Added).map(|l| l.text.as_str()).collect();
                let right: Vec<&str> = lines.iter().filter(|l| l.kind != DiffKind::Removed).map(|l| l.text.as_str()).collect();
                prop_assert_eq!(left, original.lines().collect::<Vec<_>>());
                prop_assert_eq!(right, healed.lines().collect::<Vec<_>>());
            }
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_unified_hunk_with_context() {
            let text = render_unified(&diff_lines(ORIGINAL, HEALED), "original/a.robot", "healed/a.robot");
            assert_eq!(
                text,
                "--- original/a.robot\n+++ healed/a.robot\n@@ -2,7 +2,7 @@\n b\n c\n d\n-e\n+E\n f\n g\n h\n"
            );
        }

        #[test]
        fn test_html_escapes_and_labels() {
            let html = render_html(&diff_lines("<a>\n", "<b>\n"), "x.robot", "y.robot");
            assert!(html.contains("Original: x.robot"));
            assert!(html.contains("Healed: y.robot"));
            assert!(html.contains("&lt;a&gt;"));
            assert!(html.contains("class=\"removed\""));
            assert!(html.contains("class=\"added\""));
            assert!(!html.contains("<a>"));
        }
    }
}
