//! Lossless model of Robot Framework test data.
//!
//! Every physical line is kept as alternating separator and data pieces
//! plus its line ending, so rendering an unmodified document reproduces
//! the input byte for byte. Edits replace single data pieces; spacing,
//! comments and blank lines are never touched.
//!
//! On top of the lines the parser records logical statements: a statement
//! starts on one line and absorbs any `...` continuation lines after it.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::result::{SanarError, SanarResult};

/// Separator between cells: two or more spaces, any tab, or edge whitespace
fn separator() -> Option<&'static Regex> {
    static SEPARATOR: OnceLock<Option<Regex>> = OnceLock::new();
    SEPARATOR
        .get_or_init(|| Regex::new(r"^[ \t]+|[ \t]+$|[ \t]*\t[ \t]*| {2,}").ok())
        .as_ref()
}

/// `${var}=` style assignment target
fn is_assignment(cell: &str) -> bool {
    static ASSIGNMENT: OnceLock<Option<Regex>> = OnceLock::new();
    ASSIGNMENT
        .get_or_init(|| Regex::new(r"^[$@&]\{[^}]+\}(\[[^\]]*\])* ?=?$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(cell))
}

/// Control structures and statements that are not keyword calls
const CONTROL_WORDS: &[&str] = &[
    "FOR", ":FOR", "IN", "END", "IF", "ELSE IF", "ELSE", "WHILE", "TRY", "EXCEPT", "FINALLY",
    "BREAK", "CONTINUE", "RETURN", "VAR", "GROUP",
];

/// Settings-section entries whose value is a keyword call
const SETTING_CALLS: &[&str] = &[
    "suite setup",
    "suite teardown",
    "test setup",
    "test teardown",
    "task setup",
    "task teardown",
];

/// Section kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Before the first header; ignored by Robot Framework
    Preamble,
    /// `*** Settings ***`
    Settings,
    /// `*** Variables ***`
    Variables,
    /// `*** Test Cases ***` or `*** Tasks ***`
    TestCases,
    /// `*** Keywords ***`
    Keywords,
    /// `*** Comments ***` or an unknown header
    Comments,
}

impl Section {
    fn from_header(header: &str) -> Self {
        let name: String = header
            .trim_matches(|c: char| c == '*' || c.is_whitespace())
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match name.as_str() {
            "settings" | "setting" => Self::Settings,
            "variables" | "variable" => Self::Variables,
            "test cases" | "test case" | "tasks" | "task" => Self::TestCases,
            "keywords" | "keyword" => Self::Keywords,
            _ => Self::Comments,
        }
    }

    const fn has_bodies(self) -> bool {
        matches!(self, Self::TestCases | Self::Keywords)
    }
}

/// One piece of a physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Whitespace between cells, including indentation
    Separator(String),
    /// Cell content, escapes intact
    Data(String),
}

/// One physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pieces: Vec<Piece>,
    eol: String,
}

impl Line {
    fn parse(text: &str, eol: &str) -> Self {
        let mut pieces = Vec::new();
        let mut last = 0;
        let separators = separator().map(|re| re.find_iter(text).collect::<Vec<_>>());
        for m in separators.unwrap_or_default() {
            if m.start() > last {
                pieces.push(Piece::Data(text[last..m.start()].to_string()));
            }
            pieces.push(Piece::Separator(m.as_str().to_string()));
            last = m.end();
        }
        if last < text.len() {
            pieces.push(Piece::Data(text[last..].to_string()));
        }
        Self {
            pieces,
            eol: eol.to_string(),
        }
    }

    fn render(&self, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Separator(s) | Piece::Data(s) => out.push_str(s),
            }
        }
        out.push_str(&self.eol);
    }

    fn is_indented(&self) -> bool {
        matches!(self.pieces.first(), Some(Piece::Separator(_)))
    }

    /// Indices of data pieces up to the first comment
    fn cells(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for (i, piece) in self.pieces.iter().enumerate() {
            if let Piece::Data(text) = piece {
                if text.starts_with('#') {
                    break;
                }
                out.push(i);
            }
        }
        out
    }
}

/// Address of one data piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenRef {
    /// 0-based line index
    pub line: usize,
    /// Piece index within the line
    pub piece: usize,
}

/// Statement roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Section header line
    SectionHeader,
    /// Test case or keyword name
    Name,
    /// Entry of the Settings section
    Setting,
    /// Entry of the Variables section
    Variable,
    /// Step inside a test case or keyword
    Step,
}

/// A logical statement spanning one line plus its continuations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Section the statement belongs to
    pub section: Section,
    /// Role of the statement
    pub kind: StatementKind,
    /// 1-based number of the first line
    pub lineno: usize,
    /// Data cells in order, continuation markers excluded
    pub tokens: Vec<TokenRef>,
}

/// A keyword call found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCall {
    /// 1-based line of the keyword name
    pub lineno: usize,
    /// Keyword name cell
    pub keyword: TokenRef,
    /// Argument cells
    pub args: Vec<TokenRef>,
}

/// A variable defined in the Variables section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Name cell, e.g. `${LOGIN}` or `${LOGIN} =`
    pub name: TokenRef,
    /// Value cells
    pub values: Vec<TokenRef>,
}

/// Parsed Robot Framework file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    bom: bool,
    lines: Vec<Line>,
    statements: Vec<Statement>,
}

impl Document {
    /// Parse `source` read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::ScriptParse`] when the text has data but no
    /// section header, which Robot Framework would ignore entirely.
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> SanarResult<Self> {
        let path = path.into();
        let (bom, body) = match source.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest),
            None => (false, source),
        };
        let lines: Vec<Line> = body
            .split_inclusive('\n')
            .map(|raw| {
                let (text, eol) = if let Some(t) = raw.strip_suffix("\r\n") {
                    (t, "\r\n")
                } else if let Some(t) = raw.strip_suffix('\n') {
                    (t, "\n")
                } else {
                    (raw, "")
                };
                Line::parse(text, eol)
            })
            .collect();
        let statements = group_statements(&lines);
        let has_data = lines.iter().any(|l| !l.cells().is_empty());
        if has_data && !statements.iter().any(|s| s.kind == StatementKind::SectionHeader) {
            return Err(SanarError::ScriptParse {
                path,
                message: "no section header found".to_string(),
            });
        }
        Ok(Self {
            path,
            bom,
            lines,
            statements,
        })
    }

    /// Read and parse the file at `path`
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileRead`] or [`SanarError::ScriptParse`].
    pub fn load(path: &Path) -> SanarResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| SanarError::read(path, e))?;
        Self::parse(path, &source)
    }

    /// Source path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical statements in file order
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Text of a data cell
    #[must_use]
    pub fn token(&self, at: TokenRef) -> &str {
        match self.lines.get(at.line).and_then(|l| l.pieces.get(at.piece)) {
            Some(Piece::Data(text)) => text,
            _ => "",
        }
    }

    /// Replace a data cell; the value must already be escaped
    pub fn set_token(&mut self, at: TokenRef, value: impl Into<String>) {
        if let Some(piece @ Piece::Data(_)) =
            self.lines.get_mut(at.line).and_then(|l| l.pieces.get_mut(at.piece))
        {
            *piece = Piece::Data(value.into());
        }
    }

    /// Serialize back to text
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        for line in &self.lines {
            line.render(&mut out);
        }
        out
    }

    /// Every keyword call: steps, `[Setup]`/`[Teardown]` and suite or test
    /// setup and teardown settings
    #[must_use]
    pub fn keyword_calls(&self) -> Vec<KeywordCall> {
        self.statements
            .iter()
            .flat_map(|statement| self.calls_in(statement))
            .collect()
    }

    fn calls_in(&self, statement: &Statement) -> Vec<KeywordCall> {
        let tokens = statement.tokens.as_slice();
        let text = |i: usize| self.token(tokens[i]);
        let start = match statement.kind {
            StatementKind::Setting => {
                let name = text(0).to_lowercase();
                let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
                if !SETTING_CALLS.contains(&name.as_str()) {
                    return Vec::new();
                }
                1
            }
            StatementKind::Step => {
                let first = text(0);
                if first.starts_with('[') && first.ends_with(']') {
                    let setting = first.to_lowercase();
                    if setting != "[setup]" && setting != "[teardown]" {
                        return Vec::new();
                    }
                    1
                } else {
                    let start = (0..tokens.len())
                        .find(|i| !is_assignment(text(*i)))
                        .unwrap_or(tokens.len());
                    if start < tokens.len() && text(start) == "IF" {
                        return self.inline_if_calls(&tokens[start..]);
                    }
                    if CONTROL_WORDS.contains(&first) {
                        return Vec::new();
                    }
                    start
                }
            }
            _ => return Vec::new(),
        };
        self.call_at(&tokens[start.min(tokens.len())..])
            .into_iter()
            .collect()
    }

    /// `keyword` followed by its arguments
    fn call_at(&self, tokens: &[TokenRef]) -> Option<KeywordCall> {
        let (keyword, args) = tokens.split_first()?;
        if self.token(*keyword).eq_ignore_ascii_case("NONE") {
            return None;
        }
        Some(KeywordCall {
            lineno: keyword.line + 1,
            keyword: *keyword,
            args: args.to_vec(),
        })
    }

    /// Calls in `IF    cond    Kw    args    ELSE IF    cond    Kw    ELSE    Kw`.
    /// A block `IF    cond` has none.
    fn inline_if_calls(&self, tokens: &[TokenRef]) -> Vec<KeywordCall> {
        let mut calls = Vec::new();
        let mut branch_start = 0;
        for i in 1..=tokens.len() {
            let boundary = i == tokens.len() || matches!(self.token(tokens[i]), "ELSE IF" | "ELSE");
            if !boundary {
                continue;
            }
            let branch = &tokens[branch_start..i];
            // IF and ELSE IF carry a condition before the keyword
            let skip = if self.token(branch[0]) == "ELSE" { 1 } else { 2 };
            if let Some(call) = branch.get(skip..).and_then(|rest| self.call_at(rest)) {
                calls.push(call);
            }
            branch_start = i;
        }
        calls
    }

    /// Definitions in the Variables section
    #[must_use]
    pub fn variables(&self) -> Vec<VariableDefinition> {
        self.statements
            .iter()
            .filter(|s| s.kind == StatementKind::Variable)
            .filter_map(|s| {
                let (name, values) = s.tokens.split_first()?;
                Some(VariableDefinition {
                    name: *name,
                    values: values.to_vec(),
                })
            })
            .collect()
    }

    /// Definition of the variable named like `name`, if any
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<VariableDefinition> {
        let wanted = normalize_variable(name);
        self.variables()
            .into_iter()
            .find(|v| normalize_variable(self.token(v.name)) == wanted)
    }

    /// Raw paths of `Resource` imports, in order
    #[must_use]
    pub fn resource_imports(&self) -> Vec<String> {
        self.statements
            .iter()
            .filter(|s| s.kind == StatementKind::Setting && s.tokens.len() >= 2)
            .filter(|s| self.token(s.tokens[0]).eq_ignore_ascii_case("resource"))
            .map(|s| self.token(s.tokens[1]).to_string())
            .collect()
    }
}

fn group_statements(lines: &[Line]) -> Vec<Statement> {
    let mut statements: Vec<Statement> = Vec::new();
    let mut section = Section::Preamble;
    // index into `statements` a continuation line extends
    let mut open: Option<usize> = None;

    for (index, line) in lines.iter().enumerate() {
        let cells = line.cells();
        let Some(&first) = cells.first() else {
            continue;
        };
        let at = |piece: usize| TokenRef { line: index, piece };
        let first_text = match &line.pieces[first] {
            Piece::Data(text) => text.as_str(),
            Piece::Separator(_) => "",
        };

        if !line.is_indented() && first_text.starts_with('*') {
            section = Section::from_header(first_text);
            statements.push(Statement {
                section,
                kind: StatementKind::SectionHeader,
                lineno: index + 1,
                tokens: vec![at(first)],
            });
            open = None;
            continue;
        }
        if matches!(section, Section::Preamble | Section::Comments) {
            continue;
        }
        if first_text == "..." {
            if let Some(statement) = open.and_then(|i| statements.get_mut(i)) {
                statement.tokens.extend(cells[1..].iter().map(|p| at(*p)));
            }
            continue;
        }

        let tokens: Vec<TokenRef> = cells.iter().map(|p| at(*p)).collect();
        let kind = match section {
            Section::Settings => StatementKind::Setting,
            Section::Variables => StatementKind::Variable,
            _ if section.has_bodies() && !line.is_indented() => {
                statements.push(Statement {
                    section,
                    kind: StatementKind::Name,
                    lineno: index + 1,
                    tokens: tokens[..1].to_vec(),
                });
                open = None;
                if tokens.len() == 1 {
                    continue;
                }
                statements.push(Statement {
                    section,
                    kind: StatementKind::Step,
                    lineno: index + 1,
                    tokens: tokens[1..].to_vec(),
                });
                open = Some(statements.len() - 1);
                continue;
            }
            _ => StatementKind::Step,
        };
        statements.push(Statement {
            section,
            kind,
            lineno: index + 1,
            tokens,
        });
        open = Some(statements.len() - 1);
    }
    statements
}

/// Variable name in Robot Framework's matching form: no decoration,
/// case, spaces or underscores
#[must_use]
pub fn normalize_variable(name: &str) -> String {
    let name = name.trim().trim_end_matches('=').trim_end();
    let inner = name
        .get(2..name.len().saturating_sub(1))
        .filter(|_| name.len() >= 3 && name[1..].starts_with('{') && name.ends_with('}'))
        .unwrap_or(name);
    inner
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Escape a literal value so it reads back as exactly `value` in one cell
#[must_use]
pub fn escape_cell(value: &str) -> String {
    if value.is_empty() {
        return "${EMPTY}".to_string();
    }
    escape_fragment(value, true)
}

/// Escape text placed after other cell content (no leading-edge rules)
#[must_use]
pub fn escape_fragment(value: &str, at_start: bool) -> String {
    let mut out = String::with_capacity(value.len());
    let chars: Vec<char> = value.chars().collect();
    for (i, c) in chars.iter().copied().enumerate() {
        let next = chars.get(i + 1).copied();
        let prev = i.checked_sub(1).map(|p| chars[p]);
        match c {
            '\\' => out.push_str("\\\\"),
            '$' | '@' | '&' | '%' if next == Some('{') => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 && at_start => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ' ' if (i == 0 && at_start) || next.is_none() || prev == Some(' ') => {
                out.push_str("\\ ");
            }
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_cell`] for comparisons; variables other than
/// `${EMPTY}` and `${SPACE}` are left as written
#[must_use]
pub fn unescape_cell(raw: &str) -> String {
    let raw = raw.replace("${EMPTY}", "").replace("${SPACE}", " ");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SUITE: &str = "\
*** Settings ***
Library           SeleniumLibrary
Resource          ${CURDIR}/common.resource
Suite Setup       Open Browser    ${URL}    chrome

*** Variables ***
${URL}            https://example.test
${MAIN_SELECTOR}    article.old
@{ITEMS}          one
...               two

*** Test Cases ***
Valid Login    # comment after name
    [Setup]    Go To    ${URL}/login
    Input Text    id=user-name    demo    # trailing comment
    ${title}=    Get Text    css=h1
    Click Element
    ...    css=#login
    FOR    ${item}    IN    @{ITEMS}
        Log    ${item}
    END
";

    fn suite() -> Document {
        Document::parse("suite.robot", SUITE).unwrap()
    }

    mod lossless_tests {
        use super::*;

        #[test]
        fn test_round_trip_exact() {
            assert_eq!(suite().render(), SUITE);
        }

        #[test]
        fn test_crlf_tabs_and_bom_preserved() {
            let text = "\u{feff}*** Test Cases ***\r\nT\r\n\tClick\tid=a \r\n";
            let doc = Document::parse("t.robot", text).unwrap();
            assert_eq!(doc.render(), text);
        }

        #[test]
        fn test_edit_touches_one_cell() {
            let mut doc = suite();
            let call = doc
                .keyword_calls()
                .into_iter()
                .find(|c| doc.token(c.keyword) == "Input Text")
                .unwrap();
            doc.set_token(call.args[0], "css=input#username");
            let rendered = doc.render();
            assert!(rendered.contains("    Input Text    css=input#username    demo    # trailing comment\n"));
            assert_eq!(rendered.lines().count(), SUITE.lines().count());
        }

        #[test]
        fn test_no_header_is_parse_error() {
            assert!(matches!(
                Document::parse("x.robot", "Click    id=a\n"),
                Err(SanarError::ScriptParse { .. })
            ));
            assert!(Document::parse("empty.robot", "").is_ok());
        }
    }

    mod structure_tests {
        use super::*;

        #[test]
        fn test_keyword_calls() {
            let doc = suite();
            let calls: Vec<(String, Vec<String>)> = doc
                .keyword_calls()
                .iter()
                .map(|c| {
                    (
                        doc.token(c.keyword).to_string(),
                        c.args.iter().map(|a| doc.token(*a).to_string()).collect(),
                    )
                })
                .collect();
            assert_eq!(
                calls,
                vec![
                    ("Open Browser".into(), vec!["${URL}".into(), "chrome".into()]),
                    ("Go To".into(), vec!["${URL}/login".into()]),
                    ("Input Text".into(), vec!["id=user-name".into(), "demo".into()]),
                    ("Get Text".into(), vec!["css=h1".into()]),
                    ("Click Element".into(), vec!["css=#login".into()]),
                    ("Log".into(), vec!["${item}".into()]),
                ]
            );
        }

        #[test]
        fn test_inline_if_branches_are_calls() {
            let text = "\
*** Test Cases ***
T
    IF    $admin    Click Element    id=admin    ELSE IF    $guest    Click Link    id=guest    ELSE    Log    none
    ${v}=    IF    $x    Get Text    css=h1    ELSE    Set Variable    -
    IF    $block
        Click Button    id=a
    ELSE
        No Operation
    END
";
            let doc = Document::parse("if.robot", text).unwrap();
            let calls: Vec<(String, Vec<String>)> = doc
                .keyword_calls()
                .iter()
                .map(|c| {
                    (
                        doc.token(c.keyword).to_string(),
                        c.args.iter().map(|a| doc.token(*a).to_string()).collect(),
                    )
                })
                .collect();
            assert_eq!(
                calls,
                vec![
                    ("Click Element".into(), vec!["id=admin".into()]),
                    ("Click Link".into(), vec!["id=guest".into()]),
                    ("Log".into(), vec!["none".into()]),
                    ("Get Text".into(), vec!["css=h1".into()]),
                    ("Set Variable".into(), vec!["-".into()]),
                    ("Click Button".into(), vec!["id=a".into()]),
                    ("No Operation".into(), vec![]),
                ]
            );
        }

        #[test]
        fn test_continuation_cell_addresses_its_own_line() {
            let doc = suite();
            let click = doc
                .keyword_calls()
                .into_iter()
                .find(|c| doc.token(c.keyword) == "Click Element")
                .unwrap();
            assert_eq!(click.args[0].line, click.keyword.line + 1);
        }

        #[test]
        fn test_variables_and_lookup() {
            let doc = suite();
            let main = doc.variable("${main selector}").unwrap();
            assert_eq!(doc.token(main.values[0]), "article.old");
            let items = doc.variable("@{ITEMS}").unwrap();
            assert_eq!(items.values.len(), 2);
            assert!(doc.variable("${MISSING}").is_none());
        }

        #[test]
        fn test_resource_imports() {
            assert_eq!(suite().resource_imports(), ["${CURDIR}/common.resource"]);
        }

        #[test]
        fn test_keyword_section_body() {
            let text = "*** Keywords ***\nLogin As\n    [Arguments]    ${user}\n    Input Text    name=user    ${user}\n";
            let doc = Document::parse("k.resource", text).unwrap();
            let calls = doc.keyword_calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].lineno, 4);
        }
    }

    mod escape_tests {
        use super::*;

        #[test]
        fn test_escape_cell() {
            assert_eq!(escape_cell("a  b"), "a \\ b");
            assert_eq!(escape_cell("#x"), "\\#x");
            assert_eq!(escape_cell("${x}"), "\\${x}");
            assert_eq!(escape_cell("a\\:b"), "a\\\\:b");
            assert_eq!(escape_cell(" lead"), "\\ lead");
            assert_eq!(escape_cell(""), "${EMPTY}");
        }

        #[test]
        fn test_unescape_inverts_escape() {
            for value in ["a  b", "#x", "${x}", "a\\:b", " lead", "trail ", "", "css=div > p"] {
                assert_eq!(unescape_cell(&escape_cell(value)), value);
            }
        }

        #[test]
        fn test_normalize_variable() {
            assert_eq!(normalize_variable("${Main_Selector} ="), "mainselector");
            assert_eq!(normalize_variable("${main selector}"), "mainselector");
            assert_eq!(normalize_variable("@{ITEMS}"), "items");
        }
    }
}
