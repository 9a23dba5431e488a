//! Persisting healed locators into test scripts.
//!
//! Each file named by a replacement is parsed, its keyword-call arguments
//! rewritten in place, and the result written to a mirrored tree under the
//! output directory. Variable changes the analyzer produces are applied to
//! the file's own Variables section and to every imported resource that
//! already defines the variable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::analyzer::{analyze, VariableUpdate};
use super::document::{escape_cell, unescape_cell, Document};
use crate::ledger::LocatorReplacement;
use crate::result::{SanarError, SanarResult};

/// A file written by the rewriter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenFile {
    /// Original script
    pub source: PathBuf,
    /// Healed copy
    pub output: PathBuf,
    /// Path relative to the mirrored root
    pub relative: PathBuf,
    /// Argument cells changed
    pub replaced: usize,
    /// Variable definitions changed
    pub variables_updated: usize,
}

/// Outcome of [`SourceRewriter::apply`]
#[derive(Debug, Default)]
pub struct RewriteReport {
    /// Files written, in path order
    pub files: Vec<RewrittenFile>,
    /// Per-file failures; other files were still processed
    pub errors: Vec<SanarError>,
    /// Replacements that matched no call argument in their file
    pub unmatched: Vec<LocatorReplacement>,
}

impl RewriteReport {
    /// Error if any file failed
    ///
    /// # Errors
    ///
    /// Returns the single failure or a [`SanarError::Partial`].
    pub fn into_result(self) -> SanarResult<Vec<RewrittenFile>> {
        SanarError::from_failures(self.errors)?;
        Ok(self.files)
    }
}

#[derive(Debug)]
struct Working {
    document: Document,
    replaced: usize,
    variables_updated: usize,
}

/// Rewrites scripts into a mirrored output tree
#[derive(Debug, Clone)]
pub struct SourceRewriter {
    output_dir: PathBuf,
    source_root: Option<PathBuf>,
}

impl SourceRewriter {
    /// Write healed files below `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            source_root: None,
        }
    }

    /// Mirror paths relative to `root` instead of the files' common parent
    #[must_use]
    pub fn with_source_root(mut self, root: Option<PathBuf>) -> Self {
        self.source_root = root;
        self
    }

    /// Apply `replacements`, keyed by the file holding the calls.
    ///
    /// Unreadable imported resources only skip propagation into them. A
    /// primary file that cannot be read or a file that cannot be written is
    /// reported in [`RewriteReport::errors`].
    pub fn apply(&self, replacements: &BTreeMap<PathBuf, Vec<LocatorReplacement>>) -> RewriteReport {
        let mut report = RewriteReport::default();
        let root = self
            .source_root
            .clone()
            .unwrap_or_else(|| common_parent(replacements.keys()));
        let mut working: BTreeMap<PathBuf, Working> = BTreeMap::new();

        for (file, group) in replacements {
            let mut current = match self.checkout(&mut working, file, &root) {
                Ok(current) => current,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "script skipped");
                    report.errors.push(e);
                    continue;
                }
            };
            let CallEdits {
                replaced,
                updates,
                unmatched,
            } = rewrite_calls(&mut current.document, group);
            current.replaced += replaced;
            current.variables_updated += apply_variable_updates(&mut current.document, &updates);
            info!(path = %file.display(), replaced, variables = updates.len(), "script rewritten");
            working.insert(file.clone(), current);
            for replacement in unmatched {
                warn!(
                    path = %file.display(),
                    locator = %replacement.failed_locator,
                    healed = %replacement.healed_locator,
                    "healed locator matched no call argument"
                );
                report.unmatched.push(replacement);
            }

            if updates.is_empty() {
                continue;
            }
            for resource in resolve_resources(file) {
                let defines = Document::load(&resource)
                    .map(|doc| updates.iter().any(|u| doc.variable(&u.name).is_some()))
                    .unwrap_or(false);
                if !defines {
                    continue;
                }
                match self.checkout(&mut working, &resource, &root) {
                    Ok(mut target) => {
                        let changed = apply_variable_updates(&mut target.document, &updates);
                        debug!(path = %resource.display(), changed, "variables propagated");
                        target.variables_updated += changed;
                        working.insert(resource, target);
                    }
                    Err(e) => warn!(path = %resource.display(), error = %e, "resource skipped"),
                }
            }
        }

        for (source, current) in working {
            let relative = relative_to(&source, &root);
            let output = self.output_dir.join(&relative);
            match write_document(&output, &current.document) {
                Ok(()) => report.files.push(RewrittenFile {
                    source,
                    output,
                    relative,
                    replaced: current.replaced,
                    variables_updated: current.variables_updated,
                }),
                Err(e) => {
                    warn!(path = %output.display(), error = %e, "healed file not written");
                    report.errors.push(e);
                }
            }
        }
        report
    }

    /// Output path for `source`
    #[must_use]
    pub fn mirror_path(&self, source: &Path, root: &Path) -> PathBuf {
        self.output_dir.join(relative_to(source, root))
    }

    /// Document to edit for `path`: the in-progress copy, a healed copy
    /// left on disk by an earlier pass, or the original
    fn checkout(
        &self,
        working: &mut BTreeMap<PathBuf, Working>,
        path: &Path,
        root: &Path,
    ) -> SanarResult<Working> {
        if let Some(current) = working.remove(path) {
            return Ok(current);
        }
        let healed = self.mirror_path(path, root);
        let base = if healed.is_file() { healed } else { path.to_path_buf() };
        let text = std::fs::read_to_string(&base).map_err(|e| SanarError::read(&base, e))?;
        Ok(Working {
            document: Document::parse(path, &text)?,
            replaced: 0,
            variables_updated: 0,
        })
    }
}

/// What [`rewrite_calls`] did to one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEdits {
    /// Argument cells changed
    pub replaced: usize,
    /// Variable changes the analyzer asked for
    pub updates: Vec<VariableUpdate>,
    /// Replacements no argument matched, and not already applied
    pub unmatched: Vec<LocatorReplacement>,
}

/// Rewrite matching call arguments in `document`.
///
/// Within one call each replacement applies once. An argument already
/// holding the healed locator counts as a match.
pub fn rewrite_calls(document: &mut Document, replacements: &[LocatorReplacement]) -> CallEdits {
    let mut replaced = 0;
    let mut updates: Vec<VariableUpdate> = Vec::new();
    let mut matched = vec![false; replacements.len()];
    for call in document.keyword_calls() {
        let mut consumed = vec![false; replacements.len()];
        for arg in &call.args {
            let raw = document.token(*arg).to_string();
            let text = unescape_cell(&raw);
            for (i, r) in replacements.iter().enumerate() {
                if raw == r.healed_locator || text == r.healed_locator {
                    matched[i] = true;
                }
            }
            let hit = replacements.iter().enumerate().find(|(i, r)| {
                !consumed[*i]
                    && (raw == r.failed_locator
                        || text == r.failed_locator
                        || r.raw_argument.as_deref() == Some(raw.as_str()))
            });
            let Some((index, replacement)) = hit else {
                continue;
            };
            consumed[index] = true;
            matched[index] = true;
            let edit = analyze(&raw, &replacement.failed_locator, &replacement.healed_locator);
            if edit.argument != raw {
                debug!(
                    line = call.lineno,
                    locator = %replacement.failed_locator,
                    healed = %replacement.healed_locator,
                    "argument rewritten"
                );
                document.set_token(*arg, edit.argument);
                replaced += 1;
            }
            if let Some(update) = edit.update {
                if !updates.contains(&update) {
                    updates.push(update);
                }
            }
        }
    }
    let unmatched = replacements
        .iter()
        .zip(matched)
        .filter(|(_, hit)| !hit)
        .map(|(r, _)| r.clone())
        .collect();
    CallEdits {
        replaced,
        updates,
        unmatched,
    }
}

/// Set variables `document` already defines; never adds definitions.
///
/// Only single-value definitions are changed. Returns how many were.
pub fn apply_variable_updates(document: &mut Document, updates: &[VariableUpdate]) -> usize {
    let mut changed = 0;
    for update in updates {
        let Some(definition) = document.variable(&update.name) else {
            continue;
        };
        let [value] = definition.values.as_slice() else {
            debug!(variable = %update.name, "multi-value definition left unchanged");
            continue;
        };
        let escaped = escape_cell(&update.value);
        if document.token(*value) != escaped {
            document.set_token(*value, escaped);
            changed += 1;
        }
    }
    changed
}

/// Resource files `script` imports, transitively, in discovery order
#[must_use]
pub fn resolve_resources(script: &Path) -> Vec<PathBuf> {
    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    seen.insert(script.to_path_buf());
    let mut out = Vec::new();
    let mut queue = vec![script.to_path_buf()];
    while let Some(current) = queue.pop() {
        let document = match Document::load(&current) {
            Ok(document) => document,
            Err(e) => {
                debug!(path = %current.display(), error = %e, "imports not resolved");
                continue;
            }
        };
        for raw in document.resource_imports() {
            let Some(path) = resolve_import(&raw, &current) else {
                debug!(import = %raw, "resource path not resolvable");
                continue;
            };
            if seen.insert(path.clone()) {
                out.push(path.clone());
                queue.push(path);
            }
        }
    }
    out
}

/// Resolve a `Resource` setting value relative to `importer`
fn resolve_import(raw: &str, importer: &Path) -> Option<PathBuf> {
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let value = unescape_cell(raw)
        .replace("${CURDIR}", &dir.to_string_lossy())
        .replace("${/}", std::path::MAIN_SEPARATOR_STR);
    if value.contains("${") {
        return None;
    }
    let path = Path::new(&value);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    };
    let path = normalize(&path);
    path.is_file().then_some(path)
}

/// Lexically remove `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Deepest directory containing every path
fn common_parent<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> PathBuf {
    let mut common: Option<Vec<Component<'a>>> = None;
    for path in paths {
        let parent: Vec<Component<'a>> = path
            .parent()
            .map(|p| p.components().collect())
            .unwrap_or_default();
        common = Some(match common {
            None => parent,
            Some(prev) => prev
                .into_iter()
                .zip(parent)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.map(|c| c.iter().collect()).unwrap_or_default()
}

/// `path` below `root`, or its plain components when outside it
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect(),
    }
}

fn write_document(path: &Path, document: &Document) -> SanarResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SanarError::write(parent, e))?;
    }
    std::fs::write(path, document.render()).map_err(|e| SanarError::write(path, e))
}
