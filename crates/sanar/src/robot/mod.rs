//! Robot Framework scripts: lossless parsing, argument analysis and the
//! rewriter that persists healed locators.

pub mod analyzer;
pub mod document;
pub mod rewriter;

pub use analyzer::{analyze, ArgumentEdit, VariableUpdate};
pub use document::{Document, KeywordCall, Section, TokenRef, VariableDefinition};
pub use rewriter::{CallEdits, RewriteReport, RewrittenFile, SourceRewriter};
