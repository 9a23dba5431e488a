//! Sanar: self-healing locators for UI test automation.
//!
//! When a test keyword fails because its element locator went stale, Sanar
//! derives replacement locators from the current UI, reruns the action with
//! each in turn, and afterwards rewrites the original test scripts to keep
//! the locator that worked.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SANAR Pipeline                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   failed keyword                                                 │
//! │        │                                                         │
//! │        ▼                                                         │
//! │   ┌────────────┐    ┌──────────────┐    ┌────────────┐          │
//! │   │ detect     │───►│ synth + rank │───►│ rerun via  │          │
//! │   │ (phrases)  │    │ or suggester │    │ host       │          │
//! │   └────────────┘    └──────────────┘    └─────┬──────┘          │
//! │                                               │ ledger          │
//! │                                               ▼                 │
//! │                     ┌────────────┐    ┌────────────┐            │
//! │   end of run ──────►│ rewriter   │───►│ reports    │            │
//! │                     │ (robot/)   │    │ (report/)  │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use sanar::{ActionIntent, Synthesizer, Technology, WebLibrary};
//!
//! let page = r#"<form><input id="username" type="text"></form>"#;
//! let candidates = Synthesizer::new(Technology::Web(WebLibrary::Selenium))
//!     .synthesize(page, "id=user-name", ActionIntent::TextEntry);
//! assert!(candidates.contains("css=input#username"));
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Locator adapters over captured or live UI trees
pub mod adapter;
/// Healing configuration
pub mod config;
/// Locator-failure detection from error text
pub mod detect;
/// Healing ledger and replacement derivation
pub mod ledger;
/// Locator string model
pub mod locator;
/// Recovery state machine
pub mod orchestrator;
/// Selector engines
pub mod query;
/// Candidate ranking
pub mod rank;
/// Summary, action log and diffs
#[allow(clippy::missing_errors_doc)]
pub mod report;
/// Error types
pub mod result;
/// Robot Framework script model and rewriter
pub mod robot;
/// Host runner integration
pub mod session;
/// Generative suggestion contract
pub mod suggest;
/// Candidate synthesis
pub mod synth;
/// UI tree parsing
pub mod tree;

/// OpenAI-compatible chat client and suggester
#[cfg(feature = "llm")]
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
pub mod llm;

pub use adapter::{
    verdict, CheckFailure, ElementMetadata, SnapshotAdapter, Technology, UiTreeAdapter,
    WebLibrary, UNAVAILABLE_SNAPSHOT,
};
pub use config::{GenerativeConfig, HealConfig, LocatorSource};
pub use detect::{detect, is_locator_failure, LocatorFailure};
pub use ledger::{deduplicate, CallSite, HealLedger, LocatorReplacement, ReportEntry};
pub use locator::{Dialect, Locator, Strategy};
pub use orchestrator::{
    FailedAction, HostRunner, RecoveryAttemptState, RecoveryOrchestrator, RecoveryOutcome,
    RecoveryPhase,
};
pub use rank::{rank_and_filter, rank_with_adapter};
pub use report::{Artifacts, ReportAssembler, Summary};
pub use result::{SanarError, SanarResult};
pub use robot::{Document, SourceRewriter};
pub use session::{finalize, Finalized, HealSession, RunnerHost};
pub use suggest::{
    CompletionBackend, GenerationError, GenerativeSuggester, LocatorSuggester, SuggestionRequest,
    SuggestionResponse,
};
pub use synth::{ActionIntent, CandidateList, Synthesizer, DEFAULT_MAX_CANDIDATES};
pub use tree::UiTree;

#[cfg(feature = "llm")]
pub use llm::{ChatSuggester, LlmClient};
