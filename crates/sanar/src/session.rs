//! Integration surface for a host test runner.
//!
//! The runner reports each failed keyword through
//! [`HealSession::on_action_failed`], and calls [`HealSession::finalize`]
//! once the run is over. Healing events are only appended while the run is
//! live; rewriting and reporting read them afterwards.

use std::path::Path;
use tracing::{debug, info};

use crate::adapter::{SnapshotAdapter, Technology, UiTreeAdapter};
use crate::config::HealConfig;
#[cfg(feature = "llm")]
use crate::config::LocatorSource;
use crate::ledger::{CallSite, HealLedger, LocatorReplacement};
use crate::orchestrator::{
    FailedAction, HostRunner, RecoveryAttemptState, RecoveryOrchestrator, RecoveryOutcome,
};
use crate::report::{Artifacts, ReportAssembler};
use crate::result::{SanarError, SanarResult};
use crate::robot::{RewrittenFile, SourceRewriter};

/// Directory below the output dir holding healed scripts
pub const HEALED_DIR: &str = "healed";

/// What the host runner provides besides reruns
pub trait RunnerHost: HostRunner {
    /// Serialized UI of `technology` right now, or `None` when it cannot be
    /// captured (no open browser or session)
    fn page_source(&mut self, technology: Technology) -> Option<String>;
}

/// Everything [`finalize`] produced
#[derive(Debug, Clone, Default)]
pub struct Finalized {
    /// Healed scripts written
    pub files: Vec<RewrittenFile>,
    /// Report artifacts
    pub artifacts: Artifacts,
    /// Healed locators no call argument in their file matched
    pub unmatched: Vec<LocatorReplacement>,
}

/// Healing state for one test run
#[derive(Debug)]
pub struct HealSession {
    orchestrator: RecoveryOrchestrator,
    ledger: HealLedger,
    state: RecoveryAttemptState,
}

impl HealSession {
    /// Session for `config`.
    ///
    /// With the `llm` feature and a generative locator source, a chat
    /// suggester is built from `config.generative`.
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::Config`] for invalid configuration.
    pub fn new(config: HealConfig) -> SanarResult<Self> {
        config.validate()?;
        #[cfg(feature = "llm")]
        let orchestrator = if config.locator_source == LocatorSource::Generative {
            let suggester = crate::llm::ChatSuggester::from_config(&config.generative)?;
            RecoveryOrchestrator::new(config).with_suggester(Box::new(suggester))
        } else {
            RecoveryOrchestrator::new(config)
        };
        #[cfg(not(feature = "llm"))]
        let orchestrator = RecoveryOrchestrator::new(config);
        Ok(Self::with_orchestrator(orchestrator))
    }

    /// Session around a prepared orchestrator
    #[must_use]
    pub fn with_orchestrator(orchestrator: RecoveryOrchestrator) -> Self {
        Self {
            orchestrator,
            ledger: HealLedger::new(),
            state: RecoveryAttemptState::new(),
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &HealConfig {
        self.orchestrator.config()
    }

    /// Events recorded so far
    #[must_use]
    pub const fn ledger(&self) -> &HealLedger {
        &self.ledger
    }

    /// Handle one failed keyword, rerunning it with candidates until it
    /// heals or the budget is spent.
    ///
    /// `args` are the resolved arguments; `raw_args` the same arguments as
    /// written in the script, before variable substitution, or empty when
    /// the host cannot tell. Without them a locator built from variables
    /// cannot be found again when the script is rewritten.
    ///
    /// The UI is captured once through [`RunnerHost::page_source`]; an
    /// uncapturable UI still lets the attempt run with default checks.
    pub fn on_action_failed<H: RunnerHost>(
        &mut self,
        call_site: CallSite,
        action_name: &str,
        args: &[String],
        raw_args: &[String],
        error_message: &str,
        library: &str,
        host: &mut H,
    ) -> RecoveryOutcome {
        let Some(technology) = Technology::from_library(library) else {
            debug!(library, keyword = action_name, "library not healable");
            return RecoveryOutcome::NotHealable;
        };
        let adapter = match host.page_source(technology) {
            Some(markup) => SnapshotAdapter::new(technology, markup),
            None => SnapshotAdapter::absent(technology),
        };
        let mut failure = FailedAction::new(call_site, action_name, args.to_vec(), error_message, library);
        if let Some(raw) = raw_args.first() {
            failure = failure.with_raw_locator(raw.as_str());
        }
        self.recover(&failure, &adapter, host)
    }

    /// Handle a failure against a caller-supplied adapter
    pub fn recover(
        &mut self,
        failure: &FailedAction,
        adapter: &dyn UiTreeAdapter,
        host: &mut dyn HostRunner,
    ) -> RecoveryOutcome {
        let outcome = self
            .orchestrator
            .resolve(&mut self.state, failure, adapter, host, &mut self.ledger);
        self.state.reset();
        outcome
    }

    /// Save recorded events for a later `sanador heal`
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileWrite`] naming `path`.
    pub fn save_ledger(&self, path: &Path) -> SanarResult<()> {
        self.ledger.save_json(path)
    }

    /// End the run: rewrite scripts and write reports.
    ///
    /// # Errors
    ///
    /// See [`finalize`].
    pub fn finalize(self) -> SanarResult<Finalized> {
        finalize(self.orchestrator.config(), &self.ledger)
    }
}

/// Rewrite scripts for every healed event in `ledger` and write reports
/// into `config.output_dir`.
///
/// Reports from a previous run are cleared first. Every file is attempted
/// even when another fails.
///
/// # Errors
///
/// Returns the failures naming their paths, as a [`SanarError::Partial`]
/// when there is more than one.
pub fn finalize(config: &HealConfig, ledger: &HealLedger) -> SanarResult<Finalized> {
    let assembler = ReportAssembler::new(&config.output_dir);
    assembler.clear()?;

    let entries = ledger.deduplicated();
    let rewrite = SourceRewriter::new(config.output_dir.join(HEALED_DIR))
        .with_source_root(config.source_root.clone())
        .apply(&ledger.replacements());
    let mut errors = rewrite.errors;
    let files = rewrite.files;
    let unmatched = rewrite.unmatched;

    let artifacts = match assembler.write(&entries, &files) {
        Ok(artifacts) => artifacts,
        Err(SanarError::Partial { errors: inner }) => {
            errors.extend(inner);
            Artifacts::default()
        }
        Err(e) => {
            errors.push(e);
            Artifacts::default()
        }
    };
    info!(
        events = entries.len(),
        files = files.len(),
        errors = errors.len(),
        unmatched = unmatched.len(),
        path = %config.output_dir.display(),
        "run finalized"
    );
    SanarError::from_failures(errors)?;
    Ok(Finalized {
        files,
        artifacts,
        unmatched,
    })
}
