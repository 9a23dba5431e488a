//! Recovery state machine for one failed action.
//!
//! ```text
//! IDLE -> DETECTING -> GENERATING -> RETRYING -> HEALED
//!             |            ^            |    \-> EXHAUSTED
//!             |            \------------/
//!             \-> no healing (non-locator failure)
//! ```
//!
//! The orchestrator holds configuration only. All per-action state lives in
//! a [`RecoveryAttemptState`] the caller owns and passes in on every call,
//! so nothing leaks from one failed action into the next.

use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::adapter::{Technology, UiTreeAdapter};
use crate::config::{HealConfig, LocatorSource};
use crate::detect::detect;
use crate::ledger::{CallSite, HealLedger, ReportEntry};
use crate::rank::rank_with_adapter;
use crate::suggest::{GenerationError, LocatorSuggester, SuggestionRequest, SuggestionResponse};
use crate::synth::{ActionIntent, CandidateList, Synthesizer};

/// Phase of a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPhase {
    /// No failure being handled
    #[default]
    Idle,
    /// Classifying the failure
    Detecting,
    /// Producing a batch of candidates
    Generating,
    /// Rerunning the action with candidates
    Retrying,
    /// A candidate made the action pass
    Healed,
    /// Budget spent without success
    Exhausted,
}

impl RecoveryPhase {
    /// Whether the attempt has resolved
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Healed | Self::Exhausted)
    }
}

impl fmt::Display for RecoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Detecting => "DETECTING",
            Self::Generating => "GENERATING",
            Self::Retrying => "RETRYING",
            Self::Healed => "HEALED",
            Self::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// A keyword failure as reported by the host runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    /// Where the keyword was called
    pub call_site: CallSite,
    /// Keyword name, possibly library-qualified
    pub keyword: String,
    /// Resolved arguments; the first is the locator
    pub args: Vec<String>,
    /// First argument as written in the source, when known
    pub raw_locator: Option<String>,
    /// Error text the keyword failed with
    pub error_message: String,
    /// Library owning the keyword
    pub library: String,
}

impl FailedAction {
    /// Failure of `keyword` from `library` at `call_site`
    pub fn new(
        call_site: CallSite,
        keyword: impl Into<String>,
        args: Vec<String>,
        error_message: impl Into<String>,
        library: impl Into<String>,
    ) -> Self {
        Self {
            call_site,
            keyword: keyword.into(),
            args,
            raw_locator: None,
            error_message: error_message.into(),
            library: library.into(),
        }
    }

    /// Record the unresolved first argument
    #[must_use]
    pub fn with_raw_locator(mut self, raw: impl Into<String>) -> Self {
        self.raw_locator = Some(raw.into());
        self
    }

    /// Locator the action failed with
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Per-action mutable recovery state
#[derive(Debug, Clone, Default)]
pub struct RecoveryAttemptState {
    phase: RecoveryPhase,
    retry_count: u32,
    suggestions: CandidateList,
    tried_locators: Vec<String>,
    healed: bool,
    action: Option<FailedAction>,
}

impl RecoveryAttemptState {
    /// Fresh state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Generation rounds used so far
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Candidates not yet tried from the current batch
    #[must_use]
    pub fn suggestions(&self) -> &CandidateList {
        &self.suggestions
    }

    /// Every candidate rerun so far, in order
    #[must_use]
    pub fn tried_locators(&self) -> &[String] {
        &self.tried_locators
    }

    /// Whether a candidate made the action pass
    #[must_use]
    pub const fn healed(&self) -> bool {
        self.healed
    }

    /// The failure being recovered
    #[must_use]
    pub fn action(&self) -> Option<&FailedAction> {
        self.action.as_ref()
    }

    /// Whether a fresh batch of candidates is needed
    #[must_use]
    pub fn should_generate_locators(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Back to the idle baseline
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn transition(&mut self, to: RecoveryPhase) {
        debug!(from = %self.phase, to = %to, retry_count = self.retry_count, "recovery transition");
        self.phase = to;
    }
}

/// Host runner callback for rerunning an action
pub trait HostRunner {
    /// Rerun `keyword` with `args`; `Err` carries the new failure message
    fn rerun_action(&mut self, keyword: &str, args: &[String]) -> Result<Option<Value>, String>;
}

/// Result of one orchestrator call
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// The failure is not healable; it is reported as-is
    NotHealable,
    /// The action passed with `locator`
    Healed {
        /// Winning locator
        locator: String,
        /// Value the rerun returned, for `${var}=` assignments
        return_value: Option<Value>,
    },
    /// The rerun with `candidate` failed; report the failure again to continue
    Retrying {
        /// Candidate just tried
        candidate: String,
        /// Failure it produced
        error_message: String,
    },
    /// No candidate worked within budget
    Exhausted,
}

enum Generated {
    Candidates(CandidateList),
    NoHealingNeeded,
    Failed(GenerationError),
}

/// Drives recovery of failed actions
pub struct RecoveryOrchestrator {
    config: HealConfig,
    suggester: Option<Box<dyn LocatorSuggester>>,
}

impl fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("config", &self.config)
            .field("generative", &self.suggester.is_some())
            .finish()
    }
}

impl RecoveryOrchestrator {
    /// Orchestrator using the heuristic source
    #[must_use]
    pub fn new(config: HealConfig) -> Self {
        Self {
            config,
            suggester: None,
        }
    }

    /// Use `suggester` when the configured source is generative
    #[must_use]
    pub fn with_suggester(mut self, suggester: Box<dyn LocatorSuggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &HealConfig {
        &self.config
    }

    /// Advance `state` for one reported failure.
    ///
    /// A fresh failure is classified first; a failure reported while the
    /// state is retrying is the rerun of the previous candidate and goes
    /// straight to the next one. At most one candidate is rerun per call.
    pub fn handle(
        &self,
        state: &mut RecoveryAttemptState,
        failure: &FailedAction,
        adapter: &dyn UiTreeAdapter,
        host: &mut dyn HostRunner,
        ledger: &mut HealLedger,
    ) -> RecoveryOutcome {
        if state.phase.is_terminal() {
            state.reset();
        }
        let Some(technology) = Technology::from_library(&failure.library) else {
            debug!(library = %failure.library, keyword = %failure.keyword, "library not healable");
            return RecoveryOutcome::NotHealable;
        };

        if state.phase != RecoveryPhase::Retrying {
            state.reset();
            state.transition(RecoveryPhase::Detecting);
            let Some(locator) = failure.locator() else {
                state.reset();
                return RecoveryOutcome::NotHealable;
            };
            let Some(hit) = detect(technology, &failure.error_message) else {
                info!(keyword = %failure.keyword, locator, "not a locator failure, no healing");
                state.reset();
                return RecoveryOutcome::NotHealable;
            };
            debug!(keyword = %failure.keyword, locator, phrase = hit.phrase, "locator failure detected");
            state.action = Some(failure.clone());
        }
        let Some(action) = state.action.clone() else {
            state.reset();
            return RecoveryOutcome::NotHealable;
        };

        loop {
            if state.should_generate_locators() {
                if state.retry_count >= self.config.max_retries {
                    return self.exhaust(state, &action, ledger);
                }
                state.transition(RecoveryPhase::Generating);
                state.retry_count += 1;
                match self.generate(state, &action, technology, adapter) {
                    Generated::Candidates(list) if list.is_empty() => {
                        if self.source() == LocatorSource::Heuristic {
                            // another heuristic round sees the same tree
                            return self.exhaust(state, &action, ledger);
                        }
                        debug!(retry_count = state.retry_count, "generation round produced no usable candidates");
                    }
                    Generated::Candidates(list) => {
                        debug!(candidates = list.len(), retry_count = state.retry_count, "candidates ready");
                        state.suggestions = list;
                    }
                    Generated::NoHealingNeeded => {
                        info!(keyword = %action.keyword, "generator reports no healing needed");
                        state.reset();
                        return RecoveryOutcome::NotHealable;
                    }
                    Generated::Failed(e) if e.is_unrecoverable() => {
                        warn!(error = %e, "generation unavailable for this action");
                        return self.exhaust(state, &action, ledger);
                    }
                    Generated::Failed(e) => {
                        warn!(error = %e, retry_count = state.retry_count, "generation round failed");
                    }
                }
                continue;
            }

            state.transition(RecoveryPhase::Retrying);
            let Some(candidate) = state.suggestions.pop_front() else {
                continue;
            };
            state.tried_locators.push(candidate.clone());
            let mut args = action.args.clone();
            args[0].clone_from(&candidate);
            debug!(keyword = %action.keyword, candidate = %candidate, "rerunning with candidate");

            return match host.rerun_action(&action.keyword, &args) {
                Ok(return_value) => {
                    info!(keyword = %action.keyword, locator = %candidate, "action healed");
                    state.healed = true;
                    state.transition(RecoveryPhase::Healed);
                    ledger.record(entry(&action, candidate.clone(), state.tried_locators.clone()));
                    RecoveryOutcome::Healed {
                        locator: candidate,
                        return_value,
                    }
                }
                Err(error_message) => {
                    debug!(candidate = %candidate, error = %error_message, "candidate failed");
                    RecoveryOutcome::Retrying {
                        candidate,
                        error_message,
                    }
                }
            };
        }
    }

    /// Call [`RecoveryOrchestrator::handle`] until the attempt resolves,
    /// re-reporting each rerun failure.
    pub fn resolve(
        &self,
        state: &mut RecoveryAttemptState,
        failure: &FailedAction,
        adapter: &dyn UiTreeAdapter,
        host: &mut dyn HostRunner,
        ledger: &mut HealLedger,
    ) -> RecoveryOutcome {
        let mut report = failure.clone();
        loop {
            match self.handle(state, &report, adapter, host, ledger) {
                RecoveryOutcome::Retrying { error_message, .. } => {
                    report.error_message = error_message;
                }
                outcome => return outcome,
            }
        }
    }

    fn source(&self) -> LocatorSource {
        match (self.config.locator_source, &self.suggester) {
            (LocatorSource::Generative, Some(_)) => LocatorSource::Generative,
            _ => LocatorSource::Heuristic,
        }
    }

    fn generate(
        &self,
        state: &RecoveryAttemptState,
        action: &FailedAction,
        technology: Technology,
        adapter: &dyn UiTreeAdapter,
    ) -> Generated {
        let failed = action.locator().unwrap_or_default();
        let intent = ActionIntent::from_keyword(&action.keyword);
        let cap = self.config.max_candidates;
        let raw = match (self.source(), &self.suggester) {
            (LocatorSource::Generative, Some(suggester)) => {
                let request = SuggestionRequest {
                    error_message: action.error_message.clone(),
                    failed_locator: failed.to_string(),
                    keyword_name: action.keyword.clone(),
                    ui_tree: adapter.snapshot(),
                    tried_locators: state.tried_locators.clone(),
                    technology,
                };
                match suggester.suggest(&request) {
                    Ok(SuggestionResponse::Suggestions(list)) => CandidateList::from_candidates(list, cap),
                    Ok(SuggestionResponse::NoHealingNeeded) => return Generated::NoHealingNeeded,
                    Err(e) => return Generated::Failed(e),
                }
            }
            _ => {
                // headroom so excluding tried candidates still fills the list
                let mut list = Synthesizer::new(technology)
                    .with_max_candidates(cap + state.tried_locators.len())
                    .synthesize(&adapter.snapshot(), failed, intent);
                list.exclude(&state.tried_locators);
                CandidateList::from_candidates(list.into_vec(), cap)
            }
        };
        let mut raw = raw;
        raw.exclude(&state.tried_locators);
        let require_clickable =
            self.config.require_clickable_for_clicks && intent == ActionIntent::Click;
        Generated::Candidates(rank_with_adapter(&raw, adapter, require_clickable))
    }

    fn exhaust(
        &self,
        state: &mut RecoveryAttemptState,
        action: &FailedAction,
        ledger: &mut HealLedger,
    ) -> RecoveryOutcome {
        info!(
            keyword = %action.keyword,
            locator = action.locator().unwrap_or_default(),
            retry_count = state.retry_count,
            tried = state.tried_locators.len(),
            "healing exhausted"
        );
        state.transition(RecoveryPhase::Exhausted);
        ledger.record(entry(action, String::new(), state.tried_locators.clone()));
        RecoveryOutcome::Exhausted
    }
}

fn entry(action: &FailedAction, healed_locator: String, tried_locators: Vec<String>) -> ReportEntry {
    let failed = action.locator().unwrap_or_default().to_string();
    ReportEntry {
        call_site: action.call_site.clone(),
        locator_origin: action.raw_locator.clone().unwrap_or_else(|| failed.clone()),
        keyword: action.keyword.clone(),
        keyword_args: action.args.clone(),
        failed_locator: failed,
        healed_locator,
        tried_locators,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapter::{SnapshotAdapter, WebLibrary};
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    const SELENIUM: Technology = Technology::Web(WebLibrary::Selenium);

    /// Host whose reruns pass only for `accept`
    struct Host {
        accept: Option<String>,
        reruns: Vec<Vec<String>>,
    }

    impl Host {
        fn accepting(locator: &str) -> Self {
            Self {
                accept: Some(locator.to_string()),
                reruns: Vec::new(),
            }
        }

        fn failing() -> Self {
            Self {
                accept: None,
                reruns: Vec::new(),
            }
        }
    }

    impl HostRunner for Host {
        fn rerun_action(&mut self, _keyword: &str, args: &[String]) -> Result<Option<Value>, String> {
            self.reruns.push(args.to_vec());
            if self.accept.as_deref() == Some(args[0].as_str()) {
                Ok(Some(Value::String("ok".into())))
            } else {
                Err(format!("Element with locator '{}' not found.", args[0]))
            }
        }
    }

    /// Suggester replaying canned rounds and counting calls
    struct Rounds {
        rounds: RefCell<VecDeque<Result<SuggestionResponse, GenerationError>>>,
        calls: Cell<u32>,
    }

    impl Rounds {
        fn new(rounds: Vec<Result<SuggestionResponse, GenerationError>>) -> Self {
            Self {
                rounds: RefCell::new(rounds.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl LocatorSuggester for std::rc::Rc<Rounds> {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<SuggestionResponse, GenerationError> {
            self.calls.set(self.calls.get() + 1);
            self.rounds
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::transient("no more rounds")))
        }
    }

    fn suggestions(items: &[&str]) -> Result<SuggestionResponse, GenerationError> {
        Ok(SuggestionResponse::Suggestions(
            items.iter().map(|s| (*s).to_string()).collect(),
        ))
    }

    fn failure(locator: &str, error: &str) -> FailedAction {
        FailedAction::new(
            CallSite::new("tests/login.robot", "Valid Login", 7),
            "Input Text",
            vec![locator.to_string(), "demo".to_string()],
            error,
            "SeleniumLibrary",
        )
    }

    fn login_page() -> SnapshotAdapter {
        SnapshotAdapter::new(
            SELENIUM,
            r#"<html><body><form><input id="username" name="user"><input id="password" type="password"><button id="login">Log in</button></form></body></html>"#,
        )
    }

    fn generative(max_retries: u32, rounds: &std::rc::Rc<Rounds>) -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(
            HealConfig::new()
                .with_max_retries(max_retries)
                .with_locator_source(LocatorSource::Generative),
        )
        .with_suggester(Box::new(rounds.clone()))
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn test_heals_missing_id() {
            let orchestrator = RecoveryOrchestrator::new(HealConfig::default());
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let mut host = Host::accepting("css=input#username");
            let outcome = orchestrator.resolve(
                &mut state,
                &failure("id=user-name", "Element with locator 'id=user-name' not found."),
                &login_page(),
                &mut host,
                &mut ledger,
            );
            assert_eq!(
                outcome,
                RecoveryOutcome::Healed {
                    locator: "css=input#username".into(),
                    return_value: Some(Value::String("ok".into())),
                }
            );
            assert_eq!(state.phase(), RecoveryPhase::Healed);
            assert!(state.healed());
            assert_eq!(host.reruns[0], ["css=input#username", "demo"]);
            let recorded = &ledger.entries()[0];
            assert_eq!(recorded.healed_locator, "css=input#username");
            assert_eq!(recorded.keyword_args, ["id=user-name", "demo"]);
        }

        #[test]
        fn test_exhausts_with_full_history() {
            let rounds = std::rc::Rc::new(Rounds::new(vec![
                suggestions(&["css=#a"]),
                suggestions(&["css=#b"]),
                suggestions(&["css=#c"]),
            ]));
            let orchestrator = generative(2, &rounds);
            let adapter = SnapshotAdapter::new(
                SELENIUM,
                r#"<div><p id="a"></p><p id="b"></p><p id="c"></p></div>"#,
            );
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let outcome = orchestrator.resolve(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &adapter,
                &mut Host::failing(),
                &mut ledger,
            );
            assert_eq!(outcome, RecoveryOutcome::Exhausted);
            assert_eq!(state.phase(), RecoveryPhase::Exhausted);
            assert_eq!(state.tried_locators(), ["css=#a", "css=#b"]);
            assert_eq!(rounds.calls.get(), 2);
            let recorded = &ledger.entries()[0];
            assert_eq!(recorded.healed_locator, "");
            assert_eq!(recorded.tried_locators, ["css=#a", "css=#b"]);
        }

        #[test]
        fn test_non_locator_failure_untouched() {
            let rounds = std::rc::Rc::new(Rounds::new(vec![suggestions(&["css=#a"])]));
            let orchestrator = generative(3, &rounds);
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let mut host = Host::failing();
            let outcome = orchestrator.handle(
                &mut state,
                &failure("id=user-name", "network timeout"),
                &login_page(),
                &mut host,
                &mut ledger,
            );
            assert_eq!(outcome, RecoveryOutcome::NotHealable);
            assert_eq!(rounds.calls.get(), 0);
            assert_eq!(state.retry_count(), 0);
            assert_eq!(state.phase(), RecoveryPhase::Idle);
            assert!(host.reruns.is_empty());
            assert!(ledger.is_empty());
        }
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn test_one_candidate_per_call() {
            let orchestrator = RecoveryOrchestrator::new(HealConfig::default());
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let mut host = Host::failing();
            let page = login_page();
            let first = orchestrator.handle(
                &mut state,
                &failure("id=user-name", "Element with locator 'id=user-name' not found."),
                &page,
                &mut host,
                &mut ledger,
            );
            assert!(matches!(first, RecoveryOutcome::Retrying { .. }));
            assert_eq!(state.phase(), RecoveryPhase::Retrying);
            assert_eq!(state.retry_count(), 1);
            assert_eq!(host.reruns.len(), 1);
            assert_eq!(state.tried_locators().len(), 1);
        }

        #[test]
        fn test_unsupported_library_ignored() {
            let orchestrator = RecoveryOrchestrator::new(HealConfig::default());
            let mut state = RecoveryAttemptState::new();
            let mut action = failure("id=a", "Element with locator 'id=a' not found.");
            action.library = "BuiltIn".into();
            let outcome = orchestrator.handle(
                &mut state,
                &action,
                &login_page(),
                &mut Host::failing(),
                &mut HealLedger::new(),
            );
            assert_eq!(outcome, RecoveryOutcome::NotHealable);
        }

        #[test]
        fn test_no_healing_needed_consumes_no_retry() {
            let rounds = std::rc::Rc::new(Rounds::new(vec![Ok(SuggestionResponse::NoHealingNeeded)]));
            let orchestrator = generative(3, &rounds);
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let outcome = orchestrator.handle(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &login_page(),
                &mut Host::failing(),
                &mut ledger,
            );
            assert_eq!(outcome, RecoveryOutcome::NotHealable);
            assert_eq!(state.retry_count(), 0);
            assert!(ledger.is_empty());
        }

        #[test]
        fn test_unrecoverable_generation_exhausts() {
            let rounds = std::rc::Rc::new(Rounds::new(vec![Err(GenerationError::unrecoverable(
                "connection refused",
            ))]));
            let orchestrator = generative(3, &rounds);
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let outcome = orchestrator.resolve(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &login_page(),
                &mut Host::failing(),
                &mut ledger,
            );
            assert_eq!(outcome, RecoveryOutcome::Exhausted);
            assert_eq!(rounds.calls.get(), 1);
            assert_eq!(ledger.len(), 1);
        }

        #[test]
        fn test_transient_generation_retried_within_budget() {
            let rounds = std::rc::Rc::new(Rounds::new(vec![
                Err(GenerationError::transient("malformed")),
                suggestions(&["css=#login"]),
            ]));
            let orchestrator = generative(3, &rounds);
            let mut state = RecoveryAttemptState::new();
            let mut host = Host::accepting("css=#login");
            let outcome = orchestrator.resolve(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &login_page(),
                &mut host,
                &mut HealLedger::new(),
            );
            assert!(matches!(outcome, RecoveryOutcome::Healed { .. }));
            assert_eq!(state.retry_count(), 2);
        }

        #[test]
        fn test_generated_candidates_are_ranked() {
            // css=#nowhere matches nothing and never reaches the host
            let rounds = std::rc::Rc::new(Rounds::new(vec![suggestions(&[
                "css=#nowhere",
                "css=input",
                "css=#password",
            ])]));
            let orchestrator = generative(1, &rounds);
            let mut state = RecoveryAttemptState::new();
            let mut host = Host::failing();
            orchestrator.resolve(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &login_page(),
                &mut host,
                &mut HealLedger::new(),
            );
            let tried: Vec<&str> = host.reruns.iter().map(|a| a[0].as_str()).collect();
            assert_eq!(tried, ["css=#password", "css=input"]);
        }

        #[test]
        fn test_state_reset_for_next_failure() {
            let orchestrator = RecoveryOrchestrator::new(HealConfig::default());
            let mut state = RecoveryAttemptState::new();
            let mut ledger = HealLedger::new();
            let page = login_page();
            orchestrator.resolve(
                &mut state,
                &failure("id=user-name", "Element with locator 'id=user-name' not found."),
                &page,
                &mut Host::accepting("css=input#username"),
                &mut ledger,
            );
            assert!(state.phase().is_terminal());
            orchestrator.handle(
                &mut state,
                &failure("id=other", "boom"),
                &page,
                &mut Host::failing(),
                &mut ledger,
            );
            assert_eq!(state.phase(), RecoveryPhase::Idle);
            assert!(state.tried_locators().is_empty());
            assert!(!state.healed());
        }
    }

    proptest! {
        #[test]
        fn prop_generation_rounds_bounded(max_retries in 1u32..6, per_round in 0usize..4) {
            let batch: Vec<String> = (0..per_round).map(|i| format!("css=#c{i}")).collect();
            let rounds: Vec<_> = (0..10)
                .map(|r| {
                    Ok(SuggestionResponse::Suggestions(
                        batch.iter().map(|c| format!("{c}-{r}")).collect(),
                    ))
                })
                .collect();
            let rounds = std::rc::Rc::new(Rounds::new(rounds));
            let orchestrator = generative(max_retries, &rounds);
            let markup: String = (0..4)
                .flat_map(|i| (0..10).map(move |r| format!("<p id=\"c{i}-{r}\"></p>")))
                .collect();
            let adapter = SnapshotAdapter::new(SELENIUM, format!("<div>{markup}</div>"));
            let mut state = RecoveryAttemptState::new();
            let outcome = orchestrator.resolve(
                &mut state,
                &failure("css=#gone", "Element with locator 'css=#gone' not found."),
                &adapter,
                &mut Host::failing(),
                &mut HealLedger::new(),
            );
            prop_assert_eq!(outcome, RecoveryOutcome::Exhausted);
            prop_assert!(rounds.calls.get() <= max_retries);
            prop_assert!(state.retry_count() <= max_retries);
            prop_assert_eq!(state.tried_locators().len(), per_round * max_retries as usize);
        }
    }
}
