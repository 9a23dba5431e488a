//! Suggest command handler

use sanar::{rank_with_adapter, ActionIntent, HealConfig, SnapshotAdapter, Synthesizer, Technology};

use crate::commands::SuggestFormat;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::SuggestArgs;

/// Ranked candidates for `failed_locator` in `markup`
#[must_use]
pub fn suggest_candidates(
    markup: &str,
    failed_locator: &str,
    intent: ActionIntent,
    technology: Technology,
    config: &HealConfig,
) -> Vec<String> {
    let raw = Synthesizer::new(technology)
        .with_max_candidates(config.max_candidates)
        .synthesize(markup, failed_locator, intent);
    let adapter = SnapshotAdapter::new(technology, markup);
    let require_clickable = config.require_clickable_for_clicks && intent == ActionIntent::Click;
    rank_with_adapter(&raw, &adapter, require_clickable).into_vec()
}

/// Render candidates for stdout
pub fn render(candidates: &[String], format: SuggestFormat) -> CliResult<String> {
    Ok(match format {
        SuggestFormat::Text => candidates.iter().map(|c| format!("{c}\n")).collect(),
        SuggestFormat::Json => format!("{}\n", serde_json::to_string_pretty(candidates)?),
    })
}

/// Execute the suggest command
pub fn execute_suggest(config: &CliConfig, args: &SuggestArgs) -> CliResult<String> {
    let technology = Technology::from_library(&args.library).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "unsupported library '{}' (expected Browser, SeleniumLibrary or AppiumLibrary)",
            args.library
        ))
    })?;
    let markup = std::fs::read_to_string(&args.tree)
        .map_err(|e| sanar::SanarError::read(&args.tree, e))?;
    let candidates = suggest_candidates(
        &markup,
        &args.locator,
        args.intent.into(),
        technology,
        &config.heal_config()?,
    );
    tracing::info!(locator = %args.locator, candidates = candidates.len(), "suggestions ranked");
    render(&candidates, args.format)
}
