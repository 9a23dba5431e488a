//! Heal command handler

use sanar::{finalize, Finalized, HealConfig, HealLedger, SanarError, Summary};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::Reporter;
use crate::HealArgs;

/// Configuration with command-line overrides applied
#[must_use]
pub fn apply_overrides(mut config: HealConfig, args: &HealArgs) -> HealConfig {
    if let Some(ref dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(ref root) = args.source_root {
        config = config.with_source_root(root);
    }
    config
}

/// Execute the heal command
pub fn execute_heal(config: &CliConfig, args: &HealArgs, reporter: &Reporter) -> CliResult<Finalized> {
    let heal_config = apply_overrides(config.heal_config()?, args);
    let ledger = HealLedger::load_json(&args.ledger)?;
    reporter.header("Healing");
    reporter.info(&format!(
        "{} events from {}",
        ledger.len(),
        args.ledger.display()
    ));

    let finalized = match finalize(&heal_config, &ledger) {
        Ok(finalized) => finalized,
        Err(SanarError::Partial { errors }) => {
            for e in &errors {
                reporter.failure(&e.to_string());
            }
            return Err(SanarError::Partial { errors }.into());
        }
        Err(e) => return Err(e.into()),
    };

    for file in &finalized.files {
        reporter.success(&format!(
            "{} ({} arguments, {} variables)",
            file.output.display(),
            file.replaced,
            file.variables_updated
        ));
    }
    for lost in &finalized.unmatched {
        reporter.warning(&format!(
            "{}: '{}' healed to '{}' but no call argument matched",
            lost.file.display(),
            lost.failed_locator,
            lost.healed_locator
        ));
    }
    reporter.summary(&Summary::from_entries(&ledger.deduplicated()), finalized.files.len());
    reporter.info(&format!("reports in {}", heal_config.output_dir.display()));
    Ok(finalized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sanar::{CallSite, ReportEntry};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn args(ledger: &Path, output_dir: Option<PathBuf>) -> HealArgs {
        HealArgs {
            ledger: ledger.to_path_buf(),
            output_dir,
            source_root: None,
        }
    }

    #[test]
    fn test_overrides() {
        let mut heal_args = args(Path::new("l.json"), Some(PathBuf::from("out")));
        heal_args.source_root = Some(PathBuf::from("tests"));
        let config = apply_overrides(HealConfig::default(), &heal_args);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.source_root, Some(PathBuf::from("tests")));
    }

    #[test]
    fn test_heal_from_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("login.robot");
        fs::write(&script, "*** Test Cases ***\nT\n    Click Element    id=old\n").unwrap();
        let ledger: HealLedger = [ReportEntry {
            call_site: CallSite::new(&script, "T", 3),
            locator_origin: "id=old".into(),
            keyword: "Click Element".into(),
            keyword_args: vec!["id=old".into()],
            failed_locator: "id=old".into(),
            healed_locator: "css=#new".into(),
            tried_locators: vec!["css=#new".into()],
        }]
        .into_iter()
        .collect();
        let ledger_path = dir.path().join("ledger.json");
        ledger.save_json(&ledger_path).unwrap();

        let out = dir.path().join("out");
        let finalized = execute_heal(
            &CliConfig::new(),
            &args(&ledger_path, Some(out.clone())),
            &Reporter::new(false, true),
        )
        .unwrap();
        assert_eq!(finalized.files.len(), 1);
        let healed = fs::read_to_string(out.join("healed/login.robot")).unwrap();
        assert!(healed.contains("Click Element    css=#new"));
    }

    #[test]
    fn test_missing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute_heal(
            &CliConfig::new(),
            &args(&dir.path().join("nope.json"), Some(dir.path().join("out"))),
            &Reporter::new(false, true),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
