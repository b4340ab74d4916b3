//! Pre-flight checks before starting analysis.
//!
//! Validates that the provider credential and prompt are usable before a
//! pass would otherwise mark every sermon as failed.

use crate::config::{AnalysisPrompt, Settings};
use crate::error::{Result, SermonError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Analysis requires a credential and a loadable prompt.
    Analyze,
    /// Record management only touches the local store.
    Manage,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Analyze => {
            check_api_key(settings)?;
            AnalysisPrompt::load(
                settings.analysis.prompt_path.as_deref(),
                &settings.analysis.variables,
            )?;
        }
        Operation::Manage => {}
    }
    Ok(())
}

/// Check that the provider credential is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    let var = settings.analysis.api_key_env();
    match settings.analysis.resolve_api_key() {
        Some(_) => Ok(()),
        None => Err(SermonError::Config(format!(
            "{} not set. Set it with: export {}='...' (or analysis.api_key in the config file)",
            var, var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_manage_no_requirements() {
        assert!(check(Operation::Manage, &Settings::default()).is_ok());
    }

    #[test]
    fn test_check_analyze_with_configured_key() {
        let mut settings = Settings::default();
        settings.analysis.api_key = Some("test-key".to_string());
        assert!(check(Operation::Analyze, &settings).is_ok());
    }

    #[test]
    fn test_check_analyze_missing_prompt_file() {
        let mut settings = Settings::default();
        settings.analysis.api_key = Some("test-key".to_string());
        settings.analysis.prompt_path = Some("/nonexistent/prompt.txt".to_string());
        let err = check(Operation::Analyze, &settings).unwrap_err();
        assert!(matches!(err, SermonError::Config(_)));
    }
}
