//! Doctor command - verify configuration, credentials and storage.

use crate::cli::Output;
use crate::config::{AnalysisPrompt, Settings};
use crate::store::SqliteSermonStore;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Sermon Analysis Doctor");
    println!();

    let mut checks = Vec::new();
    let mut section = |title: &str, results: Vec<CheckResult>| {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    };

    section("Provider", vec![check_api_key(settings), check_prompt(settings)]);
    section("Storage", check_storage(settings));
    section("Configuration", vec![check_config_file()]);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Fix them before running the worker.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed.");
    }

    Ok(())
}

fn check_api_key(settings: &Settings) -> CheckResult {
    let var = settings.analysis.api_key_env();
    let name = format!("{:?} credential", settings.analysis.provider);
    match settings.analysis.resolve_api_key() {
        Some(key) => CheckResult::ok(&name, &format!("{} ({})", var, mask_key(&key))),
        None => CheckResult::error(
            &name,
            &format!("{} not set", var),
            &format!("export {}='...' or set analysis.api_key", var),
        ),
    }
}

fn check_prompt(settings: &Settings) -> CheckResult {
    let source = settings.analysis.prompt_path.as_deref().unwrap_or("bundled");
    match AnalysisPrompt::load(settings.analysis.prompt_path.as_deref(), &settings.analysis.variables) {
        Ok(prompt) => CheckResult::ok(
            "Prompt",
            &format!("{} ({} chars)", source, prompt.as_str().chars().count()),
        ),
        Err(e) => CheckResult::error("Prompt", &e.to_string(), "Fix analysis.prompt_path or remove it"),
    }
}

fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![
        check_dir("Data directory", &settings.data_dir()),
        check_dir("Temp directory", &settings.temp_dir()),
    ];

    let db_path = settings.sqlite_path();
    let existed = db_path.exists();
    match SqliteSermonStore::new(&db_path) {
        Ok(_) => {
            let size = std::fs::metadata(&db_path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            let note = if existed { "" } else { ", created" };
            results.push(CheckResult::ok(
                "Database",
                &format!("{} ({}{})", db_path.display(), size, note),
            ));
        }
        Err(e) => results.push(CheckResult::error(
            "Database",
            &format!("{}: {}", db_path.display(), e),
            "Check store.sqlite_path and directory permissions",
        )),
    }

    results
}

fn check_dir(name: &str, dir: &Path) -> CheckResult {
    if dir.is_dir() {
        CheckResult::ok(name, &dir.display().to_string())
    } else if dir.exists() {
        CheckResult::error(name, &format!("{} is not a directory", dir.display()), "Choose another path")
    } else {
        CheckResult::warning(
            name,
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        )
    }
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: sermon-analysis config init",
        )
    }
}

/// Show only the last four characters of a credential.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("AIzaSyExample1234"), "****1234");
    }

    #[test]
    fn test_storage_checks_create_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_dir = dir.path().to_string_lossy().to_string();
        settings.general.temp_dir = dir.path().to_string_lossy().to_string();
        settings.store.sqlite_path = dir.path().join("db/sermons.db").to_string_lossy().to_string();

        let results = check_storage(&settings);
        assert!(results.iter().all(|r| r.status == CheckStatus::Ok));
        assert!(dir.path().join("db/sermons.db").exists());
    }

    #[test]
    fn test_check_prompt_reports_missing_file() {
        let mut settings = Settings::default();
        settings.analysis.prompt_path = Some("/nonexistent/prompt.txt".to_string());
        assert_eq!(check_prompt(&settings).status, CheckStatus::Error);
    }
}
