//! CLI output formatting utilities.

use crate::models::{Sermon, SermonStatus};
use crate::orchestrator::PassReport;
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a one-line sermon summary.
    pub fn sermon_line(sermon: &Sermon) {
        let date = sermon
            .date_given
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!(
            "  {} {} [{}] ({}, {})",
            style("*").cyan(),
            style(&sermon.title).bold(),
            status_style(sermon.status),
            style(&sermon.id).dim(),
            date
        );
        if let Some(summary) = sermon.summary.as_deref().filter(|s| !s.is_empty()) {
            println!("    {}", style(content_preview(summary, 120)).dim());
        }
    }

    /// Print a pass report.
    pub fn pass_report(report: &PassReport) {
        if report.is_idle() {
            Output::info("No sermons awaiting analysis.");
            return;
        }
        Output::kv("Selected", &report.selected.to_string());
        Output::kv("Completed", &report.completed.to_string());
        Output::kv("Failed", &report.failed.to_string());
        Output::kv("Skipped", &report.skipped.to_string());
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

fn status_style(status: SermonStatus) -> StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        SermonStatus::Created => s.cyan(),
        SermonStatus::Pending => s.yellow(),
        SermonStatus::Complete => s.green(),
        SermonStatus::Error => s.red(),
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("line one\nline two", 100), "line one line two");
        assert_eq!(content_preview("abcdefghij", 4), "abcd...");
        // Multi-byte characters are never split.
        assert_eq!(content_preview("Jesús dijo", 5), "Jesús...");
    }
}
