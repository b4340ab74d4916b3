//! Show command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::store::SermonStore;
use anyhow::{bail, Result};
use console::style;

/// Print a sermon with its notes and questions.
pub async fn run_show(id: &str, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let Some(sermon) = store.find_sermon(id).await? else {
        bail!("Sermon not found: {}", id);
    };

    Output::header(&sermon.title);
    Output::kv("Id", &sermon.id);
    Output::kv("Status", sermon.status.as_str());
    if let Some(date) = sermon.date_given {
        Output::kv("Date", &date.to_string());
    }
    Output::kv("Updated", &sermon.updated_at.to_rfc3339());

    if let Some(summary) = sermon.summary.as_deref().filter(|s| !s.is_empty()) {
        Output::header("Summary");
        println!("{}", summary);
    }

    let details = store.details_for(&sermon.id).await?;
    if !details.is_empty() {
        Output::header("Notes");
        for detail in &details {
            println!("\n{}. {}", detail.order + 1, style(&detail.title).bold());
            if !detail.description.is_empty() {
                println!("   {}", detail.description);
            }
            if !detail.key_verse.is_empty() {
                Output::kv("Key verse", &detail.key_verse);
            }
            let verses = detail.relevant_verses_list();
            if !verses.is_empty() {
                Output::kv("Related", &verses.join(", "));
            }
        }
    }

    let questions = store.questions_for(&sermon.id).await?;
    if !questions.is_empty() {
        Output::header("Discussion Questions");
        for question in &questions {
            println!("\n{}. {}", question.order + 1, style(&question.title).bold());
            if !question.description.is_empty() {
                println!("   {}", question.description);
            }
        }
    }

    Ok(())
}
