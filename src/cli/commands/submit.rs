//! Submit command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::models::NewSermon;
use crate::store::SermonStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Register a sermon so the next pass analyzes it.
pub async fn run_submit(title: &str, audio_url: &str, date: Option<&str>, settings: Settings) -> Result<()> {
    let date_given = date
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .context("Invalid --date, expected YYYY-MM-DD")?;

    let store = open_store(&settings)?;
    let (sermon, job) = store
        .create_sermon(&NewSermon {
            title: title.to_string(),
            date_given,
            audio_url: audio_url.to_string(),
        })
        .await?;

    Output::success(&format!("Submitted '{}'", sermon.title));
    Output::kv("Sermon", &sermon.id);
    Output::kv("Job", &job.id);
    Output::kv("Status", sermon.status.as_str());

    Ok(())
}
