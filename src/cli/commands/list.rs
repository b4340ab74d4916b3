//! List command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::models::SermonStatus;
use crate::store::SermonStore;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(status: Option<&str>, settings: Settings) -> Result<()> {
    let status = status
        .map(|s| s.parse::<SermonStatus>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let store = open_store(&settings)?;
    let sermons = store.list_sermons(status).await?;

    if sermons.is_empty() {
        Output::info("No sermons found. Use 'sermon-analysis submit <title> <audio_url>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Sermons ({})", sermons.len()));
    println!();
    for sermon in &sermons {
        Output::sermon_line(sermon);
    }

    Ok(())
}
