//! Reset command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::store::SermonStore;
use anyhow::{bail, Result};

/// Delete a sermon's analysis output and queue it again.
///
/// Only finished sermons can be reset; a `pending` sermon may still be
/// written to by a running pass.
pub async fn run_reset(id: &str, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let Some(sermon) = store.find_sermon(id).await? else {
        bail!("Sermon not found: {}", id);
    };

    if !sermon.status.is_terminal() {
        bail!(
            "Sermon '{}' is {}; only complete or error sermons can be reset",
            sermon.title,
            sermon.status
        );
    }

    if !store.reset_for_reanalysis(&sermon.id).await? {
        bail!("Sermon could not be reset: {}", id);
    }

    Output::success(&format!(
        "'{}' was {} and is queued for analysis again.",
        sermon.title, sermon.status
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSermon, SermonStatus};

    fn settings_in(dir: &tempfile::TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.store.sqlite_path = dir.path().join("sermons.db").to_string_lossy().to_string();
        settings
    }

    async fn submit(settings: &Settings) -> String {
        let store = open_store(settings).unwrap();
        let (sermon, _) = store
            .create_sermon(&NewSermon {
                title: "Reset me".to_string(),
                date_given: None,
                audio_url: "https://example.org/a.mp3".to_string(),
            })
            .await
            .unwrap();
        sermon.id
    }

    #[tokio::test]
    async fn test_reset_refuses_unfinished_sermon() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);
        let id = submit(&settings).await;

        let store = open_store(&settings).unwrap();
        store
            .transition_status(&id, SermonStatus::Created, SermonStatus::Pending)
            .await
            .unwrap();

        let err = run_reset(&id, settings.clone()).await.unwrap_err();
        assert!(err.to_string().contains("pending"));
        let found = store.find_sermon(&id).await.unwrap().unwrap();
        assert_eq!(found.status, SermonStatus::Pending);
    }

    #[tokio::test]
    async fn test_reset_requeues_failed_sermon() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);
        let id = submit(&settings).await;

        let store = open_store(&settings).unwrap();
        store
            .transition_status(&id, SermonStatus::Created, SermonStatus::Error)
            .await
            .unwrap();

        run_reset(&id, settings.clone()).await.unwrap();
        let found = store.find_sermon(&id).await.unwrap().unwrap();
        assert_eq!(found.status, SermonStatus::Created);
    }
}
