//! Periodic analysis passes.

use crate::orchestrator::{Orchestrator, PassReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs an [`Orchestrator`] pass on a fixed interval until cancelled.
///
/// Passes run inline, so two passes never overlap. A pass that outlasts the
/// interval causes the missed ticks to be skipped rather than queued.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    reports: watch::Sender<Option<PassReport>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            orchestrator,
            interval,
            reports,
        }
    }

    /// Receiver for the most recent pass report.
    pub fn subscribe(&self) -> watch::Receiver<Option<PassReport>> {
        self.reports.subscribe()
    }

    /// Run until `shutdown` is cancelled. The first pass starts immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.orchestrator.run_pass(&shutdown).await;
                    if !report.is_idle() {
                        debug!(?report, "Pass report");
                    }
                    self.reports.send_replace(Some(report));
                }
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisBackend;
    use crate::audio::AudioFetcher;
    use crate::config::AnalysisPrompt;
    use crate::error::{Result, SermonError};
    use crate::models::{NewSermon, SermonStatus};
    use crate::store::{SermonStore, SqliteSermonStore};
    use async_trait::async_trait;
    use std::path::Path;

    struct RejectingBackend;

    #[async_trait]
    impl AnalysisBackend for RejectingBackend {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn validate(&self) -> Result<()> {
            Err(SermonError::Config("no credential".to_string()))
        }

        async fn generate(&self, _prompt: &str, _audio_path: &Path) -> Result<String> {
            unreachable!("validation always fails")
        }
    }

    #[tokio::test]
    async fn test_scheduler_runs_passes_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteSermonStore::in_memory().unwrap());
        let (sermon, _) = store
            .create_sermon(&NewSermon {
                title: "Scheduled".to_string(),
                date_given: None,
                audio_url: "http://127.0.0.1:9/a.mp3".to_string(),
            })
            .await
            .unwrap();

        let orchestrator = Arc::new(Orchestrator::with_components(
            store.clone(),
            Arc::new(RejectingBackend),
            AnalysisPrompt::default(),
            AudioFetcher::with_client(reqwest::Client::new(), dir.path().to_path_buf()),
            Duration::from_secs(5),
        ));

        let scheduler = Arc::new(Scheduler::new(orchestrator, Duration::from_millis(200)));
        let mut reports = scheduler.subscribe();
        let shutdown = CancellationToken::new();

        let handle = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        // First pass handles the sermon, a later one finds nothing.
        reports.changed().await.unwrap();
        assert_eq!(reports.borrow_and_update().as_ref().unwrap().failed, 1);
        reports.changed().await.unwrap();
        assert!(reports.borrow_and_update().as_ref().unwrap().is_idle());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let found = store.find_sermon(&sermon.id).await.unwrap().unwrap();
        assert_eq!(found.status, SermonStatus::Error);
    }
}
