//! Sermon analysis orchestrator.
//!
//! One pass finds every analysis job whose sermon is still `created` and drives
//! each sermon through `pending` to `complete` or `error`, one job at a time.

use crate::analysis::{create_backend, AnalysisBackend, AnalysisResult, Analyzer};
use crate::audio::AudioFetcher;
use crate::config::{AnalysisPrompt, Settings};
use crate::error::{Result, SermonError};
use crate::models::{AnalysisJob, SermonStatus};
use crate::store::{SermonStore, SqliteSermonStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Outcome counts of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Jobs returned by the selection query.
    pub selected: usize,
    /// Sermons moved to `complete`.
    pub completed: usize,
    /// Sermons moved to `error`.
    pub failed: usize,
    /// Jobs not processed (claimed elsewhere, or the pass was cancelled).
    pub skipped: usize,
}

impl PassReport {
    pub fn is_idle(&self) -> bool {
        self.selected == 0
    }
}

enum JobOutcome {
    Completed,
    Failed,
    Skipped,
}

/// Drives sermon analysis passes.
pub struct Orchestrator {
    store: Arc<dyn SermonStore>,
    backend: Arc<dyn AnalysisBackend>,
    prompt: AnalysisPrompt,
    fetcher: AudioFetcher,
    job_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator from settings: SQLite store, configured backend and prompt.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompt = AnalysisPrompt::load(
            settings.analysis.prompt_path.as_deref(),
            &settings.analysis.variables,
        )?;
        let store: Arc<dyn SermonStore> = Arc::new(SqliteSermonStore::new(&settings.sqlite_path())?);
        let backend = create_backend(&settings.analysis)?;
        let fetcher = AudioFetcher::new(&settings.download, settings.temp_dir())?;

        Ok(Self::with_components(
            store,
            backend,
            prompt,
            fetcher,
            settings.analysis.job_timeout(),
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        store: Arc<dyn SermonStore>,
        backend: Arc<dyn AnalysisBackend>,
        prompt: AnalysisPrompt,
        fetcher: AudioFetcher,
        job_timeout: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            prompt,
            fetcher,
            job_timeout,
        }
    }

    pub fn store(&self) -> Arc<dyn SermonStore> {
        self.store.clone()
    }

    /// Run one analysis pass. Errors are logged, never returned.
    pub async fn run_pass(&self, shutdown: &CancellationToken) -> PassReport {
        let jobs = match self.store.jobs_for_status(SermonStatus::Created).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Error getting sermon jobs");
                return PassReport::default();
            }
        };

        let mut report = PassReport {
            selected: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            debug!("No sermons awaiting analysis");
            return report;
        }

        info!(count = jobs.len(), "Found sermon jobs");
        for job in &jobs {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, leaving remaining jobs for the next start");
                report.skipped += report.selected - (report.completed + report.failed + report.skipped);
                break;
            }

            match self.process_job(job).await {
                JobOutcome::Completed => report.completed += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "Analysis pass finished"
        );
        report
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, sermon_id = %job.sermon_id))]
    async fn process_job(&self, job: &AnalysisJob) -> JobOutcome {
        let analyzer = match Analyzer::new(job, self.backend.clone(), &self.prompt, &self.fetcher) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                error!(error = %e, kind = %e.kind(), "Error creating analyzer");
                if self.transition(job, SermonStatus::Created, SermonStatus::Error).await {
                    return JobOutcome::Failed;
                }
                return JobOutcome::Skipped;
            }
        };

        match self
            .store
            .transition_status(&job.sermon_id, SermonStatus::Created, SermonStatus::Pending)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Sermon already claimed, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "Unable to claim sermon");
                return JobOutcome::Skipped;
            }
        }

        let result = match tokio::time::timeout(self.job_timeout, analyzer.analyze()).await {
            Ok(result) => result,
            Err(_) => Err(SermonError::Timeout(format!(
                "analysis exceeded {:?}",
                self.job_timeout
            ))),
        };

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, kind = %e.kind(), "Error analyzing sermon");
                self.transition(job, SermonStatus::Pending, SermonStatus::Error).await;
                return JobOutcome::Failed;
            }
        };

        if let Err(e) = self.store_result(job, &result).await {
            error!(error = %e, kind = %e.kind(), "Error storing result");
            self.transition(job, SermonStatus::Pending, SermonStatus::Error).await;
            return JobOutcome::Failed;
        }

        if self.transition(job, SermonStatus::Pending, SermonStatus::Complete).await {
            info!("Analysis complete");
            JobOutcome::Completed
        } else {
            JobOutcome::Failed
        }
    }

    /// Write summary, details and questions. Not transactional: a failure
    /// part way leaves the records written so far.
    async fn store_result(&self, job: &AnalysisJob, result: &AnalysisResult) -> Result<()> {
        self.store.set_summary(&job.sermon_id, &result.summary).await?;

        for (order, note) in result.notes.iter().enumerate() {
            self.store.create_detail(&job.sermon_id, note, order).await?;
        }

        for (order, question) in result.questions.iter().enumerate() {
            self.store.create_question(&job.sermon_id, question, order).await?;
        }

        Ok(())
    }

    /// Conditional status update; failures are logged. Returns whether it applied.
    async fn transition(&self, job: &AnalysisJob, from: SermonStatus, to: SermonStatus) -> bool {
        match self.store.transition_status(&job.sermon_id, from, to).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Sermon was not {} when setting status {}", from, to);
                false
            }
            Err(e) => {
                error!(error = %e, "Unable to set status of sermon to {}", to);
                false
            }
        }
    }
}
