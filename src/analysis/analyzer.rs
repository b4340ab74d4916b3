//! Per-job analysis session.

use super::{parse_response, AnalysisBackend, AnalysisResult};
use crate::audio::AudioFetcher;
use crate::config::AnalysisPrompt;
use crate::error::Result;
use crate::models::AnalysisJob;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Analyzes the audio of one [`AnalysisJob`].
pub struct Analyzer<'a> {
    job: &'a AnalysisJob,
    backend: Arc<dyn AnalysisBackend>,
    prompt: &'a AnalysisPrompt,
    fetcher: &'a AudioFetcher,
}

impl<'a> Analyzer<'a> {
    /// Open a session for `job`. Fails when the backend is not usable.
    pub fn new(
        job: &'a AnalysisJob,
        backend: Arc<dyn AnalysisBackend>,
        prompt: &'a AnalysisPrompt,
        fetcher: &'a AudioFetcher,
    ) -> Result<Self> {
        backend.validate()?;
        Ok(Self {
            job,
            backend,
            prompt,
            fetcher,
        })
    }

    /// Download, generate and parse. Nothing is written anywhere.
    #[instrument(skip(self), fields(job_id = %self.job.id, sermon_id = %self.job.sermon_id))]
    pub async fn analyze(&self) -> Result<AnalysisResult> {
        let audio = self.fetcher.fetch(&self.job.audio_url, &self.job.id).await?;

        info!("Sending audio to {}", self.backend.name());
        let raw = self.backend.generate(self.prompt.as_str(), audio.path()).await;
        drop(audio);
        let raw = raw?;

        debug!(response = %raw, "Provider response");
        let result = parse_response(&raw)?;
        info!(
            "Analysis parsed: {} notes, {} questions",
            result.notes.len(),
            result.questions.len()
        );
        Ok(result)
    }
}
