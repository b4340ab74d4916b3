//! Sermon store abstraction.
//!
//! Holds sermons, their analysis jobs, and the notes and questions produced
//! by analysis.

mod sqlite;

pub use sqlite::SqliteSermonStore;

use crate::analysis::{DiscussionQuestion, SermonNote};
use crate::error::Result;
use crate::models::{AnalysisJob, NewSermon, Sermon, SermonDetail, SermonQuestion, SermonStatus};
use async_trait::async_trait;

/// Trait for sermon store implementations.
#[async_trait]
pub trait SermonStore: Send + Sync {
    /// Analysis jobs whose sermon currently has `status`, oldest first.
    async fn jobs_for_status(&self, status: SermonStatus) -> Result<Vec<AnalysisJob>>;

    /// Look up a sermon by id.
    async fn find_sermon(&self, id: &str) -> Result<Option<Sermon>>;

    /// Move a sermon from `from` to `to` only if it is still in `from`.
    ///
    /// Returns false when the sermon is missing or in another state.
    async fn transition_status(&self, id: &str, from: SermonStatus, to: SermonStatus)
        -> Result<bool>;

    /// Store the analysis summary.
    async fn set_summary(&self, id: &str, summary: &str) -> Result<()>;

    /// Create a detail record at position `order`.
    async fn create_detail(
        &self,
        sermon_id: &str,
        note: &SermonNote,
        order: usize,
    ) -> Result<SermonDetail>;

    /// Create a question record at position `order`.
    async fn create_question(
        &self,
        sermon_id: &str,
        question: &DiscussionQuestion,
        order: usize,
    ) -> Result<SermonQuestion>;

    /// Detail records for a sermon, by order.
    async fn details_for(&self, sermon_id: &str) -> Result<Vec<SermonDetail>>;

    /// Question records for a sermon, by order.
    async fn questions_for(&self, sermon_id: &str) -> Result<Vec<SermonQuestion>>;

    /// Register a sermon in `created` together with its analysis job.
    async fn create_sermon(&self, sermon: &NewSermon) -> Result<(Sermon, AnalysisJob)>;

    /// List sermons, newest first, optionally filtered by status.
    async fn list_sermons(&self, status: Option<SermonStatus>) -> Result<Vec<Sermon>>;

    /// Delete analysis output and put the sermon back to `created`.
    ///
    /// Operator recovery only; passes never call this.
    async fn reset_for_reanalysis(&self, id: &str) -> Result<bool>;
}
