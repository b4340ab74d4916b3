//! Records shared by the store and the analysis pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a sermon is in the analysis pipeline.
///
/// Transitions only move forward: created -> pending -> complete | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SermonStatus {
    Created,
    Pending,
    Complete,
    Error,
}

impl SermonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SermonStatus::Created => "created",
            SermonStatus::Pending => "pending",
            SermonStatus::Complete => "complete",
            SermonStatus::Error => "error",
        }
    }

    /// Complete and error are never revisited by a pass.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SermonStatus::Complete | SermonStatus::Error)
    }
}

impl std::str::FromStr for SermonStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(SermonStatus::Created),
            "pending" => Ok(SermonStatus::Pending),
            "complete" => Ok(SermonStatus::Complete),
            "error" => Ok(SermonStatus::Error),
            _ => Err(format!("Unknown sermon status: {}", s)),
        }
    }
}

impl std::fmt::Display for SermonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded sermon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sermon {
    pub id: String,
    pub title: String,
    pub status: SermonStatus,
    /// Day the sermon was preached.
    pub date_given: Option<NaiveDate>,
    /// Set once analysis succeeds.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where to fetch a sermon's audio from. Never modified after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub sermon_id: String,
    pub audio_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One sermon note produced by analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SermonDetail {
    pub id: String,
    pub sermon_id: String,
    pub title: String,
    pub description: String,
    pub key_verse: String,
    /// Pipe separated list of verses.
    pub relevant_verses: String,
    /// Zero-based position in the analysis response.
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl SermonDetail {
    pub fn relevant_verses_list(&self) -> Vec<&str> {
        self.relevant_verses
            .split('|')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// One discussion question produced by analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SermonQuestion {
    pub id: String,
    pub sermon_id: String,
    pub title: String,
    pub description: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a sermon together with its analysis job.
#[derive(Debug, Clone)]
pub struct NewSermon {
    pub title: String,
    pub date_given: Option<NaiveDate>,
    pub audio_url: String,
}
