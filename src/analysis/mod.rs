//! Sermon analysis using a generative AI provider.
//!
//! An [`Analyzer`] drives one job: it downloads the audio, hands it to an
//! [`AnalysisBackend`] together with the instruction prompt, and decodes the
//! returned text into an [`AnalysisResult`].
//!
//! # Providers
//!
//! - **Gemini** (default): the audio file is uploaded to the provider's file
//!   store, referenced in a single generation request, and deleted afterwards.
//! - **OpenAI**: the audio is transcribed first, then the transcript is analyzed
//!   with a chat completion.

mod analyzer;
mod gemini;
mod openai;
mod parser;

pub use analyzer::Analyzer;
pub use gemini::{audio_mime_type, GeminiBackend};
pub use openai::OpenAiBackend;
pub use parser::{parse_response, strip_code_fences};

use crate::config::{AnalysisProvider, AnalysisSettings};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Trait for AI providers that turn a sermon recording into analysis text.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Check that the backend can be used (credentials present, etc.).
    fn validate(&self) -> Result<()>;

    /// Send the prompt and audio file and return the raw response text.
    async fn generate(&self, prompt: &str, audio_path: &Path) -> Result<String>;
}

/// Create the backend selected in the settings.
pub fn create_backend(settings: &AnalysisSettings) -> Result<Arc<dyn AnalysisBackend>> {
    let backend: Arc<dyn AnalysisBackend> = match settings.provider {
        AnalysisProvider::Gemini => Arc::new(GeminiBackend::new(settings)?),
        AnalysisProvider::OpenAi => Arc::new(OpenAiBackend::new(settings)?),
    };
    Ok(backend)
}

/// Structured analysis of one sermon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "string_or_null")]
    pub summary: String,
    /// Sermon notes in the order they were preached.
    #[serde(default)]
    pub notes: Vec<SermonNote>,
    /// Discussion questions in presentation order.
    #[serde(default)]
    pub questions: Vec<DiscussionQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SermonNote {
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub key_verse: String,
    /// Accepts a pipe separated string or a JSON array.
    #[serde(default, deserialize_with = "verse_list")]
    pub relevant_verses: Vec<String>,
}

impl SermonNote {
    /// Verses in the pipe separated form the store keeps.
    pub fn joined_verses(&self) -> String {
        self.relevant_verses.join("|")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscussionQuestion {
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
}

fn string_or_null<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Verses {
    List(Vec<String>),
    Joined(String),
}

fn verse_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let verses = match Option::<Verses>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Verses::List(list)) => list,
        Some(Verses::Joined(joined)) => joined.split('|').map(str::to_string).collect(),
    };

    Ok(verses
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}
