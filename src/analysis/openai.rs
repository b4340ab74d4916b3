//! OpenAI backend: speech-to-text followed by a chat completion.

use super::AnalysisBackend;
use crate::config::AnalysisSettings;
use crate::error::{Result, SermonError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    AudioInput, AudioResponseFormat, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateTranscriptionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Largest completion the chat models accept.
const MAX_COMPLETION_TOKENS: u32 = 32768;

/// OpenAI-based analysis backend.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    has_key: bool,
    model: String,
    transcription_model: String,
    max_output_tokens: u32,
}

impl OpenAiBackend {
    /// Create an OpenAI backend with the configured request timeout.
    pub fn new(settings: &AnalysisSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| SermonError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = settings.resolve_api_key();
        let mut config = OpenAIConfig::default();
        if let Some(key) = &api_key {
            config = config.with_api_key(key);
        }

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            has_key: api_key.is_some(),
            model: settings.openai_model.clone(),
            transcription_model: settings.transcription_model.clone(),
            max_output_tokens: settings.max_output_tokens.min(MAX_COMPLETION_TOKENS),
        })
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path).await?;

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("sermon.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.transcription_model)
            .response_format(AudioResponseFormat::Json)
            .build()
            .map_err(|e| SermonError::Provider(format!("Failed to build request: {}", e)))?;

        let response = self.client.audio().transcribe(request).await.map_err(|e| {
            SermonError::Provider(format!("{} API error: {}", self.transcription_model, e))
        })?;

        Ok(response.text.trim().to_string())
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn validate(&self) -> Result<()> {
        if self.has_key {
            Ok(())
        } else {
            Err(SermonError::Config(
                "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
            ))
        }
    }

    async fn generate(&self, prompt: &str, audio_path: &Path) -> Result<String> {
        info!("Transcribing sermon audio with {}", self.transcription_model);
        let transcript = self.transcribe(audio_path).await?;
        if transcript.is_empty() {
            return Err(SermonError::Provider("Transcription returned no text".to_string()));
        }
        debug!("Transcript has {} characters", transcript.len());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| SermonError::Provider(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Sermon transcript:\n\n{}", transcript))
                .build()
                .map_err(|e| SermonError::Provider(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_output_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| SermonError::Provider(e.to_string()))?;

        info!("Requesting analysis from {}", self.model);
        let response = self.client.chat().create(request).await.map_err(|e| {
            SermonError::Provider(format!("{} API error: {}", self.model, e))
        })?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| SermonError::Provider(format!("Empty response from {}", self.model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tokens_are_clamped() {
        let settings = AnalysisSettings {
            api_key: Some("sk-test".to_string()),
            max_output_tokens: 65536,
            ..Default::default()
        };
        let backend = OpenAiBackend::new(&settings).unwrap();
        assert_eq!(backend.max_output_tokens, MAX_COMPLETION_TOKENS);
        assert!(backend.validate().is_ok());
        assert_eq!(backend.model, "gpt-4.1");
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let settings = AnalysisSettings {
            api_key: Some(" ".to_string()),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(&settings).unwrap();
        assert!(matches!(backend.validate(), Err(SermonError::Config(_))));
    }
}
