//! Gemini REST backend.
//!
//! Uploads the recording through the resumable file API, references it from a
//! single `generateContent` call and deletes the remote file afterwards.

use super::AnalysisBackend;
use crate::config::AnalysisSettings;
use crate::error::{Result, SermonError};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini-based analysis backend.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    poll_attempts: u32,
    poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, skipping thought parts.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiBackend {
    /// Create a Gemini backend from the analysis settings.
    pub fn new(settings: &AnalysisSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| SermonError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: settings.resolve_api_key(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_output_tokens: settings.max_output_tokens,
            poll_attempts: settings.upload_poll_attempts,
            poll_interval: Duration::from_millis(settings.upload_poll_interval_ms),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            SermonError::Config(
                "GEMINI_API_KEY not set. Set it with: export GEMINI_API_KEY='...'".to_string(),
            )
        })
    }

    /// Upload a local file and return the provider's file handle.
    #[instrument(skip(self, api_key), fields(audio_path = %audio_path.display()))]
    async fn upload(&self, audio_path: &Path, api_key: &str) -> Result<RemoteFile> {
        let file = tokio::fs::File::open(audio_path).await?;
        let size = file.metadata().await?.len();
        let mime_type = audio_mime_type(audio_path);
        let display_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sermon-audio")
            .to_string();

        debug!("Starting upload of {} bytes ({})", size, mime_type);

        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| SermonError::Provider(format!("Upload start failed: {}", e)))?;
        let start = check_status(start, "Upload start").await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SermonError::Provider("Upload start returned no upload URL".to_string()))?
            .to_string();

        let response = self
            .http
            .post(&upload_url)
            .header(CONTENT_LENGTH, size)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| SermonError::Provider(format!("Upload failed: {}", e)))?;
        let response = check_status(response, "Upload").await?;

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| SermonError::Provider(format!("Invalid upload response: {}", e)))?;

        info!("Uploaded audio as {}", uploaded.file.name);
        Ok(uploaded.file)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }

    async fn get_file(&self, name: &str, api_key: &str) -> Result<RemoteFile> {
        let response = self
            .http
            .get(self.file_url(name))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| SermonError::Provider(format!("File lookup failed: {}", e)))?;
        let response = check_status(response, "File lookup").await?;

        response
            .json()
            .await
            .map_err(|e| SermonError::Provider(format!("Invalid file response: {}", e)))
    }

    /// Wait until an uploaded file has finished server-side processing.
    async fn wait_until_active(&self, mut file: RemoteFile, api_key: &str) -> Result<RemoteFile> {
        let mut attempts = 0;
        loop {
            match file.state.as_deref() {
                Some("PROCESSING") => {
                    if attempts >= self.poll_attempts {
                        return Err(SermonError::Provider(format!(
                            "File {} still processing after {} checks",
                            file.name, attempts
                        )));
                    }
                    attempts += 1;
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.get_file(&file.name, api_key).await?;
                }
                Some("FAILED") => {
                    return Err(SermonError::Provider(format!(
                        "Provider failed to process file {}",
                        file.name
                    )));
                }
                _ => return Ok(file),
            }
        }
    }

    #[instrument(skip(self, prompt, file, api_key), fields(file = %file.name))]
    async fn generate_from_file(
        &self,
        prompt: &str,
        file: RemoteFile,
        api_key: &str,
    ) -> Result<String> {
        let file = self.wait_until_active(file, api_key).await?;
        let mime_type = file
            .mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "file_data": { "mime_type": mime_type, "file_uri": file.uri } }
                ]
            }],
            "generationConfig": { "maxOutputTokens": self.max_output_tokens }
        });

        info!("Requesting analysis from {}", self.model);

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SermonError::Provider(format!("{} request failed: {}", self.model, e)))?;
        let response = check_status(response, "Generation").await?;

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SermonError::Provider(format!("Invalid generation response: {}", e)))?;

        if let Some(candidate) = generated.candidates.first() {
            if let Some(reason) = &candidate.finish_reason {
                debug!("Generation finished: {}", reason);
            }
        }

        generated.text().ok_or_else(|| {
            let reason = generated
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            SermonError::Provider(format!("Empty response from {}: {}", self.model, reason))
        })
    }

    async fn delete_file(&self, name: &str, api_key: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.file_url(name))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| SermonError::Provider(format!("File delete failed: {}", e)))?;
        check_status(response, "File delete").await?;
        debug!("Deleted remote file {}", name);
        Ok(())
    }
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn validate(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn generate(&self, prompt: &str, audio_path: &Path) -> Result<String> {
        let api_key = self.api_key()?;
        let file = self.upload(audio_path, api_key).await?;
        let name = file.name.clone();
        let guard = RemoteFileGuard {
            request: Some(self.http.delete(self.file_url(&name)).header(API_KEY_HEADER, api_key)),
            name: name.clone(),
        };

        let result = self.generate_from_file(prompt, file, api_key).await;

        let deleted = self.delete_file(&name, api_key).await;
        guard.disarm();
        if let Err(e) = deleted {
            warn!("Failed to delete remote file {}: {}", name, e);
        }

        result
    }
}

/// Deletes an uploaded file when `generate` is dropped before it could,
/// e.g. when the caller's deadline fires mid-request.
struct RemoteFileGuard {
    request: Option<RequestBuilder>,
    name: String,
}

impl RemoteFileGuard {
    fn disarm(mut self) {
        self.request = None;
    }
}

impl Drop for RemoteFileGuard {
    fn drop(&mut self) {
        let Some(request) = self.request.take() else {
            return;
        };
        let name = std::mem::take(&mut self.name);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to delete remote file {}", name);
            return;
        };

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Deleted remote file {} after cancellation", name)
                }
                Ok(response) => warn!("Failed to delete remote file {}: {}", name, response.status()),
                Err(e) => warn!("Failed to delete remote file {}: {}", name, e),
            }
        });
    }
}

async fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SermonError::Provider(format!(
        "{} returned {}: {}",
        action,
        status,
        body.trim()
    )))
}

/// MIME type for an audio file, by extension.
pub fn audio_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        "aiff" | "aif" => "audio/aiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path as UrlPath, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    struct FakeGemini {
        base: String,
        fail_generation: bool,
        stall_generation: bool,
        generate_bodies: Mutex<Vec<serde_json::Value>>,
        deleted: Mutex<Vec<String>>,
    }

    async fn upload_start(State(fake): State<Arc<FakeGemini>>, headers: HeaderMap) -> impl IntoResponse {
        assert_eq!(headers.get("x-goog-upload-command").unwrap(), "start");
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "test-key");
        [(UPLOAD_URL_HEADER, format!("{}/upload-session/1", fake.base))]
    }

    async fn upload_finalize(State(fake): State<Arc<FakeGemini>>, body: axum::body::Bytes) -> impl IntoResponse {
        assert_eq!(&body[..], b"ID3fake-audio");
        Json(json!({
            "file": {
                "name": "files/abc123",
                "uri": format!("{}/v1beta/files/abc123", fake.base),
                "mimeType": "audio/mpeg",
                "state": "ACTIVE"
            }
        }))
    }

    async fn generate_content(
        State(fake): State<Arc<FakeGemini>>,
        UrlPath(call): UrlPath<String>,
        Json(body): Json<serde_json::Value>,
    ) -> axum::response::Response {
        assert_eq!(call, "gemini-test:generateContent");
        fake.generate_bodies.lock().unwrap().push(body);
        if fake.stall_generation {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if fake.fail_generation {
            return (StatusCode::TOO_MANY_REQUESTS, "quota exhausted").into_response();
        }
        Json(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "```json\n{\"summary\": " },
                    { "text": "\"ok\"}\n```" }
                ]},
                "finishReason": "STOP"
            }]
        }))
        .into_response()
    }

    async fn delete_file(State(fake): State<Arc<FakeGemini>>, UrlPath(id): UrlPath<String>) -> impl IntoResponse {
        fake.deleted.lock().unwrap().push(id);
        Json(json!({}))
    }

    async fn spawn_fake(fail_generation: bool, stall_generation: bool) -> Arc<FakeGemini> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let fake = Arc::new(FakeGemini {
            base,
            fail_generation,
            stall_generation,
            generate_bodies: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/upload/v1beta/files", post(upload_start))
            .route("/upload-session/1", post(upload_finalize))
            .route("/v1beta/models/{call}", post(generate_content))
            .route("/v1beta/files/{id}", delete(delete_file))
            .with_state(fake.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        fake
    }

    fn backend_for(fake: &FakeGemini) -> GeminiBackend {
        let settings = AnalysisSettings {
            api_key: Some("test-key".to_string()),
            base_url: format!("{}/", fake.base),
            model: "gemini-test".to_string(),
            max_output_tokens: 1024,
            ..Default::default()
        };
        GeminiBackend::new(&settings).unwrap()
    }

    fn audio_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sermon-job1.mp3");
        std::fs::write(&path, b"ID3fake-audio").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_generate_uploads_references_and_deletes() {
        let fake = spawn_fake(false, false).await;
        let backend = backend_for(&fake);
        let (_dir, path) = audio_file();

        let text = backend.generate("Analyze this sermon", &path).await.unwrap();
        assert_eq!(text, "```json\n{\"summary\": \"ok\"}\n```");

        let bodies = fake.generate_bodies.lock().unwrap();
        let parts = &bodies[0]["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Analyze this sermon");
        assert_eq!(parts[1]["file_data"]["mime_type"], "audio/mpeg");
        assert!(parts[1]["file_data"]["file_uri"].as_str().unwrap().ends_with("files/abc123"));
        assert_eq!(bodies[0]["generationConfig"]["maxOutputTokens"], 1024);

        assert_eq!(*fake.deleted.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_generation_still_deletes_file() {
        let fake = spawn_fake(true, false).await;
        let backend = backend_for(&fake);
        let (_dir, path) = audio_file();

        let err = backend.generate("prompt", &path).await.unwrap_err();
        assert!(matches!(err, SermonError::Provider(_)));
        assert!(err.to_string().contains("quota exhausted"));
        assert_eq!(fake.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_generation_still_deletes_file() {
        let fake = spawn_fake(false, true).await;
        let backend = backend_for(&fake);
        let (_dir, path) = audio_file();

        let outcome = tokio::time::timeout(Duration::from_millis(500), backend.generate("prompt", &path)).await;
        assert!(outcome.is_err());

        // The delete is issued in the background once the call is dropped.
        for _ in 0..50 {
            if !fake.deleted.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(*fake.deleted.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let settings = AnalysisSettings {
            api_key: Some(String::new()),
            ..Default::default()
        };
        let backend = GeminiBackend::new(&settings).unwrap();
        assert!(matches!(backend.validate(), Err(SermonError::Config(_))));
    }

    #[test]
    fn test_audio_mime_type() {
        assert_eq!(audio_mime_type(Path::new("a/sermon.MP3")), "audio/mpeg");
        assert_eq!(audio_mime_type(Path::new("sermon.m4a")), "audio/mp4");
        assert_eq!(audio_mime_type(Path::new("sermon")), "application/octet-stream");
    }

    #[test]
    fn test_response_text_skips_thoughts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "thinking...", "thought": true },
                { "text": "{}" }
            ]}}]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{}"));

        let empty: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(empty.text().is_none());
    }
}
