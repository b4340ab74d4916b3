//! Sermon audio download.
//!
//! Streams a remote recording into a job-scoped temporary file. The returned
//! [`TempAudio`] removes the file when dropped, so every exit path of the
//! caller cleans up.

use crate::config::DownloadSettings;
use crate::error::{Result, SermonError};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A downloaded audio file that is deleted on drop.
#[derive(Debug)]
pub struct TempAudio {
    path: PathBuf,
    bytes: u64,
}

impl TempAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary audio {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to cleanup audio file {:?}: {}", self.path, e),
        }
    }
}

/// Downloads sermon audio into a temporary directory.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl AudioFetcher {
    /// Create a fetcher whose HTTP client carries the configured timeouts.
    pub fn new(settings: &DownloadSettings, dir: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SermonError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, dir))
    }

    pub fn with_client(client: reqwest::Client, dir: PathBuf) -> Self {
        Self { client, dir }
    }

    pub async fn fetch(&self, url: &str, correlation_id: &str) -> Result<TempAudio> {
        fetch_audio(&self.client, url, correlation_id, &self.dir).await
    }
}

/// Download `url` into `dir` as `sermon-<correlation_id>.<ext>`.
///
/// An empty or malformed URL fails before any request is made.
#[instrument(skip(client, dir), fields(correlation_id = %correlation_id))]
pub async fn fetch_audio(
    client: &reqwest::Client,
    url: &str,
    correlation_id: &str,
    dir: &Path,
) -> Result<TempAudio> {
    let url = url.trim();
    if url.is_empty() {
        return Err(SermonError::InvalidInput("audio url is required".to_string()));
    }
    let parsed = Url::parse(url)
        .map_err(|e| SermonError::InvalidInput(format!("invalid audio url {}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SermonError::InvalidInput(format!(
            "unsupported audio url scheme: {}",
            parsed.scheme()
        )));
    }

    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(temp_file_name(&parsed, correlation_id));

    info!("Downloading sermon audio from {}", url);

    let response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| SermonError::Download(format!("Failed to start download: {}", e)))?;

    if !response.status().is_success() {
        return Err(SermonError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let content_length = response.content_length();
    let mut file = tokio::fs::File::create(&target)
        .await
        .map_err(|e| SermonError::Download(format!("Failed to create {:?}: {}", target, e)))?;
    // From here on the guard owns the file, so failures below remove it.
    let mut audio = TempAudio {
        path: target,
        bytes: 0,
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| SermonError::Download(format!("Error reading download stream: {}", e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| SermonError::Download(format!("Failed to write chunk: {}", e)))?;
        audio.bytes += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| SermonError::Download(format!("Failed to flush file: {}", e)))?;

    if let Some(expected) = content_length {
        if audio.bytes != expected {
            return Err(SermonError::Download(format!(
                "Download incomplete: got {} bytes, expected {}",
                audio.bytes, expected
            )));
        }
    }

    info!("Audio downloaded: {} bytes", audio.bytes);
    Ok(audio)
}

/// Temporary file name for a download: `sermon-<id>[.<ext>]`.
///
/// The extension comes from the last path segment only, so query strings and
/// fragments never leak into the name.
pub fn temp_file_name(url: &Url, correlation_id: &str) -> String {
    let id: String = correlation_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| Path::new(segment).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) => format!("sermon-{}.{}", id, ext),
        None => format!("sermon-{}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_audio_host() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new()
            .route("/media/sermon.mp3", get(|| async { vec![7u8; 4096] }))
            .route("/media/missing.mp3", get(|| async { StatusCode::NOT_FOUND }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    #[test]
    fn test_temp_file_name_uses_path_extension() {
        let url = Url::parse("https://cdn.example.com/audio/2024-06-02.MP3?token=abc.def#t=10").unwrap();
        assert_eq!(temp_file_name(&url, "job42"), "sermon-job42.mp3");

        let url = Url::parse("https://cdn.example.com/stream?file=a.mp3").unwrap();
        assert_eq!(temp_file_name(&url, "job42"), "sermon-job42");

        let url = Url::parse("https://cdn.example.com/a.m4a").unwrap();
        assert_eq!(temp_file_name(&url, "../etc/job"), "sermon-etcjob.m4a");
    }

    #[tokio::test]
    async fn test_empty_url_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_audio(&reqwest::Client::new(), "  ", "job1", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SermonError::InvalidInput(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_http_scheme_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_audio(&reqwest::Client::new(), "file:///etc/passwd", "job1", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SermonError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_download_and_cleanup_on_drop() {
        let base = spawn_audio_host().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AudioFetcher::new(&DownloadSettings::default(), dir.path().to_path_buf()).unwrap();

        let audio = fetcher
            .fetch(&format!("{}/media/sermon.mp3?dl=1", base), "job7")
            .await
            .unwrap();
        let path = audio.path().to_path_buf();
        assert_eq!(path.file_name().unwrap(), "sermon-job7.mp3");
        assert_eq!(audio.len(), 4096);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);

        drop(audio);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_not_found_is_http_status_error() {
        let base = spawn_audio_host().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AudioFetcher::new(&DownloadSettings::default(), dir.path().to_path_buf()).unwrap();

        let err = fetcher
            .fetch(&format!("{}/media/missing.mp3", base), "job8")
            .await
            .unwrap_err();
        assert!(matches!(err, SermonError::HttpStatus { status: 404, .. }));
        assert!(!dir.path().join("sermon-job8.mp3").exists());
    }
}
