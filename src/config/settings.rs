//! Configuration settings for the sermon analysis worker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub analysis: AnalysisSettings,
    pub download: DownloadSettings,
    pub scheduler: SchedulerSettings,
    pub store: StoreSettings,
    pub server: ServerSettings,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for downloaded audio while a job runs.
    pub temp_dir: String,
    /// Log level override (trace, debug, info, warn, error). Empty = by environment.
    pub log_level: String,
    /// Deployment environment.
    pub environment: Environment,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.sermon-analysis".to_string(),
            temp_dir: std::env::temp_dir().to_string_lossy().to_string(),
            log_level: String::new(),
            environment: Environment::Development,
        }
    }
}

impl GeneralSettings {
    /// Effective log level: explicit override, else debug in development and info in production.
    pub fn effective_log_level(&self) -> &str {
        if !self.log_level.is_empty() {
            return &self.log_level;
        }
        match self.environment {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }
}

/// AI provider used for analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProvider {
    /// Google Gemini (audio is uploaded and referenced directly).
    #[default]
    Gemini,
    /// OpenAI: speech-to-text followed by a chat completion.
    OpenAi,
}

impl std::str::FromStr for AnalysisProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(AnalysisProvider::Gemini),
            "openai" => Ok(AnalysisProvider::OpenAi),
            _ => Err(format!("Unknown analysis provider: {}", s)),
        }
    }
}

impl std::fmt::Display for AnalysisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisProvider::Gemini => write!(f, "gemini"),
            AnalysisProvider::OpenAi => write!(f, "openai"),
        }
    }
}

/// AI analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Provider (gemini, openai).
    pub provider: AnalysisProvider,
    /// Generation model (gemini provider).
    pub model: String,
    /// Chat model (openai provider).
    pub openai_model: String,
    /// API credential. Falls back to GEMINI_API_KEY / OPENAI_API_KEY.
    pub api_key: Option<String>,
    /// Gemini API base URL.
    pub base_url: String,
    /// Maximum output tokens requested per generation.
    pub max_output_tokens: u32,
    /// Speech-to-text model (openai provider only).
    pub transcription_model: String,
    /// Path to a prompt file replacing the bundled prompt.
    pub prompt_path: Option<String>,
    /// Timeout for each provider request in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound for one job's download + analysis in seconds.
    pub job_timeout_secs: u64,
    /// How many times to poll an uploaded file until it becomes usable.
    pub upload_poll_attempts: u32,
    /// Delay between upload polls in milliseconds.
    pub upload_poll_interval_ms: u64,
    /// Variables available in the prompt as {{name}}.
    pub variables: HashMap<String, String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            openai_model: "gpt-4.1".to_string(),
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_output_tokens: 65536,
            transcription_model: "whisper-1".to_string(),
            prompt_path: None,
            request_timeout_secs: 600,
            job_timeout_secs: 1800,
            upload_poll_attempts: 30,
            upload_poll_interval_ms: 2000,
            variables: HashMap::new(),
        }
    }
}

impl AnalysisSettings {
    /// Name of the environment variable holding the provider credential.
    pub fn api_key_env(&self) -> &'static str {
        match self.provider {
            AnalysisProvider::Gemini => "GEMINI_API_KEY",
            AnalysisProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Resolve the credential from config, then the environment. Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(self.api_key_env()).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Audio download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Total download timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between analysis passes.
    pub interval_secs: u64,
    /// Seconds to wait for an in-flight pass on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            shutdown_grace_secs: 120,
        }
    }
}

/// Sermon store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.sermon-analysis/sermons.db".to_string(),
        }
    }
}

/// Status endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Serve /health and /status while the scheduler runs.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SermonError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sermon-analysis")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
