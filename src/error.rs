//! Error types for the sermon analysis worker.

use thiserror::Error;

/// Library-level error type.
#[derive(Error, Debug)]
pub enum SermonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { status: u16, url: String },

    #[error("AI provider error: {0}")]
    Provider(String),

    /// The response could not be decoded. `raw` is the untouched provider text.
    #[error("Failed to decode analysis response: {source}. Raw response: {raw}")]
    Parse {
        source: serde_json::Error,
        raw: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Failure class used when logging pipeline errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Transport,
    Provider,
    Parse,
    Persistence,
    Timeout,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::Transport => "transport",
            ErrorKind::Provider => "provider",
            ErrorKind::Parse => "parse",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SermonError {
    /// Classify this error for logging.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SermonError::InvalidInput(_) => ErrorKind::Input,
            SermonError::Download(_)
            | SermonError::HttpStatus { .. }
            | SermonError::Http(_)
            | SermonError::Io(_) => ErrorKind::Transport,
            SermonError::Provider(_) => ErrorKind::Provider,
            SermonError::Parse { .. } | SermonError::Json(_) => ErrorKind::Parse,
            SermonError::Store(_) | SermonError::Database(_) => ErrorKind::Persistence,
            SermonError::Timeout(_) => ErrorKind::Timeout,
            SermonError::Config(_) | SermonError::TomlParse(_) => ErrorKind::Config,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, SermonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_is_transport() {
        let err = SermonError::HttpStatus {
            status: 404,
            url: "https://example.com/a.mp3".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_parse_error_keeps_raw_text() {
        let source = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err = SermonError::Parse {
            source,
            raw: "nope".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().ends_with("Raw response: nope"));
    }
}
