use crate::models::ProviderKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("{provider} usage unavailable: {reason}")]
    Unavailable {
        provider: ProviderKind,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

/// Why a usage fetch produced no windows.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no {0} credentials found")]
    CredentialMissing(ProviderKind),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("authentication expired (HTTP {status})")]
    AuthExpired { status: u16 },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn from_status(status: u16) -> Self {
        if status == 401 || status == 403 {
            FetchError::AuthExpired { status }
        } else {
            FetchError::Http { status }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}
