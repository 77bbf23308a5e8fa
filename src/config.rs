use crate::error::AppError;
use crate::models::ProviderKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SERVICE_NAME: &str = "usage-footer";
const ENV_PREFIX: &str = "USAGE_FOOTER";

pub const MIN_REFRESH_SECONDS: u64 = 10;
pub const MAX_BAR_WIDTH: usize = 64;

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("USAGE_FOOTER_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("dev", "usage-footer", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".usage-footer"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub refresh_seconds: u64,
    pub fetch_timeout_ms: u64,
    pub bar_width: usize,
    pub use_keyring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_auth_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copilot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codex_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_seconds: 60,
            fetch_timeout_ms: 5_000,
            bar_width: 12,
            use_keyring: true,
            agent_auth_path: None,
            copilot_url: None,
            codex_url: None,
        }
    }
}

impl AppConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn endpoint_override(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Copilot => self.copilot_url.as_deref(),
            ProviderKind::Codex => self.codex_url.as_deref(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    Ok(())
}

/// Clamps out-of-range values and drops blank overrides. Returns whether
/// anything changed.
fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    if config.refresh_seconds < MIN_REFRESH_SECONDS {
        config.refresh_seconds = MIN_REFRESH_SECONDS;
        changed = true;
    }

    let width = config.bar_width.clamp(1, MAX_BAR_WIDTH);
    if width != config.bar_width {
        config.bar_width = width;
        changed = true;
    }

    if config.fetch_timeout_ms == 0 {
        config.fetch_timeout_ms = AppConfig::default().fetch_timeout_ms;
        changed = true;
    }

    for url in [&mut config.copilot_url, &mut config.codex_url] {
        if url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            *url = None;
            changed = true;
        }
    }

    changed
}

fn validate_endpoints(config: &AppConfig) -> Result<(), AppError> {
    for kind in ProviderKind::ALL {
        if let Some(raw) = config.endpoint_override(kind) {
            url::Url::parse(raw).map_err(|e| {
                AppError::Config(format!("Invalid {kind} endpoint '{raw}': {e}"))
            })?;
        }
    }
    Ok(())
}

/// Layers defaults, the config file, and `USAGE_FOOTER_*` environment
/// variables, in that order.
pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from(&config_path()?)
}

fn load_config_from(path: &Path) -> Result<AppConfig, AppError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()?;

    let mut parsed: AppConfig = settings.try_deserialize()?;
    normalize_config(&mut parsed);
    validate_endpoints(&parsed)?;
    Ok(parsed)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}

fn keyring_entry(kind: ProviderKind, field: &str) -> Result<keyring::Entry, AppError> {
    Ok(keyring::Entry::new(
        SERVICE_NAME,
        &format!("provider:{}{field}", kind.provider_id()),
    )?)
}

pub fn set_token(
    kind: ProviderKind,
    token: &str,
    account_id: Option<&str>,
) -> Result<(), AppError> {
    keyring_entry(kind, "")?.set_password(token)?;
    if let Some(account) = account_id {
        keyring_entry(kind, ":account")?.set_password(account)?;
    }
    Ok(())
}

pub fn delete_token(kind: ProviderKind) -> Result<(), AppError> {
    for field in ["", ":account"] {
        match keyring_entry(kind, field)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(AppError::Keyring(e)),
        }
    }
    Ok(())
}

/// Reads a keyring value, treating a missing entry as `None`.
pub fn get_keyring_value(kind: ProviderKind, field: &str) -> Result<Option<String>, AppError> {
    match keyring_entry(kind, field)?.get_password() {
        Ok(v) if !v.is_empty() => Ok(Some(v)),
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(AppError::Keyring(e)),
    }
}
