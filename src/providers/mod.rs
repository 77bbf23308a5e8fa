use crate::credentials::Credential;
use crate::error::FetchError;
use crate::models::{ProviderKind, UsageWindow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, Response};
use serde_json::Value;

pub mod codex;
pub mod copilot;

#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub credential: Credential,
    pub endpoint: String,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait UsageFetcher: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn default_endpoint(&self) -> &'static str;

    async fn fetch_windows(
        &self,
        client: &Client,
        ctx: &ProviderContext,
    ) -> Result<Vec<UsageWindow>, FetchError>;
}

pub fn fetcher_for(kind: ProviderKind) -> Box<dyn UsageFetcher> {
    match kind {
        ProviderKind::Copilot => Box::new(copilot::CopilotFetcher),
        ProviderKind::Codex => Box::new(codex::CodexFetcher),
    }
}

/// Maps a non-success status to the fetch taxonomy and decodes the body.
pub(crate) async fn read_json_body(response: Response) -> Result<Value, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::from_status(status.as_u16()));
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn epoch_seconds(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Accepts RFC 3339 instants and bare `YYYY-MM-DD` dates (midnight UTC).
pub(crate) fn parse_instant(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value.and_then(Value::as_str)?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

pub(crate) fn as_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|f| f.is_finite())
}
