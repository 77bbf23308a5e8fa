use crate::error::FetchError;
use crate::models::{ProviderKind, UsageWindow};
use crate::providers::{as_number, epoch_seconds, read_json_body, ProviderContext, UsageFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

const USAGE_ENDPOINT: &str = "https://chatgpt.com/backend-api/wham/usage";
const CODEX_USER_AGENT: &str = concat!("usage-footer/", env!("CARGO_PKG_VERSION"));

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

pub struct CodexFetcher;

impl CodexFetcher {
    /// Names a rate-limit window after its length.
    pub(crate) fn window_label(seconds: Option<i64>, fallback: &str) -> String {
        match seconds {
            Some(SECONDS_PER_DAY) => "Day".into(),
            Some(SECONDS_PER_WEEK) => "Week".into(),
            Some(s) if s > 0 && s < SECONDS_PER_DAY => {
                format!("{}h", (s + SECONDS_PER_HOUR / 2) / SECONDS_PER_HOUR)
            }
            Some(s) if s >= SECONDS_PER_DAY => {
                format!("{}d", s.saturating_add(SECONDS_PER_DAY / 2) / SECONDS_PER_DAY)
            }
            _ => fallback.into(),
        }
    }

    fn parse_window(raw: &Value, fallback_label: &str, now: DateTime<Utc>) -> Option<UsageWindow> {
        let used = as_number(raw.get("used_percent"))?;
        let length = raw.get("limit_window_seconds").and_then(Value::as_i64);
        let window = UsageWindow::new(Self::window_label(length, fallback_label), used);

        let reset = epoch_seconds(raw.get("reset_at")).or_else(|| {
            raw.get("reset_after_seconds")
                .and_then(Value::as_i64)
                .and_then(|secs| now.checked_add_signed(Duration::try_seconds(secs)?))
        });

        Some(match reset {
            Some(at) => window.resetting_at(at, now),
            None => window,
        })
    }

    pub(crate) fn parse_windows(body: &Value, now: DateTime<Utc>) -> Vec<UsageWindow> {
        let Some(limits) = body.get("rate_limit") else {
            return vec![];
        };

        [("primary_window", "5h"), ("secondary_window", "Week")]
            .iter()
            .filter_map(|(key, fallback)| {
                let raw = limits.get(*key).filter(|v| v.is_object())?;
                Self::parse_window(raw, fallback, now)
            })
            .collect()
    }
}

#[async_trait]
impl UsageFetcher for CodexFetcher {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn default_endpoint(&self) -> &'static str {
        USAGE_ENDPOINT
    }

    #[instrument(skip_all, fields(provider = "codex"))]
    async fn fetch_windows(
        &self,
        client: &Client,
        ctx: &ProviderContext,
    ) -> Result<Vec<UsageWindow>, FetchError> {
        let mut req = client
            .get(&ctx.endpoint)
            .bearer_auth(&ctx.credential.token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CODEX_USER_AGENT);
        if let Some(account) = &ctx.credential.account_id {
            req = req.header("ChatGPT-Account-Id", account);
        }

        let body = read_json_body(req.send().await?).await?;
        if !body.is_object() {
            return Err(FetchError::Parse("expected a JSON object".into()));
        }

        let windows = Self::parse_windows(&body, ctx.now);
        debug!(windows = windows.len(), "parsed codex usage");
        Ok(windows)
    }
}
