use crate::error::FetchError;
use crate::models::{clamp_percent, ProviderKind, UsageWindow};
use crate::providers::{as_number, parse_instant, read_json_body, ProviderContext, UsageFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

const USAGE_ENDPOINT: &str = "https://api.github.com/copilot_internal/user";
const GITHUB_API_VERSION: &str = "2025-04-01";
const EDITOR_VERSION: &str = "vscode/1.96.2";
const COPILOT_USER_AGENT: &str = "GitHubCopilotChat/0.26.7";

pub struct CopilotFetcher;

impl CopilotFetcher {
    fn reset_instant(body: &Value) -> Option<DateTime<Utc>> {
        parse_instant(body.get("quota_reset_date_utc"))
            .or_else(|| parse_instant(body.get("quota_reset_date")))
            .or_else(|| parse_instant(body.get("limited_user_reset_date")))
    }

    /// Paid plans report `quota_snapshots.premium_interactions`.
    fn premium_window(body: &Value) -> Option<UsageWindow> {
        let quota = body.get("quota_snapshots")?.get("premium_interactions")?;
        if quota.get("unlimited").and_then(Value::as_bool) == Some(true) {
            return None;
        }

        let remaining = as_number(quota.get("remaining"));
        let entitlement = as_number(quota.get("entitlement"));
        let percent_remaining = as_number(quota.get("percent_remaining")).or_else(|| {
            match (remaining, entitlement) {
                (Some(r), Some(e)) if e > 0.0 => Some(r / e * 100.0),
                _ => None,
            }
        })?;

        let mut window = UsageWindow::new("Premium", 100.0 - percent_remaining);
        if let (Some(r), Some(e)) = (remaining, entitlement) {
            window = window.with_quota(r.floor() as i64, e.floor() as i64);
        }
        Some(window)
    }

    /// Free plans only report monthly chat allowances.
    fn free_chat_window(body: &Value) -> Option<UsageWindow> {
        let remaining = as_number(body.get("limited_user_quotas")?.get("chat"))?;
        let entitlement = as_number(body.get("monthly_quotas")?.get("chat"))?;
        if entitlement <= 0.0 {
            return None;
        }
        let used = clamp_percent((entitlement - remaining) * 100.0 / entitlement);
        Some(
            UsageWindow::new("Chat", used)
                .with_quota(remaining.floor() as i64, entitlement.floor() as i64),
        )
    }

    pub(crate) fn parse_windows(body: &Value, now: DateTime<Utc>) -> Vec<UsageWindow> {
        let window = Self::premium_window(body).or_else(|| Self::free_chat_window(body));
        let reset = Self::reset_instant(body);
        window
            .map(|w| match reset {
                Some(at) => w.resetting_at(at, now),
                None => w,
            })
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl UsageFetcher for CopilotFetcher {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Copilot
    }

    fn default_endpoint(&self) -> &'static str {
        USAGE_ENDPOINT
    }

    #[instrument(skip_all, fields(provider = "copilot"))]
    async fn fetch_windows(
        &self,
        client: &Client,
        ctx: &ProviderContext,
    ) -> Result<Vec<UsageWindow>, FetchError> {
        let response = client
            .get(&ctx.endpoint)
            .header(AUTHORIZATION, format!("token {}", ctx.credential.token))
            .header(ACCEPT, "application/json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header("Editor-Version", EDITOR_VERSION)
            .header(USER_AGENT, COPILOT_USER_AGENT)
            .send()
            .await?;

        let body = read_json_body(response).await?;
        if !body.is_object() {
            return Err(FetchError::Parse("expected a JSON object".into()));
        }

        let windows = Self::parse_windows(&body, ctx.now);
        debug!(windows = windows.len(), "parsed copilot usage");
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn premium_window_uses_percent_remaining() {
        let body = json!({
            "copilot_plan": "individual",
            "quota_reset_date_utc": "2025-10-18T12:00:00.000Z",
            "quota_snapshots": {
                "chat": { "unlimited": true, "percent_remaining": 100.0 },
                "premium_interactions": {
                    "entitlement": 300,
                    "remaining": 120,
                    "percent_remaining": 40.0,
                    "unlimited": false
                }
            }
        });

        let windows = CopilotFetcher::parse_windows(&body, now());
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.label, "Premium");
        assert_eq!(w.used_percent, 60.0);
        assert_eq!(w.remaining, Some(120));
        assert_eq!(w.entitlement, Some(300));
        assert_eq!(w.reset_description.as_deref(), Some("2d"));
    }

    #[test]
    fn premium_percent_falls_back_to_counts() {
        let body = json!({
            "quota_snapshots": {
                "premium_interactions": { "entitlement": 50, "remaining": 40.6 }
            }
        });
        let windows = CopilotFetcher::parse_windows(&body, now());
        assert_eq!(windows[0].remaining, Some(40));
        assert!((windows[0].used_percent - 18.8).abs() < 1e-9);
        assert_eq!(windows[0].reset_description, None);
    }

    #[test]
    fn overdrawn_quota_is_clamped() {
        let body = json!({
            "quota_snapshots": {
                "premium_interactions": { "entitlement": 300, "remaining": -12, "percent_remaining": -4.0 }
            }
        });
        let windows = CopilotFetcher::parse_windows(&body, now());
        assert_eq!(windows[0].used_percent, 100.0);
    }

    #[test]
    fn unlimited_plans_have_no_window() {
        let body = json!({
            "quota_snapshots": {
                "premium_interactions": { "unlimited": true, "percent_remaining": 100.0 }
            }
        });
        assert!(CopilotFetcher::parse_windows(&body, now()).is_empty());
    }

    #[test]
    fn free_plan_reports_chat_allowance() {
        let body = json!({
            "access_type_sku": "free_limited_copilot",
            "limited_user_quotas": { "chat": 30, "completions": 1500 },
            "monthly_quotas": { "chat": 50, "completions": 2000 },
            "limited_user_reset_date": "2025-10-16"
        });
        let windows = CopilotFetcher::parse_windows(&body, now());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].label, "Chat");
        assert_eq!(windows[0].used_percent, 40.0);
        assert_eq!(windows[0].remaining, Some(30));
        assert_eq!(windows[0].entitlement, Some(50));
        assert_eq!(windows[0].reset_description.as_deref(), Some("now"));
    }

    #[test]
    fn unrelated_shape_yields_no_windows() {
        assert!(CopilotFetcher::parse_windows(&json!({ "login": "octo" }), now()).is_empty());
    }

    fn ctx(endpoint: String) -> ProviderContext {
        ProviderContext {
            credential: Credential::new("gho_test"),
            endpoint,
            now: now(),
        }
    }

    #[tokio::test]
    async fn fetch_sends_token_prefix_and_api_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/copilot_internal/user")
            .match_header("authorization", "token gho_test")
            .match_header("x-github-api-version", GITHUB_API_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "quota_snapshots": {
                        "premium_interactions": {
                            "entitlement": 300, "remaining": 120, "percent_remaining": 40.0
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let endpoint = format!("{}/copilot_internal/user", server.url());
        let windows = CopilotFetcher
            .fetch_windows(&Client::new(), &ctx(endpoint))
            .await
            .expect("windows");

        mock.assert_async().await;
        assert_eq!(windows[0].remaining, Some(120));
    }

    #[tokio::test]
    async fn fetch_flags_unauthorized_as_expired() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/copilot_internal/user")
            .with_status(401)
            .with_body("{\"message\":\"Bad credentials\"}")
            .create_async()
            .await;

        let endpoint = format!("{}/copilot_internal/user", server.url());
        let err = CopilotFetcher
            .fetch_windows(&Client::new(), &ctx(endpoint))
            .await
            .expect_err("expected auth error");
        assert!(matches!(err, FetchError::AuthExpired { status: 401 }));
    }

    #[tokio::test]
    async fn fetch_reports_invalid_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/copilot_internal/user")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let endpoint = format!("{}/copilot_internal/user", server.url());
        let err = CopilotFetcher
            .fetch_windows(&Client::new(), &ctx(endpoint))
            .await
            .expect_err("expected parse error");
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
