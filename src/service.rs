use crate::config::AppConfig;
use crate::credentials::CredentialLoader;
use crate::error::{AppError, FetchError};
use crate::models::{ProviderKind, UsageSnapshot};
use crate::providers::{fetcher_for, ProviderContext};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Resolves to `fut`'s output, or to `fallback()` if `limit` elapses first.
/// The slower side is dropped.
pub async fn settle_within<T, F>(fut: F, limit: Duration, fallback: impl FnOnce() -> T) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => value,
        Err(_) => fallback(),
    }
}

/// Anything that can produce a usage snapshot for a provider. Must not fail.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, kind: ProviderKind) -> UsageSnapshot;
}

pub struct UsageService {
    client: Client,
    loader: CredentialLoader,
    timeout: Duration,
    config: AppConfig,
}

impl UsageService {
    pub fn new(cfg: &AppConfig, loader: CredentialLoader) -> Result<Self, AppError> {
        let timeout = cfg.fetch_timeout();
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            loader,
            timeout,
            config: cfg.clone(),
        })
    }

    async fn try_fetch(&self, kind: ProviderKind) -> Result<UsageSnapshot, FetchError> {
        let credential = self
            .loader
            .load(kind)
            .ok_or(FetchError::CredentialMissing(kind))?;
        let fetcher = fetcher_for(kind);
        let ctx = ProviderContext {
            credential,
            endpoint: self
                .config
                .endpoint_override(kind)
                .unwrap_or(fetcher.default_endpoint())
                .to_string(),
            now: Utc::now(),
        };

        debug!(provider = %fetcher.kind(), endpoint = %ctx.endpoint, "requesting usage");
        let windows = fetcher.fetch_windows(&self.client, &ctx).await?;
        Ok(UsageSnapshot::from_windows(windows))
    }
}

#[async_trait]
impl SnapshotSource for UsageService {
    #[instrument(skip(self))]
    async fn snapshot(&self, kind: ProviderKind) -> UsageSnapshot {
        let attempt = async {
            self.try_fetch(kind).await.unwrap_or_else(|e| {
                debug!(provider = %kind, error = %e, "usage fetch failed");
                UsageSnapshot::failed(e.to_string())
            })
        };
        settle_within(attempt, self.timeout, || {
            debug!(provider = %kind, "usage fetch abandoned after timeout");
            UsageSnapshot::failed(FetchError::Timeout.to_string())
        })
        .await
    }
}
