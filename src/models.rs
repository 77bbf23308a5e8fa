use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Copilot,
    Codex,
}

/// Host provider identifiers that carry usage tracking.
const PROVIDER_TABLE: [(&str, ProviderKind); 2] = [
    ("github-copilot", ProviderKind::Copilot),
    ("openai-codex", ProviderKind::Codex),
];

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Copilot, ProviderKind::Codex];

    /// Maps a host provider id to a tracked kind. Unknown ids are untracked.
    pub fn from_provider_id(id: &str) -> Option<Self> {
        let id = id.trim();
        PROVIDER_TABLE
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(id))
            .map(|(_, kind)| *kind)
    }

    /// The host provider id, also used as the credential file and keyring key.
    pub fn provider_id(self) -> &'static str {
        match self {
            ProviderKind::Copilot => "github-copilot",
            ProviderKind::Codex => "openai-codex",
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            ProviderKind::Copilot => "Copilot",
            ProviderKind::Codex => "Codex",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub label: String,
    pub used_percent: f64,
    pub reset_description: Option<String>,
    pub resets_at: Option<DateTime<Utc>>,
    pub remaining: Option<i64>,
    pub entitlement: Option<i64>,
}

impl UsageWindow {
    pub fn new(label: impl Into<String>, used_percent: f64) -> Self {
        Self {
            label: label.into(),
            used_percent: clamp_percent(used_percent),
            reset_description: None,
            resets_at: None,
            remaining: None,
            entitlement: None,
        }
    }

    /// Sets the reset instant and its description relative to `now`.
    pub fn resetting_at(mut self, resets_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        self.reset_description = Some(crate::reset::describe_reset(resets_at, now));
        self.resets_at = Some(resets_at);
        self
    }

    pub fn with_quota(mut self, remaining: i64, entitlement: i64) -> Self {
        self.remaining = Some(remaining);
        self.entitlement = Some(entitlement);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub windows: Vec<UsageWindow>,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn from_windows(windows: Vec<UsageWindow>) -> Self {
        Self {
            windows,
            error: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            windows: vec![],
            error: Some(error.into()),
            fetched_at: Utc::now(),
        }
    }

    pub fn primary(&self) -> Option<&UsageWindow> {
        self.windows.first()
    }

    pub fn secondary(&self) -> Option<&UsageWindow> {
        self.windows.get(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSlot {
    Primary,
    Secondary,
}

impl StatusSlot {
    pub fn as_label(self) -> &'static str {
        match self {
            StatusSlot::Primary => "primary",
            StatusSlot::Secondary => "secondary",
        }
    }
}

/// The model currently selected in the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub id: String,
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
