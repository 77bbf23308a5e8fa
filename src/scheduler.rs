use crate::format::{render_percent, render_quota};
use crate::host::StatusHost;
use crate::models::{ProviderKind, StatusSlot, UsageSnapshot};
use crate::service::SnapshotSource;
use std::cell::Cell;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Host lifecycle events that may refresh the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SessionStart,
    ModelChanged,
    TurnEnd,
}

impl Trigger {
    /// Forced triggers skip the refresh interval, never the in-flight guard.
    pub fn is_forced(self) -> bool {
        matches!(self, Trigger::SessionStart | Trigger::ModelChanged)
    }
}

#[derive(Debug, Default)]
pub struct ProviderState {
    last_refresh: Cell<Option<Instant>>,
    in_flight: Cell<bool>,
}

impl ProviderState {
    pub fn is_fetching(&self) -> bool {
        self.in_flight.get()
    }

    fn due(&self, interval: Duration) -> bool {
        self.last_refresh
            .get()
            .map_or(true, |at| at.elapsed() >= interval)
    }
}

/// Clears the in-flight flag and records the refresh time, even if the fetch
/// future is dropped part way.
struct FetchGuard<'a>(&'a ProviderState);

impl<'a> FetchGuard<'a> {
    fn begin(state: &'a ProviderState) -> Self {
        state.in_flight.set(true);
        Self(state)
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.set(false);
        self.0.last_refresh.set(Some(Instant::now()));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub bar_width: usize,
}

pub struct Scheduler<S> {
    source: S,
    interval: Duration,
    render: RenderOptions,
    copilot: ProviderState,
    codex: ProviderState,
    shown: Cell<Option<ProviderKind>>,
}

impl<S: SnapshotSource> Scheduler<S> {
    pub fn new(source: S, interval: Duration, render: RenderOptions) -> Self {
        Self {
            source,
            interval,
            render,
            copilot: ProviderState::default(),
            codex: ProviderState::default(),
            shown: Cell::new(None),
        }
    }

    pub fn state(&self, kind: ProviderKind) -> &ProviderState {
        match kind {
            ProviderKind::Copilot => &self.copilot,
            ProviderKind::Codex => &self.codex,
        }
    }

    fn active_kind<H: StatusHost>(host: &H) -> Option<ProviderKind> {
        host.active_model()
            .and_then(|m| ProviderKind::from_provider_id(&m.provider))
    }

    fn clear_slots<H: StatusHost>(&self, host: &H) {
        host.set_status(StatusSlot::Primary, None);
        host.set_status(StatusSlot::Secondary, None);
        self.shown.set(None);
    }

    pub async fn handle<H: StatusHost>(&self, trigger: Trigger, host: &H) {
        if !host.has_ui() {
            return;
        }

        let Some(kind) = Self::active_kind(host) else {
            trace!(?trigger, "active provider has no usage tracking");
            self.clear_slots(host);
            return;
        };

        if self.shown.get().is_some_and(|shown| shown != kind) {
            self.clear_slots(host);
        }

        let state = self.state(kind);
        if state.is_fetching() {
            trace!(provider = %kind, ?trigger, "fetch already in flight");
            return;
        }
        if !trigger.is_forced() && !state.due(self.interval) {
            trace!(provider = %kind, "refresh interval not elapsed");
            return;
        }

        let snapshot = {
            let _guard = FetchGuard::begin(state);
            debug!(provider = %kind, ?trigger, "refreshing usage");
            self.source.snapshot(kind).await
        };

        // The user may have switched providers while the request was out.
        if Self::active_kind(host) != Some(kind) {
            debug!(provider = %kind, "discarding usage for inactive provider");
            return;
        }
        self.publish(kind, &snapshot, host);
    }

    fn publish<H: StatusHost>(&self, kind: ProviderKind, snapshot: &UsageSnapshot, host: &H) {
        let Some(primary) = snapshot.primary() else {
            if let Some(err) = &snapshot.error {
                debug!(provider = %kind, error = %err, "no usage to show");
            }
            self.clear_slots(host);
            return;
        };

        let theme = host.theme();
        let width = self.render.bar_width;
        let (first, second) = match kind {
            ProviderKind::Copilot => (
                render_quota(theme, primary, Some(kind.as_label()), width),
                snapshot
                    .secondary()
                    .map(|w| render_quota(theme, w, None, width)),
            ),
            ProviderKind::Codex => (
                render_percent(theme, primary, Some(kind.as_label()), width),
                snapshot
                    .secondary()
                    .map(|w| render_percent(theme, w, None, width)),
            ),
        };

        host.set_status(StatusSlot::Primary, Some(first));
        host.set_status(StatusSlot::Secondary, second);
        self.shown.set(Some(kind));
    }
}
