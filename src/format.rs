//! Usage bars and their color thresholds.

use crate::models::{clamp_percent, UsageWindow};

pub const FILLED_GLYPH: char = '█';
pub const EMPTY_GLYPH: char = '░';

pub const WARNING_PERCENT: f64 = 60.0;
pub const ERROR_PERCENT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    Accent,
    Muted,
    Dim,
    Neutral,
    Warning,
    Error,
}

/// Color lookup supplied by the host. Only affects presentation.
pub trait Theme {
    fn paint(&self, color: ThemeColor, text: &str) -> String;
}

/// Leaves text uncolored.
pub struct PlainTheme;

impl Theme for PlainTheme {
    fn paint(&self, _color: ThemeColor, text: &str) -> String {
        text.to_string()
    }
}

pub fn usage_color(used_percent: f64) -> ThemeColor {
    let used = clamp_percent(used_percent);
    if used >= ERROR_PERCENT {
        ThemeColor::Error
    } else if used >= WARNING_PERCENT {
        ThemeColor::Warning
    } else {
        ThemeColor::Neutral
    }
}

/// Number of filled and empty cells for a bar of `width` cells.
pub fn bar_cells(used_percent: f64, width: usize) -> (usize, usize) {
    let used = clamp_percent(used_percent);
    let filled = ((used / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    (filled, width - filled)
}

fn render_bar(theme: &dyn Theme, used_percent: f64, width: usize) -> String {
    let (filled, empty) = bar_cells(used_percent, width);
    let color = usage_color(shown_percent(used_percent));
    let filled: String = std::iter::repeat(FILLED_GLYPH).take(filled).collect();
    let empty: String = std::iter::repeat(EMPTY_GLYPH).take(empty).collect();
    format!(
        "{}{}",
        theme.paint(color, &filled),
        theme.paint(ThemeColor::Dim, &empty)
    )
}

/// The whole percent that is printed; colors key off this value too.
fn shown_percent(used_percent: f64) -> f64 {
    clamp_percent(used_percent).round()
}

fn percent_text(theme: &dyn Theme, used_percent: f64) -> String {
    let used = shown_percent(used_percent);
    theme.paint(usage_color(used), &format!("{used:.0}% used"))
}

/// The text shared by both renderers: optional title, label, bar, percent.
fn head(
    theme: &dyn Theme,
    window: &UsageWindow,
    title: Option<&str>,
    width: usize,
) -> Vec<String> {
    let mut parts = Vec::with_capacity(6);
    if let Some(title) = title {
        parts.push(theme.paint(ThemeColor::Accent, &format!("{title} |")));
    }
    parts.push(theme.paint(ThemeColor::Muted, &window.label));
    parts.push(render_bar(theme, window.used_percent, width));
    parts.push(percent_text(theme, window.used_percent));
    parts
}

fn push_reset(theme: &dyn Theme, window: &UsageWindow, parts: &mut Vec<String>) {
    if let Some(reset) = &window.reset_description {
        parts.push(theme.paint(ThemeColor::Dim, reset));
    }
}

/// Renders a quota-style window, adding `(remaining/entitlement)` when both
/// counts are known.
pub fn render_quota(
    theme: &dyn Theme,
    window: &UsageWindow,
    title: Option<&str>,
    width: usize,
) -> String {
    let mut parts = head(theme, window, title, width);
    if let (Some(remaining), Some(entitlement)) = (window.remaining, window.entitlement) {
        let counts = format!("({remaining}/{entitlement})");
        parts.push(theme.paint(ThemeColor::Muted, &counts));
    }
    push_reset(theme, window, &mut parts);
    parts.join(" ")
}

/// Renders a percent-only window. A `title` adds a `Title |` prefix so
/// several windows read as one line group.
pub fn render_percent(
    theme: &dyn Theme,
    window: &UsageWindow,
    title: Option<&str>,
    width: usize,
) -> String {
    let mut parts = head(theme, window, title, width);
    push_reset(theme, window, &mut parts);
    parts.join(" ")
}
