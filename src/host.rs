use crate::format::{Theme, ThemeColor};
use crate::models::{ModelRef, StatusSlot};
use crossterm::style::Stylize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

/// The UI the status slots live in.
pub trait StatusHost {
    fn has_ui(&self) -> bool;

    fn active_model(&self) -> Option<ModelRef>;

    fn theme(&self) -> &dyn Theme;

    /// Writes `text` into `slot`, or clears it when `None`.
    fn set_status(&self, slot: StatusSlot, text: Option<String>);
}

/// Colors spans with ANSI escapes.
pub struct AnsiTheme;

impl Theme for AnsiTheme {
    fn paint(&self, color: ThemeColor, text: &str) -> String {
        let styled = match color {
            ThemeColor::Accent => text.cyan(),
            ThemeColor::Muted => text.grey(),
            ThemeColor::Dim => text.dark_grey(),
            ThemeColor::Neutral => text.green(),
            ThemeColor::Warning => text.yellow(),
            ThemeColor::Error => text.red(),
        };
        styled.to_string()
    }
}

/// Prints slot changes to stdout, one line per change.
pub struct TerminalHost<W: Write> {
    model: RefCell<Option<ModelRef>>,
    theme: Box<dyn Theme>,
    out: RefCell<W>,
    shown: RefCell<HashMap<StatusSlot, String>>,
}

impl<W: Write> TerminalHost<W> {
    pub fn new(model: Option<ModelRef>, theme: Box<dyn Theme>, out: W) -> Self {
        Self {
            model: RefCell::new(model),
            theme,
            out: RefCell::new(out),
            shown: RefCell::new(HashMap::new()),
        }
    }

    pub fn switch_model(&self, model: ModelRef) {
        *self.model.borrow_mut() = Some(model);
    }
}

impl<W: Write> StatusHost for TerminalHost<W> {
    fn has_ui(&self) -> bool {
        true
    }

    fn active_model(&self) -> Option<ModelRef> {
        self.model.borrow().clone()
    }

    fn theme(&self) -> &dyn Theme {
        self.theme.as_ref()
    }

    fn set_status(&self, slot: StatusSlot, text: Option<String>) {
        let mut shown = self.shown.borrow_mut();
        let line = match text {
            Some(text) => {
                if shown.get(&slot) == Some(&text) {
                    return;
                }
                shown.insert(slot, text.clone());
                text
            }
            None => {
                if shown.remove(&slot).is_none() {
                    return;
                }
                String::new()
            }
        };
        let mut out = self.out.borrow_mut();
        if writeln!(out, "[{}] {line}", slot.as_label())
            .and_then(|()| out.flush())
            .is_err()
        {
            tracing::warn!(slot = slot.as_label(), "failed to write status line");
        }
    }
}
