//! Presentation state the renderer reads.

use crate::catalog::ModelCatalog;

pub const TRIGGER_LABEL: &str = "OPTIMIZE WITH GEMINI";
pub const TRIGGER_BUSY_LABEL: &str = "GEMINI IS THINKING...";

pub const STATUS_STANDBY: &str = "System Standby";
pub const STATUS_FAILED: &str = "Optimization Failed";

pub const SELECTOR_FETCHING: &str = "Fetching Gemini models...";
pub const SELECTOR_KEY_MISSING: &str = "Key Missing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    Optimizer,
    History,
}

impl ActiveView {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Optimizer => Self::History,
            Self::History => Self::Optimizer,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Optimizer => "Optimizer",
            Self::History => "History",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Info,
    Busy,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub kind: StatusKind,
}

impl StatusLine {
    pub fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new(STATUS_STANDBY, StatusKind::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerButton {
    pub enabled: bool,
    pub label: &'static str,
}

impl TriggerButton {
    pub fn set_busy(&mut self) {
        self.enabled = false;
        self.label = TRIGGER_BUSY_LABEL;
    }

    pub fn restore(&mut self) {
        self.enabled = true;
        self.label = TRIGGER_LABEL;
    }
}

impl Default for TriggerButton {
    fn default() -> Self {
        Self {
            enabled: true,
            label: TRIGGER_LABEL,
        }
    }
}

/// Model dropdown: option list, current selection, and a placeholder shown
/// when there is nothing to select.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelSelector {
    options: Vec<String>,
    selected: Option<usize>,
    placeholder: Option<&'static str>,
    enabled: bool,
}

impl ModelSelector {
    /// Disabled selector showing `placeholder`.
    #[must_use]
    pub fn placeholder(placeholder: &'static str) -> Self {
        Self {
            options: Vec::new(),
            selected: None,
            placeholder: Some(placeholder),
            enabled: false,
        }
    }

    /// Replace the options from a catalog and select its default entry.
    pub fn replace(&mut self, catalog: &ModelCatalog) {
        self.options = catalog.names().map(ToString::to_string).collect();
        self.selected = catalog
            .default_selection()
            .and_then(|name| self.options.iter().position(|option| option == name));
        self.placeholder = None;
        self.enabled = !self.options.is_empty();
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected
            .and_then(|index| self.options.get(index))
            .map(String::as_str)
    }

    /// Returns false when the index is out of range or the selector is disabled.
    pub fn select(&mut self, index: usize) -> bool {
        if !self.enabled || index >= self.options.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Text for the collapsed selector.
    #[must_use]
    pub fn label(&self) -> &str {
        self.placeholder
            .or_else(|| self.selected())
            .unwrap_or("(no model)")
    }
}
