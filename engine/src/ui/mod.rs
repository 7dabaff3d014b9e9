//! UI-facing state owned by the engine and read by the renderer.

mod input;
mod view;

pub use input::{DraftInput, InputMode};
pub use view::{
    ActiveView, ModelSelector, SELECTOR_FETCHING, SELECTOR_KEY_MISSING, STATUS_FAILED,
    STATUS_STANDBY, StatusKind, StatusLine, TRIGGER_BUSY_LABEL, TRIGGER_LABEL, TriggerButton,
};
