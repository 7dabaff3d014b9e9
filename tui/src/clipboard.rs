//! System clipboard access.

/// Copy `text` to the system clipboard. Returns false when no clipboard is available.
pub fn copy_text(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Clipboard copy failed: {e}");
            false
        }
    }
}
