//! Model catalog shown in the selector.

use refine_types::{GENERATE_CONTENT_METHOD, ModelDescriptor, RemoteModel, take_chars};

const MODEL_NAMESPACE: &str = "models/";
const PREFERRED_MODEL_HINT: &str = "flash";
const SENTINEL_MESSAGE_CHARS: usize = 20;

/// Ordered display-name to API-id mapping, replaced wholesale on every refresh.
///
/// Display names are unique. An entry with an empty API id is a sentinel that
/// stands in for a failed refresh and is never dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    entries: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build from a remote listing: keep `generateContent` models, newest identifier first.
    ///
    /// An empty result becomes the sentinel.
    #[must_use]
    pub fn from_listing(models: Vec<RemoteModel>) -> Self {
        let mut ids: Vec<String> = models
            .into_iter()
            .filter(|model| model.supports(GENERATE_CONTENT_METHOD))
            .map(|model| model.name)
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut entries: Vec<ModelDescriptor> = Vec::with_capacity(ids.len());
        for id in ids {
            let display = id.strip_prefix(MODEL_NAMESPACE).unwrap_or(&id).to_string();
            if entries.iter().any(|entry| entry.display_name == display) {
                continue;
            }
            entries.push(ModelDescriptor::new(display, id));
        }

        if entries.is_empty() {
            return Self::sentinel("No models found");
        }
        Self { entries }
    }

    /// Single invalid entry labelled with the start of `message`.
    #[must_use]
    pub fn sentinel(message: &str) -> Self {
        let label = format!("Error: {}", take_chars(message, SENTINEL_MESSAGE_CHARS));
        Self {
            entries: vec![ModelDescriptor::new(label, String::new())],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[ModelDescriptor] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.display_name.as_str())
    }

    /// First display name containing "flash", else the first entry.
    #[must_use]
    pub fn default_selection(&self) -> Option<&str> {
        self.names()
            .find(|name| name.contains(PREFERRED_MODEL_HINT))
            .or_else(|| self.names().next())
    }

    /// API id for a display name. `None` for unknown names and sentinels.
    #[must_use]
    pub fn resolve(&self, display_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.display_name == display_name)
            .filter(|entry| entry.is_dispatchable())
            .map(|entry| entry.api_id.as_str())
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.entries.len() == 1 && !self.entries[0].is_dispatchable()
    }
}
