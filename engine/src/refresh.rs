//! Background model catalog refresh.

use std::sync::Arc;

use refine_providers::GenerativeService;

use crate::App;
use crate::catalog::ModelCatalog;
use crate::state::{Completion, RefreshState};
use crate::ui::{InputMode, ModelSelector, SELECTOR_FETCHING, SELECTOR_KEY_MISSING, StatusKind};

impl<S: GenerativeService> App<S> {
    /// Fetch the model listing with the current credential.
    ///
    /// Supersedes any refresh still in flight. Returns false without a credential.
    pub fn refresh_models(&mut self) -> bool {
        let Some(key) = self.credential.clone() else {
            self.selector = ModelSelector::placeholder(SELECTOR_KEY_MISSING);
            return false;
        };

        self.refresh_generation = self.refresh_generation.wrapping_add(1);
        let generation = self.refresh_generation;
        self.refresh = RefreshState::Fetching { generation };
        self.selector = ModelSelector::placeholder(SELECTOR_FETCHING);

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let completion = match service.list_models(&key).await {
                Ok(models) => Completion::Catalog {
                    generation,
                    catalog: ModelCatalog::from_listing(models),
                    error: None,
                },
                Err(e) => {
                    let message = e.to_string();
                    Completion::Catalog {
                        generation,
                        catalog: ModelCatalog::sentinel(&message),
                        error: Some(message),
                    }
                }
            };
            let _ = tx.send(completion);
        });
        true
    }

    pub(crate) fn finish_refresh(
        &mut self,
        generation: u64,
        catalog: ModelCatalog,
        error: Option<String>,
    ) {
        if self.refresh != (RefreshState::Fetching { generation }) {
            tracing::debug!(generation, "Discarding superseded model listing");
            return;
        }

        self.refresh = RefreshState::Idle;
        if let Some(error) = error {
            tracing::warn!("Model listing failed: {error}");
            self.set_status("Model list unavailable", StatusKind::Warning);
        } else if catalog.is_sentinel() {
            tracing::warn!("Model listing returned no usable models");
        } else {
            tracing::info!(count = catalog.len(), "Model catalog refreshed");
        }

        self.selector.replace(&catalog);
        self.catalog = catalog;
        if self.mode == InputMode::ModelSelect {
            self.mode = InputMode::Normal;
        }
    }
}
