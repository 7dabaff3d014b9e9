//! Core engine for Refine: request orchestration and UI-state synchronization.
//!
//! This crate contains the [`App`] state machine without TUI dependencies.
//! Network calls run on spawned tokio tasks; each posts one [`Completion`] over
//! an unbounded channel that the frame loop drains through
//! [`App::process_completions`]. Only the frame loop mutates `App`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

mod catalog;
mod config;
mod history;
mod optimize;
mod refresh;
mod state;
mod store;
pub mod ui;

pub use catalog::ModelCatalog;
pub use config::{
    AppConfig, ConfigError, DATA_DIR_ENV, DataDir, DataDirSource, GoogleConfig, RefineConfig,
    StorageConfig, expand_env_vars,
};
pub use history::HistoryLog;
pub use refine_providers::{self, GeminiClient, GenerativeService, ServiceError};
pub use refine_types::{
    ApiKey, HISTORY_CAPACITY, HistoryEntry, ModelDescriptor, OptimizationRequest,
    OptimizationResult, SYSTEM_INSTRUCTION, Temperature, UiOptions, truncate_preview,
};
pub use state::{Completion, OperationState, RefreshState, TriggerOutcome};
pub use store::{CREDENTIAL_FILE_NAME, HISTORY_FILE_NAME, Store};

use ui::{
    ActiveView, DraftInput, InputMode, ModelSelector, SELECTOR_KEY_MISSING, StatusKind,
    StatusLine, TriggerButton,
};

/// Environment variable consulted when no credential is stored.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const COPY_ACK_DURATION: Duration = Duration::from_millis(1500);

/// Startup values not owned by the store.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub temperature: Temperature,
    pub ui: UiOptions,
    /// Used only when the store holds no credential.
    pub fallback_key: Option<ApiKey>,
}

pub struct App<S: GenerativeService = GeminiClient> {
    service: Arc<S>,
    store: Store,
    data_dir: Option<DataDir>,
    credential: Option<ApiKey>,
    catalog: ModelCatalog,
    selector: ModelSelector,
    history: HistoryLog,
    state: OperationState,
    refresh: RefreshState,
    refresh_generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    input: DraftInput,
    output: String,
    temperature: Temperature,
    status: StatusLine,
    trigger: TriggerButton,
    mode: InputMode,
    view: ActiveView,
    history_cursor: usize,
    model_cursor: usize,
    key_draft: DraftInput,
    options: UiOptions,
    copied_until: Option<Instant>,
    tick: usize,
    should_quit: bool,
}

impl App<GeminiClient> {
    /// Build from `~/.refine/config.toml`, the environment and the data directory.
    pub fn new() -> anyhow::Result<Self> {
        let config = match RefineConfig::load() {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("{e}; using defaults");
                RefineConfig::default()
            }
        };

        let data_dir = config.data_dir();
        if matches!(data_dir.source, DataDirSource::Fallback) {
            tracing::warn!(
                "Home directory unavailable; storing data in {}",
                data_dir.path.display()
            );
        }

        let service = match config.api_base() {
            Some(base) => GeminiClient::with_base_url(base)?,
            None => GeminiClient::new()?,
        };

        let fallback_key = std::env::var(API_KEY_ENV)
            .ok()
            .and_then(|raw| ApiKey::new(raw).ok());

        let settings = AppSettings {
            temperature: config.temperature(),
            ui: config.ui_options(),
            fallback_key,
        };
        let mut app = Self::with_service(service, Store::new(&data_dir), settings);
        app.data_dir = Some(data_dir);
        Ok(app)
    }
}

impl<S: GenerativeService> App<S> {
    pub fn with_service(service: S, store: Store, settings: AppSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let history = HistoryLog::load(&store);
        let credential = store.load_credential().or(settings.fallback_key);

        Self {
            service: Arc::new(service),
            store,
            data_dir: None,
            credential,
            catalog: ModelCatalog::default(),
            selector: ModelSelector::placeholder(SELECTOR_KEY_MISSING),
            history,
            state: OperationState::Idle,
            refresh: RefreshState::Idle,
            refresh_generation: 0,
            completions_tx,
            completions_rx,
            input: DraftInput::default(),
            output: String::new(),
            temperature: settings.temperature,
            status: StatusLine::default(),
            trigger: TriggerButton::default(),
            mode: InputMode::Normal,
            view: ActiveView::Optimizer,
            history_cursor: 0,
            model_cursor: 0,
            key_draft: DraftInput::default(),
            options: settings.ui,
            copied_until: None,
            tick: 0,
            should_quit: false,
        }
    }

    /// Kick off the first catalog refresh, or ask for a key if there is none.
    ///
    /// Must run inside a tokio runtime.
    pub fn startup(&mut self) {
        if self.credential.is_some() {
            self.refresh_models();
        } else {
            self.selector = ModelSelector::placeholder(SELECTOR_KEY_MISSING);
            self.open_key_prompt();
        }
    }

    /// Persist anything a failed write left behind.
    pub fn shutdown(&mut self) {
        if self.history.is_dirty() && !self.history.flush(&self.store) {
            tracing::warn!("History could not be saved before exit");
        }
    }

    // ------------------------------------------------------------------
    // Completion handoff
    // ------------------------------------------------------------------

    /// Apply every completion posted since the last frame.
    pub fn process_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion);
        }
    }

    /// Wait for and apply the next completion. Returns false when nothing is outstanding.
    pub async fn wait_for_completion(&mut self) -> bool {
        if self.state.is_idle() && self.refresh == RefreshState::Idle {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Optimization(result) => self.finish_optimization(result),
            Completion::Catalog {
                generation,
                catalog,
                error,
            } => self.finish_refresh(generation, catalog, error),
        }
    }

    // ------------------------------------------------------------------
    // Credential
    // ------------------------------------------------------------------

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Replace the session credential and refresh the catalog against it.
    pub fn set_credential(&mut self, key: ApiKey) {
        if let Err(e) = self.store.save_credential(&key) {
            tracing::warn!("Failed to save API key: {e}");
            self.set_status(
                "API key could not be saved; using it for this session",
                StatusKind::Warning,
            );
        }
        self.credential = Some(key);
        self.refresh_models();
    }

    pub fn open_key_prompt(&mut self) {
        self.key_draft.clear();
        self.mode = InputMode::KeyPrompt;
    }

    pub fn cancel_key_prompt(&mut self) {
        self.key_draft.clear();
        self.mode = InputMode::Normal;
    }

    /// Save the typed key. Stays in the prompt when the draft is blank.
    pub fn submit_key_prompt(&mut self) -> bool {
        match ApiKey::new(self.key_draft.take_text()) {
            Ok(key) => {
                self.mode = InputMode::Normal;
                self.set_credential(key);
                true
            }
            Err(e) => {
                self.set_status(e.to_string(), StatusKind::Warning);
                false
            }
        }
    }

    #[must_use]
    pub fn key_draft(&self) -> &DraftInput {
        &self.key_draft
    }

    pub fn key_draft_mut(&mut self) -> &mut DraftInput {
        &mut self.key_draft
    }

    // ------------------------------------------------------------------
    // Surface accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn input(&self) -> &DraftInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut DraftInput {
        &mut self.input
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    #[must_use]
    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn set_status(&mut self, text: impl Into<String>, kind: StatusKind) {
        self.status = StatusLine::new(text, kind);
    }

    #[must_use]
    pub fn trigger(&self) -> &TriggerButton {
        &self.trigger
    }

    #[must_use]
    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn operation(&self) -> &OperationState {
        &self.state
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.state.is_idle()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self.refresh, RefreshState::Fetching { .. })
    }

    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    #[must_use]
    pub fn ui_options(&self) -> UiOptions {
        self.options
    }

    #[must_use]
    pub fn data_dir(&self) -> Option<&DataDir> {
        self.data_dir.as_ref()
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.mode
    }

    #[must_use]
    pub fn view(&self) -> ActiveView {
        self.view
    }

    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.tick
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }

    /// Advance the animation tick and expire transient acknowledgements.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        if self
            .copied_until
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.copied_until = None;
        }
    }

    // ------------------------------------------------------------------
    // Modes and views
    // ------------------------------------------------------------------

    pub fn enter_insert_mode(&mut self) {
        self.view = ActiveView::Optimizer;
        self.mode = InputMode::Insert;
    }

    pub fn enter_normal_mode(&mut self) {
        self.mode = InputMode::Normal;
    }

    pub fn toggle_view(&mut self) {
        self.view = self.view.toggled();
    }

    pub fn set_view(&mut self, view: ActiveView) {
        self.view = view;
    }

    /// Insert pasted text into whichever buffer has focus.
    pub fn paste(&mut self, text: &str) {
        match self.mode {
            InputMode::KeyPrompt => {
                let single_line: String = text.chars().filter(|c| !c.is_control()).collect();
                self.key_draft.enter_text(single_line.trim());
            }
            InputMode::Insert => self.input.enter_text(text),
            InputMode::Normal if self.view == ActiveView::Optimizer => {
                self.mode = InputMode::Insert;
                self.input.enter_text(text);
            }
            InputMode::Normal | InputMode::ModelSelect => {}
        }
    }

    // ------------------------------------------------------------------
    // Temperature
    // ------------------------------------------------------------------

    #[must_use]
    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn increase_temperature(&mut self) {
        self.temperature = self.temperature.step_up();
    }

    pub fn decrease_temperature(&mut self) {
        self.temperature = self.temperature.step_down();
    }

    // ------------------------------------------------------------------
    // Model selection
    // ------------------------------------------------------------------

    pub fn enter_model_select_mode(&mut self) {
        if !self.selector.is_enabled() {
            return;
        }
        self.model_cursor = self.selector.selected_index().unwrap_or(0);
        self.mode = InputMode::ModelSelect;
    }

    #[must_use]
    pub fn model_select_index(&self) -> Option<usize> {
        (self.mode == InputMode::ModelSelect).then_some(self.model_cursor)
    }

    pub fn model_select_move_up(&mut self) {
        self.model_cursor = self.model_cursor.saturating_sub(1);
    }

    pub fn model_select_move_down(&mut self) {
        let last = self.selector.options().len().saturating_sub(1);
        self.model_cursor = (self.model_cursor + 1).min(last);
    }

    pub fn model_select_set_index(&mut self, index: usize) {
        if index < self.selector.options().len() {
            self.model_cursor = index;
        }
    }

    pub fn model_select_confirm(&mut self) {
        self.selector.select(self.model_cursor);
        self.mode = InputMode::Normal;
    }

    /// Select a display name directly. Returns false if it is not offered.
    pub fn select_model(&mut self, display_name: &str) -> bool {
        self.selector
            .options()
            .iter()
            .position(|option| option == display_name)
            .is_some_and(|index| self.selector.select(index))
    }

    // ------------------------------------------------------------------
    // History view
    // ------------------------------------------------------------------

    #[must_use]
    pub fn history_cursor(&self) -> usize {
        self.history_cursor
    }

    pub fn history_move_up(&mut self) {
        self.history_cursor = self.history_cursor.saturating_sub(1);
    }

    pub fn history_move_down(&mut self) {
        let last = self.history.len().saturating_sub(1);
        self.history_cursor = (self.history_cursor + 1).min(last);
    }

    /// Load an entry into the input and output boxes and show the optimizer.
    pub fn restore_history(&mut self, index: usize) -> bool {
        let Some(entry) = self.history.get(index) else {
            return false;
        };
        let prompt = entry.prompt.clone();
        let result = entry.result.clone();

        self.input.set_text(prompt);
        self.output = result;
        self.history_cursor = index;
        self.view = ActiveView::Optimizer;
        self.mode = InputMode::Normal;
        true
    }

    pub fn restore_selected_history(&mut self) -> bool {
        self.restore_history(self.history_cursor)
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    /// Output text to copy, if any.
    #[must_use]
    pub fn output_for_copy(&self) -> Option<&str> {
        let text = self.output.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn report_copy(&mut self, copied: bool) {
        if copied {
            self.copied_until = Some(Instant::now() + COPY_ACK_DURATION);
        } else {
            self.set_status("Clipboard unavailable", StatusKind::Warning);
        }
    }

    #[must_use]
    pub fn copy_acknowledged(&self) -> bool {
        self.copied_until.is_some()
    }
}

#[cfg(test)]
mod tests;
