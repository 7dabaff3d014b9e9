//! Unit tests for the engine crate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use refine_providers::{GenerateRequest, Generation};
use refine_types::RemoteModel;
use tempfile::{TempDir, tempdir};

use super::*;
use crate::ui::{
    SELECTOR_FETCHING, STATUS_FAILED, STATUS_STANDBY, TRIGGER_BUSY_LABEL, TRIGGER_LABEL,
};

#[derive(Default)]
struct FakeService {
    listing: Vec<&'static str>,
    listing_error: Option<String>,
    /// Keys for which the listing is replaced with `alt_listing`.
    alt_key: Option<&'static str>,
    alt_listing: Vec<&'static str>,
    generation: Mutex<Option<Result<Generation, String>>>,
    list_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl FakeService {
    fn with_models(names: &[&'static str]) -> Self {
        Self {
            listing: names.to_vec(),
            generation: Mutex::new(Some(Ok(Generation {
                text: "Persona: tester".to_string(),
                total_tokens: Some(42),
            }))),
            ..Self::default()
        }
    }

    fn failing_listing(message: &str) -> Self {
        Self {
            listing_error: Some(message.to_string()),
            ..Self::with_models(&[])
        }
    }

    fn set_generation(&self, outcome: Result<Generation, String>) {
        *self.generation.lock().unwrap() = Some(outcome);
    }
}

fn remote(names: &[&'static str]) -> Vec<RemoteModel> {
    names
        .iter()
        .map(|name| RemoteModel {
            name: (*name).to_string(),
            supported_generation_methods: vec!["generateContent".to_string()],
        })
        .collect()
}

impl GenerativeService for FakeService {
    async fn list_models(&self, key: &ApiKey) -> Result<Vec<RemoteModel>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.alt_key == Some(key.as_str()) {
            return Ok(remote(&self.alt_listing));
        }
        match &self.listing_error {
            None => Ok(remote(&self.listing)),
            Some(message) => Err(ServiceError::Api {
                status: 400,
                message: message.clone(),
            }),
        }
    }

    async fn generate(
        &self,
        _key: &ApiKey,
        request: &GenerateRequest,
    ) -> Result<Generation, ServiceError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match self.generation.lock().unwrap().clone() {
            Some(Ok(generation)) => Ok(generation),
            Some(Err(message)) => Err(ServiceError::Api {
                status: 429,
                message,
            }),
            None => Err(ServiceError::Decode("no scripted generation".to_string())),
        }
    }
}

fn key(raw: &str) -> ApiKey {
    ApiKey::new(raw).unwrap()
}

fn test_app(service: FakeService, credential: Option<&str>) -> (App<FakeService>, TempDir) {
    let dir = tempdir().unwrap();
    let settings = AppSettings {
        fallback_key: credential.map(key),
        ..AppSettings::default()
    };
    let app = App::with_service(service, Store::in_dir(dir.path()), settings);
    (app, dir)
}

async fn drain(app: &mut App<FakeService>) {
    while app.wait_for_completion().await {}
}

const MODELS: [&str; 3] = [
    "models/gemini-2.0-pro",
    "models/gemini-2.0-flash",
    "models/gemini-1.5-flash",
];

#[tokio::test]
async fn startup_refresh_selects_first_flash_model() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));

    app.startup();
    assert!(app.is_refreshing());
    assert_eq!(app.selector().label(), SELECTOR_FETCHING);
    assert!(!app.selector().is_enabled());

    drain(&mut app).await;
    assert!(!app.is_refreshing());
    assert_eq!(app.selector().selected(), Some("gemini-2.0-flash"));
    assert_eq!(
        app.selector().options(),
        ["gemini-2.0-pro", "gemini-2.0-flash", "gemini-1.5-flash"]
    );
    assert_eq!(app.status().text, STATUS_STANDBY);
}

#[tokio::test]
async fn startup_without_credential_opens_key_prompt() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), None);

    app.startup();
    assert_eq!(app.input_mode(), InputMode::KeyPrompt);
    assert_eq!(app.selector().label(), ui::SELECTOR_KEY_MISSING);
    assert_eq!(app.service.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_optimization_updates_surface_and_history() {
    let (mut app, dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.input_mut().set_text("  write a haiku about rust  ");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::Dispatched);
    assert!(!app.trigger().enabled);
    assert_eq!(app.trigger().label, TRIGGER_BUSY_LABEL);
    assert_eq!(app.status().text, "Sending to gemini-2.0-flash...");
    assert_eq!(app.status().kind, StatusKind::Busy);

    assert!(app.wait_for_completion().await);
    assert!(app.trigger().enabled);
    assert_eq!(app.trigger().label, TRIGGER_LABEL);
    assert_eq!(app.output(), "Persona: tester");
    assert_eq!(app.status().text, "Success! Total Tokens: 42");
    assert_eq!(app.status().kind, StatusKind::Success);

    let request = app.service.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.model_id, "models/gemini-2.0-flash");
    assert_eq!(request.user_text, "write a haiku about rust");
    assert_eq!(request.system_instruction, SYSTEM_INSTRUCTION);
    assert_eq!(request.temperature, Temperature::DEFAULT);

    let entry = &app.history().entries()[0];
    assert_eq!(entry.prompt, "write a haiku about rust");
    assert_eq!(entry.result, "Persona: tester");
    assert_eq!(entry.model, "models/gemini-2.0-flash");
    assert_eq!(entry.tokens, Some(42));

    let on_disk = Store::in_dir(dir.path()).load_history();
    assert_eq!(on_disk, app.history().entries());
}

#[tokio::test]
async fn second_trigger_while_in_flight_is_rejected() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.input_mut().set_text("first");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::Dispatched);
    app.input_mut().set_text("second");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::Busy);

    drain(&mut app).await;
    assert_eq!(app.service.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.history().len(), 1);
    assert_eq!(app.history().entries()[0].prompt, "first");
}

#[tokio::test]
async fn failed_generation_shows_error_without_history() {
    let service = FakeService::with_models(&MODELS);
    service.set_generation(Err("quota exceeded".to_string()));
    let (mut app, dir) = test_app(service, Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.input_mut().set_text("anything");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::Dispatched);
    drain(&mut app).await;

    assert!(app.output().contains("quota exceeded"));
    assert!(app.output().starts_with("Gemini Error: "));
    assert_eq!(app.status().text, STATUS_FAILED);
    assert_eq!(app.status().kind, StatusKind::Error);
    assert!(app.trigger().enabled);
    assert!(app.history().is_empty());
    assert!(Store::in_dir(dir.path()).load_history().is_empty());
}

#[tokio::test]
async fn failed_listing_yields_sentinel_that_never_dispatches() {
    let (mut app, _dir) = test_app(
        FakeService::failing_listing("API key not valid. Please pass a valid API key."),
        Some("AIza-bad"),
    );
    app.startup();
    drain(&mut app).await;

    assert_eq!(app.catalog().len(), 1);
    assert!(app.catalog().is_sentinel());
    assert_eq!(app.catalog().entries()[0].api_id, "");
    let label = app.selector().selected().unwrap().to_string();
    assert!(label.starts_with("Error: "));
    assert_eq!(app.status().kind, StatusKind::Warning);

    app.input_mut().set_text("hello");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::NoModel);
    assert!(app.trigger().enabled);
    assert_eq!(app.service.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trigger_without_credential_opens_prompt() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), None);
    app.input_mut().set_text("hello");

    assert_eq!(
        app.trigger_optimization(),
        TriggerOutcome::CredentialMissing
    );
    assert_eq!(app.input_mode(), InputMode::KeyPrompt);
    assert!(app.trigger().enabled);
    assert_eq!(app.status().text, STATUS_STANDBY);
    assert_eq!(app.service.generate_calls.load(Ordering::SeqCst), 0);

    app.cancel_key_prompt();
    assert_eq!(app.status().text, STATUS_STANDBY);
    assert_eq!(app.status().kind, StatusKind::Info);
}

#[tokio::test]
async fn blank_input_is_not_dispatched() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.input_mut().set_text(" \n\t ");
    assert_eq!(app.trigger_optimization(), TriggerOutcome::EmptyInput);
    assert!(app.operation().is_idle());
}

#[tokio::test]
async fn submitting_key_saves_it_and_refreshes() {
    let (mut app, dir) = test_app(FakeService::with_models(&MODELS), None);
    app.startup();

    app.paste("  AIza-pasted\n");
    assert_eq!(app.key_draft().text(), "AIza-pasted");
    assert!(app.submit_key_prompt());
    assert_eq!(app.input_mode(), InputMode::Normal);
    assert!(app.has_credential());
    drain(&mut app).await;

    assert_eq!(app.selector().selected(), Some("gemini-2.0-flash"));
    let stored = Store::in_dir(dir.path()).load_credential().unwrap();
    assert_eq!(stored.as_str(), "AIza-pasted");
}

#[tokio::test]
async fn blank_key_keeps_prompt_open() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), None);
    app.startup();

    assert!(!app.submit_key_prompt());
    assert_eq!(app.input_mode(), InputMode::KeyPrompt);
    assert!(!app.has_credential());
}

#[tokio::test]
async fn superseded_refresh_is_discarded() {
    let service = FakeService {
        alt_key: Some("AIza-new"),
        alt_listing: vec!["models/gemini-exp-pro"],
        ..FakeService::with_models(&MODELS)
    };
    let (mut app, _dir) = test_app(service, Some("AIza-old"));

    app.startup();
    app.set_credential(key("AIza-new"));
    drain(&mut app).await;
    app.process_completions();

    assert_eq!(app.service.list_calls.load(Ordering::SeqCst), 2);
    let names: Vec<&str> = app.catalog().names().collect();
    assert_eq!(names, ["gemini-exp-pro"]);
    assert_eq!(app.selector().selected(), Some("gemini-exp-pro"));
}

#[tokio::test]
async fn restore_round_trips_prompt_and_result() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.history
        .record(&app.store, "P".into(), "R".into(), "m".into(), Some(7));
    app.set_view(ActiveView::History);

    assert!(app.restore_history(0));
    assert_eq!(app.input().text(), "P");
    assert_eq!(app.output(), "R");
    assert_eq!(app.view(), ActiveView::Optimizer);
    assert!(!app.restore_history(5));
}

#[tokio::test]
async fn history_is_capped_across_many_optimizations() {
    let (mut app, dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    for n in 0..HISTORY_CAPACITY + 3 {
        app.input_mut().set_text(format!("prompt {n}"));
        assert_eq!(app.trigger_optimization(), TriggerOutcome::Dispatched);
        drain(&mut app).await;
    }

    assert_eq!(app.history().len(), HISTORY_CAPACITY);
    assert_eq!(app.history().entries()[0].prompt, "prompt 52");
    let on_disk = Store::in_dir(dir.path()).load_history();
    assert_eq!(on_disk.len(), HISTORY_CAPACITY);
    assert_eq!(on_disk, app.history().entries());
}

#[tokio::test]
async fn temperature_is_snapshotted_at_trigger_time() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.decrease_temperature();
    app.decrease_temperature();
    app.input_mut().set_text("x");
    app.trigger_optimization();
    app.increase_temperature();
    drain(&mut app).await;

    let request = app.service.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.temperature.to_string(), "0.60");
    assert_eq!(app.temperature().to_string(), "0.65");
}

#[tokio::test]
async fn model_select_changes_dispatched_model() {
    let (mut app, _dir) = test_app(FakeService::with_models(&MODELS), Some("AIza-test"));
    app.startup();
    drain(&mut app).await;

    app.enter_model_select_mode();
    assert_eq!(app.model_select_index(), Some(1));
    app.model_select_move_up();
    app.model_select_confirm();
    assert_eq!(app.selector().selected(), Some("gemini-2.0-pro"));

    app.input_mut().set_text("x");
    app.trigger_optimization();
    drain(&mut app).await;
    let request = app.service.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.model_id, "models/gemini-2.0-pro");
}

#[tokio::test]
async fn stored_credential_wins_over_fallback() {
    let dir = tempdir().unwrap();
    let store = Store::in_dir(dir.path());
    store.save_credential(&key("AIza-stored")).unwrap();
    let settings = AppSettings {
        fallback_key: Some(key("AIza-env")),
        ..AppSettings::default()
    };

    let mut app = App::with_service(FakeService::with_models(&MODELS), store, settings);
    app.startup();
    drain(&mut app).await;
    assert_eq!(
        app.credential.as_ref().map(ApiKey::as_str),
        Some("AIza-stored")
    );
}

#[test]
fn copy_outcomes_are_reported() {
    let (mut app, _dir) = test_app(FakeService::default(), None);
    assert_eq!(app.output_for_copy(), None);

    app.output = " \n ".to_string();
    assert_eq!(app.output_for_copy(), None);
    app.output = "\n  Persona: tester\n\n".to_string();
    assert_eq!(app.output_for_copy(), Some("Persona: tester"));

    app.report_copy(false);
    assert_eq!(app.status().kind, StatusKind::Warning);
    app.report_copy(true);
    assert!(app.copy_acknowledged());
}
