//! Input handling for the Refine TUI.

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;

use refine_engine::ui::{ActiveView, InputMode};
use refine_engine::{App, GenerativeService};

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25); // shutdown responsiveness
const INPUT_CHANNEL_CAPACITY: usize = 1024; // bounded: no OOM
const MAX_EVENTS_PER_FRAME: usize = 64; // never starve rendering

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

enum InputMsg {
    Event(Event),
    Error(String),
}

/// Reads terminal events on a blocking thread and hands them to the frame loop.
pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();

        let join = tokio::task::spawn_blocking(move || input_loop(stop2, tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Close the receiver first so a backpressured send unblocks.
        self.rx.close();

        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best-effort stop if caller exits early; do not block in Drop.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: Arc<AtomicBool>, tx: mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    // Bounded queue: apply backpressure instead of dropping events.
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Apply queued terminal events. Returns `Ok(true)` when the app should quit.
pub fn handle_events<S: GenerativeService>(
    app: &mut App<S>,
    input: &mut InputPump,
) -> Result<bool> {
    let mut processed = 0;
    while processed < MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };

        if apply_event(app, ev) {
            return Ok(true);
        }
        processed += 1;
    }
    Ok(app.should_quit())
}

pub(crate) fn apply_event<S: GenerativeService>(app: &mut App<S>, event: Event) -> bool {
    match event {
        Event::Key(key) => {
            if matches!(key.kind, KeyEventKind::Release) {
                return app.should_quit();
            }

            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                app.request_quit();
                return true;
            }

            match app.input_mode() {
                InputMode::Normal => handle_normal_mode(app, key),
                InputMode::Insert => handle_insert_mode(app, key),
                InputMode::ModelSelect => handle_model_select_mode(app, key),
                InputMode::KeyPrompt => handle_key_prompt_mode(app, key),
            }
        }
        Event::Paste(text) => {
            let normalized = normalize_line_endings(&text);
            app.paste(&normalized);
        }
        _ => {}
    }
    app.should_quit()
}

fn copy_output<S: GenerativeService>(app: &mut App<S>) {
    let Some(text) = app.output_for_copy() else {
        return;
    };
    let copied = crate::clipboard::copy_text(text);
    app.report_copy(copied);
}

fn handle_normal_mode<S: GenerativeService>(app: &mut App<S>, key: KeyEvent) {
    if app.view() == ActiveView::History {
        match key.code {
            KeyCode::Char('k') | KeyCode::Up => {
                app.history_move_up();
                return;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.history_move_down();
                return;
            }
            KeyCode::Enter => {
                app.restore_selected_history();
                return;
            }
            KeyCode::Esc => {
                app.set_view(ActiveView::Optimizer);
                return;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') => {
            app.request_quit();
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('h') => {
            app.toggle_view();
        }
        KeyCode::Char('i' | 'a') => {
            app.enter_insert_mode();
        }
        KeyCode::Enter | KeyCode::Char('o') => {
            app.set_view(ActiveView::Optimizer);
            app.trigger_optimization();
        }
        // Open model picker
        KeyCode::Char('m') => {
            app.enter_model_select_mode();
        }
        KeyCode::Char('r') => {
            app.refresh_models();
        }
        KeyCode::Char('K') => {
            app.open_key_prompt();
        }
        KeyCode::Char('+' | '=') | KeyCode::Right => {
            app.increase_temperature();
        }
        KeyCode::Char('-' | '_') | KeyCode::Left => {
            app.decrease_temperature();
        }
        KeyCode::Char('y') => {
            copy_output(app);
        }
        _ => {}
    }
}

fn handle_insert_mode<S: GenerativeService>(app: &mut App<S>, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Esc => {
            app.enter_normal_mode();
        }
        // Submit: Ctrl+S, Ctrl+Enter, Alt+Enter (bare Enter inserts a newline)
        KeyCode::Char('s') if ctrl => {
            app.enter_normal_mode();
            app.trigger_optimization();
        }
        KeyCode::Enter if ctrl || alt => {
            app.enter_normal_mode();
            app.trigger_optimization();
        }
        KeyCode::Enter => {
            app.input_mut().enter_char('\n');
        }
        KeyCode::Backspace => {
            app.input_mut().delete_char();
        }
        KeyCode::Delete => {
            app.input_mut().delete_char_forward();
        }
        KeyCode::Left => {
            app.input_mut().move_cursor_left();
        }
        KeyCode::Right => {
            app.input_mut().move_cursor_right();
        }
        KeyCode::Home => {
            app.input_mut().move_cursor_home();
        }
        KeyCode::End => {
            app.input_mut().move_cursor_end();
        }
        KeyCode::Char('a') if ctrl => {
            app.input_mut().move_cursor_home();
        }
        KeyCode::Char('e') if ctrl => {
            app.input_mut().move_cursor_end();
        }
        KeyCode::Char('w') if ctrl => {
            app.input_mut().delete_word_backwards();
        }
        KeyCode::Char('u') if ctrl => {
            app.input_mut().clear();
        }
        // Insert character (ignore \r)
        KeyCode::Char(c) if c != '\r' && !ctrl => {
            app.input_mut().enter_char(c);
        }
        _ => {}
    }
}

fn handle_model_select_mode<S: GenerativeService>(app: &mut App<S>, key: KeyEvent) {
    match key.code {
        // Cancel and return to normal mode
        KeyCode::Esc => {
            app.enter_normal_mode();
        }
        KeyCode::Enter => {
            app.model_select_confirm();
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.model_select_move_up();
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.model_select_move_down();
        }
        // Direct selection with number keys
        KeyCode::Char(c) if c.is_ascii_digit() => {
            if let Some(digit) = c.to_digit(10)
                && digit > 0
            {
                app.model_select_set_index((digit - 1) as usize);
                app.model_select_confirm();
            }
        }
        _ => {}
    }
}

fn handle_key_prompt_mode<S: GenerativeService>(app: &mut App<S>, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => {
            app.cancel_key_prompt();
        }
        KeyCode::Enter => {
            app.submit_key_prompt();
        }
        KeyCode::Backspace => {
            app.key_draft_mut().delete_char();
        }
        KeyCode::Left => {
            app.key_draft_mut().move_cursor_left();
        }
        KeyCode::Right => {
            app.key_draft_mut().move_cursor_right();
        }
        KeyCode::Char('u') if ctrl => {
            app.key_draft_mut().clear();
        }
        KeyCode::Char(c) if !c.is_control() && !ctrl => {
            app.key_draft_mut().enter_char(c);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};
    use refine_engine::{AppSettings, GeminiClient, Store};

    fn key(code: KeyCode) -> Event {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn test_app(dir: &tempfile::TempDir) -> App {
        App::with_service(
            GeminiClient::new().unwrap(),
            Store::in_dir(dir.path()),
            AppSettings::default(),
        )
    }

    #[test]
    fn insert_mode_enter_adds_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        apply_event(&mut app, key(KeyCode::Char('i')));
        for c in "ab".chars() {
            apply_event(&mut app, key(KeyCode::Char(c)));
        }
        apply_event(&mut app, key(KeyCode::Enter));
        apply_event(&mut app, key(KeyCode::Char('c')));

        assert_eq!(app.input().text(), "ab\nc");
        assert_eq!(app.input_mode(), InputMode::Insert);

        apply_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode(), InputMode::Normal);
    }

    #[test]
    fn paste_normalizes_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        apply_event(&mut app, Event::Paste("one\r\ntwo\rthree".to_string()));
        assert_eq!(app.input().text(), "one\ntwo\nthree");
        assert_eq!(app.input_mode(), InputMode::Insert);
    }

    #[test]
    fn temperature_keys_step_the_slider() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        apply_event(&mut app, key(KeyCode::Char('+')));
        assert_eq!(app.temperature().to_string(), "0.75");
        apply_event(&mut app, key(KeyCode::Char('-')));
        apply_event(&mut app, key(KeyCode::Char('-')));
        assert_eq!(app.temperature().to_string(), "0.65");
    }

    #[test]
    fn tab_switches_views_and_ctrl_c_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        apply_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.view(), ActiveView::History);
        apply_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.view(), ActiveView::Optimizer);

        assert!(apply_event(
            &mut app,
            key_with(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }

    #[test]
    fn trigger_without_key_opens_prompt_and_esc_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.input_mut().set_text("hello");

        apply_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input_mode(), InputMode::KeyPrompt);

        apply_event(&mut app, key(KeyCode::Char('x')));
        assert_eq!(app.key_draft().text(), "x");
        apply_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert!(!app.has_credential());
    }
}
