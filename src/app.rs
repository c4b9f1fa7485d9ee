use crate::settings::{Settings, SettingsField};
use crate::speedtest::{TestPhase, TestState, TestUpdate};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Main,
    Settings,
}

pub struct App {
    pub state: TestState,
    pub should_quit: bool,

    // UI state
    pub view: AppView,

    // Settings
    pub settings: Settings,
    pub selected_setting: SettingsField,

    cancel: Option<CancellationToken>,
}

impl App {
    pub fn new() -> Self {
        Self {
            state: TestState::new(),
            should_quit: false,
            view: AppView::Main,
            settings: Settings::default(),
            selected_setting: SettingsField::PingAttempts,
            cancel: None,
        }
    }

    pub fn running(&self) -> bool {
        !matches!(self.state.phase, TestPhase::Idle | TestPhase::Complete)
    }

    /// Starts a fresh run: a new cancellation token every time, so nothing
    /// from a previous run can leak into this one.
    pub fn start_run(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.state.begin_run();
        token
    }

    /// Cancels any in-flight run and returns to an empty idle state. Safe
    /// to call at any time.
    pub fn reset(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.state.reset();
    }

    pub fn apply_update(&mut self, update: TestUpdate) {
        self.state.apply(update);
        if !self.running() {
            self.cancel = None;
        }
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match self.view {
            AppView::Main => self.handle_main_key(key),
            AppView::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_main_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Char('s') => {
                if !self.running() {
                    self.view = AppView::Settings;
                }
                None
            }
            KeyCode::Enter => {
                if self.running() {
                    None
                } else {
                    Some(AppAction::StartTest)
                }
            }
            KeyCode::Esc | KeyCode::Char('r') => Some(AppAction::ResetTest),
            _ => None,
        }
    }

    fn handle_settings_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                self.view = AppView::Main;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_setting = self.selected_setting.prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected_setting = self.selected_setting.next();
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.decrease_setting();
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.increase_setting();
                None
            }
            _ => None,
        }
    }

    fn increase_setting(&mut self) {
        match self.selected_setting {
            SettingsField::PingAttempts => {
                self.settings.ping_attempts = (self.settings.ping_attempts + 1).min(20);
            }
            SettingsField::PhaseDuration => {
                self.settings.phase_duration_ms =
                    (self.settings.phase_duration_ms + 1_000).min(30_000);
            }
            SettingsField::UploadChunk => {
                self.settings.upload_chunk_bytes =
                    (self.settings.upload_chunk_bytes + 50 * 1024).min(1024 * 1024);
            }
        }
    }

    fn decrease_setting(&mut self) {
        match self.selected_setting {
            SettingsField::PingAttempts => {
                self.settings.ping_attempts = self.settings.ping_attempts.saturating_sub(1).max(1);
            }
            SettingsField::PhaseDuration => {
                self.settings.phase_duration_ms =
                    self.settings.phase_duration_ms.saturating_sub(1_000).max(2_000);
            }
            SettingsField::UploadChunk => {
                self.settings.upload_chunk_bytes = self
                    .settings
                    .upload_chunk_bytes
                    .saturating_sub(50 * 1024)
                    .max(50 * 1024);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AppAction {
    Quit,
    StartTest,
    ResetTest,
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_run_gets_its_own_token() {
        let mut app = App::new();
        let first = app.start_run();
        app.reset();
        assert!(first.is_cancelled());

        let second = app.start_run();
        assert!(!second.is_cancelled());
        assert_eq!(app.state.phase, TestPhase::Ping);
    }

    #[test]
    fn reset_is_idempotent_from_idle() {
        let mut app = App::new();
        app.reset();
        app.reset();
        assert_eq!(app.state.phase, TestPhase::Idle);
        assert!(!app.running());
    }
}
