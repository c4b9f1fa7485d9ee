mod app;
mod settings;
mod speedtest;
mod ui;

use anyhow::Result;
use app::{poll_event, App, AppAction};
use crossterm::event::Event;
use ratatui::DefaultTerminal;
use speedtest::{run_speed_test, TestUpdate};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal).await;

    ratatui::restore();
    result
}

// Logging is opt-in so it never interferes with the terminal UI. Run with
// RUST_LOG=debug and redirect stderr to a file to capture it.
fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run_app(terminal: &mut DefaultTerminal) -> Result<()> {
    let mut app = App::new();
    let mut test_rx: Option<mpsc::Receiver<TestUpdate>> = None;

    loop {
        terminal.draw(|frame| draw_ui(frame, &app))?;

        // Handle engine updates
        if let Some(rx) = test_rx.as_mut() {
            match rx.try_recv() {
                Ok(update) => app.apply_update(update),
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if app.running() {
                        // the engine went away without finishing the run
                        app.reset();
                    }
                    test_rx = None;
                }
            }
        }

        // Handle input
        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(30))? {
            if let Some(action) = app.handle_key_event(key) {
                match action {
                    AppAction::Quit => break,
                    AppAction::StartTest => {
                        let token = app.start_run();
                        let (tx, rx) = mpsc::channel(32);
                        test_rx = Some(rx);

                        let settings = app.settings.clone();
                        tokio::spawn(async move {
                            let _ = run_speed_test(tx, token, settings).await;
                        });
                    }
                    AppAction::ResetTest => {
                        app.reset();
                        test_rx = None;
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
