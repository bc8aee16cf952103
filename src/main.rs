use std::{io, time::Duration, time::Instant};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;

use sethael::app::{Action, App, AppEvent};
use sethael::config::load_config;
use sethael::logging::init_tracing;
use sethael::migrate::{self, Origin};
use sethael::model::Wiki;
use sethael::storage::{FileStore, KeyValueStore, Persistence, STORAGE_KEY};
use sethael::ui::ui;

async fn run_storage_loop<S: KeyValueStore>(
    persistence: Persistence<S>,
    mut action_rx: mpsc::UnboundedReceiver<Action>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) {
    while let Some(Action::Persist(mut blob)) = action_rx.recv().await {
        // each blob is a full snapshot, so queued older ones can be skipped
        while let Ok(Action::Persist(newer)) = action_rx.try_recv() {
            blob = newer;
        }
        let event = match persistence.set(STORAGE_KEY, blob).await {
            Some(_) => AppEvent::Saved,
            None => AppEvent::SaveFailed,
        };
        let _ = event_tx.send(event);
    }
}

async fn run_config_watcher(event_tx: mpsc::UnboundedSender<AppEvent>) {
    let mut last_theme = load_config().theme;
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;
        let theme = load_config().theme;
        if theme != last_theme {
            last_theme = theme;
            tracing::debug!(?theme, "theme changed on disk");
            if event_tx.send(AppEvent::ThemeUpdate(theme)).is_err() {
                break;
            }
        }
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;
        if event::poll(tick_rate.checked_sub(last_tick.elapsed()).unwrap_or(Duration::from_secs(0)))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key, Instant::now()) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, Instant::now()),
                _ => {}
            }
        }
        while let Ok(e) = event_rx.try_recv() {
            app.on_tick(Some(e), Instant::now());
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick(None, Instant::now());
            last_tick = Instant::now();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    if let Err(error) = init_tracing(&config.data_dir) {
        eprintln!("logging disabled: {error}");
    }
    tracing::info!(data_dir = %config.data_dir.display(), "starting");

    let persistence = Persistence::new(FileStore::in_dir(&config.data_dir));
    let defaults = Wiki::shipped()?;
    let loaded = migrate::load(&persistence, &defaults).await;

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut app = App::new(loaded.wiki, &config, action_tx);
    if loaded.origin == Origin::Fallback {
        app.notify("Stored wiki unavailable, showing defaults", true, Instant::now());
    }
    tokio::spawn(run_storage_loop(persistence, action_rx, event_tx.clone()));
    tokio::spawn(run_config_watcher(event_tx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &mut event_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    tracing::info!("exiting");
    result
}
