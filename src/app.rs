use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tokio::sync::mpsc;

use crate::config::{Config, MAX_SCALE, MIN_SCALE, Theme};
use crate::editor::{EditForm, Field};
use crate::migrate::encode;
use crate::model::{EntryRef, Wiki};
use crate::nav::{Direction, Focus, NavRow, Navigator, focused_row, move_cursor};
use crate::search::search;
use crate::timeline::{Carousel, ERAS, TimelineView};

const TOAST_TTL: Duration = Duration::from_millis(2500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Home,
    Browsing,
    Searching,
    Reading,
    Timeline,
    Editing,
}

/// Work handed to background tasks.
#[derive(Debug)]
pub enum Action {
    Persist(String),
}

/// Results coming back from background tasks.
#[derive(Debug)]
pub enum AppEvent {
    Saved,
    SaveFailed,
    ThemeUpdate(Theme),
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub error: bool,
    expires: Instant,
}

#[derive(Debug, Clone)]
pub struct ReadingState {
    pub scroll: u16,
    pub scale: u8,
    /// Filled in by the renderer.
    pub total: usize,
    pub viewport: u16,
}

impl ReadingState {
    /// Share of the text scrolled past, 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        let scrollable = self.total.saturating_sub(self.viewport as usize);
        if scrollable == 0 {
            1.0
        } else {
            (self.scroll as f64 / scrollable as f64).min(1.0)
        }
    }

    /// Width of the reading column as a percentage of the screen.
    pub fn column_percent(&self) -> u16 {
        match self.scale {
            1 => 50,
            2 => 60,
            3 => 70,
            4 => 85,
            _ => 100,
        }
    }

    fn max_scroll(&self) -> u16 {
        self.total.saturating_sub(self.viewport as usize) as u16
    }
}

pub struct App {
    pub state: AppState,
    return_to: AppState,
    pub wiki: Wiki,
    revision: u64,
    pub nav: Navigator,
    pub cursor: usize,
    pub query: String,
    pub result_index: usize,
    hits: Vec<(String, String)>,
    hits_key: Option<(String, u64)>,
    pub theme: Theme,
    pub entry_scroll: u16,
    pub reading: ReadingState,
    pub carousel: Carousel,
    pub timeline: TimelineView,
    pub timeline_offsets: Vec<usize>,
    pub timeline_total: usize,
    pub form: Option<EditForm>,
    pub toast: Option<Toast>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(wiki: Wiki, config: &Config, action_tx: mpsc::UnboundedSender<Action>) -> Self {
        Self {
            state: AppState::Home,
            return_to: AppState::Home,
            wiki,
            revision: 0,
            nav: Navigator::default(),
            cursor: 0,
            query: String::new(),
            result_index: 0,
            hits: Vec::new(),
            hits_key: None,
            theme: config.theme,
            entry_scroll: 0,
            reading: ReadingState {
                scroll: 0,
                scale: config.reading_scale,
                total: 0,
                viewport: 0,
            },
            carousel: Carousel::new(ERAS.len()),
            timeline: TimelineView::default(),
            timeline_offsets: Vec::new(),
            timeline_total: 0,
            form: None,
            toast: None,
            action_tx,
        }
    }

    pub fn on_tick(&mut self, event: Option<AppEvent>, now: Instant) {
        if let Some(event) = event {
            match event {
                AppEvent::Saved => self.notify("Saved", false, now),
                AppEvent::SaveFailed => self.notify("Save failed", true, now),
                AppEvent::ThemeUpdate(theme) => self.theme = theme,
            }
        }
        if self.toast.as_ref().is_some_and(|t| now >= t.expires) {
            self.toast = None;
        }
    }

    pub fn notify(&mut self, message: &str, error: bool, now: Instant) {
        self.toast = Some(Toast {
            message: message.to_string(),
            error,
            expires: now + TOAST_TTL,
        });
    }

    pub fn rows(&self) -> Vec<NavRow> {
        self.nav.rows(&self.wiki)
    }

    pub fn selected_entry(&self) -> Option<EntryRef<'_>> {
        let (category, key) = self.nav.selected_entry()?;
        let (category_key, cat) = self.wiki.categories.get_key_value(category)?;
        let (entry_key, entry) = cat.entries.get_key_value(key)?;
        Some(EntryRef {
            category_key,
            category: cat,
            entry_key,
            entry,
        })
    }

    /// Search results as (category, entry) keys, recomputed only when the
    /// query or the wiki changed.
    pub fn search_hits(&mut self) -> &[(String, String)] {
        let key = (self.query.clone(), self.revision);
        if self.hits_key.as_ref() != Some(&key) {
            self.hits = search(&self.wiki, &self.query)
                .into_iter()
                .map(|h| (h.category_key.to_string(), h.entry_key.to_string()))
                .collect();
            self.hits_key = Some(key);
        }
        &self.hits
    }

    fn sync_cursor(&mut self) {
        let rows = self.rows();
        self.cursor = focused_row(&rows, self.nav.focus()).unwrap_or(self.cursor.min(rows.len().saturating_sub(1)));
    }

    fn open_entry(&mut self, category: &str, key: &str) {
        self.nav.select_entry(category, key);
        self.entry_scroll = 0;
        self.reading.scroll = 0;
        self.sync_cursor();
        if self.state != AppState::Reading {
            self.state = AppState::Browsing;
        }
    }

    fn step_entry(&mut self, direction: Direction) {
        if self.nav.step(&self.wiki, direction) {
            self.entry_scroll = 0;
            self.reading.scroll = 0;
            self.sync_cursor();
        }
    }

    fn go_back(&mut self) {
        self.nav.back();
        self.state = if *self.nav.focus() == Focus::Home {
            AppState::Home
        } else {
            AppState::Browsing
        };
        self.sync_cursor();
    }

    fn focused_category(&self) -> Option<String> {
        match self.nav.focus() {
            Focus::Category(c) | Focus::Entry { category: c, .. } => Some(c.clone()),
            Focus::Home => self.wiki.categories.keys().next().cloned(),
        }
    }

    fn enter(&mut self, state: AppState) {
        if !matches!(self.state, AppState::Searching | AppState::Editing | AppState::Timeline) {
            self.return_to = self.state;
        }
        self.state = state;
    }

    fn leave(&mut self) {
        self.state = self.return_to;
    }

    fn start_edit(&mut self) {
        let Some(e) = self.selected_entry() else { return };
        let form = EditForm::edit(e.category_key, e.entry_key, e.entry);
        self.form = Some(form);
        self.enter(AppState::Editing);
    }

    fn start_create(&mut self) {
        let Some(category) = self.focused_category() else { return };
        self.form = Some(EditForm::create(&category));
        self.enter(AppState::Editing);
    }

    /// Applies the form to a copy of the wiki; the copy replaces the live
    /// wiki only if the form was valid.
    fn save_form(&mut self, delete: bool, now: Instant) {
        let Some(form) = &self.form else { return };
        let mut next = self.wiki.clone();
        let result = if delete { form.delete(&mut next) } else { form.apply(&mut next) };
        match result {
            Ok(applied) => {
                tracing::info!(category = %applied.category, key = %applied.key, delete, "entry updated");
                self.wiki = next;
                self.revision += 1;
                self.form = None;
                self.nav.reconcile(&self.wiki);
                if !delete {
                    self.nav.select_entry(&applied.category, &applied.key);
                }
                self.sync_cursor();
                self.state = if self.return_to == AppState::Reading && !delete {
                    AppState::Reading
                } else if *self.nav.focus() == Focus::Home {
                    AppState::Home
                } else {
                    AppState::Browsing
                };
                self.persist(now);
            }
            Err(error) => {
                tracing::warn!(error = %error, "entry form rejected");
                self.notify(&error.to_string(), true, now);
            }
        }
    }

    fn persist(&mut self, now: Instant) {
        match encode(&self.wiki) {
            Ok(blob) => {
                if self.action_tx.send(Action::Persist(blob)).is_err() {
                    self.notify("Save failed", true, now);
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "could not encode wiki");
                self.notify("Save failed", true, now);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        match self.state {
            AppState::Home | AppState::Browsing => return self.handle_browse_key(key, now),
            AppState::Searching => self.handle_search_key(key),
            AppState::Reading => return self.handle_reading_key(key),
            AppState::Timeline => self.handle_timeline_key(key),
            AppState::Editing => self.handle_editor_key(key, now),
        }
        false
    }

    fn handle_browse_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let rows = self.rows();
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => self.cursor = move_cursor(&rows, self.cursor, Direction::Next),
            KeyCode::Char('k') | KeyCode::Up => self.cursor = move_cursor(&rows, self.cursor, Direction::Prev),
            KeyCode::Enter | KeyCode::Char('l') => match rows.get(self.cursor) {
                Some(NavRow::Category { key: category, .. }) => {
                    self.nav.toggle_category(category);
                    if *self.nav.focus() != Focus::Home {
                        self.state = AppState::Browsing;
                    }
                    self.sync_cursor();
                }
                Some(NavRow::Entry { category, key: entry, .. }) => self.open_entry(category, entry),
                _ => {}
            },
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Backspace => self.go_back(),
            KeyCode::Left if self.state == AppState::Home => {
                self.carousel.on_key(Direction::Prev, now);
            }
            KeyCode::Right if self.state == AppState::Home => {
                self.carousel.on_key(Direction::Next, now);
            }
            KeyCode::Char('[') | KeyCode::Left => self.step_entry(Direction::Prev),
            KeyCode::Char(']') | KeyCode::Right => self.step_entry(Direction::Next),
            KeyCode::Char('J') | KeyCode::PageDown => self.entry_scroll = self.entry_scroll.saturating_add(5),
            KeyCode::Char('K') | KeyCode::PageUp => self.entry_scroll = self.entry_scroll.saturating_sub(5),
            KeyCode::Char('/') => {
                self.query.clear();
                self.result_index = 0;
                self.enter(AppState::Searching);
            }
            KeyCode::Char('r') => {
                if self.selected_entry().is_some() {
                    self.reading.scroll = 0;
                    self.state = AppState::Reading;
                }
            }
            KeyCode::Char('t') => self.enter(AppState::Timeline),
            KeyCode::Char('e') => self.start_edit(),
            KeyCode::Char('n') => self.start_create(),
            KeyCode::Char('T') => self.theme = self.theme.toggled(),
            KeyCode::Char('g') | KeyCode::Home => {
                self.nav.clear();
                self.state = AppState::Home;
                self.sync_cursor();
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.leave();
            }
            KeyCode::Enter => {
                let index = self.result_index;
                let chosen = self.search_hits().get(index).cloned();
                if let Some((category, entry)) = chosen {
                    self.query.clear();
                    self.state = AppState::Browsing;
                    self.open_entry(&category, &entry);
                }
            }
            KeyCode::Down => {
                let len = self.search_hits().len();
                if self.result_index + 1 < len {
                    self.result_index += 1;
                }
            }
            KeyCode::Up => self.result_index = self.result_index.saturating_sub(1),
            KeyCode::Backspace => {
                self.query.pop();
                self.result_index = 0;
            }
            KeyCode::Char(c) => {
                self.query.push(c);
                self.result_index = 0;
            }
            _ => {}
        }
    }

    fn handle_reading_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc => {
                self.state = AppState::Browsing;
                self.sync_cursor();
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_reading(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_reading(-1),
            KeyCode::Char(' ') | KeyCode::PageDown => self.scroll_reading(self.reading.viewport.max(2) as i32 - 1),
            KeyCode::PageUp => self.scroll_reading(-(self.reading.viewport.max(2) as i32 - 1)),
            KeyCode::Char('g') => self.reading.scroll = 0,
            KeyCode::Char('G') => self.reading.scroll = self.reading.max_scroll(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.reading.scale = (self.reading.scale + 1).min(MAX_SCALE);
            }
            KeyCode::Char('-') => {
                self.reading.scale = self.reading.scale.saturating_sub(1).max(MIN_SCALE);
            }
            KeyCode::Char('n') | KeyCode::Right | KeyCode::Char(']') => self.step_entry(Direction::Next),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::Char('[') => self.step_entry(Direction::Prev),
            KeyCode::Char('e') => self.start_edit(),
            KeyCode::Char('T') => self.theme = self.theme.toggled(),
            _ => {}
        }
        false
    }

    fn scroll_reading(&mut self, delta: i32) {
        let next = (self.reading.scroll as i32 + delta).clamp(0, self.reading.max_scroll() as i32);
        self.reading.scroll = next as u16;
    }

    fn handle_timeline_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.leave(),
            KeyCode::Char('j') | KeyCode::Down => self.timeline.scroll_by(1, self.timeline_total),
            KeyCode::Char('k') | KeyCode::Up => self.timeline.scroll_by(-1, self.timeline_total),
            KeyCode::Char('n') | KeyCode::Right | KeyCode::Char(']') => {
                self.timeline.jump(Direction::Next, &self.timeline_offsets)
            }
            KeyCode::Char('p') | KeyCode::Left | KeyCode::Char('[') => {
                self.timeline.jump(Direction::Prev, &self.timeline_offsets)
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => self.save_form(false, now),
            KeyCode::Char('d') if ctrl => {
                if self.form.as_ref().is_some_and(|f| !f.is_create()) {
                    self.save_form(true, now);
                }
            }
            KeyCode::Esc => {
                self.form = None;
                self.leave();
            }
            _ => {
                let Some(form) = self.form.as_mut() else { return };
                match key.code {
                    KeyCode::Tab => form.focus(Direction::Next),
                    KeyCode::BackTab => form.focus(Direction::Prev),
                    KeyCode::Left if form.field == Field::Category => form.cycle_category(&self.wiki, Direction::Prev),
                    KeyCode::Right if form.field == Field::Category => form.cycle_category(&self.wiki, Direction::Next),
                    KeyCode::Enter => form.newline(),
                    KeyCode::Backspace => form.backspace(),
                    KeyCode::Char(c) => form.input(c),
                    _ => {}
                }
            }
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let delta = match mouse.kind {
            MouseEventKind::ScrollDown | MouseEventKind::ScrollRight => 1,
            MouseEventKind::ScrollUp | MouseEventKind::ScrollLeft => -1,
            _ => return,
        };
        match self.state {
            AppState::Home => {
                self.carousel.on_wheel(delta, now);
            }
            AppState::Browsing => {
                self.entry_scroll = (self.entry_scroll as i32 + delta).max(0) as u16;
            }
            AppState::Reading => self.scroll_reading(delta),
            AppState::Timeline => self.timeline.scroll_by(delta, self.timeline_total),
            AppState::Searching => {
                let len = self.search_hits().len();
                self.result_index = (self.result_index as i32 + delta).clamp(0, len.saturating_sub(1) as i32) as usize;
            }
            AppState::Editing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::decode;

    fn app() -> (App, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(Wiki::shipped().unwrap(), &Config::default(), tx), rx)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), Instant::now())
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn expand_category_and_open_entry() {
        let (mut app, _rx) = app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Browsing);
        assert_eq!(app.nav.focus(), &Focus::Category("cosmology".into()));

        // group heading is skipped, first entry is selected
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.nav.selected_entry(), Some(("cosmology", "the-seeder")));

        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.nav.selected_entry(), Some(("cosmology", "the-veil")));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.nav.focus(), &Focus::Category("cosmology".into()));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Home);
        assert!(app.nav.is_expanded("cosmology"));
    }

    #[test]
    fn search_then_open_result() {
        let (mut app, _rx) = app();
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "teodra");
        let hits = app.search_hits().to_vec();
        assert!(hits.contains(&("characters".to_string(), "mother-teodra".to_string())));
        let index = hits.iter().position(|h| h.1 == "mother-teodra").unwrap();
        for _ in 0..index {
            press(&mut app, KeyCode::Down);
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Browsing);
        assert_eq!(app.nav.selected_entry(), Some(("characters", "mother-teodra")));
        assert!(app.query.is_empty());
    }

    #[test]
    fn escape_from_search_returns_to_previous_screen() {
        let (mut app, _rx) = app();
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "q");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Home);
    }

    #[test]
    fn creating_an_entry_persists_the_whole_wiki() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.state, AppState::Editing);
        type_str(&mut app, "Glass Songs");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "song");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "Hummed at the Wells.");
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), Instant::now());

        assert_eq!(app.state, AppState::Browsing);
        assert_eq!(app.nav.selected_entry(), Some(("history", "glass-songs")));
        let Ok(Action::Persist(blob)) = rx.try_recv() else {
            panic!("expected a persist action");
        };
        let (saved, _) = decode(&blob).unwrap();
        assert_eq!(saved.entry("history", "glass-songs").unwrap().tags, vec!["song"]);
        assert_eq!(saved, app.wiki);
    }

    #[test]
    fn invalid_form_stays_open_with_error_toast() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('n'));
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), Instant::now());
        assert_eq!(app.state, AppState::Editing);
        assert!(app.toast.as_ref().is_some_and(|t| t.error));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn deleting_selected_entry_falls_back_to_category() {
        let (mut app, mut rx) = app();
        app.open_entry("languages", "trade-cant");
        press(&mut app, KeyCode::Char('e'));
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL), Instant::now());
        assert!(app.wiki.entry("languages", "trade-cant").is_none());
        assert_eq!(app.nav.focus(), &Focus::Category("languages".into()));
        assert!(matches!(rx.try_recv(), Ok(Action::Persist(_))));
    }

    #[test]
    fn save_events_show_and_expire_toasts() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        app.on_tick(Some(AppEvent::Saved), now);
        assert_eq!(app.toast.as_ref().unwrap().message, "Saved");
        app.on_tick(Some(AppEvent::SaveFailed), now);
        assert!(app.toast.as_ref().unwrap().error);
        app.on_tick(None, now + TOAST_TTL);
        assert!(app.toast.is_none());
    }

    #[test]
    fn reading_mode_scales_and_tracks_progress() {
        let (mut app, _rx) = app();
        app.open_entry("books", "chapter-1-the-ash-road");
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state, AppState::Reading);
        app.reading.total = 40;
        app.reading.viewport = 20;
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.reading.scroll, 20);
        assert!((app.reading.progress() - 1.0).abs() < f64::EPSILON);
        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('+'));
        assert_eq!(app.reading.scale, MAX_SCALE);
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.nav.selected_entry(), Some(("books", "chapter-2-the-keeper")));
        assert_eq!(app.reading.scroll, 0);
        assert_eq!(app.state, AppState::Reading);
    }

    #[test]
    fn home_arrows_drive_the_teaser() {
        let (mut app, _rx) = app();
        press(&mut app, KeyCode::Right);
        assert_eq!(app.carousel.index(), 1);
        assert_eq!(app.state, AppState::Home);
    }
}
