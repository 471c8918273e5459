use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::charts::{Chart, ChartKind, Input};
use crate::config::Config;
use crate::data::{LoadState, Sources};

/// Rows shown in the search dropdown
pub const DROPDOWN_ROWS: usize = 8;

/// Coalesces bursts of terminal resize events into a single redraw
#[derive(Debug, Clone, Copy)]
pub struct ResizeDebounce {
    delay: Duration,
    pending: Option<Instant>,
}

impl ResizeDebounce {
    pub const DELAY: Duration = Duration::from_millis(200);

    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Record a resize; restarts the delay
    pub fn notify(&mut self, now: Instant) {
        self.pending = Some(now);
    }

    /// True once the delay elapsed since the last resize. Fires once per burst.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if now.saturating_duration_since(at) >= self.delay => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for ResizeDebounce {
    fn default() -> Self {
        Self::new(Self::DELAY)
    }
}

/// Search input with its type-ahead dropdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchBox {
    pub text: String,
    pub suggestions: Vec<String>,
    pub selected: Option<usize>,
}

impl SearchBox {
    fn up(&mut self) {
        self.selected = match self.selected {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
    }

    fn down(&mut self) {
        let len = self.suggestions.len().min(DROPDOWN_ROWS);
        self.selected = match self.selected {
            None if len > 0 => Some(0),
            Some(i) if i + 1 < len => Some(i + 1),
            other => other,
        };
    }

    /// Highlighted suggestion, else the typed text
    fn submission(&self) -> String {
        self.selected
            .and_then(|i| self.suggestions.get(i))
            .cloned()
            .unwrap_or_else(|| self.text.clone())
    }
}

/// A chart tab, built the first time it is shown
struct Tab {
    kind: ChartKind,
    chart: Option<LoadState<Box<dyn Chart>>>,
}

/// Application state
pub struct App {
    sources: Sources,
    config: Config,
    tabs: Vec<Tab>,
    active: usize,
    /// Navigation sidebar visible
    pub sidebar_open: bool,
    /// Open search input, `None` when not typing
    pub search: Option<SearchBox>,
    pub should_quit: bool,
    /// Last mouse position during drag
    last_mouse: Option<(u16, u16)>,
    resize: ResizeDebounce,
    dirty: bool,
}

impl App {
    pub fn new(sources: Sources, config: Config, start: ChartKind) -> Self {
        let tabs = ChartKind::ALL.iter().map(|&kind| Tab { kind, chart: None }).collect();
        let active = ChartKind::ALL.iter().position(|&k| k == start).unwrap_or(0);
        let mut app = Self {
            sources,
            config,
            tabs,
            active,
            sidebar_open: true,
            search: None,
            should_quit: false,
            last_mouse: None,
            resize: ResizeDebounce::default(),
            dirty: true,
        };
        app.ensure_built();
        app
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn active_kind(&self) -> ChartKind {
        self.tabs[self.active].kind
    }

    /// Active chart, `None` only before its first build
    pub fn active_chart(&self) -> Option<&LoadState<Box<dyn Chart>>> {
        self.tabs[self.active].chart.as_ref()
    }

    /// Every tab with its load outcome so far (`None` = not built yet)
    pub fn tabs(&self) -> impl Iterator<Item = (ChartKind, Option<Result<(), &str>>)> + '_ {
        self.tabs.iter().map(|tab| {
            let state = tab.chart.as_ref().map(|s| match s.error() {
                Some(msg) => Err(msg),
                None => Ok(()),
            });
            (tab.kind, state)
        })
    }

    pub fn select_chart(&mut self, index: usize) {
        if index >= self.tabs.len() || index == self.active {
            return;
        }
        self.active = index;
        self.search = None;
        self.last_mouse = None;
        self.ensure_built();
        self.dirty = true;
    }

    pub fn next_chart(&mut self) {
        self.select_chart((self.active + 1) % self.tabs.len());
    }

    pub fn prev_chart(&mut self) {
        self.select_chart((self.active + self.tabs.len() - 1) % self.tabs.len());
    }

    fn ensure_built(&mut self) {
        let tab = &mut self.tabs[self.active];
        if tab.chart.is_none() {
            tab.chart = Some(tab.kind.build(&self.sources, &self.config));
        }
    }

    /// Route an input to the active chart; failed charts ignore input
    pub fn send(&mut self, input: Input) {
        if let Some(LoadState::Loaded(chart)) = self.tabs[self.active].chart.as_mut() {
            tracing::trace!(chart = chart.title(), ?input, "input");
            chart.handle(input);
        }
        self.dirty = true;
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        match self.active_chart() {
            Some(LoadState::Loaded(chart)) => chart.suggestions(query),
            _ => Vec::new(),
        }
    }

    fn refresh_suggestions(&mut self) {
        let query = self.search.as_ref().map(|s| s.text.clone()).unwrap_or_default();
        let suggestions = if query.trim().is_empty() { Vec::new() } else { self.suggestions(&query) };
        if let Some(search) = self.search.as_mut() {
            search.suggestions = suggestions;
            search.selected = None;
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }
        if self.search.is_some() {
            self.on_search_key(key);
        } else {
            self.on_browse_key(key);
        }
        self.dirty = true;
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        let Some(search) = self.search.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.search = None;
                self.send(Input::Search(String::new()));
            }
            KeyCode::Enter => {
                let text = search.submission();
                self.search = None;
                self.send(Input::Submit(text));
            }
            KeyCode::Up => search.up(),
            KeyCode::Down => search.down(),
            KeyCode::Backspace => {
                if search.text.is_empty() {
                    self.send(Input::PopTerm);
                } else {
                    search.text.pop();
                    let text = search.text.clone();
                    self.send(Input::Search(text));
                    self.refresh_suggestions();
                }
            }
            KeyCode::Char(c) => {
                search.text.push(c);
                let text = search.text.clone();
                self.send(Input::Search(text));
                self.refresh_suggestions();
            }
            _ => {}
        }
    }

    fn on_browse_key(&mut self, key: KeyEvent) {
        let input = match key.code {
            KeyCode::Char('q') => {
                self.quit();
                return;
            }
            KeyCode::Char('/') => {
                self.search = Some(SearchBox::default());
                return;
            }
            KeyCode::Char('s') => {
                self.sidebar_open = !self.sidebar_open;
                return;
            }
            KeyCode::Tab => {
                self.next_chart();
                return;
            }
            KeyCode::BackTab => {
                self.prev_chart();
                return;
            }
            KeyCode::Char(d @ '0'..='9') => {
                // 1..9 then 0 for the tenth tab
                let n = d.to_digit(10).unwrap_or(0) as usize;
                self.select_chart(if n == 0 { 9 } else { n - 1 });
                return;
            }
            KeyCode::Up => Input::Up,
            KeyCode::Down => Input::Down,
            KeyCode::Enter => Input::Select,
            KeyCode::Char(' ') => Input::Toggle,
            KeyCode::Esc => Input::Escape,
            KeyCode::Char(']') | KeyCode::Right => Input::Next,
            KeyCode::Char('[') | KeyCode::Left => Input::Prev,
            KeyCode::Char('v') => Input::SwitchView,
            KeyCode::Char('c') => Input::ClearSelection,
            KeyCode::Char('r') => Input::Reset,
            KeyCode::Backspace => Input::PopTerm,
            KeyCode::Char('h') => Input::Pan(-10, 0),
            KeyCode::Char('l') => Input::Pan(10, 0),
            KeyCode::Char('k') => Input::Pan(0, -10),
            KeyCode::Char('j') => Input::Pan(0, 10),
            KeyCode::Char('+') | KeyCode::Char('=') => Input::ZoomIn,
            KeyCode::Char('-') | KeyCode::Char('_') => Input::ZoomOut,
            _ => return,
        };
        self.send(input);
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.send(Input::ZoomIn),
            MouseEventKind::ScrollDown => self.send(Input::ZoomOut),
            // Trackpad two-finger swipe
            MouseEventKind::ScrollLeft => self.send(Input::Pan(-15, 0)),
            MouseEventKind::ScrollRight => self.send(Input::Pan(15, 0)),
            MouseEventKind::Down(MouseButton::Left) => self.last_mouse = Some((mouse.column, mouse.row)),
            MouseEventKind::Drag(MouseButton::Left) => self.drag(mouse.column, mouse.row),
            MouseEventKind::Up(MouseButton::Left) => self.last_mouse = None,
            _ => {}
        }
    }

    /// Pan by the drag delta in braille pixels (2x4 per cell)
    fn drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = (i32::from(last_x) - i32::from(x)) * 2;
            let dy = (i32::from(last_y) - i32::from(y)) * 4;
            if dx != 0 || dy != 0 {
                self.send(Input::Pan(dx, dy));
            }
        }
        self.last_mouse = Some((x, y));
    }

    pub fn on_resize(&mut self, now: Instant) {
        self.resize.notify(now);
    }

    /// Whether a frame should be drawn now. Clears the dirty flag.
    pub fn take_redraw(&mut self, now: Instant) -> bool {
        if self.resize.ready(now) {
            self.dirty = true;
        }
        if self.resize.is_pending() {
            return false;
        }
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let works = Table::from_csv("works.csv", "type,title\narticle,a\narticle,b\nreview,c\n").unwrap();
        App::new(Sources::from_tables(Some(works), None, None), Config::default(), ChartKind::Waffle)
    }

    fn status(app: &App) -> String {
        match app.active_chart() {
            Some(LoadState::Loaded(chart)) => chart.status(),
            other => panic!("chart not loaded: {:?}", other.and_then(|s| s.error())),
        }
    }

    #[test]
    fn test_resize_debounce_coalesces_burst() {
        let t0 = Instant::now();
        let mut d = ResizeDebounce::default();
        assert!(!d.ready(t0));
        d.notify(t0);
        d.notify(t0 + Duration::from_millis(150));
        assert!(!d.ready(t0 + Duration::from_millis(300)));
        assert!(d.ready(t0 + Duration::from_millis(350)));
        assert!(!d.ready(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn test_redraw_waits_for_resize() {
        let t0 = Instant::now();
        let mut app = app();
        assert!(app.take_redraw(t0));
        assert!(!app.take_redraw(t0));
        app.on_resize(t0);
        app.on_key(key(KeyCode::Down));
        assert!(!app.take_redraw(t0 + Duration::from_millis(100)));
        assert!(app.take_redraw(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_keys_route_to_chart() {
        let mut app = app();
        app.on_key(key(KeyCode::Down));
        assert_eq!(status(&app), "review: 1 works, 79 cells");
        app.on_key(key(KeyCode::Char('r')));
        assert_eq!(status(&app), "2 types, 3 works");
    }

    #[test]
    fn test_tabs_build_lazily_and_fail_inline() {
        let mut app = app();
        let built = app.tabs().filter(|(_, s)| s.is_some()).count();
        assert_eq!(built, 1);
        app.on_key(key(KeyCode::Tab));
        assert_eq!(app.active_kind(), ChartKind::Network);
        assert!(app.active_chart().and_then(|s| s.error()).is_some());
        app.on_key(key(KeyCode::Char('1')));
        assert_eq!(app.active_kind(), ChartKind::Waffle);
        app.on_key(key(KeyCode::Char('0')));
        assert_eq!(app.active_kind(), ChartKind::Proportional);
        app.on_key(key(KeyCode::BackTab));
        assert_eq!(app.active_kind(), ChartKind::Treemap);
    }

    #[test]
    fn test_search_box_suggestions_and_submit() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('/')));
        app.on_key(key(KeyCode::Char('r')));
        app.on_key(key(KeyCode::Char('e')));
        let search = app.search.clone().unwrap();
        assert_eq!(search.text, "re");
        assert_eq!(search.suggestions, vec!["review".to_string()]);
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.search.as_ref().unwrap().selected, Some(0));
        app.on_key(key(KeyCode::Enter));
        assert!(app.search.is_none());
    }

    #[test]
    fn test_escape_closes_search_and_quit_keys() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('/')));
        app.on_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.on_key(key(KeyCode::Esc));
        assert!(app.search.is_none());
        app.on_key(key(KeyCode::Char('s')));
        assert!(!app.sidebar_open);
        app.on_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }
}
