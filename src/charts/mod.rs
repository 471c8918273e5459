//! Chart modules. Each one owns its aggregates and its filter state; nothing
//! is shared between charts except the read-only source tables.

pub mod bubble;
pub mod choropleth;
pub mod flowmap;
pub mod institutions;
pub mod leaderboard;
pub mod network;
pub mod pictorial;
pub mod waffle;
pub mod widgets;
pub mod wordcloud;

use crate::config::Config;
use crate::data::{LoadState, Sources};
use crate::filter::{FilterEvent, FilterState};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

/// Discrete inputs routed from the shell to the active chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Up,
    Down,
    /// Pin or unpin the entity under the cursor
    Select,
    /// Toggle the entity under the cursor in the selection
    Toggle,
    /// Click outside any entity
    Escape,
    /// Cycle a single-select control (year, region, category...)
    Next,
    Prev,
    /// Switch between the chart's alternative views
    SwitchView,
    ClearSelection,
    Reset,
    /// Live search text
    Search(String),
    /// Search confirmed with Enter
    Submit(String),
    /// Backspace on an empty search box
    PopTerm,
    Pan(i32, i32),
    ZoomIn,
    ZoomOut,
}

pub trait Chart {
    fn title(&self) -> &str;

    fn handle(&mut self, input: Input);

    fn render(&self, area: Rect, buf: &mut Buffer);

    /// One-line summary for the status bar
    fn status(&self) -> String;

    /// Type-ahead entries for the search box
    fn suggestions(&self, _query: &str) -> Vec<String> {
        Vec::new()
    }

    /// Chart-specific key hints
    fn keys(&self) -> &'static str {
        "↑↓ move  enter pin  / search"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ChartKind {
    Waffle,
    Network,
    Bubble,
    Leaderboard,
    WordCloud,
    Choropleth,
    FlowMap,
    Pictorial,
    Treemap,
    Proportional,
}

impl ChartKind {
    pub const ALL: [ChartKind; 10] = [
        ChartKind::Waffle,
        ChartKind::Network,
        ChartKind::Bubble,
        ChartKind::Leaderboard,
        ChartKind::WordCloud,
        ChartKind::Choropleth,
        ChartKind::FlowMap,
        ChartKind::Pictorial,
        ChartKind::Treemap,
        ChartKind::Proportional,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Waffle => "Publication Types",
            ChartKind::Network => "Co-authorship",
            ChartKind::Bubble => "Researchers",
            ChartKind::Leaderboard => "Leaderboard",
            ChartKind::WordCloud => "Topics",
            ChartKind::Choropleth => "Countries",
            ChartKind::FlowMap => "Flows",
            ChartKind::Pictorial => "Institutions",
            ChartKind::Treemap => "Treemap",
            ChartKind::Proportional => "Proportional",
        }
    }

    /// Build the chart from shared sources. A failed source leaves the chart in
    /// `Failed` without affecting the others.
    pub fn build(self, sources: &Sources, config: &Config) -> LoadState<Box<dyn Chart>> {
        fn boxed<C: Chart + 'static>(state: LoadState<C>) -> LoadState<Box<dyn Chart>> {
            match state {
                LoadState::Loaded(chart) => LoadState::Loaded(Box::new(chart)),
                LoadState::Failed(msg) => LoadState::Failed(msg),
            }
        }

        let started = std::time::Instant::now();
        let state = match self {
            ChartKind::Waffle => boxed(waffle::Waffle::build(sources, config)),
            ChartKind::Network => boxed(network::Network::build(sources, config)),
            ChartKind::Bubble => boxed(bubble::Bubble::build(sources, config)),
            ChartKind::Leaderboard => boxed(leaderboard::Leaderboard::build(sources, config)),
            ChartKind::WordCloud => boxed(wordcloud::WordCloud::build(sources, config)),
            ChartKind::Choropleth => boxed(choropleth::Choropleth::build(sources, config)),
            ChartKind::FlowMap => boxed(flowmap::FlowMap::build(sources, config)),
            ChartKind::Pictorial => boxed(pictorial::Pictorial::build(sources, config)),
            ChartKind::Treemap => boxed(institutions::Institutions::build(
                sources,
                config,
                institutions::Layout::Treemap,
            )),
            ChartKind::Proportional => boxed(institutions::Institutions::build(
                sources,
                config,
                institutions::Layout::Proportional,
            )),
        };
        match &state {
            LoadState::Loaded(_) => tracing::info!(
                chart = self.label(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "chart ready"
            ),
            LoadState::Failed(msg) => tracing::error!(chart = self.label(), error = %msg, "chart unavailable"),
        }
        state
    }
}

/// Shared routing for list-shaped charts: the cursor drives hover, Select pins,
/// Toggle flips selection, text drives search. Inputs it does not consume are
/// handed back to the caller.
pub(crate) fn route_list(
    filter: &mut FilterState,
    cursor: &mut Cursor,
    keys: &[String],
    input: Input,
) -> Option<Input> {
    let current = |c: &Cursor| c.get(keys.len()).map(|i| keys[i].clone());
    match input {
        Input::Up => {
            cursor.up();
            filter.apply(FilterEvent::Hover(current(&*cursor)));
        }
        Input::Down => {
            cursor.down(keys.len());
            filter.apply(FilterEvent::Hover(current(&*cursor)));
        }
        Input::Select => {
            if let Some(key) = current(&*cursor) {
                filter.apply(FilterEvent::Click(key));
            }
        }
        Input::Toggle => {
            if let Some(key) = current(&*cursor) {
                filter.apply(FilterEvent::ToggleSelection(key));
            }
        }
        Input::Escape => {
            filter.apply(FilterEvent::ClickElsewhere);
        }
        Input::ClearSelection => {
            filter.apply(FilterEvent::ClearSelection);
        }
        Input::Reset => {
            filter.apply(FilterEvent::Reset);
            cursor.reset();
        }
        Input::Search(text) | Input::Submit(text) => {
            filter.apply(FilterEvent::Search(text));
        }
        other => return Some(other),
    }
    None
}

/// Row cursor over a list that may shrink under filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn down(&mut self, len: usize) {
        if self.index + 1 < len {
            self.index += 1;
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Current index clamped to the list, `None` when empty
    pub fn get(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.index.min(len - 1))
    }

    /// First visible row so the cursor stays on screen
    pub fn scroll(&self, len: usize, height: usize) -> usize {
        match self.get(len) {
            Some(i) if height > 0 && i >= height => i + 1 - height,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_clamps() {
        let mut c = Cursor::default();
        assert_eq!(c.get(0), None);
        c.down(3);
        c.down(3);
        c.down(3);
        assert_eq!(c.get(3), Some(2));
        assert_eq!(c.get(1), Some(0));
        c.up();
        assert_eq!(c.get(3), Some(1));
    }

    #[test]
    fn test_cursor_scroll() {
        let mut c = Cursor::default();
        for _ in 0..9 {
            c.down(20);
        }
        assert_eq!(c.scroll(20, 5), 5);
        assert_eq!(c.scroll(20, 50), 0);
    }

    #[test]
    fn test_every_chart_fails_cleanly_without_sources() {
        let sources = Sources::from_tables(None, None, None);
        let config = Config::default();
        for kind in ChartKind::ALL {
            let state = kind.build(&sources, &config);
            assert!(state.error().is_some(), "{kind:?} should fail without its sources");
        }
    }
}
