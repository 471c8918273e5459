//! Interactive filter state and the presentational mapping derived from it.
//!
//! The mapping is a pure function of (state, entity): changing the state never
//! re-runs aggregation, and unknown keys simply do not match.

use std::collections::BTreeSet;

/// Which interaction currently drives the presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Default,
    Searching,
    CategoryFiltered,
    Pinned,
}

/// Discrete UI inputs that change filter state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    /// Replace the search text
    Search(String),
    /// Add the key to the selection, or remove it if present
    ToggleSelection(String),
    /// Make the key the only selected one
    SelectOnly(String),
    ClearSelection,
    /// Pin the key, or unpin it if it is already pinned
    Click(String),
    /// Click outside any entity: unpin
    ClickElsewhere,
    Hover(Option<String>),
    Reset,
}

/// Per-chart narrowing and highlighting criteria. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    search: String,
    selection: BTreeSet<String>,
    pinned: Option<String>,
    hovered: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a single selected key
    pub fn with_selection(key: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.selection.insert(key.into());
        state
    }

    pub fn apply(&mut self, event: FilterEvent) -> Mode {
        match event {
            FilterEvent::Search(text) => self.search = text,
            FilterEvent::ToggleSelection(key) => {
                if !self.selection.remove(&key) {
                    self.selection.insert(key);
                }
            }
            FilterEvent::SelectOnly(key) => {
                self.selection.clear();
                self.selection.insert(key);
            }
            FilterEvent::ClearSelection => self.selection.clear(),
            FilterEvent::Click(key) => {
                if self.pinned.as_deref() == Some(key.as_str()) {
                    self.pinned = None;
                } else {
                    self.pinned = Some(key);
                }
            }
            FilterEvent::ClickElsewhere => self.pinned = None,
            FilterEvent::Hover(key) => self.hovered = key,
            FilterEvent::Reset => *self = Self::default(),
        }
        self.mode()
    }

    /// Pinned > Searching > CategoryFiltered > Default
    pub fn mode(&self) -> Mode {
        if self.pinned.is_some() {
            Mode::Pinned
        } else if !self.search_term().is_empty() {
            Mode::Searching
        } else if !self.selection.is_empty() {
            Mode::CategoryFiltered
        } else {
            Mode::Default
        }
    }

    /// Raw search text as typed
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Normalized term used for matching
    pub fn search_term(&self) -> String {
        self.search.trim().to_lowercase()
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selection.contains(key)
    }

    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// The entity whose details are shown: the pin wins over hover
    pub fn focused(&self) -> Option<&str> {
        self.pinned().or_else(|| self.hovered())
    }

    pub fn matches_search(&self, label: &str) -> bool {
        let term = self.search_term();
        term.is_empty() || label.to_lowercase().contains(&term)
    }

    /// True when the selection is empty or any membership is selected
    pub fn belongs<'a>(&self, memberships: impl IntoIterator<Item = &'a str>) -> bool {
        self.selection.is_empty() || memberships.into_iter().any(|m| self.selection.contains(m))
    }
}

/// Base fill of an entity relative to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Member,
    NonMember,
}

/// Emphasis relative to search, pin and hover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Normal,
    Highlight,
    Dimmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visual {
    pub tone: Tone,
    pub emphasis: Emphasis,
    pub pinned: bool,
    pub hovered: bool,
}

impl Visual {
    pub const DEFAULT: Visual = Visual {
        tone: Tone::Member,
        emphasis: Emphasis::Normal,
        pinned: false,
        hovered: false,
    };

    pub fn is_dimmed(&self) -> bool {
        self.emphasis == Emphasis::Dimmed
    }

    pub fn is_highlighted(&self) -> bool {
        self.emphasis == Emphasis::Highlight
    }

    /// Opacity in [0, 1] the way the dashboards dim non-matches
    pub fn opacity(&self) -> f64 {
        match self.emphasis {
            Emphasis::Dimmed => 0.1,
            _ => 1.0,
        }
    }
}

/// Presentational mapping for one entity.
///
/// - selection non-empty and no membership selected → `NonMember` tone
/// - search non-empty: label match → `Highlight`, otherwise `Dimmed`
/// - the pinned entity is always highlighted; hover only counts with no pin
pub fn visual<'a>(
    state: &FilterState,
    key: &str,
    label: &str,
    memberships: impl IntoIterator<Item = &'a str>,
) -> Visual {
    let tone = if state.belongs(memberships) {
        Tone::Member
    } else {
        Tone::NonMember
    };

    let pinned = state.pinned() == Some(key);
    let hovered = state.pinned().is_none() && state.hovered() == Some(key);

    let emphasis = if pinned {
        Emphasis::Highlight
    } else if !state.search_term().is_empty() {
        if state.matches_search(label) {
            Emphasis::Highlight
        } else {
            Emphasis::Dimmed
        }
    } else if hovered {
        Emphasis::Highlight
    } else {
        Emphasis::Normal
    };

    Visual {
        tone,
        emphasis,
        pinned,
        hovered,
    }
}
