use super::network::NAME_COLUMNS;
use super::widgets::{self, heading, muted, truncate, ACCENT, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::split_list;
use crate::config::Config;
use crate::data::{LoadState, Sources};
use crate::error::LoadError;
use crate::filter::FilterState;
use crate::view::scale::hex;
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::{BTreeSet, HashMap, HashSet};

pub const NO_AFFILIATION: &str = "No Affiliation";
pub const OTHER_COUNTRY: &str = "Other";
const UNKNOWN_PERSON: &str = "Unknown";

const GLYPH: char = '♟';
const MATCH: &str = "#ff0007";
const FADED: &str = "#475569";
const CARD_WIDTH: u16 = 30;
const MAX_GLYPH_ROWS: usize = 4;

/// Country groupings offered by the location control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Territory {
    World,
    Italy,
    Europe,
    Asia,
    Usa,
}

impl Territory {
    pub const ALL: [Territory; 5] = [
        Territory::World,
        Territory::Italy,
        Territory::Europe,
        Territory::Asia,
        Territory::Usa,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Territory::World => "World",
            Territory::Italy => "Italy",
            Territory::Europe => "Europe",
            Territory::Asia => "Asia",
            Territory::Usa => "USA",
        }
    }

    /// Country codes in the territory; `None` admits everything
    pub fn codes(self) -> Option<&'static [&'static str]> {
        match self {
            Territory::World => None,
            Territory::Italy => Some(&["IT"]),
            Territory::Europe => Some(&[
                "IT", "FR", "DE", "GB", "ES", "NL", "PL", "DK", "FI", "SE", "NO", "CZ", "AT", "RE", "BE", "CH", "IE",
                "PT", "GR",
            ]),
            Territory::Asia => Some(&["CN", "JP", "KR", "VN", "PK", "AE", "ID", "TH", "SG", "IN"]),
            Territory::Usa => Some(&["US"]),
        }
    }

    pub fn admits(self, country: &str) -> bool {
        self.codes().map_or(true, |codes| codes.contains(&country))
    }

    fn step(self, by: usize) -> Territory {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + by) % Self::ALL.len()]
    }

    pub fn next(self) -> Territory {
        self.step(1)
    }

    pub fn prev(self) -> Territory {
        self.step(Self::ALL.len() - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub name: String,
    pub people: Vec<String>,
    pub country: String,
}

/// Researchers drawn as glyphs, grouped into one card per institution
pub struct Pictorial {
    cards: Vec<Card>,
    names: Vec<String>,
    territory: Territory,
    keys: Vec<String>,
    filter: FilterState,
    cursor: Cursor,
    suggestion_limit: usize,
}

impl Pictorial {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let people = sources.people()?;

        // Later rows win, like repeated map inserts
        let mut country_by_name: HashMap<String, String> = HashMap::new();
        match sources.coords() {
            Ok(coords) => {
                for row in coords.rows() {
                    if let (Some(name), Some(cc)) = (row.field("display_name"), row.field("country_code")) {
                        country_by_name.insert(name.to_string(), cc.to_uppercase());
                    }
                }
            }
            Err(e) => tracing::warn!(reason = %e, "no institution coordinates, every card falls under Other"),
        }

        let mut cards: Vec<Card> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();
        for row in people.rows() {
            let person = row.first_field(&NAME_COLUMNS).unwrap_or(UNKNOWN_PERSON);
            let mut affiliations: Vec<&str> = Vec::new();
            for inst in split_list(row.get("institutions").unwrap_or(""), ';') {
                if !affiliations.contains(&inst) {
                    affiliations.push(inst);
                }
            }
            if affiliations.is_empty() {
                affiliations.push(NO_AFFILIATION);
            }
            for inst in affiliations {
                let i = *slot.entry(inst.to_string()).or_insert_with(|| {
                    cards.push(Card {
                        name: inst.to_string(),
                        people: Vec::new(),
                        country: country_by_name
                            .get(inst)
                            .cloned()
                            .unwrap_or_else(|| OTHER_COUNTRY.to_string()),
                    });
                    cards.len() - 1
                });
                cards[i].people.push(person.to_string());
            }
        }
        // Stable: equal sizes keep first-seen order
        cards.sort_by(|a, b| b.people.len().cmp(&a.people.len()));

        let names: Vec<String> = people
            .rows()
            .iter()
            .filter_map(|row| row.field("display_name_or_alias").map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::debug!(cards = cards.len(), people = people.len(), "pictorial built");

        let mut chart = Self {
            cards,
            names,
            territory: Territory::Italy,
            keys: Vec::new(),
            filter: FilterState::new(),
            cursor: Cursor::default(),
            suggestion_limit: config.people_suggestions,
        };
        chart.refresh_keys();
        Ok(chart)
    }

    pub fn territory(&self) -> Territory {
        self.territory
    }

    /// Cards in the territory that list a person matching the search
    pub fn visible(&self) -> Vec<&Card> {
        let term = self.filter.search_term();
        self.cards
            .iter()
            .filter(|card| self.territory.admits(&card.country))
            .filter(|card| term.is_empty() || card.people.iter().any(|p| p.to_lowercase().contains(&term)))
            .collect()
    }

    /// "N Institutions - M Researchers" over the visible cards
    pub fn subtitle(&self) -> String {
        let visible = self.visible();
        let researchers: HashSet<&str> = visible
            .iter()
            .flat_map(|card| card.people.iter().map(String::as_str))
            .collect();
        format!("{} Institutions - {} Researchers", visible.len(), researchers.len())
    }

    fn refresh_keys(&mut self) {
        self.keys = self.visible().iter().map(|c| c.name.clone()).collect();
    }

    fn card(&self, name: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.name == name)
    }

    fn set_territory(&mut self, territory: Territory) {
        self.territory = territory;
        self.cursor.reset();
    }

    fn glyph_style(&self, person: &str) -> Style {
        let term = self.filter.search_term();
        if term.is_empty() {
            Style::default()
        } else if person.to_lowercase().contains(&term) {
            Style::default().fg(hex(MATCH)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(hex(FADED))
        }
    }

    fn glyph_lines(&self, card: &Card, width: usize) -> Vec<Line<'static>> {
        let width = width.max(1);
        let shown = (width * MAX_GLYPH_ROWS).min(card.people.len());
        let mut lines: Vec<Line> = card.people[..shown]
            .chunks(width)
            .map(|row| {
                Line::from(
                    row.iter()
                        .map(|p| Span::styled(GLYPH.to_string(), self.glyph_style(p)))
                        .collect::<Vec<_>>(),
                )
            })
            .collect();
        if shown < card.people.len() {
            lines.push(muted(format!("+{} more", card.people.len() - shown)));
        }
        lines
    }

    fn card_height(&self, card: &Card, inner: usize) -> u16 {
        let rows = card.people.len().div_ceil(inner.max(1)).min(MAX_GLYPH_ROWS);
        let overflow = usize::from(card.people.len() > inner.max(1) * MAX_GLYPH_ROWS);
        (rows + overflow + 2) as u16
    }

    /// Card rectangles laid out in rows, relative to the grid origin
    fn layout(&self, cards: &[&Card], width: u16) -> Vec<Rect> {
        let columns = (width / CARD_WIDTH).max(1);
        let card_width = width / columns;
        let inner = card_width.saturating_sub(2) as usize;
        let mut slots = Vec::with_capacity(cards.len());
        let mut y = 0u16;
        for row in cards.chunks(columns as usize) {
            let height = row.iter().map(|c| self.card_height(c, inner)).max().unwrap_or(2);
            for (i, _) in row.iter().enumerate() {
                slots.push(Rect::new(i as u16 * card_width, y, card_width, height));
            }
            y = y.saturating_add(height);
        }
        slots
    }

    fn render_grid(&self, cards: &[&Card], area: Rect, buf: &mut Buffer) {
        let slots = self.layout(cards, area.width);
        let focused = self.filter.focused();
        let cursor = self.cursor.get(cards.len());
        let offset = cursor
            .and_then(|i| slots.get(i))
            .map_or(0, |s| (s.y + s.height).saturating_sub(area.height).min(s.y));

        for (i, (card, slot)) in cards.iter().zip(&slots).enumerate() {
            if slot.y < offset || slot.y - offset + slot.height > area.height {
                continue;
            }
            let rect = Rect::new(area.x + slot.x, area.y + slot.y - offset, slot.width, slot.height);
            let border = if focused == Some(card.name.as_str()) {
                Style::default().fg(ACCENT)
            } else if cursor == Some(i) {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(MUTED)
            };
            let inner_width = slot.width.saturating_sub(2) as usize;
            let count = card.people.len().to_string();
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(truncate(&card.name, inner_width.saturating_sub(count.len() + 1)))
                .title(Line::from(count).right_aligned());
            Paragraph::new(self.glyph_lines(card, inner_width))
                .block(block)
                .render(rect, buf);
        }
    }

    fn panel_lines(&self, card: &Card) -> Vec<Line<'static>> {
        let mut lines = vec![
            heading(card.name.clone()),
            muted(format!("{} - {} researchers", card.country, card.people.len())),
            Line::raw(""),
        ];
        lines.extend(
            card.people
                .iter()
                .map(|p| Line::styled(p.clone(), self.glyph_style(p))),
        );
        lines
    }
}

impl Chart for Pictorial {
    fn title(&self) -> &str {
        "Researchers involved in RAISE"
    }

    fn handle(&mut self, input: Input) {
        let input = match input {
            Input::Search(text) | Input::Submit(text) => {
                self.cursor.reset();
                Input::Search(text)
            }
            Input::Reset => {
                self.territory = Territory::Italy;
                Input::Reset
            }
            other => other,
        };
        match route_list(&mut self.filter, &mut self.cursor, &self.keys, input) {
            Some(Input::Next) => self.set_territory(self.territory.next()),
            Some(Input::Prev) => self.set_territory(self.territory.prev()),
            _ => {}
        }
        self.refresh_keys();
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        let (body, side) = widgets::with_sidebar(area, 34);
        let (header, grid) = widgets::with_header(body, 2);
        let tabs: Vec<Span> = std::iter::once(Span::styled("Location: ", Style::default().fg(MUTED)))
            .chain(Territory::ALL.iter().map(|t| {
                let style = if *t == self.territory {
                    Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
                } else {
                    Style::default().fg(MUTED)
                };
                Span::styled(format!(" {} ", t.label()), style)
            }))
            .collect();
        buf.set_line(header.x, header.y, &Line::from(tabs), header.width);
        if header.height > 1 {
            buf.set_line(header.x, header.y + 1, &muted(self.subtitle()), header.width);
        }

        let cards = self.visible();
        if cards.is_empty() {
            widgets::empty_state(&format!("No matches found for {}", self.territory.label()), grid, buf);
        } else {
            self.render_grid(&cards, grid, buf);
        }

        match self.filter.focused().and_then(|name| self.card(name)) {
            Some(card) => widgets::panel("Institution", self.panel_lines(card), side, buf),
            None => widgets::panel(
                "Institution",
                vec![muted("Select a card to list its researchers")],
                side,
                buf,
            ),
        }
    }

    fn status(&self) -> String {
        format!("{}: {}", self.territory.label(), self.subtitle())
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(&self.names, query, self.suggestion_limit, &[])
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ card  enter pin  [ ] location  / search person"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    const PEOPLE: &str = "openalex_id,display_name_or_alias,institutions
A1,Ada,University of Genoa; IIT; University of Genoa
A2,Bob,University of Genoa
A3,Carla,Sorbonne
A4,Dan,
A5,,IIT
";

    const COORDS: &str = "id,display_name,country_code,coords
I1,University of Genoa,it,\"44.4, 8.9\"
I2,IIT,IT,\"44.4, 8.9\"
I3,Sorbonne,FR,\"48.8, 2.3\"
";

    fn chart() -> Pictorial {
        let sources = Sources::from_tables(
            None,
            Some(Table::from_csv("people.csv", PEOPLE).unwrap()),
            Some(Table::from_csv("coords.csv", COORDS).unwrap()),
        );
        match Pictorial::build(&sources, &Config::default()) {
            LoadState::Loaded(c) => c,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    fn visible_names(c: &Pictorial) -> Vec<&str> {
        c.visible().iter().map(|card| card.name.as_str()).collect()
    }

    #[test]
    fn test_cards_group_people_by_institution() {
        let c = chart();
        let names: Vec<&str> = c.cards.iter().map(|card| card.name.as_str()).collect();
        assert_eq!(names, vec!["University of Genoa", "IIT", "Sorbonne", NO_AFFILIATION]);
        assert_eq!(c.cards[0].people, vec!["Ada", "Bob"]);
        assert_eq!(c.cards[1].people, vec!["Ada", "Unknown"]);
        assert_eq!(c.cards[0].country, "IT");
        assert_eq!(c.cards[3].country, OTHER_COUNTRY);
    }

    #[test]
    fn test_default_territory_is_italy() {
        let c = chart();
        assert_eq!(c.territory(), Territory::Italy);
        assert_eq!(visible_names(&c), vec!["University of Genoa", "IIT"]);
        assert_eq!(c.subtitle(), "2 Institutions - 3 Researchers");
    }

    #[test]
    fn test_territory_cycle_and_world() {
        let mut c = chart();
        c.handle(Input::Prev);
        assert_eq!(c.territory(), Territory::World);
        assert_eq!(c.subtitle(), "4 Institutions - 5 Researchers");
        c.handle(Input::Next);
        c.handle(Input::Next);
        assert_eq!(c.territory(), Territory::Europe);
        assert_eq!(visible_names(&c), vec!["University of Genoa", "IIT", "Sorbonne"]);
        assert!(Territory::Usa.next() == Territory::World);
    }

    #[test]
    fn test_search_keeps_cards_with_matching_people() {
        let mut c = chart();
        c.handle(Input::Search("car".into()));
        assert!(c.visible().is_empty());
        assert!(c.keys.is_empty());

        c.handle(Input::Prev);
        assert_eq!(visible_names(&c), vec!["Sorbonne"]);
        assert_eq!(c.keys, vec!["Sorbonne"]);
        assert_eq!(c.glyph_style("Carla").fg, Some(hex(MATCH)));
        assert_eq!(c.glyph_style("Dan").fg, Some(hex(FADED)));

        c.handle(Input::Reset);
        assert_eq!(c.territory(), Territory::Italy);
        assert_eq!(c.glyph_style("Dan"), Style::default());
    }

    #[test]
    fn test_pin_and_suggestions() {
        let mut c = chart();
        c.handle(Input::Down);
        c.handle(Input::Select);
        assert_eq!(c.filter.pinned(), Some("IIT"));
        assert_eq!(c.suggestions("a"), vec!["Ada", "Carla", "Dan"]);
        assert!(c.suggestions(" ").is_empty());
    }

    #[test]
    fn test_layout_and_render() {
        let c = chart();
        let cards = c.visible();
        let slots = c.layout(&cards, 60);
        assert_eq!(slots.len(), 2);
        assert_eq!((slots[0].x, slots[1].x), (0, 30));
        assert_eq!(slots[0].height, 3);

        let area = Rect::new(0, 0, 100, 20);
        let mut buf = Buffer::empty(area);
        c.render(area, &mut buf);
    }
}
