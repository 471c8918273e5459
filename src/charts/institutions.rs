//! Institutional output per publication year, as a squarified treemap or as a
//! proportional strip with ranked shares. Both views share the same reduction:
//! top N, allow-listed names and picked terms stay visible, the rest folds into
//! Others.

use super::widgets::{self, heading, muted, put, truncate, ACCENT, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::{nested, ranked, split_list, Counts};
use crate::config::Config;
use crate::data::{parse_work, LoadState, Row, Sources};
use crate::error::LoadError;
use crate::filter::{FilterEvent, FilterState};
use crate::view::scale::{fnv1a, hex, palette, text_on, OrdinalPalette};
use crate::view::{
    allocate_cells, normalize_label, suggest, top_n_with_others, AllowList, Hierarchy, Leaf, TopN, OTHERS_KEY,
};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::{BTreeSet, HashMap};

pub const TOTAL: &str = "Total";

const TREEMAP_PALETTE: [&str; 15] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7", "#9c755f", "#bab0ab",
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
];
const PROPORTIONAL_PALETTE: [&str; 12] = [
    "#6a97db", "#e06666", "#47c290", "#e9ac48", "#6d6fe1", "#db6bad", "#996fdd", "#44cbb9", "#ec8643", "#94cb4f",
    "#4bb4ca", "#798797",
];
const OTHERS_FILL: &str = "#e5e7eb";
const OTHERS_TEXT: &str = "#6b7280";

/// A terminal cell is roughly twice as tall as it is wide
const CELL_ASPECT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Treemap,
    Proportional,
}

/// Squarified treemap of `values` over `area`, one rectangle per value in input order.
///
/// Tile edges are rounded from shared fractional boundaries, so the tiles
/// cover the area exactly. Non-positive values get an empty rectangle.
pub fn squarify(values: &[f64], area: Rect) -> Vec<Rect> {
    let mut out = vec![Rect::new(area.x, area.y, 0, 0); values.len()];
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 || area.width == 0 || area.height == 0 {
        return out;
    }

    let (mut x, mut y) = (0.0, 0.0);
    let (mut w, mut h) = (area.width as f64, area.height as f64 * CELL_ASPECT);
    let scale = w * h / total;
    let items: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .map(|(i, v)| (i, v * scale))
        .collect();

    let mut start = 0;
    while start < items.len() {
        let side = w.min(h);
        let mut end = start + 1;
        while end < items.len() && worst(&items[start..=end], side) <= worst(&items[start..end], side) {
            end += 1;
        }
        let row = &items[start..end];
        let sum: f64 = row.iter().map(|(_, a)| a).sum();
        let last = row.len() - 1;
        if w >= h {
            let width = if h > 0.0 { (sum / h).min(w) } else { w };
            let mut cy = y;
            for (k, &(i, a)) in row.iter().enumerate() {
                let tile = if k == last { y + h - cy } else { a / width.max(f64::EPSILON) };
                out[i] = to_cells(area, x, cy, width, tile);
                cy += tile;
            }
            x += width;
            w -= width;
        } else {
            let height = if w > 0.0 { (sum / w).min(h) } else { h };
            let mut cx = x;
            for (k, &(i, a)) in row.iter().enumerate() {
                let tile = if k == last { x + w - cx } else { a / height.max(f64::EPSILON) };
                out[i] = to_cells(area, cx, y, tile, height);
                cx += tile;
            }
            y += height;
            h -= height;
        }
        start = end;
    }
    out
}

/// Worst aspect ratio of a row laid along `side`
fn worst(row: &[(usize, f64)], side: f64) -> f64 {
    let sum: f64 = row.iter().map(|(_, a)| a).sum();
    let (min, max) = row
        .iter()
        .fold((f64::MAX, 0.0f64), |(lo, hi), (_, a)| (lo.min(*a), hi.max(*a)));
    let (s2, side2) = (sum * sum, side * side);
    if s2 <= 0.0 || min <= 0.0 {
        return f64::MAX;
    }
    (side2 * max / s2).max(s2 / (side2 * min))
}

fn to_cells(area: Rect, x: f64, y: f64, w: f64, h: f64) -> Rect {
    let (x0, x1) = (x.round() as u16, (x + w).round() as u16);
    let (y0, y1) = ((y / CELL_ASPECT).round() as u16, ((y + h) / CELL_ASPECT).round() as u16);
    Rect::new(area.x + x0, area.y + y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

/// Word-wrap a label into at most `lines` lines of `width` characters
fn wrap_label(label: &str, width: usize, lines: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in label.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out.truncate(lines);
    out.into_iter().map(|l| truncate(&l, width)).collect()
}

/// Publication counts per institution for each year tab
pub struct Institutions {
    layout: Layout,
    counts: HashMap<String, Counts>,
    tabs: Vec<String>,
    all: Vec<String>,
    allow: AllowList,
    top_n: usize,
    suggestion_limit: usize,
    ordinal: OrdinalPalette,
    year: usize,
    terms: Vec<String>,
    view: Hierarchy,
    keys: Vec<String>,
    filter: FilterState,
    cursor: Cursor,
}

/// Institution names of a work row, from the `institutions` column or the embedded authorships
fn row_institutions(row: &Row) -> BTreeSet<String> {
    match row.field("institutions") {
        Some(list) => split_list(list, ';').map(str::to_string).collect(),
        None => row
            .field("raw_json")
            .and_then(parse_work)
            .map(|work| {
                work.institutions()
                    .filter_map(|i| i.name())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

impl Institutions {
    pub fn build(sources: &Sources, config: &Config, layout: Layout) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config, layout))
    }

    fn try_build(sources: &Sources, config: &Config, layout: Layout) -> Result<Self, LoadError> {
        let works = sources.works()?;
        works.require_any(&["institutions", "raw_json"])?;

        let tagged: Vec<(String, BTreeSet<String>)> = works
            .rows()
            .iter()
            .filter_map(|row| {
                let year = row
                    .field("publication_year")
                    .and_then(|y| y.parse::<f64>().ok())
                    .map(|y| (y as i64).to_string())
                    .filter(|y| config.years.contains(y))?;
                Some((year, row_institutions(row)))
            })
            .collect();

        let mut counts = nested(tagged.iter(), |(year, names)| {
            names
                .iter()
                .flat_map(|name| [(year.clone(), name.clone()), (TOTAL.to_string(), name.clone())])
                .collect::<Vec<_>>()
        });
        for tab in config.years.iter().map(String::as_str).chain([TOTAL]) {
            counts.entry(tab.to_string()).or_default();
        }
        let all: BTreeSet<String> = tagged
            .into_iter()
            .flat_map(|(_, names)| names)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut all: Vec<String> = all.into_iter().collect();
        all.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

        let patterns: Vec<&str> = config.allow_list.iter().map(String::as_str).collect();
        let ordinal = OrdinalPalette::new(
            &palette(&PROPORTIONAL_PALETTE),
            counts.get(TOTAL).map(ranked).unwrap_or_default().into_iter().map(|(k, _)| k),
        );
        let mut tabs = config.years.clone();
        tabs.push(TOTAL.to_string());

        tracing::debug!(institutions = all.len(), layout = ?layout, "institution counts built");

        let mut chart = Self {
            layout,
            counts,
            year: tabs.len() - 1,
            tabs,
            all,
            allow: AllowList::from_patterns(&patterns),
            top_n: config.top_n,
            suggestion_limit: config.term_suggestions,
            ordinal,
            terms: Vec::new(),
            view: Hierarchy::default(),
            keys: Vec::new(),
            filter: FilterState::new(),
            cursor: Cursor::default(),
        };
        chart.rebuild();
        Ok(chart)
    }

    pub fn year(&self) -> &str {
        &self.tabs[self.year]
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn view(&self) -> &Hierarchy {
        &self.view
    }

    /// Add a term unless an equal one (ignoring case) is already picked
    pub fn add_term(&mut self, term: &str) -> bool {
        let term = normalize_label(term);
        let lower = term.to_lowercase();
        if term.is_empty() || self.terms.iter().any(|t| t.to_lowercase() == lower) {
            return false;
        }
        self.terms.push(term);
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let empty = Counts::new();
        let counts = self.counts.get(self.year()).unwrap_or(&empty);
        let items = top_n_with_others(
            counts,
            &TopN {
                n: self.top_n,
                terms: &self.terms,
                allow: &self.allow,
            },
        );
        self.view = Hierarchy::from_items(&items);
        self.keys = self.view.leaves.iter().map(|l| l.key().to_string()).collect();
    }

    fn set_year(&mut self, index: usize) {
        self.year = index % self.tabs.len();
        self.rebuild();
    }

    fn count(&self, label: &str) -> u64 {
        self.counts
            .get(self.year())
            .and_then(|c| c.get(label))
            .copied()
            .unwrap_or(0)
    }

    fn fill(&self, leaf: &Leaf) -> Color {
        if leaf.is_others {
            return hex(OTHERS_FILL);
        }
        match self.layout {
            Layout::Treemap => hex(TREEMAP_PALETTE[fnv1a(&leaf.label) as usize % TREEMAP_PALETTE.len()]),
            Layout::Proportional => self.ordinal.color(&leaf.label),
        }
    }

    fn ink(&self, leaf: &Leaf, fill: Color) -> Color {
        if leaf.is_others {
            hex(OTHERS_TEXT)
        } else {
            text_on(fill)
        }
    }

    fn share(&self, leaf: &Leaf) -> f64 {
        let total = self.view.total();
        if total > 0.0 {
            leaf.value / total
        } else {
            0.0
        }
    }

    fn header_lines(&self) -> Vec<Line<'static>> {
        let mut tabs = vec![Span::styled("Year: ", Style::default().fg(MUTED))];
        for (i, tab) in self.tabs.iter().enumerate() {
            let style = if i == self.year {
                Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(MUTED)
            };
            tabs.push(Span::styled(format!(" {tab} "), style));
        }
        let mut pills = vec![Span::styled("Terms: ", Style::default().fg(MUTED))];
        if self.terms.is_empty() {
            pills.push(Span::styled("none", Style::default().fg(MUTED)));
        }
        for term in &self.terms {
            pills.push(Span::styled(format!(" {term} × "), Style::default().fg(Color::Black).bg(ACCENT)));
            pills.push(Span::raw(" "));
        }
        vec![
            Line::from(tabs),
            heading(format!("Institutional Output {}", self.year())),
            Line::from(pills),
        ]
    }

    fn render_treemap(&self, area: Rect, buf: &mut Buffer) {
        let values: Vec<f64> = self.view.leaves.iter().map(|l| l.value).collect();
        let tiles = squarify(&values, area);
        let focused = self.filter.focused();
        for (leaf, tile) in self.view.leaves.iter().zip(tiles) {
            if tile.width == 0 || tile.height == 0 {
                continue;
            }
            let fill = self.fill(leaf);
            let ink = self.ink(leaf, fill);
            let mut style = Style::default().bg(fill).fg(ink);
            if focused == Some(leaf.key()) {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            buf.set_style(tile, style);
            for y in tile.top()..tile.bottom() {
                for x in tile.left()..tile.right() {
                    buf[(x, y)].set_char(' ');
                }
            }

            let inset = u16::from(tile.width > 1);
            let label_width = tile.width.saturating_sub(1) as usize;
            let label_lines = tile.height.saturating_sub(1).max(1) as usize;
            for (i, line) in wrap_label(&leaf.label, label_width, label_lines).iter().enumerate() {
                put(buf, tile, inset, i as u16, line, style);
            }
            if tile.height >= 3 && tile.width >= 8 {
                let pubs = format!("{} pubs", leaf.value.round() as u64);
                put(buf, tile, 1, tile.height - 1, &pubs, style.remove_modifier(Modifier::UNDERLINED));
            }
            if focused == Some(leaf.key()) {
                put(buf, tile, 0, 0, "▶", style.fg(ACCENT));
            }
        }
    }

    fn render_proportional(&self, area: Rect, buf: &mut Buffer) {
        let (strip, list) = widgets::with_header(area, 3);
        let weights: Vec<(String, u64)> = self
            .view
            .leaves
            .iter()
            .map(|l| (l.key().to_string(), (l.value * 2.0).round() as u64))
            .collect();
        let mut x = 0u16;
        for (alloc, leaf) in allocate_cells(&weights, strip.width as usize).iter().zip(&self.view.leaves) {
            let style = Style::default().fg(self.fill(leaf));
            for _ in 0..alloc.cells {
                for y in 0..strip.height.saturating_sub(1) {
                    put(buf, strip, x, y, "█", style);
                }
                x += 1;
            }
        }

        let height = list.height as usize;
        let start = self.cursor.scroll(self.view.leaves.len(), height);
        let name_width = (list.width / 3).max(12) as usize;
        let focused = self.filter.focused();
        for (i, leaf) in self.view.leaves.iter().enumerate().skip(start).take(height) {
            let y = (i - start) as u16;
            let fill = self.fill(leaf);
            let mut name_style = Style::default();
            if focused == Some(leaf.key()) {
                name_style = name_style.fg(ACCENT).add_modifier(Modifier::BOLD);
            }
            put(buf, list, 0, y, "■", Style::default().fg(fill));
            put(buf, list, 2, y, &truncate(&leaf.label, name_width), name_style);
            let share = self.share(leaf);
            let info_x = 3 + name_width as u16;
            let written = put(
                buf,
                list,
                info_x,
                y,
                &format!("{:>6} {:>5.1}% ", leaf.value.round() as u64, share * 100.0),
                Style::default().fg(MUTED),
            );
            let bar_width = list.width.saturating_sub(info_x + written);
            put(buf, list, info_x + written, y, &widgets::bar(share, 1.0, bar_width), Style::default().fg(fill));
        }
    }

    fn panel_lines(&self, label: &str) -> Vec<Line<'static>> {
        let Some(leaf) = self.view.leaves.iter().find(|l| l.key() == label) else {
            return vec![muted("No data available")];
        };
        let mut lines = vec![heading(leaf.label.clone())];
        if leaf.is_others {
            let folded = self.view.leaves.iter().filter(|l| !l.is_others).count();
            lines.push(muted(format!("Everything outside the {folded} named institutions")));
        } else {
            lines.push(Line::raw(format!("{} publications in {}", self.count(label), self.year())));
            if self.allow.matches(label) {
                lines.push(muted("Always shown"));
            }
        }
        lines.push(muted(format!("{:.1}% of the view", self.share(leaf) * 100.0)));
        lines
    }
}

impl Chart for Institutions {
    fn title(&self) -> &str {
        match self.layout {
            Layout::Treemap => "Institutional Output",
            Layout::Proportional => "Institutional Output (proportional)",
        }
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Next => self.set_year(self.year + 1),
            Input::Prev => self.set_year(self.year + self.tabs.len() - 1),
            Input::Submit(text) => {
                // Enter picks the first suggestion, like the dropdown
                if let Some(first) = self.suggestions(&text).into_iter().next() {
                    self.add_term(&first);
                }
                self.filter.apply(FilterEvent::Search(String::new()));
            }
            Input::PopTerm => {
                if self.terms.pop().is_some() {
                    self.rebuild();
                }
            }
            Input::ClearSelection => {
                self.terms.clear();
                self.rebuild();
            }
            Input::Reset => {
                self.terms.clear();
                self.set_year(self.tabs.len() - 1);
                route_list(&mut self.filter, &mut self.cursor, &self.keys, Input::Reset);
            }
            other => {
                route_list(&mut self.filter, &mut self.cursor, &self.keys, other);
            }
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        let (body, side) = widgets::with_sidebar(area, 32);
        let (header, chart) = widgets::with_header(body, 3);
        for (i, line) in self.header_lines().iter().enumerate() {
            if (i as u16) < header.height {
                buf.set_line(header.x, header.y + i as u16, line, header.width);
            }
        }
        if self.view.is_empty() {
            widgets::empty_state("No data available", chart, buf);
        } else {
            match self.layout {
                Layout::Treemap => self.render_treemap(chart, buf),
                Layout::Proportional => self.render_proportional(chart, buf),
            }
        }
        match self.filter.focused() {
            Some(label) => widgets::panel("Institution", self.panel_lines(label), side, buf),
            None => widgets::panel(
                "Institution",
                vec![
                    muted("↑↓ to inspect a tile"),
                    muted("/ then Enter adds a term"),
                    muted("Backspace on empty input removes the last"),
                ],
                side,
                buf,
            ),
        }
    }

    fn status(&self) -> String {
        let named = self.view.leaves.iter().filter(|l| !l.is_others).count();
        format!("{} - {named} institutions - {} terms", self.year(), self.terms.len())
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(&self.all, &normalize_label(query), self.suggestion_limit, &self.terms)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ tile  enter pin  [ ] year  / add term  ⌫ remove term  c clear terms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn works_csv() -> String {
        let json = r#"{"authorships":[{"institutions":[{"display_name":"Sorbonne"},{"display_name":"MIT"}]},{"institutions":[{"display_name":"MIT"}]}]}"#;
        format!(
            "publication_year,institutions,raw_json\n\
             2023,University of Genoa; IIT,\n\
             2024,University of Genoa; University of Genoa,\n\
             2024,,\"{}\"\n\
             2022,Old Uni,\n\
             2025,Sorbonne,\n",
            json.replace('"', "\"\"")
        )
    }

    fn chart(layout: Layout, top_n: usize) -> Institutions {
        let sources = Sources::from_tables(Some(Table::from_csv("works.csv", &works_csv()).unwrap()), None, None);
        let config = Config {
            top_n,
            ..Config::default()
        };
        match Institutions::build(&sources, &config, layout) {
            LoadState::Loaded(c) => c,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    fn labels(c: &Institutions) -> Vec<&str> {
        c.view().leaves.iter().map(|l| l.label.as_str()).collect()
    }

    #[test]
    fn test_total_is_sum_of_years() {
        let c = chart(Layout::Treemap, 12);
        for name in &c.all {
            let per_year: u64 = ["2023", "2024", "2025"]
                .iter()
                .map(|y| c.counts[*y].get(name).copied().unwrap_or(0))
                .sum();
            assert_eq!(c.counts[TOTAL][name], per_year, "{name}");
        }
        assert!(c.counts.contains_key("2025"));
    }

    #[test]
    fn test_counts_per_year_and_total() {
        let c = chart(Layout::Treemap, 12);
        assert_eq!(c.year(), TOTAL);
        assert_eq!(c.count("University of Genoa"), 2);
        assert_eq!(c.count("MIT"), 1);
        assert_eq!(c.count("Old Uni"), 0);
        assert_eq!(c.all, vec!["IIT", "MIT", "Sorbonne", "University of Genoa"]);

        let mut c = c;
        c.handle(Input::Next);
        assert_eq!(c.year(), "2023");
        c.handle(Input::Next);
        assert_eq!(c.year(), "2024");
        assert_eq!(labels(&c), vec!["MIT", "Sorbonne", "University of Genoa"]);
    }

    #[test]
    fn test_allow_list_and_others() {
        let c = chart(Layout::Treemap, 1);
        assert_eq!(labels(&c), vec!["Sorbonne", "University of Genoa", "IIT", "Others"]);
        let others = c.view().leaves.last().unwrap();
        assert!(others.is_others);
        assert_eq!(others.value, 1.0);
    }

    #[test]
    fn test_real_institution_named_others_stays_distinct() {
        let csv = "publication_year,institutions\n2023,Others\n2024,Others\n2023,Alpha\n2023,Beta\n";
        let sources = Sources::from_tables(Some(Table::from_csv("works.csv", csv).unwrap()), None, None);
        let config = Config { top_n: 1, ..Config::default() };
        let mut c = match Institutions::build(&sources, &config, Layout::Treemap) {
            LoadState::Loaded(c) => c,
            LoadState::Failed(msg) => panic!("{msg}"),
        };
        assert_eq!(labels(&c), vec!["Others", "Others"]);
        assert_eq!(c.keys, vec!["Others".to_string(), OTHERS_KEY.to_string()]);

        let text = |lines: Vec<Line<'static>>| -> String {
            lines
                .iter()
                .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert!(text(c.panel_lines("Others")).contains("2 publications in Total"));
        c.handle(Input::Down);
        assert_eq!(c.filter.focused(), Some(OTHERS_KEY));
        assert!(text(c.panel_lines(OTHERS_KEY)).contains("Everything outside the 1 named institutions"));
    }

    #[test]
    fn test_terms_pills() {
        let mut c = chart(Layout::Treemap, 1);
        c.handle(Input::Submit("mi".into()));
        assert_eq!(c.terms(), ["MIT".to_string()]);
        assert!(!labels(&c).contains(&"Others"));
        assert!(c.suggestions("mi").is_empty());
        assert!(!c.add_term("  mit "));

        c.handle(Input::Submit("zzz".into()));
        assert_eq!(c.terms().len(), 1);

        c.handle(Input::PopTerm);
        assert!(c.terms().is_empty());
        assert!(labels(&c).contains(&"Others"));
        c.handle(Input::PopTerm);
        assert!(c.terms().is_empty());
    }

    #[test]
    fn test_reset_returns_to_total() {
        let mut c = chart(Layout::Proportional, 1);
        c.handle(Input::Prev);
        assert_eq!(c.year(), "2025");
        c.add_term("MIT");
        c.handle(Input::Reset);
        assert_eq!(c.year(), TOTAL);
        assert!(c.terms().is_empty());
    }

    #[test]
    fn test_colors_by_layout() {
        let tree = chart(Layout::Treemap, 12);
        let leaf = &tree.view().leaves[0];
        let expected = hex(TREEMAP_PALETTE[fnv1a(&leaf.label) as usize % TREEMAP_PALETTE.len()]);
        assert_eq!(tree.fill(leaf), expected);

        let prop = chart(Layout::Proportional, 1);
        let others = prop.view().leaves.last().unwrap();
        assert_eq!(prop.fill(others), hex(OTHERS_FILL));
        // Most published first in the Total ranking takes the first color
        assert_eq!(prop.fill(&prop.view().leaves[0]), hex(PROPORTIONAL_PALETTE[0]));
    }

    #[test]
    fn test_wrap_label() {
        assert_eq!(wrap_label("University of Genoa", 10, 3), vec!["University", "of Genoa"]);
        assert_eq!(wrap_label("University of Genoa", 10, 1), vec!["University"]);
        assert_eq!(wrap_label("Supercalifragilistic", 6, 2), vec!["Super…"]);
    }

    #[test]
    fn test_squarify_single_tile_fills_area() {
        let area = Rect::new(3, 2, 40, 10);
        assert_eq!(squarify(&[5.0], area), vec![area]);
        assert_eq!(squarify(&[0.0], area)[0].area(), 0);
    }

    #[test]
    fn test_render_both_layouts() {
        for layout in [Layout::Treemap, Layout::Proportional] {
            let mut c = chart(layout, 1);
            c.handle(Input::Down);
            let area = Rect::new(0, 0, 100, 30);
            let mut buf = Buffer::empty(area);
            c.render(area, &mut buf);
        }
    }

    proptest! {
        #[test]
        fn prop_squarify_tiles_cover_area(
            values in proptest::collection::vec(1u32..500, 1..20),
            width in 10u16..120,
            height in 5u16..40,
        ) {
            let area = Rect::new(1, 1, width, height);
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let tiles = squarify(&values, area);
            prop_assert_eq!(tiles.len(), values.len());
            let covered: u32 = tiles.iter().map(|t| t.width as u32 * t.height as u32).sum();
            prop_assert_eq!(covered, width as u32 * height as u32);
            for t in &tiles {
                prop_assert!(t.width == 0 || t.height == 0 || area.contains(t.as_position()));
                prop_assert!(t.right() <= area.right() && t.bottom() <= area.bottom());
            }
        }
    }
}
