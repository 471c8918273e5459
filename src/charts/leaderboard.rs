use super::network::{person_id, NAME_COLUMNS};
use super::widgets::{self, heading, muted, put, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::config::Config;
use crate::data::{parse_works, LoadState, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterEvent, FilterState};
use crate::view::scale::{palette, OrdinalPalette, MODERN};
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget, Wrap};
use std::collections::{BTreeSet, HashMap};

const UNKNOWN: &str = "Unknown";
const OTHER: &str = "Other";

/// Counts kept in first-seen order so ties resolve to the earliest key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCounts(Vec<(String, u64)>);

impl OrderedCounts {
    pub fn add(&mut self, key: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, n)) => *n += 1,
            None => self.0.push((key.to_string(), 1)),
        }
    }

    /// First key reaching the maximum count
    pub fn first_max(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.0 {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(k, _)| k.as_str())
    }

    /// Descending by count; equal counts keep first-seen order
    pub fn sorted(&self) -> Vec<(String, u64)> {
        let mut out = self.0.clone();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }
}

#[derive(Debug, Clone)]
pub struct AuthorStats {
    pub id: String,
    pub name: String,
    pub total: u64,
    pub categories: OrderedCounts,
    pub topics: Vec<(String, u64)>,
    pub primary: String,
}

/// Researchers ranked by output with their dominant research field
pub struct Leaderboard {
    authors: Vec<AuthorStats>,
    names: Vec<String>,
    categories: Vec<String>,
    topic_category: HashMap<String, String>,
    colors: OrdinalPalette,
    legend_cursor: usize,
    filter: FilterState,
    cursor: Cursor,
    profile_topics: usize,
    suggestion_limit: usize,
}

impl Leaderboard {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let people = sources.people()?;
        let works = sources.works()?;

        let mut known: HashMap<String, String> = HashMap::new();
        for row in people.rows() {
            if let Some(id) = person_id(row) {
                let name = row.first_field(&NAME_COLUMNS).unwrap_or(&id).to_string();
                known.entry(id).or_insert(name);
            }
        }

        let mut topic_category: HashMap<String, String> = HashMap::new();
        let mut stats: HashMap<String, (u64, OrderedCounts, OrderedCounts)> = HashMap::new();
        for (_, work) in parse_works(&works) {
            let category = work.top_category();
            // Distinct per work, first-seen order
            let mut topics: Vec<&str> = Vec::new();
            for topic in work.topics() {
                if !topics.contains(&topic) {
                    topics.push(topic);
                }
            }
            if let Some(category) = category {
                for topic in &topics {
                    topic_category
                        .entry(topic.to_string())
                        .or_insert_with(|| category.to_string());
                }
            }

            let authors: BTreeSet<String> = work.author_ids().filter(|id| known.contains_key(id)).collect();
            for id in authors {
                let (total, categories, topic_counts) = stats.entry(id).or_default();
                *total += 1;
                if let Some(category) = category {
                    categories.add(category);
                }
                for topic in &topics {
                    topic_counts.add(topic);
                }
            }
        }

        let mut authors: Vec<AuthorStats> = stats
            .into_iter()
            .map(|(id, (total, categories, topics))| AuthorStats {
                name: known.get(&id).cloned().unwrap_or_else(|| id.clone()),
                primary: categories.first_max().unwrap_or(UNKNOWN).to_string(),
                topics: topics.sorted(),
                id,
                total,
                categories,
            })
            .collect();
        authors.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));

        let categories: Vec<String> = authors
            .iter()
            .map(|a| a.primary.clone())
            .filter(|c| c != UNKNOWN)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let colors = OrdinalPalette::new(
            &palette(&MODERN),
            categories.iter().cloned().chain([OTHER.to_string(), UNKNOWN.to_string()]),
        );
        let names: Vec<String> = authors
            .iter()
            .map(|a| a.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::debug!(authors = authors.len(), categories = categories.len(), "leaderboard built");

        Ok(Self {
            authors,
            names,
            categories,
            topic_category,
            colors,
            legend_cursor: 0,
            filter: FilterState::new(),
            cursor: Cursor::default(),
            profile_topics: config.profile_topics,
            suggestion_limit: config.people_suggestions,
        })
    }

    /// Active category filter
    pub fn category(&self) -> Option<&str> {
        self.filter.selection().iter().next().map(String::as_str)
    }

    /// Rows passing both the search text and the category filter
    pub fn visible(&self) -> Vec<&AuthorStats> {
        self.authors
            .iter()
            .filter(|a| self.filter.matches_search(&a.name))
            .filter(|a| self.category().map_or(true, |c| a.primary == c))
            .collect()
    }

    fn author(&self, id: &str) -> Option<&AuthorStats> {
        self.authors.iter().find(|a| a.id == id)
    }

    /// Clicking the active category clears it, any other replaces it
    fn toggle_category(&mut self, category: String) {
        if self.category() == Some(category.as_str()) {
            self.filter.apply(FilterEvent::ClearSelection);
        } else {
            self.filter.apply(FilterEvent::SelectOnly(category));
        }
        self.cursor.reset();
    }

    /// (authors, publications) whose primary category is `category`
    pub fn category_summary(&self, category: &str) -> (usize, u64) {
        self.authors
            .iter()
            .filter(|a| a.primary == category)
            .fold((0, 0), |(n, pubs), a| (n + 1, pubs + a.total))
    }

    fn render_legend(&self, area: Rect, buf: &mut Buffer) {
        let mut spans = vec![Span::styled("Categories: ", Style::default().fg(MUTED))];
        for (i, category) in self.categories.iter().enumerate() {
            let active = self.category().map_or(true, |c| c == category);
            let mut style = Style::default().fg(if active { self.colors.color(category) } else { MUTED });
            if i == self.legend_cursor {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            spans.push(Span::styled(format!("■ {category}  "), style));
        }
        Paragraph::new(Line::from(spans))
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }

    fn render_list(&self, area: Rect, buf: &mut Buffer) {
        let rows = self.visible();
        if rows.is_empty() {
            widgets::empty_state("No matches found.", area, buf);
            return;
        }
        let global_max = self.authors.first().map_or(1, |a| a.total.max(1));
        let height = area.height as usize;
        let start = self.cursor.scroll(rows.len(), height);
        let name_width = (area.width / 3).max(12);
        for (i, author) in rows.iter().enumerate().skip(start).take(height) {
            let y = (i - start) as u16;
            let v = visual(&self.filter, &author.id, &author.name, [author.primary.as_str()]);
            let color = self.colors.color(&author.primary);
            let style = widgets::styled(&v, color);
            put(buf, area, 0, y, &format!("{:>3}", i + 1), Style::default().fg(MUTED));
            put(buf, area, 4, y, &widgets::truncate(&author.name, name_width as usize), style);
            let count = format!(" {} works", author.total);
            let bar_x = 5 + name_width;
            let bar_width = area.width.saturating_sub(bar_x + count.len() as u16);
            let bar = widgets::bar(author.total as f64, global_max as f64, bar_width);
            let written = put(buf, area, bar_x, y, &bar, Style::default().fg(color));
            put(buf, area, bar_x + written, y, &count, Style::default().fg(MUTED));
        }
    }

    fn profile_lines(&self, author: &AuthorStats, width: u16) -> Vec<Line<'static>> {
        let mut lines = vec![
            heading(author.name.clone()),
            Line::styled(
                format!("{}: {} Publications", author.primary, author.total),
                Style::default().fg(self.colors.color(&author.primary)),
            ),
            muted(""),
            heading("Focus Topics"),
        ];
        let bar_width = width.saturating_sub(30).max(4);
        for (topic, count) in author.topics.iter().take(self.profile_topics) {
            let category = self.topic_category.get(topic).map_or(OTHER, String::as_str);
            let percent = topic_share(*count, author.total);
            lines.push(Line::from(vec![
                Span::raw(format!("{:<20} ", widgets::truncate(topic, 20))),
                Span::styled(
                    widgets::bar(percent, 100.0, bar_width),
                    Style::default().fg(self.colors.color(category)),
                ),
                Span::styled(format!(" {count}"), Style::default().fg(MUTED)),
            ]));
        }
        lines
    }

    fn detail_lines(&self, width: u16) -> Vec<Line<'static>> {
        if let Some(author) = self.filter.pinned().and_then(|id| self.author(id)) {
            return self.profile_lines(author, width);
        }
        if let Some(category) = self.category() {
            let (authors, publications) = self.category_summary(category);
            return vec![
                Line::styled(
                    category.to_string(),
                    Style::default()
                        .fg(self.colors.color(category))
                        .add_modifier(Modifier::BOLD),
                ),
                muted(""),
                Line::raw(format!("{authors} Authors")),
                Line::raw(format!("{publications} Publications")),
            ];
        }
        if let Some(author) = self.filter.hovered().and_then(|id| self.author(id)) {
            return self.profile_lines(author, width);
        }
        vec![muted("Select a researcher to view their topic landscape.")]
    }
}

/// Share of an author's works tagged with a topic, in percent
pub fn topic_share(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

impl Chart for Leaderboard {
    fn title(&self) -> &str {
        "Researcher Leaderboard"
    }

    fn handle(&mut self, input: Input) {
        let keys: Vec<String> = self.visible().iter().map(|a| a.id.clone()).collect();
        let input = match input {
            Input::Toggle => {
                if let Some(category) = self.categories.get(self.legend_cursor).cloned() {
                    self.toggle_category(category);
                }
                return;
            }
            Input::Search(text) | Input::Submit(text) => {
                self.filter.apply(FilterEvent::Search(text));
                self.cursor.reset();
                return;
            }
            other => route_list(&mut self.filter, &mut self.cursor, &keys, other),
        };
        let len = self.categories.len();
        match input {
            Some(Input::Next) if len > 0 => self.legend_cursor = (self.legend_cursor + 1) % len,
            Some(Input::Prev) if len > 0 => self.legend_cursor = (self.legend_cursor + len - 1) % len,
            _ => {}
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.authors.is_empty() {
            widgets::empty_state("No data available", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 48);
        let (legend, list) = widgets::with_header(body, 3);
        self.render_legend(legend, buf);
        self.render_list(list, buf);
        let title = if self.filter.pinned().is_some() { "Profile" } else { "Details" };
        widgets::panel(title, self.detail_lines(side.width), side, buf);
    }

    fn status(&self) -> String {
        let shown = self.visible().len();
        match self.category() {
            Some(c) => format!("{shown} of {} researchers in {c}", self.authors.len()),
            None => format!("{shown} of {} researchers", self.authors.len()),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(&self.names, query, self.suggestion_limit, &[])
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ move  enter profile  ←→ category  space filter  / search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    fn work(authors: &[&str], l0: &[(&str, f64)], l1: &[&str]) -> String {
        let authorships: Vec<String> = authors
            .iter()
            .map(|id| format!(r#"{{"author":{{"id":"{id}"}}}}"#))
            .collect();
        let mut concepts: Vec<String> = l0
            .iter()
            .map(|(name, score)| format!(r#"{{"display_name":"{name}","level":0,"score":{score}}}"#))
            .collect();
        concepts.extend(l1.iter().map(|name| format!(r#"{{"display_name":"{name}","level":1,"score":0.5}}"#)));
        let json = format!(
            r#"{{"authorships":[{}],"concepts":[{}]}}"#,
            authorships.join(","),
            concepts.join(",")
        );
        format!("\"{}\"", json.replace('"', "\"\""))
    }

    fn board() -> Leaderboard {
        board_of(&[
            work(&["A1", "A2"], &[("Medicine", 0.9), ("Biology", 0.2)], &["Oncology"]),
            work(&["A1", "A1"], &[("Biology", 0.8)], &["Genetics", "Oncology"]),
            work(&["A1"], &[("Medicine", 0.7)], &[]),
            work(&["A2", "A9"], &[], &["Robotics"]),
        ])
    }

    fn board_of(works: &[String]) -> Leaderboard {
        let mut csv = String::from("raw_json\n");
        for w in works {
            csv.push_str(w);
            csv.push('\n');
        }
        let people = "openalex_id,display_name_or_alias\nA1,Ada\nA2,Bob\n";
        let sources = Sources::from_tables(
            Some(Table::from_csv("works.csv", &csv).unwrap()),
            Some(Table::from_csv("people.csv", people).unwrap()),
            None,
        );
        match Leaderboard::build(&sources, &Config::default()) {
            LoadState::Loaded(l) => l,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    #[test]
    fn test_first_max_prefers_earliest() {
        let mut counts = OrderedCounts::default();
        counts.add("b");
        counts.add("a");
        counts.add("a");
        counts.add("b");
        assert_eq!(counts.first_max(), Some("b"));
        assert_eq!(OrderedCounts::default().first_max(), None);
    }

    #[test]
    fn test_repeated_topic_counts_once_per_work() {
        let lb = board_of(&[work(&["A1"], &[("Medicine", 0.9)], &["Oncology", "Oncology"])]);
        let ada = &lb.authors[0];
        assert_eq!(ada.total, 1);
        assert_eq!(ada.topics, vec![("Oncology".to_string(), 1)]);
        assert!(topic_share(ada.topics[0].1, ada.total) <= 100.0);
    }

    #[test]
    fn test_author_stats() {
        let lb = board();
        assert_eq!(lb.authors.len(), 2);
        let ada = &lb.authors[0];
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.total, 3);
        assert_eq!(ada.primary, "Medicine");
        assert_eq!(ada.topics[0], ("Oncology".to_string(), 2));
        let bob = &lb.authors[1];
        assert_eq!(bob.total, 2);
        assert_eq!(bob.primary, "Medicine");
        assert_eq!(lb.topic_category.get("Genetics").map(String::as_str), Some("Biology"));
        assert_eq!(lb.topic_category.get("Oncology").map(String::as_str), Some("Medicine"));
        assert!(!lb.topic_category.contains_key("Robotics"));
    }

    #[test]
    fn test_unknown_primary_excluded_from_legend() {
        let lb = board();
        assert_eq!(lb.categories, vec!["Medicine"]);
    }

    #[test]
    fn test_category_filter_and_summary() {
        let mut lb = board();
        lb.handle(Input::Toggle);
        assert_eq!(lb.category(), Some("Medicine"));
        assert_eq!(lb.category_summary("Medicine"), (2, 5));
        assert_eq!(lb.status(), "2 of 2 researchers in Medicine");
        lb.handle(Input::Toggle);
        assert_eq!(lb.category(), None);
    }

    #[test]
    fn test_search_hides_rows() {
        let mut lb = board();
        lb.handle(Input::Search("BO".into()));
        let visible: Vec<&str> = lb.visible().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(visible, vec!["Bob"]);
        lb.handle(Input::Search("zzz".into()));
        let area = Rect::new(0, 0, 100, 20);
        let mut buf = Buffer::empty(area);
        lb.render(area, &mut buf);
        assert!(lb.visible().is_empty());
    }

    #[test]
    fn test_topic_share() {
        assert_eq!(topic_share(1, 4), 25.0);
        assert_eq!(topic_share(3, 0), 0.0);
    }

    #[test]
    fn test_pinned_profile() {
        let mut lb = board();
        lb.handle(Input::Select);
        let lines = lb.detail_lines(48);
        assert_eq!(lines[0].to_string(), "Ada");
        assert_eq!(lines[1].to_string(), "Medicine: 3 Publications");
    }
}
