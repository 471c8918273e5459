use super::widgets::{self, heading, muted, put, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::{distinct_by, first_seen, pairs, split_list};
use crate::config::Config;
use crate::data::{normalize_id, parse_works, LoadState, Row, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterEvent, FilterState};
use crate::view::graph::{Edge, Graph};
use crate::view::scale::{hex, palette, OrdinalPalette};
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::{BTreeSet, HashMap};

pub(crate) const ID_COLUMNS: [&str; 3] = ["openalex_id", "openalexid", "id"];
pub(crate) const NAME_COLUMNS: [&str; 4] = ["display_name_or_alias", "display_name", "name", "alias"];

const NODE_COLOR: &str = "#6381b3";
const SET1: [&str; 9] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf", "#999999",
];

pub(crate) fn person_id(row: &Row) -> Option<String> {
    row.first_field(&ID_COLUMNS)
        .map(normalize_id)
        .filter(|id| !id.is_empty())
}

/// What the search box looks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Authors,
    Institutions,
}

/// Co-authorship graph with a full view and an ego view around a pinned author
pub struct Network {
    graph: Graph,
    names: HashMap<String, String>,
    id_by_name: HashMap<String, String>,
    author_names: Vec<String>,
    institutions_by_author: HashMap<String, BTreeSet<String>>,
    institutions: Vec<String>,
    institution_colors: OrdinalPalette,
    by_degree: Vec<String>,
    target: SearchTarget,
    filter: FilterState,
    cursor: Cursor,
    edge_titles: usize,
    suggestion_limit: usize,
}

impl Network {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let works = sources.works()?;
        let people = sources.people()?;
        people.require_any(&ID_COLUMNS)?;

        let mut names = first_seen(people.rows(), |row| {
            person_id(row).zip(row.first_field(&NAME_COLUMNS).map(str::to_string))
        });

        let institutions_by_author = distinct_by(people.rows(), |row| {
            let Some(id) = person_id(row) else {
                return Vec::new();
            };
            split_list(row.get("institutions").unwrap_or(""), ';')
                .map(|inst| (id.clone(), inst.to_string()))
                .collect::<Vec<_>>()
        });
        let institutions: Vec<String> = institutions_by_author
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let parsed = parse_works(&works);
        for (_, work) in &parsed {
            for (id, name) in work.named_authors() {
                names.entry(id).or_insert_with(|| name.to_string());
            }
        }

        let pair_counts = pairs(
            parsed.iter(),
            |(_, work)| work.author_ids().collect::<Vec<_>>(),
            |(row, work)| work.title().or_else(|| row.field("title")).map(str::to_string),
        );
        let graph = Graph::from_pairs(pair_counts, |id| names.get(id).cloned().unwrap_or_else(|| id.to_string()));

        // Name collisions: the id that sorts first under its name wins
        let mut by_name: Vec<(&String, &String)> = names.iter().map(|(id, name)| (name, id)).collect();
        by_name.sort();
        let mut id_by_name = HashMap::new();
        for (name, id) in by_name {
            id_by_name.entry(name.clone()).or_insert_with(|| id.clone());
        }
        let mut author_names: Vec<String> = id_by_name.keys().cloned().collect();
        author_names.sort();

        let mut by_degree: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        by_degree.sort_by(|a, b| {
            graph
                .degree(b)
                .cmp(&graph.degree(a))
                .then_with(|| names.get(a).cmp(&names.get(b)))
                .then_with(|| a.cmp(b))
        });

        let institution_colors = OrdinalPalette::new(&palette(&SET1), institutions.iter().cloned());

        tracing::debug!(
            nodes = graph.nodes.len(),
            links = graph.edges.len(),
            "co-authorship graph built"
        );

        Ok(Self {
            graph,
            names,
            id_by_name,
            author_names,
            institutions_by_author,
            institutions,
            institution_colors,
            by_degree,
            target: SearchTarget::Authors,
            filter: FilterState::new(),
            cursor: Cursor::default(),
            edge_titles: config.edge_titles,
            suggestion_limit: config.people_suggestions,
        })
    }

    pub fn name<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map_or(id, String::as_str)
    }

    /// Author at the center of the ego view, if any
    pub fn center(&self) -> Option<&str> {
        self.filter.pinned().filter(|id| self.graph.contains(id))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Selected institutions the author belongs to, sorted
    pub fn matched_institutions(&self, id: &str) -> Vec<&str> {
        let Some(own) = self.institutions_by_author.get(id) else {
            return Vec::new();
        };
        self.filter
            .selection()
            .iter()
            .filter(|inst| own.contains(*inst))
            .map(String::as_str)
            .collect()
    }

    fn institution_color(&self, inst: &str) -> ratatui::style::Color {
        let lower = inst.to_lowercase();
        if lower.contains("university of genoa") {
            hex("#2563eb")
        } else if lower.contains("italian institute of technology") {
            hex("#ea6f4d")
        } else if lower.contains("national research council") {
            hex("#fab115")
        } else {
            self.institution_colors.color(inst)
        }
    }

    /// Edges of the ego view, strongest first
    fn ego_edges(&self) -> Vec<&Edge> {
        match self.center() {
            Some(center) => self.graph.ego(center).edges,
            None => Vec::new(),
        }
    }

    /// Ids under the cursor: all nodes in the full view, neighbors in the ego view
    fn cursor_keys(&self) -> Vec<String> {
        match self.center() {
            Some(center) => self
                .ego_edges()
                .iter()
                .filter_map(|e| e.other(center))
                .map(str::to_string)
                .collect(),
            None => self.by_degree.clone(),
        }
    }

    fn node_style(&self, id: &str) -> Style {
        let memberships = self.institutions_by_author.get(id);
        let v = visual(
            &self.filter,
            id,
            self.name(id),
            memberships.into_iter().flatten().map(String::as_str),
        );
        let base = self
            .matched_institutions(id)
            .first()
            .map_or(hex(NODE_COLOR), |inst| self.institution_color(inst));
        widgets::styled(&v, base)
    }

    fn render_chips(&self, area: Rect, buf: &mut Buffer) {
        let mut spans = vec![Span::styled(
            match self.target {
                SearchTarget::Authors => "search: authors  ",
                SearchTarget::Institutions => "search: institutions  ",
            },
            Style::default().fg(MUTED),
        )];
        for inst in self.filter.selection() {
            spans.push(Span::styled("● ", Style::default().fg(self.institution_color(inst))));
            spans.push(Span::raw(format!("{inst} ×  ")));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }

    fn render_full(&self, area: Rect, buf: &mut Buffer) {
        let height = area.height as usize;
        let start = self.cursor.scroll(self.by_degree.len(), height);
        let max_degree = self.by_degree.first().map_or(1, |id| self.graph.degree(id).max(1));
        let name_width = (area.width / 2).max(10);
        for (row, id) in self.by_degree.iter().enumerate().skip(start).take(height) {
            let y = (row - start) as u16;
            let style = self.node_style(id);
            put(buf, area, 0, y, "●", style);
            put(buf, area, 2, y, &widgets::truncate(self.name(id), name_width as usize - 3), style);
            let degree = self.graph.degree(id);
            let x = name_width + 1;
            put(buf, area, x, y, &format!("{degree:>4} "), Style::default().fg(MUTED));
            let bar = widgets::bar(degree as f64, max_degree as f64, area.width.saturating_sub(x + 6));
            put(buf, area, x + 5, y, &bar, style.remove_modifier(Modifier::REVERSED));
        }
    }

    fn render_ego(&self, center: &str, area: Rect, buf: &mut Buffer) {
        let edges = self.ego_edges();
        put(buf, area, 0, 0, "◉", self.node_style(center));
        put(buf, area, 2, 0, self.name(center), self.node_style(center).add_modifier(Modifier::BOLD));
        let height = area.height.saturating_sub(1) as usize;
        let start = self.cursor.scroll(edges.len(), height);
        let max_weight = edges.first().map_or(1, |e| e.weight.max(1));
        let name_width = (area.width / 2).max(10);
        for (row, edge) in edges.iter().enumerate().skip(start).take(height) {
            let Some(other) = edge.other(center) else { continue };
            let y = (row - start) as u16 + 1;
            let style = self.node_style(other);
            let hovered = self.filter.hovered() == Some(other);
            put(buf, area, 0, y, if hovered { "└▶" } else { "└─" }, Style::default().fg(MUTED));
            put(buf, area, 3, y, &widgets::truncate(self.name(other), name_width as usize - 4), style);
            let x = name_width + 1;
            put(buf, area, x, y, &format!("{:>4} ", edge.weight), Style::default().fg(MUTED));
            let bar = widgets::bar(edge.weight as f64, max_weight as f64, area.width.saturating_sub(x + 6));
            put(buf, area, x + 5, y, &bar, style);
        }
    }

    fn detail_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        if let Some(center) = self.center() {
            let Some(other) = self.filter.hovered() else {
                lines.push(muted("Move to a co-author to list shared works"));
                return lines;
            };
            let Some(edge) = self.ego_edges().into_iter().find(|e| e.touches(other)) else {
                return lines;
            };
            lines.push(heading(format!("{} ↔ {}", self.name(center), self.name(other))));
            let (shown, more) = shared_titles(&edge.titles, self.edge_titles);
            if shown.is_empty() {
                lines.push(muted("No titles available"));
            }
            lines.extend(shown.iter().map(|t| Line::raw(format!("- {t}"))));
            if more > 0 {
                lines.push(muted(format!("+{more} more")));
            }
            return lines;
        }

        let Some(id) = self.filter.focused() else {
            lines.push(muted("enter: show an author's co-authors"));
            lines.push(muted("v: switch search between authors and institutions"));
            return lines;
        };
        lines.push(heading(self.name(id).to_string()));
        lines.push(muted(format!("{} co-authors", self.graph.degree(id))));
        if !self.filter.selection().is_empty() {
            let matched = self.matched_institutions(id);
            if matched.is_empty() {
                lines.push(muted("no match"));
            }
            lines.extend(matched.iter().map(|m| Line::raw(format!("- {m}"))));
        }
        lines
    }
}

/// At most `max` titles, plus how many were left out
pub fn shared_titles(titles: &[String], max: usize) -> (Vec<&str>, usize) {
    let unique: Vec<&str> = titles
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let more = unique.len().saturating_sub(max);
    (unique.into_iter().take(max).collect(), more)
}

impl Chart for Network {
    fn title(&self) -> &str {
        "Co-authorship Network"
    }

    fn handle(&mut self, input: Input) {
        let before = self.center().map(str::to_string);
        let keys = self.cursor_keys();
        let input = match input {
            Input::Submit(text) => {
                match self.target {
                    SearchTarget::Authors => {
                        if let Some(id) = self.resolve_author(&text) {
                            if self.filter.pinned() != Some(id.as_str()) {
                                self.filter.apply(FilterEvent::Click(id));
                            }
                        }
                    }
                    SearchTarget::Institutions => {
                        if let Some(inst) = self.resolve_institution(&text) {
                            if !self.filter.is_selected(&inst) {
                                self.filter.apply(FilterEvent::ToggleSelection(inst));
                            }
                        }
                    }
                }
                None
            }
            // Institution search only feeds the dropdown
            Input::Search(_) if self.target == SearchTarget::Institutions => None,
            Input::Toggle => None,
            other => route_list(&mut self.filter, &mut self.cursor, &keys, other),
        };
        match input {
            Some(Input::SwitchView) => {
                self.target = match self.target {
                    SearchTarget::Authors => SearchTarget::Institutions,
                    SearchTarget::Institutions => SearchTarget::Authors,
                };
                self.filter.apply(FilterEvent::Search(String::new()));
            }
            Some(Input::PopTerm) => {
                if let Some(last) = self.filter.selection().iter().next_back().cloned() {
                    self.filter.apply(FilterEvent::ToggleSelection(last));
                }
            }
            _ => {}
        }
        if self.center() != before.as_deref() {
            self.cursor.reset();
            self.filter.apply(FilterEvent::Hover(None));
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.graph.nodes.is_empty() {
            widgets::empty_state("No co-authored works", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 44);
        let (chips, list) = widgets::with_header(body, 2);
        self.render_chips(chips, buf);
        match self.center() {
            Some(center) => self.render_ego(center, list, buf),
            None => self.render_full(list, buf),
        }
        widgets::panel("Details", self.detail_lines(), side, buf);
    }

    fn status(&self) -> String {
        match self.center() {
            Some(center) => format!("Showing: {} - links {}", self.name(center), self.ego_edges().len()),
            None => format!(
                "All authors - nodes {} - links {}",
                self.graph.nodes.len(),
                self.graph.edges.len()
            ),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        let (names, exclude): (&[String], Vec<String>) = match self.target {
            SearchTarget::Authors => (self.author_names.as_slice(), Vec::new()),
            SearchTarget::Institutions => (
                self.institutions.as_slice(),
                self.filter.selection().iter().cloned().collect(),
            ),
        };
        suggest(names, query, self.suggestion_limit, &exclude)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ move  enter center  esc full view  v search target  ⌫ drop chip"
    }
}

impl Network {
    fn resolve_author(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if let Some(id) = self.id_by_name.get(text) {
            return Some(id.clone());
        }
        let first = suggest(&self.author_names, text, 1, &[]).into_iter().next()?;
        self.id_by_name.get(first).cloned()
    }

    fn resolve_institution(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if let Some(exact) = self.institutions.iter().find(|i| i.eq_ignore_ascii_case(text)) {
            return Some(exact.clone());
        }
        let exclude: Vec<String> = self.filter.selection().iter().cloned().collect();
        suggest(&self.institutions, text, 1, &exclude)
            .into_iter()
            .next()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    fn work_json(title: &str, authors: &[(&str, &str)]) -> String {
        let authorships: Vec<String> = authors
            .iter()
            .map(|(id, name)| format!(r#"{{"author":{{"id":"{id}","display_name":"{name}"}},"institutions":[]}}"#))
            .collect();
        let json = format!(r#"{{"title":"{title}","authorships":[{}]}}"#, authorships.join(","));
        format!("\"{}\"", json.replace('"', "\"\""))
    }

    fn network() -> Network {
        let works = format!(
            "title,raw_json\nP1,{}\nP2,{}\nP3,{}\nbad,{{nope\n",
            work_json("Paper 1", &[("A1", "Ada"), ("A2", "Bob"), ("A3", "Cy")]),
            work_json("Paper 2", &[("A1", "Ada"), ("A2", "Bob"), ("A2", "Bob")]),
            work_json("Paper 3", &[("A3", "Cy"), ("A4", "Dee")]),
        );
        let people = "openalex_id,display_name_or_alias,institutions\n\
                      A1,Ada Lovelace,University of Genoa;CNR\n\
                      https://openalex.org/A2,Bob,IIT\n";
        let sources = Sources::from_tables(
            Some(Table::from_csv("works.csv", &works).unwrap()),
            Some(Table::from_csv("people.csv", people).unwrap()),
            None,
        );
        match Network::build(&sources, &Config::default()) {
            LoadState::Loaded(n) => n,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    const A1: &str = "https://openalex.org/A1";
    const A2: &str = "https://openalex.org/A2";
    const A3: &str = "https://openalex.org/A3";

    #[test]
    fn test_graph_from_works() {
        let n = network();
        assert_eq!(n.graph().nodes.len(), 4);
        assert_eq!(n.graph().edges.len(), 4);
        let top = &n.graph().edges[0];
        assert_eq!((top.source.as_str(), top.target.as_str()), (A1, A2));
        assert_eq!(top.weight, 2);
        assert_eq!(n.status(), "All authors - nodes 4 - links 4");
    }

    #[test]
    fn test_names_prefer_people_file() {
        let n = network();
        assert_eq!(n.name(A1), "Ada Lovelace");
        assert_eq!(n.name(A3), "Cy");
        assert_eq!(n.name("unknown"), "unknown");
    }

    #[test]
    fn test_submit_centers_ego_view() {
        let mut n = network();
        n.handle(Input::Submit("cy".into()));
        assert_eq!(n.center(), Some(A3));
        assert_eq!(n.status(), "Showing: Cy - links 3");
        n.handle(Input::Escape);
        assert_eq!(n.center(), None);
    }

    #[test]
    fn test_institution_chips() {
        let mut n = network();
        n.handle(Input::SwitchView);
        assert_eq!(n.suggestions("gen"), vec!["University of Genoa"]);
        n.handle(Input::Submit("university of genoa".into()));
        n.handle(Input::Submit("IIT".into()));
        assert_eq!(n.matched_institutions(A1), vec!["University of Genoa"]);
        assert_eq!(n.matched_institutions(A2), vec!["IIT"]);
        assert!(n.matched_institutions(A3).is_empty());
        assert!(n.suggestions("i").iter().all(|s| s != "IIT"));
        n.handle(Input::PopTerm);
        assert!(n.matched_institutions(A1).is_empty());
    }

    #[test]
    fn test_shared_titles_caps_at_max() {
        let titles: Vec<String> = (0..13).map(|i| format!("T{i:02}")).collect();
        let (shown, more) = shared_titles(&titles, 10);
        assert_eq!(shown.len(), 10);
        assert_eq!(more, 3);
        let (shown, more) = shared_titles(&[], 10);
        assert!(shown.is_empty());
        assert_eq!(more, 0);
    }

    #[test]
    fn test_render_both_views() {
        let mut n = network();
        let area = Rect::new(0, 0, 100, 20);
        let mut buf = Buffer::empty(area);
        n.render(area, &mut buf);
        n.handle(Input::Select);
        n.handle(Input::Down);
        let mut buf = Buffer::empty(area);
        n.render(area, &mut buf);
        assert!(n.center().is_some());
    }
}
