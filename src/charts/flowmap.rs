use super::widgets::{self, heading, muted, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::pairs;
use crate::braille::BrailleCanvas;
use crate::config::Config;
use crate::data::{normalize_id, parse_works, Country, LoadState, Sources, Table};
use crate::error::LoadError;
use crate::filter::{visual, FilterEvent, FilterState};
use crate::hash::keyed_unit;
use crate::map::{draw_labels, CountryStyle, Label, MapRenderer, Region, Viewport};
use crate::view::scale::{hex, SqrtScale};
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const LAND: &str = "#445879";
const NODE: &str = "#808da0";
const MAJOR: &str = "#38bdf8";
const FLOW: &str = "#f472b6";
const HOVER: &str = "#fbbf24";
const DIM: &str = "#334155";

/// Institutions drawn larger and in their own color
const MAJOR_IDS: [&str; 3] = [
    "https://openalex.org/I30771326",
    "https://openalex.org/I83816512",
    "https://openalex.org/I4210155236",
];

/// Co-located Genoa institutions nudged apart by (dlat, dlon)
const OFFSETS: [(&str, f64, f64); 4] = [
    ("https://openalex.org/I30771326", 0.1, 0.1),
    ("https://openalex.org/I4210146472", 0.05, 0.3),
    ("https://openalex.org/I4210130470", 0.05, -0.2),
    ("https://openalex.org/I3018768319", 0.05, 0.5),
];

const JITTER_ATTEMPTS: u64 = 10;
const JITTER_SPAN: f64 = 0.1;
/// Stroke widths were tuned for an 1100 px wide map
const STROKE_RANGE: (f64, f64) = (0.9, 15.0);
const REFERENCE_WIDTH: f64 = 1100.0;
const BASE_PIXELS: (usize, usize) = (160, 80);

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub major: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

impl Link {
    fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    fn other(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(&self.target)
        } else if self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Parse "lat, lon"
fn parse_coords(value: &str) -> Option<(f64, f64)> {
    let (lat, lon) = value.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
}

fn coord_key(lat: f64, lon: f64) -> String {
    format!("{lat:.3},{lon:.3}")
}

/// Place every institution with usable coordinates. Duplicate positions are
/// jittered with draws keyed on the institution id, so placement is stable.
pub fn place_institutions(table: &Table) -> HashMap<String, Node> {
    let mut occupied: HashSet<String> = HashSet::new();
    let mut nodes = HashMap::new();
    for row in table.rows() {
        let (Some(id), Some((mut lat, mut lon))) = (
            row.field("id").map(normalize_id),
            row.field("coords").and_then(parse_coords),
        ) else {
            continue;
        };
        if let Some((_, dlat, dlon)) = OFFSETS.iter().find(|(known, _, _)| *known == id) {
            lat += dlat;
            lon += dlon;
        }
        let mut key = coord_key(lat, lon);
        let mut attempt = 0;
        while occupied.contains(&key) && attempt < JITTER_ATTEMPTS {
            lat += (keyed_unit(&id, 2 * attempt) - 0.5) * JITTER_SPAN;
            lon += (keyed_unit(&id, 2 * attempt + 1) - 0.5) * JITTER_SPAN;
            key = coord_key(lat, lon);
            attempt += 1;
        }
        occupied.insert(key);

        let node = Node {
            name: row.field("display_name").unwrap_or(&id).to_string(),
            major: MAJOR_IDS.contains(&id.as_str()),
            id: id.clone(),
            lon,
            lat,
        };
        nodes.entry(id).or_insert(node);
    }
    nodes
}

/// Legend sample weights: 1, a quarter of the max, the max
pub fn legend_values(max: u64) -> Vec<u64> {
    let mut values: Vec<u64> = [1, (max as f64 / 4.0).round() as u64, max]
        .into_iter()
        .filter(|v| *v >= 1)
        .collect();
    values.dedup();
    values
}

pub fn legend_label(value: u64, max: u64) -> String {
    if value == max {
        format!("{value}+ works")
    } else if value == 1 {
        "1 work".to_string()
    } else {
        format!("{value} works")
    }
}

/// Collaboration flows between institutions placed on a map
pub struct FlowMap {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    links: Vec<Link>,
    keys: Vec<String>,
    names: Vec<String>,
    stroke: SqrtScale,
    max_weight: u64,
    countries: Option<Arc<Vec<Country>>>,
    region: Region,
    viewport: Viewport,
    renderer: MapRenderer,
    filter: FilterState,
    cursor: Cursor,
}

impl FlowMap {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, _config: &Config) -> Result<Self, LoadError> {
        let coords = sources.coords()?;
        coords.require_any(&["coords"])?;
        let works = sources.works()?;
        let countries = sources.countries().ok();

        let placed = place_institutions(&coords);
        let parsed = parse_works(&works);
        let tallies = pairs(
            parsed.iter(),
            |(_, work)| {
                work.institutions()
                    .filter_map(|i| i.id.as_deref())
                    .map(normalize_id)
                    .filter(|id| placed.contains_key(id))
                    .collect::<Vec<_>>()
            },
            |_| None,
        );

        let mut links: Vec<Link> = tallies
            .into_iter()
            .map(|((source, target), tally)| Link { source, target, weight: tally.count })
            .collect();
        links.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });

        let connected: HashSet<&str> = links
            .iter()
            .flat_map(|l| [l.source.as_str(), l.target.as_str()])
            .collect();
        let mut nodes: Vec<Node> = placed
            .values()
            .filter(|n| connected.contains(n.id.as_str()))
            .cloned()
            .collect();
        // Majors last so they draw on top
        nodes.sort_by(|a, b| a.major.cmp(&b.major).then_with(|| a.id.cmp(&b.id)));
        let index: HashMap<String, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();

        let mut strength: HashMap<&str, u64> = HashMap::new();
        for link in &links {
            *strength.entry(&link.source).or_default() += link.weight;
            *strength.entry(&link.target).or_default() += link.weight;
        }
        let mut by_strength: Vec<&Node> = nodes.iter().collect();
        by_strength.sort_by(|a, b| {
            let (sa, sb) = (strength.get(a.id.as_str()), strength.get(b.id.as_str()));
            sb.cmp(&sa).then_with(|| a.name.cmp(&b.name))
        });
        let keys: Vec<String> = by_strength.iter().map(|n| n.id.clone()).collect();
        let mut names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        names.sort();
        names.dedup();

        let max_weight = links.first().map_or(1, |l| l.weight.max(1));
        tracing::debug!(
            placed = placed.len(),
            nodes = nodes.len(),
            links = links.len(),
            max_weight,
            "flow map built"
        );

        Ok(Self {
            nodes,
            index,
            links,
            keys,
            names,
            stroke: SqrtScale::new((1.0, max_weight as f64), STROKE_RANGE),
            max_weight,
            countries,
            region: Region::World,
            viewport: Viewport::world(BASE_PIXELS.0, BASE_PIXELS.1),
            renderer: MapRenderer::new(),
            filter: FilterState::new(),
            cursor: Cursor::default(),
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Partners of a node with the joint work count, heaviest first
    pub fn partners(&self, id: &str) -> Vec<(&Node, u64)> {
        self.links
            .iter()
            .filter_map(|l| Some((self.node(l.other(id)?)?, l.weight)))
            .collect()
    }

    fn is_neighbor(&self, focus: &str, id: &str) -> bool {
        self.links.iter().any(|l| l.touches(focus) && l.touches(id))
    }

    /// Stroke width in canvas pixels for a link weight
    fn stroke_px(&self, weight: u64, canvas_width: usize) -> i32 {
        let svg = self.stroke.apply(weight as f64);
        ((svg * canvas_width as f64 / REFERENCE_WIDTH).round() as i32).max(1)
    }

    fn set_region(&mut self, region: Region) {
        self.region = region;
        self.viewport = Viewport::region(region, BASE_PIXELS.0, BASE_PIXELS.1);
    }

    /// Pin the first institution whose name contains the query and center on it
    fn locate(&mut self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return false;
        }
        let Some(node) = self.nodes.iter().find(|n| n.name.to_lowercase().contains(&q)) else {
            return false;
        };
        let (id, lon, lat) = (node.id.clone(), node.lon, node.lat);
        if self.filter.pinned() != Some(id.as_str()) {
            self.filter.apply(FilterEvent::Click(id));
        }
        self.filter.apply(FilterEvent::Search(String::new()));
        self.viewport.center_on(lon, lat);
        true
    }

    fn link_style(&self, link: &Link) -> (Color, bool) {
        match self.filter.focused() {
            Some(focus) if link.touches(focus) => (hex(HOVER), true),
            Some(_) => (hex(DIM), false),
            None => (hex(FLOW), false),
        }
    }

    fn node_style(&self, node: &Node) -> (Color, i32) {
        let base = if node.major { hex(MAJOR) } else { hex(NODE) };
        let radius = if node.major { 2 } else { 1 };
        let v = visual(&self.filter, &node.id, &node.name, [node.id.as_str()]);
        match self.filter.focused() {
            Some(focus) if focus == node.id => (hex(HOVER), 3),
            Some(focus) if !self.is_neighbor(focus, &node.id) => (hex(DIM), radius),
            _ if v.is_dimmed() => (hex(DIM), radius),
            _ => (base, radius),
        }
    }

    fn render_map(&self, area: Rect, buf: &mut Buffer) {
        let mut canvas = BrailleCanvas::new(area.width as usize, area.height as usize);
        let viewport = self.viewport.resized(canvas.pixel_width(), canvas.pixel_height());
        if let Some(countries) = self.countries.as_deref() {
            let land = hex(LAND);
            self.renderer.draw_countries(&mut canvas, countries, &viewport, |_| CountryStyle {
                fill: None,
                stroke: Some(land),
            });
        }

        // Highlighted links last so they stay on top
        let mut ordered: Vec<(&Link, Color, bool)> = self
            .links
            .iter()
            .rev()
            .map(|l| {
                let (color, lit) = self.link_style(l);
                (l, color, lit)
            })
            .collect();
        ordered.sort_by_key(|(_, _, lit)| *lit);
        for (link, color, _) in ordered {
            let (Some(a), Some(b)) = (self.node(&link.source), self.node(&link.target)) else {
                continue;
            };
            let width = self.stroke_px(link.weight, canvas.pixel_width());
            self.renderer
                .draw_flow(&mut canvas, (a.lon, a.lat), (b.lon, b.lat), width, color, &viewport);
        }

        let mut labels = Vec::new();
        for node in &self.nodes {
            let (color, radius) = self.node_style(node);
            let cell = self
                .renderer
                .draw_marker(&mut canvas, (node.lon, node.lat), radius, color, &viewport);
            if let (Some((x, y)), Some(focus)) = (cell, self.filter.focused()) {
                if focus == node.id {
                    labels.push(Label {
                        x: x + 2,
                        y,
                        text: node.name.clone(),
                        style: Style::default().fg(hex(HOVER)).add_modifier(Modifier::BOLD),
                    });
                }
            }
        }
        canvas.blit(area, buf, MUTED);
        draw_labels(&labels, area, buf);
    }

    fn region_tabs(&self) -> Line<'static> {
        let mut spans = vec![Span::styled("View: ", Style::default().fg(MUTED))];
        for region in Region::ALL {
            let style = if region == self.region {
                Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(MUTED)
            };
            spans.push(Span::styled(format!(" {} ", region.label()), style));
        }
        Line::from(spans)
    }

    fn legend_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![heading("Collaborations")];
        for value in legend_values(self.max_weight) {
            let cells = (self.stroke.apply(value as f64) / 3.0).ceil().max(1.0) as usize;
            lines.push(Line::from(vec![
                Span::styled(format!("{:<6}", "━".repeat(cells.min(5))), Style::default().fg(hex(FLOW))),
                Span::styled(legend_label(value, self.max_weight), Style::default().fg(MUTED)),
            ]));
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::styled("● ", Style::default().fg(hex(MAJOR))),
            Span::styled("major institution", Style::default().fg(MUTED)),
        ]));
        lines
    }

    fn panel_lines(&self, node: &Node) -> Vec<Line<'static>> {
        let partners = self.partners(&node.id);
        let joint: u64 = partners.iter().map(|(_, w)| w).sum();
        let mut lines = vec![heading(node.name.clone())];
        if node.major {
            lines.push(Line::styled("Major institution", Style::default().fg(hex(MAJOR))));
        }
        lines.push(muted(format!("{} partners - {joint} joint works", partners.len())));
        lines.push(Line::raw(""));
        lines.extend(
            partners
                .iter()
                .take(10)
                .map(|(p, w)| Line::raw(format!("{}  {w}", p.name))),
        );
        if partners.len() > 10 {
            lines.push(muted(format!("+{} more", partners.len() - 10)));
        }
        lines
    }
}

impl Chart for FlowMap {
    fn title(&self) -> &str {
        "Collaboration Flows"
    }

    fn handle(&mut self, input: Input) {
        let input = match input {
            Input::Submit(text) => {
                if self.locate(&text) {
                    return;
                }
                Input::Search(text)
            }
            Input::Reset => {
                self.set_region(Region::World);
                Input::Reset
            }
            other => other,
        };
        match route_list(&mut self.filter, &mut self.cursor, &self.keys, input) {
            Some(Input::Next) => self.set_region(self.region.next()),
            Some(Input::Prev) => self.set_region(self.region.prev()),
            Some(Input::Pan(dx, dy)) => self.viewport.pan(dx, dy),
            Some(Input::ZoomIn) => self.viewport.zoom_in(),
            Some(Input::ZoomOut) => self.viewport.zoom_out(),
            _ => {}
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.links.is_empty() {
            widgets::empty_state("No collaborations between placed institutions", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 36);
        let (tabs, map) = widgets::with_header(body, 1);
        buf.set_line(tabs.x, tabs.y, &self.region_tabs(), tabs.width);
        self.render_map(map, buf);
        match self.filter.focused().and_then(|id| self.node(id)) {
            Some(node) => widgets::panel("Institution", self.panel_lines(node), side, buf),
            None => widgets::panel("Legend", self.legend_lines(), side, buf),
        }
    }

    fn status(&self) -> String {
        match self.filter.focused().and_then(|id| self.node(id)) {
            Some(node) => format!("{}: {} partners", node.name, self.partners(&node.id).len()),
            None => format!(
                "{} - {} institutions - {} links",
                self.region.label(),
                self.nodes.len(),
                self.links.len()
            ),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(&self.names, query, 10, &[]).into_iter().map(str::to_string).collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ institution  enter pin  [ ] region  / search (enter locates)  hjkl pan  +/- zoom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COORDS: &str = "id,display_name,country_code,coords
https://openalex.org/I30771326,IIT,IT,\"44.40, 8.90\"
I1,Genoa Uni,IT,\"44.40, 8.90\"
I4,Genoa Hospital,IT,\"44.40, 8.90\"
I2,Milan,IT,\"45.46, 9.19\"
I3,Paris,FR,\"48.85, 2.35\"
I9,Broken,IT,nowhere
";

    fn works_csv() -> String {
        let docs = [
            vec!["https://openalex.org/I1", "https://openalex.org/I2", "https://openalex.org/I30771326"],
            vec!["I1", "https://openalex.org/I2", "https://openalex.org/I1"],
            vec!["https://openalex.org/I3", "https://openalex.org/I5"],
        ];
        let mut csv = String::from("raw_json\n");
        for ids in docs {
            let insts: Vec<String> = ids.iter().map(|id| format!(r#"{{"id":"{id}"}}"#)).collect();
            let json = format!(r#"{{"authorships":[{{"institutions":[{}]}}]}}"#, insts.join(","));
            csv.push_str(&format!("\"{}\"\n", json.replace('"', "\"\"")));
        }
        csv
    }

    fn chart() -> FlowMap {
        let sources = Sources::from_tables(
            Some(Table::from_csv("works.csv", &works_csv()).unwrap()),
            None,
            Some(Table::from_csv("coords.csv", COORDS).unwrap()),
        );
        match FlowMap::build(&sources, &Config::default()) {
            LoadState::Loaded(c) => c,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    #[test]
    fn test_offsets_and_jitter() {
        let placed = place_institutions(&Table::from_csv("coords.csv", COORDS).unwrap());
        assert_eq!(placed.len(), 5);
        let iit = &placed["https://openalex.org/I30771326"];
        assert!((iit.lat - 44.5).abs() < 1e-9 && (iit.lon - 9.0).abs() < 1e-9);
        assert!(iit.major);

        let uni = &placed["https://openalex.org/I1"];
        let hospital = &placed["https://openalex.org/I4"];
        assert_eq!((uni.lat, uni.lon), (44.40, 8.90));
        assert_ne!(coord_key(uni.lat, uni.lon), coord_key(hospital.lat, hospital.lon));
        assert!((hospital.lat - 44.40).abs() <= 0.5 && (hospital.lon - 8.90).abs() <= 0.5);

        let again = place_institutions(&Table::from_csv("coords.csv", COORDS).unwrap());
        assert_eq!(again["https://openalex.org/I4"], *hospital);
    }

    #[test]
    fn test_links_between_placed_institutions() {
        let c = chart();
        assert_eq!(c.links().len(), 3);
        assert_eq!(
            c.links()[0],
            Link {
                source: "https://openalex.org/I1".into(),
                target: "https://openalex.org/I2".into(),
                weight: 2,
            }
        );
        assert!(c.links()[1..].iter().all(|l| l.weight == 1));
        // Paris has no placed partner, Genoa Hospital no works
        assert!(c.node("https://openalex.org/I3").is_none());
        assert!(c.node("https://openalex.org/I4").is_none());
        assert_eq!(c.nodes.last().map(|n| n.major), Some(true));
        assert_eq!(c.status(), "World - 3 institutions - 3 links");
    }

    #[test]
    fn test_focus_highlights_neighbors() {
        let mut c = chart();
        assert_eq!(c.keys[0], "https://openalex.org/I1");
        c.handle(Input::Select);
        assert_eq!(c.filter.pinned(), Some("https://openalex.org/I1"));
        assert_eq!(c.status(), "Genoa Uni: 2 partners");
        let milan = c.node("https://openalex.org/I2").unwrap().clone();
        assert_eq!(c.node_style(&milan).0, hex(NODE));
        assert!(c.link_style(&c.links()[0]).1);

        c.handle(Input::Escape);
        assert_eq!(c.filter.pinned(), None);
    }

    #[test]
    fn test_regions_and_locate() {
        let mut c = chart();
        c.handle(Input::Next);
        assert_eq!(c.region(), Region::Europe);
        assert_eq!(c.viewport.zoom, Region::Europe.zoom());
        c.handle(Input::Prev);
        c.handle(Input::Prev);
        assert_eq!(c.region(), Region::Italy);

        c.handle(Input::Submit("milan".into()));
        assert_eq!(c.filter.pinned(), Some("https://openalex.org/I2"));
        assert!((c.viewport.center_lon - 9.19).abs() < 1e-9);
        assert_eq!(c.suggestions("gen"), vec!["Genoa Uni"]);

        c.handle(Input::Reset);
        assert_eq!(c.region(), Region::World);
        assert_eq!(c.filter.pinned(), None);
    }

    #[test]
    fn test_legend() {
        assert_eq!(legend_values(1), vec![1]);
        assert_eq!(legend_values(20), vec![1, 5, 20]);
        assert_eq!(legend_label(1, 20), "1 work");
        assert_eq!(legend_label(5, 20), "5 works");
        assert_eq!(legend_label(20, 20), "20+ works");
    }

    #[test]
    fn test_render_smoke() {
        let mut c = chart();
        let area = Rect::new(0, 0, 100, 30);
        let mut buf = Buffer::empty(area);
        c.render(area, &mut buf);
        c.handle(Input::Down);
        c.render(area, &mut buf);
    }
}
