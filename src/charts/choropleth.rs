use super::widgets::{self, heading, muted, put, ACCENT, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::{distinct_by, nested, ranked};
use crate::braille::BrailleCanvas;
use crate::config::Config;
use crate::data::{parse_works, Country, LoadState, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterState};
use crate::map::{draw_labels, CountryStyle, Label, MapRenderer, Region, Viewport};
use crate::view::scale::{palette, ThresholdScale, BLUES};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::HashMap;
use std::sync::Arc;

/// The three lightest Blues are unreadable against the empty map
const FIRST_CLASS: usize = 3;
const MAX_ZOOM_FACTOR: f64 = 8.0;
/// Pixel size pans are measured against; rendering resizes to the real canvas
const BASE_PIXELS: (usize, usize) = (160, 80);

/// Distinct institutions per country on a world map
pub struct Choropleth {
    counts: HashMap<String, u64>,
    institutions: HashMap<String, Vec<(String, u64)>>,
    ranked: Vec<(String, u64)>,
    keys: Vec<String>,
    scale: ThresholdScale,
    countries: Option<Arc<Vec<Country>>>,
    names: HashMap<String, String>,
    viewport: Viewport,
    renderer: MapRenderer,
    filter: FilterState,
    cursor: Cursor,
}

impl Choropleth {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, _config: &Config) -> Result<Self, LoadError> {
        let works = sources.works()?;
        let countries = match sources.countries() {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::info!(reason = %e, "no country shapes, showing the country table");
                None
            }
        };
        let parsed = parse_works(&works);

        let ids = distinct_by(parsed.iter(), |(_, work)| {
            work.institutions()
                .filter_map(|inst| Some((inst.country()?, inst.identity()?.to_string())))
                .collect::<Vec<_>>()
        });
        let counts: HashMap<String, u64> = ids.iter().map(|(cc, set)| (cc.clone(), set.len() as u64)).collect();

        let by_name = nested(parsed.iter(), |(_, work)| {
            work.institutions()
                .filter_map(|inst| Some((inst.country()?, inst.name()?.to_string())))
                .collect::<Vec<_>>()
        });
        let institutions: HashMap<String, Vec<(String, u64)>> =
            by_name.iter().map(|(cc, names)| (cc.clone(), ranked(names))).collect();

        let ranked = ranked(&counts);
        let scale = ThresholdScale::log(counts.values().copied(), &palette(&BLUES[FIRST_CLASS..]));

        let names: HashMap<String, String> = countries
            .iter()
            .flat_map(|cs| cs.iter())
            .filter_map(|c| Some((c.iso2.clone()?, c.name.clone())))
            .collect();

        tracing::debug!(countries = counts.len(), thresholds = ?scale.thresholds, "choropleth built");

        Ok(Self {
            keys: ranked.iter().map(|(cc, _)| cc.clone()).collect(),
            counts,
            institutions,
            ranked,
            scale,
            countries,
            names,
            viewport: Viewport::world(BASE_PIXELS.0, BASE_PIXELS.1),
            renderer: MapRenderer::new(),
            filter: FilterState::new(),
            cursor: Cursor::default(),
        })
    }

    pub fn count(&self, code: &str) -> u64 {
        self.counts.get(code).copied().unwrap_or(0)
    }

    /// Country name from the shapes, falling back to the code
    pub fn name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map_or(code, String::as_str)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scale(&self) -> &ThresholdScale {
        &self.scale
    }

    fn fill(&self, code: &str) -> Option<Color> {
        match self.count(code) {
            0 => None,
            n => self.scale.color(n),
        }
    }

    /// First country whose name contains the query, in shape order
    fn find_country(&self, query: &str) -> Option<&Country> {
        let q = query.trim().to_uppercase();
        if q.is_empty() {
            return None;
        }
        self.countries
            .as_deref()?
            .iter()
            .find(|c| c.name.to_uppercase().contains(&q))
    }

    fn center_on_match(&mut self, query: &str) {
        let Some((lon, lat, zoom)) = self.find_country(query).map(|c| {
            let (lon, lat) = c.centroid();
            (lon, lat, fit_zoom(c.bbox))
        }) else {
            return;
        };
        self.viewport.center_on(lon, lat);
        self.viewport.zoom = zoom;
    }

    fn country_style(&self, country: &Country) -> CountryStyle {
        let Some(code) = country.iso2.as_deref() else {
            return CountryStyle { fill: None, stroke: Some(MUTED) };
        };
        let v = visual(&self.filter, code, &country.name, [code]);
        if v.pinned {
            return CountryStyle { fill: Some(ACCENT), stroke: Some(Color::White) };
        }
        let fill = if v.is_dimmed() { None } else { self.fill(code) };
        let stroke = if v.hovered {
            Some(Color::White)
        } else if fill.is_none() {
            Some(MUTED)
        } else {
            None
        };
        CountryStyle { fill, stroke }
    }

    fn render_map(&self, countries: &[Country], area: Rect, buf: &mut Buffer) {
        let mut canvas = BrailleCanvas::new(area.width as usize, area.height as usize);
        let viewport = self.viewport.resized(canvas.pixel_width(), canvas.pixel_height());
        self.renderer
            .draw_countries(&mut canvas, countries, &viewport, |c| self.country_style(c));
        canvas.blit(area, buf, MUTED);

        let mut labels = Vec::new();
        for code in [self.filter.pinned(), self.filter.hovered()].into_iter().flatten() {
            let Some(country) = countries.iter().find(|c| c.iso2.as_deref() == Some(code)) else {
                continue;
            };
            let (lon, lat) = country.centroid();
            let (px, py) = viewport.project(lon, lat);
            if viewport.is_visible(px, py) {
                let text = country.name.clone();
                let x = ((px / 2) as u16).saturating_sub(text.chars().count() as u16 / 2);
                labels.push(Label {
                    x,
                    y: (py / 4) as u16,
                    text,
                    style: Style::default().add_modifier(Modifier::BOLD),
                });
            }
        }
        draw_labels(&labels, area, buf);
    }

    fn render_table(&self, area: Rect, buf: &mut Buffer) {
        let height = area.height as usize;
        let start = self.cursor.scroll(self.ranked.len(), height);
        let max = self.ranked.first().map_or(1, |(_, c)| (*c).max(1));
        let name_width = (area.width / 3).max(12);
        for (i, (code, count)) in self.ranked.iter().enumerate().skip(start).take(height) {
            let y = (i - start) as u16;
            let name = self.name(code);
            let v = visual(&self.filter, code, name, [code.as_str()]);
            let color = self.fill(code).unwrap_or(MUTED);
            let style = widgets::styled(&v, color);
            put(buf, area, 0, y, &format!("{:>3} {code:<3}", i + 1), Style::default().fg(MUTED));
            put(buf, area, 8, y, &widgets::truncate(name, name_width as usize), style);
            let bar_x = 9 + name_width;
            let bar = widgets::bar(*count as f64, max as f64, area.width.saturating_sub(bar_x + 7));
            let written = put(buf, area, bar_x, y, &bar, Style::default().fg(color));
            put(buf, area, bar_x + written, y, &format!(" {count}"), Style::default().fg(MUTED));
        }
    }

    fn legend(&self) -> Line<'static> {
        let mut spans = vec![Span::styled("Distinct Institutions  0 ", Style::default().fg(MUTED))];
        for (i, color) in self.scale.colors.iter().enumerate() {
            spans.push(Span::styled("███", Style::default().fg(*color)));
            if let Some(t) = self.scale.thresholds.get(i) {
                spans.push(Span::styled(format!(" {t} "), Style::default().fg(MUTED)));
            }
        }
        spans.push(Span::styled(format!(" {}", self.scale.max), Style::default().fg(MUTED)));
        Line::from(spans)
    }

    fn panel_lines(&self, code: &str) -> Vec<Line<'static>> {
        let list = self.institutions.get(code).map(Vec::as_slice).unwrap_or(&[]);
        let mut lines = vec![
            heading(self.name(code).to_string()),
            muted("Total Distinct Institutions"),
            Line::styled(
                self.count(code).to_string(),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            muted(format!("Institutions by publication count ({})", list.len())),
        ];
        if list.is_empty() {
            lines.push(muted("No data available"));
        }
        lines.extend(
            list.iter()
                .enumerate()
                .map(|(i, (name, count))| Line::raw(format!("{}. {name}  {count}", i + 1))),
        );
        lines
    }
}

/// Zoom that frames a (min_lon, min_lat, max_lon, max_lat) box, within 1x..8x of the world view
pub fn fit_zoom(bbox: (f64, f64, f64, f64)) -> f64 {
    let world = Region::World.zoom();
    let (min_lon, min_lat, max_lon, max_lat) = bbox;
    let span = (max_lon - min_lon).max((max_lat - min_lat) * 1.5) / 360.0;
    if span <= 0.0 {
        return world * MAX_ZOOM_FACTOR;
    }
    (0.9 / span).clamp(world, world * MAX_ZOOM_FACTOR)
}

impl Chart for Choropleth {
    fn title(&self) -> &str {
        "Institutions by Country"
    }

    fn handle(&mut self, input: Input) {
        let input = match input {
            Input::Submit(text) => {
                self.center_on_match(&text);
                Input::Search(text)
            }
            Input::Reset => {
                self.viewport = Viewport::world(BASE_PIXELS.0, BASE_PIXELS.1);
                Input::Reset
            }
            other => other,
        };
        match route_list(&mut self.filter, &mut self.cursor, &self.keys, input) {
            Some(Input::Pan(dx, dy)) => self.viewport.pan(dx, dy),
            Some(Input::ZoomIn) => self.viewport.zoom_in(),
            Some(Input::ZoomOut) => self.viewport.zoom_out(),
            _ => {}
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.counts.is_empty() {
            widgets::empty_state("No data available", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 42);
        let (legend, chart) = widgets::with_header(body, 1);
        buf.set_line(legend.x, legend.y, &self.legend(), legend.width);
        match self.countries.as_deref() {
            Some(countries) => self.render_map(countries, chart, buf),
            None => self.render_table(chart, buf),
        }
        match self.filter.focused() {
            Some(code) => {
                let title = if self.filter.pinned().is_some() { "Pinned" } else { "Country" };
                widgets::panel(title, self.panel_lines(code), side, buf);
            }
            None => widgets::panel(
                "Country",
                vec![muted("Select a country to list its institutions")],
                side,
                buf,
            ),
        }
    }

    fn status(&self) -> String {
        match self.filter.focused() {
            Some(code) => format!("{}: {} institutions", self.name(code), self.count(code)),
            None => format!("{} countries", self.counts.len()),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_uppercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.ranked
            .iter()
            .map(|(code, _)| self.name(code))
            .filter(|name| name.to_uppercase().contains(&q))
            .take(10)
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ country  enter pin  / search (enter centers)  hjkl pan  +/- zoom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_countries, Table};
    use pretty_assertions::assert_eq;

    const SHAPES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"ISO_A2": "IT", "ADMIN": "Italy"},
         "geometry": {"type": "Polygon", "coordinates": [[[6,36],[18,36],[18,47],[6,47],[6,36]]]}},
        {"type": "Feature", "properties": {"ISO_A2": "FR", "ADMIN": "France"},
         "geometry": {"type": "Polygon", "coordinates": [[[-5,42],[8,42],[8,51],[-5,51],[-5,42]]]}}
    ]}"#;

    fn inst(id: &str, name: &str, cc: &str) -> String {
        format!(r#"{{"id":"{id}","display_name":"{name}","country_code":"{cc}"}}"#)
    }

    fn works_csv() -> String {
        let docs = [
            vec![inst("I1", "Genoa", "it"), inst("I2", "Milan", "IT"), inst("I1", "Genoa", "IT")],
            vec![inst("I1", "Genoa", "IT"), inst("I3", "Paris", "FR")],
            vec![inst("I4", "Nowhere", "")],
        ];
        let mut csv = String::from("raw_json\n");
        for insts in docs {
            let json = format!(r#"{{"authorships":[{{"institutions":[{}]}}]}}"#, insts.join(","));
            csv.push_str(&format!("\"{}\"\n", json.replace('"', "\"\"")));
        }
        csv
    }

    fn chart(with_shapes: bool) -> Choropleth {
        let mut sources = Sources::from_tables(Some(Table::from_csv("works.csv", &works_csv()).unwrap()), None, None);
        if with_shapes {
            sources = sources.with_countries(parse_countries(SHAPES).unwrap());
        }
        match Choropleth::build(&sources, &Config::default()) {
            LoadState::Loaded(c) => c,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    #[test]
    fn test_distinct_institutions_per_country() {
        let c = chart(false);
        assert_eq!(c.count("IT"), 2);
        assert_eq!(c.count("FR"), 1);
        assert_eq!(c.count(""), 0);
        assert_eq!(c.ranked[0], ("IT".to_string(), 2));
        assert_eq!(
            c.institutions["IT"],
            vec![("Genoa".to_string(), 2), ("Milan".to_string(), 1)]
        );
    }

    #[test]
    fn test_table_without_shapes() {
        let c = chart(false);
        assert_eq!(c.name("IT"), "IT");
        let area = Rect::new(0, 0, 100, 12);
        let mut buf = Buffer::empty(area);
        c.render(area, &mut buf);
    }

    #[test]
    fn test_names_and_pin_panel() {
        let mut c = chart(true);
        assert_eq!(c.name("IT"), "Italy");
        c.handle(Input::Select);
        assert_eq!(c.status(), "Italy: 2 institutions");
        let lines = c.panel_lines("IT");
        assert_eq!(lines[0].to_string(), "Italy");
        assert_eq!(lines[4].to_string(), "1. Genoa  2");
        let lines = c.panel_lines("DE");
        assert_eq!(lines[4].to_string(), "No data available");
    }

    #[test]
    fn test_submit_centers_first_match() {
        let mut c = chart(true);
        c.handle(Input::Submit("fran".into()));
        assert!((c.viewport().center_lon - 1.5).abs() < 1e-9);
        assert!(c.viewport().zoom > Region::World.zoom());
        assert_eq!(c.suggestions("ital"), vec!["Italy"]);
        c.handle(Input::Pan(10, 0));
        c.handle(Input::Reset);
        assert_eq!(c.viewport().center_lon, Region::World.center().0);
        assert_eq!(c.viewport().zoom, Region::World.zoom());
        let area = Rect::new(0, 0, 100, 30);
        let mut buf = Buffer::empty(area);
        c.render(area, &mut buf);
    }

    #[test]
    fn test_fit_zoom_is_clamped() {
        let world = Region::World.zoom();
        assert_eq!(fit_zoom((-180.0, -60.0, 180.0, 80.0)), world);
        assert_eq!(fit_zoom((9.0, 44.0, 9.0, 44.0)), world * MAX_ZOOM_FACTOR);
    }
}
