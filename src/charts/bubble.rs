use super::network::{person_id, NAME_COLUMNS};
use super::widgets::{self, heading, muted, put, ACCENT, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::split_list;
use crate::braille::BrailleCanvas;
use crate::config::Config;
use crate::data::{LoadState, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterEvent, FilterState};
use crate::map::geometry::draw_circle;
use crate::view::scale::{hex, SqrtScale};
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use std::collections::{BTreeSet, HashMap};

const MEMBER: &str = "#94a3b8";
const MATCH: &str = "#ff0007";

#[derive(Debug, Clone)]
pub struct Person {
    pub key: String,
    pub name: String,
    pub institutions: Vec<String>,
    pub works: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub title: String,
    pub year: Option<i64>,
}

/// Researchers as bubbles sized by output, one institution highlighted at a time
pub struct Bubble {
    people: Vec<Person>,
    keys: Vec<String>,
    names: Vec<String>,
    works_by_name: HashMap<String, Vec<Publication>>,
    institutions: Vec<String>,
    filter: FilterState,
    cursor: Cursor,
    suggestion_limit: usize,
}

impl Bubble {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let people_table = sources.people()?;
        let works = sources.works()?;

        let mut works_by_name: HashMap<String, Vec<Publication>> = HashMap::new();
        for row in works.rows() {
            let Some(authors) = row.field("authors") else { continue };
            let publication = Publication {
                title: row.field("title").unwrap_or_default().to_string(),
                year: row.field("publication_year").and_then(|y| y.parse().ok()),
            };
            let unique: BTreeSet<&str> = split_list(authors, ';').collect();
            for name in unique {
                works_by_name.entry(name.to_string()).or_default().push(publication.clone());
            }
        }
        for list in works_by_name.values_mut() {
            // Stable: equal years keep file order
            list.sort_by(|a, b| b.year.cmp(&a.year));
        }

        let mut people: Vec<Person> = people_table
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let name = row.first_field(&NAME_COLUMNS)?.to_string();
                let mut institutions: Vec<String> = Vec::new();
                for inst in split_list(row.get("institutions").unwrap_or(""), ';') {
                    if !institutions.iter().any(|known| known == inst) {
                        institutions.push(inst.to_string());
                    }
                }
                Some(Person {
                    key: person_id(row).unwrap_or_else(|| format!("row-{i}")),
                    name,
                    institutions,
                    works: row
                        .field("n_works_in_input")
                        .and_then(|n| n.parse::<f64>().ok())
                        .map_or(0, |n| n.max(0.0) as u64),
                })
            })
            .collect();
        people.sort_by(|a, b| b.works.cmp(&a.works).then_with(|| a.name.cmp(&b.name)));

        let institutions: Vec<String> = people
            .iter()
            .flat_map(|p| p.institutions.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names: Vec<String> = people
            .iter()
            .map(|p| p.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let filter = match institutions
            .iter()
            .find(|i| **i == config.default_institution)
            .or_else(|| institutions.first())
        {
            Some(inst) => FilterState::with_selection(inst.clone()),
            None => FilterState::new(),
        };

        Ok(Self {
            keys: people.iter().map(|p| p.key.clone()).collect(),
            people,
            names,
            works_by_name,
            institutions,
            filter,
            cursor: Cursor::default(),
            suggestion_limit: config.people_suggestions,
        })
    }

    pub fn institution(&self) -> Option<&str> {
        self.filter.selection().iter().next().map(String::as_str)
    }

    /// People listing the selected institution
    pub fn member_count(&self) -> usize {
        let Some(inst) = self.institution() else { return 0 };
        self.people
            .iter()
            .filter(|p| p.institutions.iter().any(|i| i == inst))
            .count()
    }

    pub fn publications(&self, name: &str) -> &[Publication] {
        self.works_by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn person(&self, key: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.key == key)
    }

    fn cycle_institution(&mut self, step: isize) {
        if self.institutions.is_empty() {
            return;
        }
        let len = self.institutions.len() as isize;
        let current = self
            .institution()
            .and_then(|inst| self.institutions.iter().position(|i| i == inst))
            .map_or(0, |i| i as isize);
        let next = (current + step).rem_euclid(len) as usize;
        self.filter
            .apply(FilterEvent::SelectOnly(self.institutions[next].clone()));
    }

    fn render_bubbles(&self, area: Rect, buf: &mut Buffer) {
        let mut canvas = BrailleCanvas::new(area.width as usize, area.height as usize);
        let (w, h) = (canvas.pixel_width() as i32, canvas.pixel_height() as i32);
        let max_works = self.people.first().map_or(0, |p| p.works);
        let max_radius = (h / 6).clamp(2, 14) as f64;
        let scale = SqrtScale::new((0.0, max_works as f64), (0.0, max_radius));
        let radii: Vec<i32> = self
            .people
            .iter()
            .map(|p| scale.apply(p.works as f64).round().max(1.0) as i32)
            .collect();

        for (person, slot) in self.people.iter().zip(shelf_pack(&radii, w, h)) {
            let Some((cx, cy, r)) = slot else { break };
            let v = visual(
                &self.filter,
                &person.key,
                &person.name,
                person.institutions.iter().map(String::as_str),
            );
            let color = if v.is_highlighted() {
                hex(MATCH)
            } else {
                widgets::styled(&v, hex(MEMBER)).fg.unwrap_or(MUTED)
            };
            canvas.set_pen(Some(color));
            draw_circle(&mut canvas, cx, cy, r);
        }
        canvas.blit(area, buf, MUTED);
    }

    fn detail_lines(&self) -> Vec<Line<'static>> {
        let Some(person) = self.filter.focused().and_then(|key| self.person(key)) else {
            let values: Vec<u64> = self.people.iter().map(|p| p.works).collect();
            let mut lines = vec![heading("Publications Count")];
            lines.extend(legend_values(&values).into_iter().map(|v| Line::raw(format!("● {v}"))));
            lines.push(muted(""));
            lines.push(muted("←→ institution  enter pin"));
            return lines;
        };

        let mut lines = vec![Line::styled(
            person.name.clone(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )];
        lines.extend(person.institutions.iter().map(|i| muted(i.clone())));
        lines.push(Line::raw(format!("Total: {} works", person.works)));
        let publications = self.publications(&person.name);
        if publications.is_empty() {
            lines.push(muted("No linked publications."));
        } else {
            lines.push(heading("Publications"));
            for p in publications {
                let year = p.year.map_or_else(|| "----".to_string(), |y| y.to_string());
                lines.push(Line::raw(format!("{year} {}", p.title)));
            }
        }
        lines
    }
}

/// Largest, middle and smallest bubble values for the size legend
pub fn legend_values(values: &[u64]) -> Vec<u64> {
    let (Some(&max), Some(&min)) = (values.iter().max(), values.iter().min()) else {
        return Vec::new();
    };
    let mid = (max as f64 / 2.0).round() as u64;
    let set: BTreeSet<u64> = [min.max(1), mid, max].into_iter().collect();
    set.into_iter().collect()
}

/// Row-by-row placement of circles, left to right. `None` once space runs out.
pub fn shelf_pack(radii: &[i32], width: i32, height: i32) -> Vec<Option<(i32, i32, i32)>> {
    const GAP: i32 = 1;
    let mut out = Vec::with_capacity(radii.len());
    let (mut x, mut top, mut row_height) = (0, 0, 0);
    let mut full = false;
    for &r in radii {
        let d = 2 * r + 1;
        if x > 0 && x + d > width {
            x = 0;
            top += row_height + GAP;
            row_height = 0;
        }
        if full || top + d > height || d > width {
            full = true;
            out.push(None);
            continue;
        }
        out.push(Some((x + r, top + r, r)));
        x += d + GAP;
        row_height = row_height.max(d);
    }
    out
}

impl Chart for Bubble {
    fn title(&self) -> &str {
        "Authors and their publications"
    }

    fn handle(&mut self, input: Input) {
        match route_list(&mut self.filter, &mut self.cursor, &self.keys, input) {
            Some(Input::Next) => self.cycle_institution(1),
            Some(Input::Prev) => self.cycle_institution(-1),
            _ => {}
        }
        if self.institution().is_none() {
            // Reset clears the selection; the select always shows an institution
            self.cycle_institution(0);
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.people.is_empty() {
            widgets::empty_state("No data available", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 40);
        let (header, chart) = widgets::with_header(body, 2);
        put(buf, header, 0, 0, "Institution: ", Style::default().fg(MUTED));
        put(
            buf,
            header,
            13,
            0,
            &format!("◀ {} ▶", self.institution().unwrap_or("-")),
            Style::default().add_modifier(Modifier::BOLD),
        );
        self.render_bubbles(chart, buf);
        let title = if self.filter.pinned().is_some() { "Pinned" } else { "Details" };
        widgets::panel(title, self.detail_lines(), side, buf);
    }

    fn status(&self) -> String {
        format!("{} people in {}", self.member_count(), self.institution().unwrap_or("-"))
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        suggest(&self.names, query, self.suggestion_limit, &[])
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ move  enter pin  ←→ institution  / search"
    }
}
