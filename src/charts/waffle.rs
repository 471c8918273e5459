use super::widgets::{self, put, thousands, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::{count_by, ranked};
use crate::config::Config;
use crate::data::{LoadState, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterState};
use crate::view::scale::{palette, OrdinalPalette};
use crate::view::{allocate_cells, expand_cells, Allocation};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

const UNKNOWN: &str = "unknown";

/// Tableau10 followed by Set3
const PALETTE: [&str; 22] = [
    "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7", "#9c755f",
    "#bab0ab", "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69", "#fccde5",
    "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
];

/// Share of each publication type as a fixed grid of cells
pub struct Waffle {
    legend: Vec<(String, u64)>,
    keys: Vec<String>,
    total: u64,
    allocation: Vec<Allocation>,
    columns: usize,
    colors: OrdinalPalette,
    filter: FilterState,
    cursor: Cursor,
}

impl Waffle {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let works = sources.works()?;
        let counts = count_by(works.rows(), |row| {
            [row.field("type").unwrap_or(UNKNOWN).to_string()]
        });
        let legend = ranked(&counts);
        let total = legend.iter().map(|(_, c)| c).sum();
        let allocation = allocate_cells(&legend, config.waffle_cells);
        let keys: Vec<String> = legend.iter().map(|(k, _)| k.clone()).collect();
        let colors = OrdinalPalette::new(&palette(&PALETTE), keys.iter().cloned());

        Ok(Self {
            legend,
            keys,
            total,
            allocation,
            columns: config.waffle_columns.max(1),
            colors,
            filter: FilterState::new(),
            cursor: Cursor::default(),
        })
    }

    /// Cell index → publication type
    pub fn cells(&self) -> Vec<&str> {
        expand_cells(&self.allocation)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn render_grid(&self, area: Rect, buf: &mut Buffer) {
        put(buf, area, 1, 0, "Publication Types", Style::default().add_modifier(Modifier::BOLD));
        put(
            buf,
            area,
            1,
            1,
            &format!("Total Publications: {}", thousands(self.total)),
            Style::default().fg(MUTED),
        );

        for (i, key) in self.cells().into_iter().enumerate() {
            let (row, col) = (i / self.columns, i % self.columns);
            let v = visual(&self.filter, key, key, [key]);
            let style = widgets::styled(&v, self.colors.color(key));
            let glyph = if v.is_dimmed() { "○" } else { "●" };
            put(buf, area, 1 + col as u16 * 2, 3 + row as u16, glyph, style);
        }
    }

    fn render_legend(&self, area: Rect, buf: &mut Buffer) {
        put(buf, area, 0, 0, "CATEGORIES", Style::default().fg(MUTED).add_modifier(Modifier::BOLD));
        let height = area.height.saturating_sub(2) as usize;
        let start = self.cursor.scroll(self.legend.len(), height);
        let count_x = area.width.saturating_sub(8);
        for (row, (key, count)) in self.legend.iter().enumerate().skip(start).take(height) {
            let y = (row - start) as u16 + 2;
            let v = visual(&self.filter, key, key, [key.as_str()]);
            let style = widgets::styled(&v, self.colors.color(key));
            put(buf, area, 0, y, "●", style);
            let name = widgets::truncate(key, count_x.saturating_sub(3) as usize);
            put(buf, area, 2, y, &name, style);
            put(buf, area, count_x, y, &format!("{:>7}", thousands(*count)), Style::default().fg(MUTED));
        }
    }
}

impl Chart for Waffle {
    fn title(&self) -> &str {
        "Publication Types"
    }

    fn handle(&mut self, input: Input) {
        route_list(&mut self.filter, &mut self.cursor, &self.keys, input);
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if self.legend.is_empty() {
            widgets::empty_state("No publications", area, buf);
            return;
        }
        let grid_width = (self.columns as u16 * 2 + 2).min(area.width / 2);
        let (grid, legend) = widgets::with_sidebar(area, area.width.saturating_sub(grid_width));
        self.render_grid(grid, buf);
        self.render_legend(legend, buf);
    }

    fn status(&self) -> String {
        match self.filter.focused() {
            Some(key) => {
                let count = self.legend.iter().find(|(k, _)| k == key).map_or(0, |(_, c)| *c);
                let cells = self.allocation.iter().find(|a| a.key == key).map_or(0, |a| a.cells);
                format!("{key}: {} works, {cells} cells", thousands(count))
            }
            None => format!("{} types, {} works", self.legend.len(), thousands(self.total)),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        crate::view::suggest(&self.keys, query, 10, &[])
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ move  enter pin  space select  / search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    fn sources(csv: &str) -> Sources {
        Sources::from_tables(Some(Table::from_csv("works.csv", csv).unwrap()), None, None)
    }

    fn built(csv: &str) -> Waffle {
        match Waffle::build(&sources(csv), &Config::default()) {
            LoadState::Loaded(w) => w,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    #[test]
    fn test_counts_and_unknown_bucket() {
        let w = built("type,title\narticle,a\narticle,b\n,c\n  ,d\nreview,e\n");
        assert_eq!(
            w.legend,
            vec![("article".to_string(), 2), (UNKNOWN.to_string(), 2), ("review".to_string(), 1)]
        );
        assert_eq!(w.total(), 5);
    }

    #[test]
    fn test_cells_fill_budget_in_legend_order() {
        let w = built("type\narticle\narticle\narticle\nreview\n");
        let cells = w.cells();
        assert_eq!(cells.len(), 236);
        assert_eq!(cells[0], "article");
        assert_eq!(cells[176], "article");
        assert_eq!(cells[177], "review");
    }

    #[test]
    fn test_hover_and_pin_status() {
        let mut w = built("type\narticle\nreview\n");
        w.handle(Input::Down);
        assert_eq!(w.status(), "review: 1 works, 118 cells");
        w.handle(Input::Up);
        w.handle(Input::Select);
        w.handle(Input::Down);
        assert!(w.status().starts_with("article"));
    }

    #[test]
    fn test_render_smoke() {
        let w = built("type\narticle\nreview\n");
        let area = Rect::new(0, 0, 80, 30);
        let mut buf = Buffer::empty(area);
        w.render(area, &mut buf);
        assert_eq!(buf[(1, 3)].symbol(), "●");
    }

    #[test]
    fn test_missing_works_fails() {
        let state = Waffle::build(&Sources::from_tables(None, None, None), &Config::default());
        assert!(state.error().is_some_and(|e| e.contains("openalex_works_full.csv")));
    }
}
