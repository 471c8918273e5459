use super::widgets::{self, muted, put, MUTED};
use super::{route_list, Chart, Cursor, Input};
use crate::aggregate::{count_by, ranked, Counts};
use crate::config::Config;
use crate::data::{parse_works, LoadState, Sources};
use crate::error::LoadError;
use crate::filter::{visual, FilterEvent, FilterState};
use crate::view::scale::{palette, OrdinalPalette, SqrtScale, MODERN};
use crate::view::suggest;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use std::collections::HashMap;

const UNKNOWN: &str = "Unknown";
const WORD_GAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudMode {
    Topics,
    Categories,
}

impl CloudMode {
    fn key(self) -> &'static str {
        match self {
            CloudMode::Topics => "topics",
            CloudMode::Categories => "cats",
        }
    }

    fn size_range(self) -> (f64, f64) {
        match self {
            CloudMode::Topics => (12.0, 45.0),
            CloudMode::Categories => (18.0, 50.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub count: u64,
    pub size: f64,
    /// Category the word is colored by
    pub category: String,
}

/// Linear congruential generator seeded from a string, reproducible across runs
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    pub fn new(seed: &str) -> Self {
        let state = seed
            .encode_utf16()
            .fold(0u32, |s, unit| s.wrapping_mul(31).wrapping_add(unit as u32));
        Self { state }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state as f64 / 4294967296.0
    }
}

/// Top `max` entries by frequency with sqrt-scaled sizes over the count extent
pub fn cloud_words(
    counts: &Counts,
    max: usize,
    range: (f64, f64),
    category: impl Fn(&str) -> String,
) -> Vec<Word> {
    let items: Vec<(String, u64)> = ranked(counts).into_iter().take(max).collect();
    let lo = items.last().map_or(0, |(_, c)| *c) as f64;
    let hi = items.first().map_or(0, |(_, c)| *c) as f64;
    let scale = SqrtScale::new((lo, hi), range);
    items
        .into_iter()
        .map(|(text, count)| Word {
            size: scale.apply(count as f64),
            category: category(&text),
            text,
            count,
        })
        .collect()
}

/// Seeded shuffle of word indices so the layout is stable between runs
pub fn layout_order(len: usize, seed: &str) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = SeededRandom::new(seed);
    for i in (1..len).rev() {
        let j = (rng.next_f64() * (i + 1) as f64) as usize;
        order.swap(i, j.min(i));
    }
    order
}

/// Break ordered words into centered lines no wider than `width`
pub fn flow_lines(widths: &[usize], order: &[usize], width: usize) -> Vec<Vec<usize>> {
    let mut lines: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut used = 0;
    for &i in order {
        let w = widths[i].min(width);
        let needed = if current.is_empty() { w } else { used + WORD_GAP + w };
        if !current.is_empty() && needed > width {
            lines.push(std::mem::take(&mut current));
            used = w;
        } else {
            used = needed;
        }
        current.push(i);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Topic and category frequency cloud
pub struct WordCloud {
    topics: Vec<Word>,
    categories: Vec<Word>,
    mode: CloudMode,
    colors: OrdinalPalette,
    filter: FilterState,
    cursor: Cursor,
}

impl WordCloud {
    pub fn build(sources: &Sources, config: &Config) -> LoadState<Self> {
        LoadState::from_result(Self::try_build(sources, config))
    }

    fn try_build(sources: &Sources, config: &Config) -> Result<Self, LoadError> {
        let works = sources.works()?;
        let parsed = parse_works(&works);

        let category_counts = count_by(parsed.iter(), |(_, w)| w.top_category().map(str::to_string));
        let topic_counts = count_by(parsed.iter(), |(_, w)| w.topics().map(str::to_string).collect::<Vec<_>>());
        let mut topic_category: HashMap<String, String> = HashMap::new();
        for (_, work) in &parsed {
            let Some(category) = work.top_category() else { continue };
            for topic in work.topics() {
                topic_category
                    .entry(topic.to_string())
                    .or_insert_with(|| category.to_string());
            }
        }

        let topics = cloud_words(
            &topic_counts,
            config.max_topic_words,
            CloudMode::Topics.size_range(),
            |t| topic_category.get(t).cloned().unwrap_or_else(|| UNKNOWN.to_string()),
        );
        let categories = cloud_words(
            &category_counts,
            config.max_category_words,
            CloudMode::Categories.size_range(),
            str::to_string,
        );

        let mut domain: Vec<String> = ranked(&category_counts).into_iter().map(|(k, _)| k).collect();
        domain.push(UNKNOWN.to_string());
        let colors = OrdinalPalette::new(&palette(&MODERN), domain);

        Ok(Self {
            topics,
            categories,
            mode: CloudMode::Topics,
            colors,
            filter: FilterState::new(),
            cursor: Cursor::default(),
        })
    }

    pub fn mode(&self) -> CloudMode {
        self.mode
    }

    pub fn words(&self) -> &[Word] {
        match self.mode {
            CloudMode::Topics => &self.topics,
            CloudMode::Categories => &self.categories,
        }
    }

    fn word_keys(&self) -> Vec<String> {
        self.words().iter().map(|w| w.text.clone()).collect()
    }

    /// Size class 0..=3 within the current mode's range
    fn tier(&self, size: f64) -> u8 {
        let (lo, hi) = self.mode.size_range();
        (((size - lo) / (hi - lo)).clamp(0.0, 1.0) * 3.0).round() as u8
    }

    fn label(&self, word: &Word) -> String {
        if self.tier(word.size) == 3 {
            word.text.to_uppercase()
        } else {
            word.text.clone()
        }
    }
}

impl Chart for WordCloud {
    fn title(&self) -> &str {
        match self.mode {
            CloudMode::Topics => "Research Topics",
            CloudMode::Categories => "Research Categories",
        }
    }

    fn handle(&mut self, input: Input) {
        let keys = self.word_keys();
        if input == Input::Toggle {
            // Selection is by category: it mutes every word outside the picked ones
            if let Some(i) = self.cursor.get(keys.len()) {
                let category = self.words()[i].category.clone();
                self.filter.apply(FilterEvent::ToggleSelection(category));
            }
            return;
        }
        if let Some(Input::SwitchView) = route_list(&mut self.filter, &mut self.cursor, &keys, input) {
            self.mode = match self.mode {
                CloudMode::Topics => CloudMode::Categories,
                CloudMode::Categories => CloudMode::Topics,
            };
            self.filter = FilterState::new();
            self.cursor.reset();
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        let words = self.words();
        if words.is_empty() {
            widgets::empty_state("No data available", area, buf);
            return;
        }
        let (body, side) = widgets::with_sidebar(area, 34);
        let labels: Vec<String> = words.iter().map(|w| self.label(w)).collect();
        let widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
        let seed = format!("seed:{}:{}", self.mode.key(), words.len());
        let order = layout_order(words.len(), &seed);
        let lines = flow_lines(&widths, &order, body.width as usize);

        let visible = lines.len().min(body.height as usize);
        let top = (body.height as usize - visible) / 2;
        for (row, line) in lines.iter().take(visible).enumerate() {
            let line_width: usize = line.iter().map(|&i| widths[i]).sum::<usize>() + WORD_GAP * (line.len() - 1);
            let mut x = (body.width as usize).saturating_sub(line_width) / 2;
            for &i in line {
                let word = &words[i];
                let v = visual(&self.filter, &word.text, &word.text, [word.category.as_str()]);
                let mut style = widgets::styled(&v, self.colors.color(&word.category));
                if self.tier(word.size) >= 2 {
                    style = style.add_modifier(Modifier::BOLD);
                }
                put(buf, body, x as u16, (top + row) as u16, &labels[i], style);
                x += widths[i] + WORD_GAP;
            }
        }
        if lines.len() > visible {
            let hidden: usize = lines[visible..].iter().map(Vec::len).sum();
            put(
                buf,
                body,
                0,
                body.height.saturating_sub(1),
                &format!("+{hidden} smaller words"),
                Style::default().fg(MUTED),
            );
        }

        let mut detail = Vec::new();
        match self.filter.focused().and_then(|k| words.iter().find(|w| w.text == k)) {
            Some(word) => {
                detail.push(widgets::heading(word.text.clone()));
                detail.push(muted(format!("{} works", word.count)));
                if self.mode == CloudMode::Topics {
                    detail.push(muted(format!("Category: {}", word.category)));
                }
            }
            None => detail.push(muted("v: switch topics / categories")),
        }
        widgets::panel("Details", detail, side, buf);
    }

    fn status(&self) -> String {
        let noun = match self.mode {
            CloudMode::Topics => "topics",
            CloudMode::Categories => "categories",
        };
        match self.filter.focused().and_then(|k| self.words().iter().find(|w| w.text == k)) {
            Some(word) => format!("{}: {} works", word.text, word.count),
            None => format!("{} {noun}", self.words().len()),
        }
    }

    fn suggestions(&self, query: &str) -> Vec<String> {
        let keys = self.word_keys();
        suggest(&keys, query, 10, &[])
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn keys(&self) -> &'static str {
        "↑↓ move  enter pin  space category  v topics/categories  / search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use pretty_assertions::assert_eq;

    fn work(l0: &str, l1: &[&str]) -> String {
        let mut concepts = vec![format!(r#"{{"display_name":"{l0}","level":0,"score":0.9}}"#)];
        concepts.extend(l1.iter().map(|t| format!(r#"{{"display_name":"{t}","level":1}}"#)));
        let json = format!(r#"{{"concepts":[{}]}}"#, concepts.join(","));
        format!("\"{}\"", json.replace('"', "\"\""))
    }

    fn cloud() -> WordCloud {
        cloud_of(&[
            work("Medicine", &["Oncology", "Surgery"]),
            work("Biology", &["Oncology", "Genetics"]),
            work("Medicine", &["Oncology"]),
        ])
    }

    fn cloud_of(rows: &[String]) -> WordCloud {
        let csv = format!("raw_json\n{}\n", rows.join("\n"));
        let sources = Sources::from_tables(Some(Table::from_csv("works.csv", &csv).unwrap()), None, None);
        match WordCloud::build(&sources, &Config::default()) {
            LoadState::Loaded(w) => w,
            LoadState::Failed(msg) => panic!("{msg}"),
        }
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut rng = SeededRandom::new("a");
        assert_eq!(rng.next_f64(), 1175363148.0 / 4294967296.0);
        let a: Vec<f64> = {
            let mut r = SeededRandom::new("seed:topics:3");
            (0..5).map(|_| r.next_f64()).collect()
        };
        let b: Vec<f64> = {
            let mut r = SeededRandom::new("seed:topics:3");
            (0..5).map(|_| r.next_f64()).collect()
        };
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_topic_frequencies_and_colors() {
        let c = cloud();
        let top = &c.words()[0];
        assert_eq!(top.text, "Oncology");
        assert_eq!(top.count, 3);
        assert_eq!(top.size, 45.0);
        assert_eq!(top.category, "Medicine");
        let genetics = c.words().iter().find(|w| w.text == "Genetics").unwrap();
        assert_eq!(genetics.category, "Biology");
        assert_eq!(genetics.size, 12.0);
    }

    #[test]
    fn test_repeated_topic_counts_once_per_work() {
        let c = cloud_of(&[
            work("Medicine", &["Oncology", "Oncology"]),
            work("Medicine", &["Surgery"]),
        ]);
        let oncology = c.words().iter().find(|w| w.text == "Oncology").unwrap();
        assert_eq!(oncology.count, 1);
    }

    #[test]
    fn test_switch_to_categories() {
        let mut c = cloud();
        c.handle(Input::SwitchView);
        assert_eq!(c.mode(), CloudMode::Categories);
        let texts: Vec<&str> = c.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Medicine", "Biology"]);
        assert_eq!(c.status(), "2 categories");
    }

    #[test]
    fn test_layout_order_is_permutation() {
        let mut order = layout_order(20, "seed:topics:20");
        assert_eq!(order, layout_order(20, "seed:topics:20"));
        order.sort_unstable();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_flow_lines_wrap() {
        let lines = flow_lines(&[4, 4, 4], &[0, 1, 2], 10);
        assert_eq!(lines, vec![vec![0, 1], vec![2]]);
        let lines = flow_lines(&[30], &[0], 10);
        assert_eq!(lines, vec![vec![0]]);
    }

    #[test]
    fn test_render_smoke() {
        let c = cloud();
        let area = Rect::new(0, 0, 80, 10);
        let mut buf = Buffer::empty(area);
        c.render(area, &mut buf);
    }
}
