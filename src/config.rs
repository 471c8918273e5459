use crate::charts::ChartKind;
use clap::Parser;
use std::path::PathBuf;

/// Terminal dashboards over OpenAlex research collaboration exports
#[derive(Debug, Parser)]
#[command(name = "tui-raise", version, about)]
pub struct Cli {
    /// Directory holding the CSV exports and the optional countries.geojson
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Chart shown at startup
    #[arg(long, value_enum, default_value_t = ChartKind::Waffle)]
    pub chart: ChartKind,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, default_value = "tui-raise.log")]
    pub log_file: PathBuf,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Cell budget of the waffle chart
    #[arg(long, default_value_t = 236)]
    pub cells: usize,

    /// Institutions kept visible before folding into Others
    #[arg(long, default_value_t = 12)]
    pub top_n: usize,
}

/// Tunables shared by every chart builder
#[derive(Debug, Clone)]
pub struct Config {
    pub waffle_cells: usize,
    pub waffle_columns: usize,
    pub top_n: usize,
    /// Institutions that always stay visible in the treemap views
    pub allow_list: Vec<String>,
    pub people_suggestions: usize,
    pub term_suggestions: usize,
    pub max_topic_words: usize,
    pub max_category_words: usize,
    pub edge_titles: usize,
    pub profile_topics: usize,
    pub years: Vec<String>,
    pub default_institution: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            waffle_cells: 236,
            waffle_columns: 13,
            top_n: 12,
            allow_list: vec![
                r"universit[aà]\s+di\s+genova|unige|university\s+of\s+genoa".to_string(),
                r"\bcnr\b|national\s+research\s+council".to_string(),
                r"\biit\b|istituto\s+italiano\s+di\s+tecnologia|italian\s+institute\s+of\s+technology".to_string(),
            ],
            people_suggestions: 50,
            term_suggestions: 15,
            max_topic_words: 250,
            max_category_words: 50,
            edge_titles: 10,
            profile_topics: 20,
            years: vec!["2023".into(), "2024".into(), "2025".into()],
            default_institution: "University of Genoa".to_string(),
        }
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            waffle_cells: cli.cells,
            top_n: cli.top_n,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tui-raise"]);
        assert_eq!(cli.data_dir, PathBuf::from("data"));
        assert_eq!(cli.chart, ChartKind::Waffle);
        let config = Config::from(&cli);
        assert_eq!(config.waffle_cells, 236);
        assert_eq!(config.top_n, 12);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["tui-raise", "--chart", "flow-map", "--cells", "100", "--top-n", "5"]);
        assert_eq!(cli.chart, ChartKind::FlowMap);
        let config = Config::from(&cli);
        assert_eq!(config.waffle_cells, 100);
        assert_eq!(config.top_n, 5);
    }
}
