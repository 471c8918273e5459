mod geo;
mod table;
pub mod work;

pub use geo::{load_countries, parse_countries, Country};
pub use table::{load_table, Row, Table};
pub use work::{normalize_id, parse_work, parse_works, Work};

use crate::error::LoadError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const WORKS_FILE: &str = "openalex_works_full.csv";
pub const PEOPLE_FILE: &str = "openalex_people.csv";
pub const COORDS_FILE: &str = "institutions_osm_coords.csv";
pub const COUNTRIES_FILE: &str = "countries.geojson";

/// Outcome of a one-shot load. A failure is terminal for the module holding it.
#[derive(Debug, Clone)]
pub enum LoadState<T> {
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(e) => LoadState::Failed(e.to_string()),
        }
    }

    pub fn as_ref(&self) -> LoadState<&T> {
        match self {
            LoadState::Loaded(v) => LoadState::Loaded(v),
            LoadState::Failed(msg) => LoadState::Failed(msg.clone()),
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(v) => Some(v),
            LoadState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Loaded(_) => None,
            LoadState::Failed(msg) => Some(msg),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }
}

/// Every source file the dashboards read, each loaded once and shared read-only.
pub struct Sources {
    pub dir: PathBuf,
    works: LoadState<Arc<Table>>,
    people: LoadState<Arc<Table>>,
    coords: LoadState<Arc<Table>>,
    countries: LoadState<Arc<Vec<Country>>>,
}

impl Sources {
    /// Load all source files in parallel on the rayon pool.
    pub fn load(dir: &Path) -> Self {
        let works_path = dir.join(WORKS_FILE);
        let people_path = dir.join(PEOPLE_FILE);
        let coords_path = dir.join(COORDS_FILE);
        let countries_path = dir.join(COUNTRIES_FILE);

        let ((works, people), (coords, countries)) = rayon::join(
            || {
                rayon::join(
                    || load_logged(&works_path, load_table),
                    || load_logged(&people_path, load_table),
                )
            },
            || {
                rayon::join(
                    || load_logged(&coords_path, load_table),
                    || load_logged(&countries_path, load_countries),
                )
            },
        );

        Self {
            dir: dir.to_path_buf(),
            works: LoadState::from_result(works.map(Arc::new)),
            people: LoadState::from_result(people.map(Arc::new)),
            coords: LoadState::from_result(coords.map(Arc::new)),
            countries: LoadState::from_result(countries.map(Arc::new)),
        }
    }

    /// Build sources from already-parsed tables (used by tests and benches).
    pub fn from_tables(works: Option<Table>, people: Option<Table>, coords: Option<Table>) -> Self {
        let wrap = |table: Option<Table>, name: &str| match table {
            Some(t) => LoadState::Loaded(Arc::new(t)),
            None => LoadState::Failed(format!("source file '{name}' not found")),
        };
        Self {
            dir: PathBuf::new(),
            works: wrap(works, WORKS_FILE),
            people: wrap(people, PEOPLE_FILE),
            coords: wrap(coords, COORDS_FILE),
            countries: LoadState::Failed(format!("source file '{COUNTRIES_FILE}' not found")),
        }
    }

    pub fn with_countries(mut self, countries: Vec<Country>) -> Self {
        self.countries = LoadState::Loaded(Arc::new(countries));
        self
    }

    pub fn works(&self) -> Result<Arc<Table>, LoadError> {
        upstream(&self.works, WORKS_FILE)
    }

    pub fn people(&self) -> Result<Arc<Table>, LoadError> {
        upstream(&self.people, PEOPLE_FILE)
    }

    pub fn coords(&self) -> Result<Arc<Table>, LoadError> {
        upstream(&self.coords, COORDS_FILE)
    }

    pub fn countries(&self) -> Result<Arc<Vec<Country>>, LoadError> {
        upstream(&self.countries, COUNTRIES_FILE)
    }
}

fn upstream<T: Clone>(state: &LoadState<T>, name: &'static str) -> Result<T, LoadError> {
    match state {
        LoadState::Loaded(v) => Ok(v.clone()),
        LoadState::Failed(msg) => Err(LoadError::Upstream(name, msg.clone())),
    }
}

fn load_logged<T, F>(path: &Path, load: F) -> Result<T, LoadError>
where
    F: FnOnce(&Path) -> Result<T, LoadError>,
{
    if !path.exists() {
        tracing::warn!(path = %path.display(), "source file missing");
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let started = std::time::Instant::now();
    let result = load(path);
    match &result {
        Ok(_) => tracing::info!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded source"
        ),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to load source"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sources_fail_independently() {
        let people = Table::from_csv("people.csv", "openalex_id,display_name_or_alias\nA1,Ada\n").unwrap();
        let sources = Sources::from_tables(None, Some(people), None);

        assert!(sources.people().is_ok());
        let err = sources.works().unwrap_err();
        assert!(matches!(err, LoadError::Upstream(WORKS_FILE, _)));
        assert!(sources.countries().is_err());
    }

    #[test]
    fn test_load_missing_directory() {
        let sources = Sources::load(Path::new("/nonexistent/tui-raise-data"));
        assert!(sources.works().is_err());
        assert!(sources.people().is_err());
        assert!(sources.coords().is_err());
    }

    #[test]
    fn test_load_state_accessors() {
        let ok: LoadState<u32> = LoadState::from_result(Ok::<_, String>(3));
        assert_eq!(ok.loaded(), Some(&3));
        assert!(ok.error().is_none());

        let failed: LoadState<u32> = LoadState::from_result(Err("boom"));
        assert_eq!(failed.error(), Some("boom"));
        assert!(!failed.is_loaded());
    }
}
