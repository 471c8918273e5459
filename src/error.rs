use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading a source file. Terminal for every chart that needs it.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed CSV in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed GeoJSON in '{}': {source}", path.display())]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },
    #[error("'{}' has no column named any of {columns:?}", path.display())]
    MissingColumn { path: PathBuf, columns: Vec<&'static str> },
    #[error("source '{0}' failed to load earlier: {1}")]
    Upstream(&'static str, String),
}
