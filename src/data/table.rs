use crate::error::LoadError;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column names of a table with a name → index lookup
#[derive(Debug)]
struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated column names
            index.entry(name.trim().to_string()).or_insert(i);
        }
        Self { names, index }
    }
}

/// One record of a source file: column name → string value
#[derive(Debug, Clone)]
pub struct Row {
    header: Arc<Header>,
    values: Vec<String>,
}

impl Row {
    /// Raw value of a column, `None` if the column is absent from this row
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.header.index.get(column)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Trimmed value of a column, `None` when missing or blank
    pub fn field(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }

    /// First non-blank value among several alternative column names
    pub fn first_field(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|c| self.field(c))
    }
}

/// Parsed rows of one delimited file
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    header: Arc<Header>,
    rows: Vec<Row>,
}

impl Table {
    fn from_reader<R: Read>(path: &Path, reader: R) -> Result<Self, LoadError> {
        let csv_err = |source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let names: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let header = Arc::new(Header::new(names));

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(Row {
                header: Arc::clone(&header),
                values: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    /// Parse CSV text held in memory
    pub fn from_csv(label: &str, text: &str) -> Result<Self, LoadError> {
        Self::from_reader(Path::new(label), text.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.header.names
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.index.contains_key(column)
    }

    /// Fail unless at least one of the alternative columns exists
    pub fn require_any(&self, columns: &[&'static str]) -> Result<(), LoadError> {
        if columns.iter().any(|c| self.has_column(c)) {
            Ok(())
        } else {
            Err(LoadError::MissingColumn {
                path: self.path.clone(),
                columns: columns.to_vec(),
            })
        }
    }
}

/// Read and parse a CSV file with a header row
pub fn load_table(path: &Path) -> Result<Table, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = Table::from_reader(path, std::io::BufReader::new(file))?;
    tracing::debug!(path = %path.display(), rows = table.len(), "parsed table");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_trims_and_drops_blank() {
        let table = Table::from_csv("t.csv", "name,inst\n  Ada  ,\nBob,X\n").unwrap();
        let rows = table.rows();
        assert_eq!(rows[0].get("name"), Some("  Ada  "));
        assert_eq!(rows[0].field("name"), Some("Ada"));
        assert_eq!(rows[0].field("inst"), None);
        assert_eq!(rows[1].field("inst"), Some("X"));
        assert_eq!(rows[1].field("missing"), None);
    }

    #[test]
    fn test_first_field_falls_back() {
        let table = Table::from_csv("t.csv", "openalex_id,id\n,A7\n").unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.first_field(&["openalex_id", "openalexid", "id"]), Some("A7"));
    }

    #[test]
    fn test_quoted_json_cell() {
        let text = "title,raw_json\nPaper,\"{\"\"title\"\": \"\"Paper\"\"}\"\n";
        let table = Table::from_csv("t.csv", text).unwrap();
        assert_eq!(table.rows()[0].get("raw_json"), Some("{\"title\": \"Paper\"}"));
    }

    #[test]
    fn test_short_records_are_tolerated() {
        let table = Table::from_csv("t.csv", "a,b,c\n1,2\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get("c"), None);
    }

    #[test]
    fn test_require_any() {
        let table = Table::from_csv("t.csv", "a,b\n").unwrap();
        assert!(table.is_empty());
        assert!(table.require_any(&["x", "b"]).is_ok());
        assert!(matches!(
            table.require_any(&["x", "y"]),
            Err(LoadError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_table(Path::new("/nonexistent/file.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
