//! Embedded OpenAlex work documents carried in the `raw_json` column.

use super::table::{Row, Table};
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Work {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub publication_year: Option<i64>,
    pub authorships: Vec<Authorship>,
    pub concepts: Vec<Concept>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Authorship {
    pub author: Option<Author>,
    pub institutions: Vec<Institution>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Institution {
    pub id: Option<String>,
    pub ror: Option<String>,
    pub display_name: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Concept {
    pub display_name: Option<String>,
    pub level: Option<i64>,
    pub score: Option<f64>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Work {
    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    /// Normalized author ids in authorship order (may repeat)
    pub fn author_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref())
            .map(|a| normalize_id(a.id.as_deref().unwrap_or("")))
            .filter(|id| !id.is_empty())
    }

    /// (normalized id, display name) for every named author
    pub fn named_authors(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref())
            .filter_map(|a| {
                let id = normalize_id(a.id.as_deref().unwrap_or(""));
                let name = non_blank(&a.display_name)?;
                (!id.is_empty()).then_some((id, name))
            })
    }

    pub fn institutions(&self) -> impl Iterator<Item = &Institution> {
        self.authorships.iter().flat_map(|a| a.institutions.iter())
    }

    /// Level-0 concept with the highest score: the work's category
    pub fn top_category(&self) -> Option<&str> {
        self.concepts
            .iter()
            .filter(|c| c.level == Some(0))
            .filter_map(|c| Some((non_blank(&c.display_name)?, c.score.unwrap_or(0.0))))
            .fold(None, |best: Option<(&str, f64)>, (name, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((name, score)),
            })
            .map(|(name, _)| name)
    }

    /// Level-1 concepts: the work's topics
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.concepts
            .iter()
            .filter(|c| c.level == Some(1))
            .filter_map(|c| non_blank(&c.display_name))
    }
}

impl Institution {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.display_name)
    }

    /// Upper-cased ISO-2 country code
    pub fn country(&self) -> Option<String> {
        non_blank(&self.country_code).map(str::to_uppercase)
    }

    /// Stable identity: OpenAlex id, else ROR, else display name
    pub fn identity(&self) -> Option<&str> {
        non_blank(&self.id)
            .or_else(|| non_blank(&self.ror))
            .or_else(|| non_blank(&self.display_name))
    }
}

/// Parse one embedded document. Malformed input yields `None`; the row is skipped.
pub fn parse_work(raw: &str) -> Option<Work> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // Cells exported with an extra layer of CSV quoting
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let unwrapped = raw[1..raw.len() - 1].replace("\"\"", "\"");
        if let Some(work) = from_json(unwrapped.into_bytes()) {
            return Some(work);
        }
    }
    from_json(raw.as_bytes().to_vec())
}

fn from_json(mut bytes: Vec<u8>) -> Option<Work> {
    simd_json::serde::from_slice::<Work>(&mut bytes).ok()
}

/// Canonical OpenAlex URL form of an id
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    if id.is_empty() || id.starts_with("http") {
        return id.to_string();
    }
    let mut chars = id.chars();
    let short_form = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.clone().next().is_some()
        && chars.all(|c| c.is_ascii_digit());
    if short_form {
        return format!("https://openalex.org/{id}");
    }
    if id.contains("openalex.org/") {
        return format!("https://{id}");
    }
    id.to_string()
}

/// Parse the `raw_json` column of every row that carries one.
///
/// Malformed documents are skipped; how many were dropped is logged once per table.
pub fn parse_works(table: &Table) -> Vec<(&Row, Work)> {
    let mut skipped = 0usize;
    let works: Vec<(&Row, Work)> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let raw = row.field("raw_json")?;
            match parse_work(raw) {
                Some(work) => Some((row, work)),
                None => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();
    if skipped > 0 {
        tracing::debug!(path = %table.path().display(), skipped, "skipped malformed raw_json documents");
    }
    works
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "title": "Robots",
        "type": "article",
        "publication_year": 2024,
        "authorships": [
            {"author": {"id": "https://openalex.org/A1", "display_name": "Ada"},
             "institutions": [{"id": "https://openalex.org/I1", "display_name": "University of Genoa", "country_code": "it"}]},
            {"author": {"id": "A2", "display_name": "Bob"}, "institutions": []},
            {"author": null, "institutions": [{"ror": "https://ror.org/x", "country_code": "FR"}]}
        ],
        "concepts": [
            {"display_name": "Computer science", "level": 0, "score": 0.4},
            {"display_name": "Engineering", "level": 0, "score": 0.7},
            {"display_name": "Robotics", "level": 1, "score": 0.9},
            {"display_name": "Control", "level": 2, "score": 0.3}
        ],
        "unrelated": {"nested": [1, 2, 3]}
    }"#;

    #[test]
    fn test_parse_full_document() {
        let work = parse_work(DOC).expect("valid document");
        assert_eq!(work.title(), Some("Robots"));
        assert_eq!(work.kind.as_deref(), Some("article"));
        assert_eq!(work.publication_year, Some(2024));
        let ids: Vec<String> = work.author_ids().collect();
        assert_eq!(ids, vec!["https://openalex.org/A1", "https://openalex.org/A2"]);
        assert_eq!(work.top_category(), Some("Engineering"));
        assert_eq!(work.topics().collect::<Vec<_>>(), vec!["Robotics"]);
    }

    #[test]
    fn test_institution_helpers() {
        let work = parse_work(DOC).unwrap();
        let insts: Vec<&Institution> = work.institutions().collect();
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].country().as_deref(), Some("IT"));
        assert_eq!(insts[0].identity(), Some("https://openalex.org/I1"));
        assert_eq!(insts[1].identity(), Some("https://ror.org/x"));
        assert_eq!(insts[1].name(), None);
    }

    #[test]
    fn test_malformed_document_is_none() {
        assert!(parse_work("{not json").is_none());
        assert!(parse_work("").is_none());
        assert!(parse_work("   ").is_none());
    }

    #[test]
    fn test_double_quoted_document() {
        let wrapped = r#""{""title"": ""Wrapped""}""#;
        let work = parse_work(wrapped).expect("unwrapped document");
        assert_eq!(work.title(), Some("Wrapped"));
    }

    #[test]
    fn test_parse_works_skips_bad_rows() {
        let csv = "title,raw_json\nA,\"{\"\"title\"\": \"\"A\"\"}\"\nB,{oops\nC,\n";
        let table = Table::from_csv("works.csv", csv).unwrap();
        let works = parse_works(&table);
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].0.field("title"), Some("A"));
        assert_eq!(works[0].1.title(), Some("A"));
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(" A123 "), "https://openalex.org/A123");
        assert_eq!(normalize_id("https://openalex.org/I9"), "https://openalex.org/I9");
        assert_eq!(normalize_id("openalex.org/I9"), "https://openalex.org/I9");
        assert_eq!(normalize_id("custom-id"), "custom-id");
        assert_eq!(normalize_id("A"), "A");
        assert_eq!(normalize_id(""), "");
    }
}
