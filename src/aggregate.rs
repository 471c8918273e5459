//! Single-pass grouping over row collections.
//!
//! Every fold here deduplicates keys within a row before touching an
//! accumulator, so a row that lists the same entity twice contributes once.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Key → number of contributing rows
pub type Counts = HashMap<String, u64>;

/// Count plus the set of secondary values associated with a key
#[derive(Debug, Clone, PartialEq)]
pub struct Tally<A: Ord> {
    pub count: u64,
    pub associations: BTreeSet<A>,
}

impl<A: Ord> Default for Tally<A> {
    fn default() -> Self {
        Self {
            count: 0,
            associations: BTreeSet::new(),
        }
    }
}

/// Co-occurrence accumulator for an unordered key pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairTally {
    pub count: u64,
    pub titles: BTreeSet<String>,
}

/// Canonical (lexicographically ordered) pair key
pub type PairKey = (String, String);

/// Split a delimited list field, trimming entries and dropping blanks
pub fn split_list(value: &str, delimiter: char) -> impl Iterator<Item = &str> {
    value.split(delimiter).map(str::trim).filter(|s| !s.is_empty())
}

/// Trimmed, non-empty, sorted and deduplicated keys of one row
fn row_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = keys
        .into_iter()
        .filter_map(|k| {
            let k = k.as_ref().trim();
            (!k.is_empty()).then(|| k.to_string())
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Count rows per key.
pub fn count_by<T, I, F>(rows: impl IntoIterator<Item = T>, mut keys: F) -> Counts
where
    F: FnMut(&T) -> I,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut counts = Counts::new();
    for row in rows {
        for key in row_keys(keys(&row)) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

/// Count rows per key and collect the row's association under each key.
pub fn count_with<T, I, A, F, G>(
    rows: impl IntoIterator<Item = T>,
    mut keys: F,
    mut association: G,
) -> HashMap<String, Tally<A>>
where
    F: FnMut(&T) -> I,
    I: IntoIterator,
    I::Item: AsRef<str>,
    G: FnMut(&T) -> Option<A>,
    A: Ord + Clone,
{
    let mut out: HashMap<String, Tally<A>> = HashMap::new();
    for row in rows {
        let row_keys = row_keys(keys(&row));
        if row_keys.is_empty() {
            continue;
        }
        let assoc = association(&row);
        for key in row_keys {
            let tally = out.entry(key).or_default();
            tally.count += 1;
            if let Some(a) = &assoc {
                tally.associations.insert(a.clone());
            }
        }
    }
    out
}

/// Co-occurrence of every unordered pair of distinct keys in a row.
pub fn pairs<T, I, F, G>(
    rows: impl IntoIterator<Item = T>,
    mut keys: F,
    mut title: G,
) -> HashMap<PairKey, PairTally>
where
    F: FnMut(&T) -> I,
    I: IntoIterator,
    I::Item: AsRef<str>,
    G: FnMut(&T) -> Option<String>,
{
    let mut out: HashMap<PairKey, PairTally> = HashMap::new();
    for row in rows {
        // Sorted, so (ids[i], ids[j]) with i < j is already canonical
        let ids = row_keys(keys(&row));
        if ids.len() < 2 {
            continue;
        }
        let title = title(&row).filter(|t| !t.trim().is_empty());
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let tally = out.entry((ids[i].clone(), ids[j].clone())).or_default();
                tally.count += 1;
                if let Some(t) = &title {
                    tally.titles.insert(t.trim().to_string());
                }
            }
        }
    }
    out
}

/// Outer key → inner key → count, deduplicating (outer, inner) pairs per row.
pub fn nested<T, I, K1, K2, F>(rows: impl IntoIterator<Item = T>, mut keys: F) -> HashMap<String, Counts>
where
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = (K1, K2)>,
    K1: AsRef<str>,
    K2: AsRef<str>,
{
    let mut out: HashMap<String, Counts> = HashMap::new();
    for row in rows {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for (outer, inner) in keys(&row) {
            let (outer, inner) = (outer.as_ref().trim(), inner.as_ref().trim());
            if outer.is_empty() || inner.is_empty() {
                continue;
            }
            if seen.insert((outer.to_string(), inner.to_string())) {
                *out.entry(outer.to_string())
                    .or_default()
                    .entry(inner.to_string())
                    .or_insert(0) += 1;
            }
        }
    }
    out
}

/// Key → set of distinct values seen with it
pub fn distinct_by<T, I, V, F>(rows: impl IntoIterator<Item = T>, mut pairs: F) -> HashMap<String, BTreeSet<V>>
where
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = (String, V)>,
    V: Ord,
{
    let mut out: HashMap<String, BTreeSet<V>> = HashMap::new();
    for row in rows {
        for (key, value) in pairs(&row) {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            out.entry(key.to_string()).or_default().insert(value);
        }
    }
    out
}

/// First value seen for each key wins
pub fn first_seen<T, I, F>(rows: impl IntoIterator<Item = T>, mut pairs: F) -> HashMap<String, String>
where
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = (String, String)>,
{
    let mut out = HashMap::new();
    for row in rows {
        for (key, value) in pairs(&row) {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            out.entry(key).or_insert(value);
        }
    }
    out
}

/// Entries sorted by descending count, ties broken by key
pub fn ranked(counts: &Counts) -> Vec<(String, u64)> {
    let mut items: Vec<(String, u64)> = counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

/// Key with the highest count; ties resolve to the smallest key
pub fn arg_max<K: AsRef<str> + Ord + Eq + Hash>(counts: &HashMap<K, u64>) -> Option<&K> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, _)| k)
}
