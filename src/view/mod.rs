//! Derived views: reshape an aggregate into what a renderer consumes.

pub mod graph;
pub mod scale;

use crate::aggregate::{ranked, Counts};
use regex::Regex;

pub const OTHERS_LABEL: &str = "Others";

/// Selection key of the folded bucket, distinct from any real key named "Others"
pub const OTHERS_KEY: &str = "\u{1f}others";

/// One entry of a reduced, renderable view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewItem {
    pub label: String,
    /// Real number of contributing rows (for Others: the folded sum)
    pub count: u64,
    /// Weight handed to the renderer (Others may be capped)
    pub weight: f64,
    pub is_others: bool,
}

/// Names that always stay visible regardless of rank
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Build from case-insensitive pattern strings, skipping invalid ones
    pub fn from_patterns(patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "ignoring invalid allow-list pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// Parameters of a top-N-plus-Others reduction
pub struct TopN<'a> {
    pub n: usize,
    /// Active filter terms; keys containing any of them stay visible
    pub terms: &'a [String],
    pub allow: &'a AllowList,
}

/// Keep the top N keys, filter matches and allow-listed keys; fold the rest into Others.
///
/// Others' weight is capped at half the largest visible weight so it never
/// dominates. With no visible entry the fold keeps its full sum.
pub fn top_n_with_others(counts: &Counts, params: &TopN<'_>) -> Vec<ViewItem> {
    let terms: Vec<String> = params
        .terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut visible = Vec::new();
    let mut folded = 0u64;

    for (index, (label, count)) in ranked(counts).into_iter().enumerate() {
        let lower = label.to_lowercase();
        let keep = index < params.n
            || params.allow.matches(&label)
            || terms.iter().any(|t| lower.contains(t));
        if keep {
            visible.push(ViewItem {
                label,
                count,
                weight: count as f64,
                is_others: false,
            });
        } else {
            folded += count;
        }
    }

    if folded > 0 {
        let cap = visible.first().map_or(folded as f64, |v| v.weight * 0.5);
        visible.push(ViewItem {
            label: OTHERS_LABEL.to_string(),
            count: folded,
            weight: (folded as f64).min(cap),
            is_others: true,
        });
    }
    visible
}

/// Number of cells given to a key by [`allocate_cells`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub key: String,
    pub count: u64,
    pub cells: usize,
}

/// Split `budget` cells proportionally with the largest-remainder method.
///
/// Each key gets `floor(budget * count / total)`; leftover cells go one each to
/// the largest remainders, ties in input order. Whenever total > 0 the cells sum
/// to exactly `budget`. Integer arithmetic keeps the remainders exact.
pub fn allocate_cells(items: &[(String, u64)], budget: usize) -> Vec<Allocation> {
    let total: u64 = items.iter().map(|(_, c)| c).sum();
    let mut out: Vec<Allocation> = items
        .iter()
        .map(|(key, count)| Allocation {
            key: key.clone(),
            count: *count,
            cells: 0,
        })
        .collect();
    if total == 0 || budget == 0 {
        return out;
    }

    let budget_wide = budget as u128;
    let mut remainders: Vec<(usize, u128)> = Vec::with_capacity(items.len());
    let mut assigned = 0usize;
    for (i, (_, count)) in items.iter().enumerate() {
        let scaled = budget_wide * *count as u128;
        let cells = (scaled / total as u128) as usize;
        out[i].cells = cells;
        assigned += cells;
        remainders.push((i, scaled % total as u128));
    }

    // Stable sort keeps input order among equal remainders
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    for &(i, _) in remainders.iter().take(budget.saturating_sub(assigned)) {
        out[i].cells += 1;
    }
    out
}

/// Cell index → key, in allocation order
pub fn expand_cells(allocation: &[Allocation]) -> Vec<&str> {
    allocation
        .iter()
        .flat_map(|a| std::iter::repeat(a.key.as_str()).take(a.cells))
        .collect()
}

/// Leaf of a single-level hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub label: String,
    pub value: f64,
    pub is_others: bool,
}

/// Single-level tree handed to packing / treemap renderers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub leaves: Vec<Leaf>,
}

impl Leaf {
    /// Key used for hover, pin and lookups
    pub fn key(&self) -> &str {
        if self.is_others {
            OTHERS_KEY
        } else {
            &self.label
        }
    }
}

impl Hierarchy {
    /// Wrap view items as leaves, largest first with Others always last
    pub fn from_items(items: &[ViewItem]) -> Self {
        let mut leaves: Vec<Leaf> = items
            .iter()
            .map(|i| Leaf {
                label: i.label.clone(),
                value: i.weight,
                is_others: i.is_others,
            })
            .collect();
        leaves.sort_by(|a, b| {
            a.is_others
                .cmp(&b.is_others)
                .then_with(|| b.value.total_cmp(&a.value))
        });
        Self { leaves }
    }

    pub fn total(&self) -> f64 {
        self.leaves.iter().map(|l| l.value).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// Type-ahead: names containing `query` (case-insensitive), skipping excluded, at most `limit`
pub fn suggest<'a>(
    names: &'a [String],
    query: &str,
    limit: usize,
    exclude: &[String],
) -> Vec<&'a str> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let excluded: Vec<String> = exclude.iter().map(|e| e.to_lowercase()).collect();
    names
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.contains(&query) && !excluded.contains(&lower)
        })
        .take(limit)
        .map(String::as_str)
        .collect()
}

/// Collapse whitespace runs and trim
pub fn normalize_label(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn counts(pairs: &[(&str, u64)]) -> Counts {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn cells_of(alloc: &[Allocation], key: &str) -> usize {
        alloc.iter().find(|a| a.key == key).map_or(0, |a| a.cells)
    }

    #[test]
    fn test_allocate_cells_example() {
        let items = vec![("A".to_string(), 2), ("B".to_string(), 2), ("C".to_string(), 1)];
        let alloc = allocate_cells(&items, 4);
        assert_eq!(cells_of(&alloc, "A"), 2);
        assert_eq!(cells_of(&alloc, "B"), 1);
        assert_eq!(cells_of(&alloc, "C"), 1);
        assert_eq!(alloc.iter().map(|a| a.cells).sum::<usize>(), 4);
    }

    #[test]
    fn test_allocate_cells_zero_total() {
        let items = vec![("A".to_string(), 0)];
        let alloc = allocate_cells(&items, 10);
        assert_eq!(alloc[0].cells, 0);
        assert!(allocate_cells(&[], 10).is_empty());
    }

    #[test]
    fn test_expand_cells_order() {
        let items = vec![("A".to_string(), 3), ("B".to_string(), 1)];
        let alloc = allocate_cells(&items, 4);
        assert_eq!(expand_cells(&alloc), vec!["A", "A", "A", "B"]);
    }

    #[test]
    fn test_top_n_folds_and_caps_others() {
        let c = counts(&[("big", 10), ("mid", 6), ("s1", 4), ("s2", 4), ("s3", 3)]);
        let allow = AllowList::default();
        let view = top_n_with_others(&c, &TopN { n: 2, terms: &[], allow: &allow });
        assert_eq!(view.len(), 3);
        assert_eq!(view[0].label, "big");
        assert_eq!(view[1].label, "mid");
        let others = &view[2];
        assert!(others.is_others);
        assert_eq!(others.count, 11);
        assert_eq!(others.weight, 5.0);
    }

    #[test]
    fn test_top_n_keeps_terms_and_allow_list() {
        let c = counts(&[("Big", 10), ("Tiny Lab", 1), ("University of Genoa", 2), ("Other", 3)]);
        let allow = AllowList::from_patterns(&[r"university\s+of\s+genoa"]);
        let terms = vec!["TINY".to_string()];
        let view = top_n_with_others(&c, &TopN { n: 1, terms: &terms, allow: &allow });
        let labels: Vec<&str> = view.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["Big", "University of Genoa", "Tiny Lab", OTHERS_LABEL]);
        assert_eq!(view[3].weight, 3.0);
    }

    #[test]
    fn test_top_n_without_visible_keeps_full_others() {
        let c = counts(&[("a", 3), ("b", 2)]);
        let allow = AllowList::default();
        let view = top_n_with_others(&c, &TopN { n: 0, terms: &[], allow: &allow });
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].weight, 5.0);
    }

    #[test]
    fn test_top_n_no_fold_no_others() {
        let c = counts(&[("a", 3)]);
        let allow = AllowList::default();
        let view = top_n_with_others(&c, &TopN { n: 5, terms: &[], allow: &allow });
        assert!(view.iter().all(|v| !v.is_others));
    }

    #[test]
    fn test_hierarchy_puts_others_last() {
        let items = vec![
            ViewItem { label: OTHERS_LABEL.into(), count: 9, weight: 9.0, is_others: true },
            ViewItem { label: "a".into(), count: 2, weight: 2.0, is_others: false },
            ViewItem { label: "b".into(), count: 5, weight: 5.0, is_others: false },
        ];
        let h = Hierarchy::from_items(&items);
        let labels: Vec<&str> = h.leaves.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", OTHERS_LABEL]);
        assert_eq!(h.total(), 16.0);
    }

    #[test]
    fn test_folded_bucket_key_differs_from_real_others() {
        let counts = counts(&[("Others", 5), ("x", 1), ("y", 1)]);
        let allow = AllowList::default();
        let items = top_n_with_others(&counts, &TopN { n: 1, terms: &[], allow: &allow });
        let h = Hierarchy::from_items(&items);
        let keys: Vec<&str> = h.leaves.iter().map(Leaf::key).collect();
        assert_eq!(keys, vec!["Others", OTHERS_KEY]);
        assert_eq!(h.leaves[1].label, OTHERS_LABEL);
    }

    #[test]
    fn test_suggest_bounded_and_excluding() {
        let names: Vec<String> = ["Genoa Univ", "Genoa Hospital", "Milan", "GENOA port"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(suggest(&names, "genoa", 2, &[]), vec!["Genoa Univ", "Genoa Hospital"]);
        assert_eq!(
            suggest(&names, " GENOA ", 10, &["genoa univ".to_string()]),
            vec!["Genoa Hospital", "GENOA port"]
        );
        assert!(suggest(&names, "  ", 10, &[]).is_empty());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  University   of\tGenoa "), "University of Genoa");
    }

    proptest! {
        #[test]
        fn prop_allocation_sums_to_budget(
            counts in prop::collection::vec(0u64..500, 1..30),
            budget in 0usize..400,
        ) {
            let items: Vec<(String, u64)> = counts.iter().enumerate().map(|(i, c)| (format!("k{i}"), *c)).collect();
            let total: u64 = counts.iter().sum();
            let alloc = allocate_cells(&items, budget);
            let sum: usize = alloc.iter().map(|a| a.cells).sum();
            if total > 0 {
                prop_assert_eq!(sum, budget);
                for a in &alloc {
                    let ideal = budget as f64 * a.count as f64 / total as f64;
                    prop_assert!((a.cells as f64 - ideal).abs() < 1.0 + 1e-9);
                }
            } else {
                prop_assert_eq!(sum, 0);
            }
        }

        #[test]
        fn prop_others_never_exceeds_half_of_largest(
            values in prop::collection::vec(1u64..1000, 1..40),
            n in 0usize..10,
        ) {
            let c: Counts = values.iter().enumerate().map(|(i, v)| (format!("k{i}"), *v)).collect();
            let allow = AllowList::default();
            let view = top_n_with_others(&c, &TopN { n, terms: &[], allow: &allow });
            let largest = view.iter().filter(|v| !v.is_others).map(|v| v.weight).fold(0.0, f64::max);
            if let Some(others) = view.iter().find(|v| v.is_others) {
                if largest > 0.0 {
                    prop_assert!(others.weight <= largest * 0.5 + 1e-9);
                }
            }
            let folded: u64 = view.iter().map(|v| v.count).sum();
            prop_assert_eq!(folded, values.iter().sum::<u64>());
        }
    }
}
