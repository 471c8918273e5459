use crate::aggregate::{PairKey, PairTally};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: u64,
    pub titles: Vec<String>,
}

impl Edge {
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    /// The endpoint opposite to `id`
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(&self.target)
        } else if self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Node/edge view built from pairwise co-occurrence
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    neighbors: HashMap<String, BTreeSet<String>>,
}

impl Graph {
    /// Edges sorted by descending weight; nodes are the edge endpoints sorted by label.
    pub fn from_pairs(pairs: HashMap<PairKey, PairTally>, label: impl Fn(&str) -> String) -> Self {
        let mut edges: Vec<Edge> = pairs
            .into_iter()
            .map(|((source, target), tally)| Edge {
                source,
                target,
                weight: tally.count,
                titles: tally.titles.into_iter().collect(),
            })
            .collect();
        edges.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });

        let mut neighbors: HashMap<String, BTreeSet<String>> = HashMap::new();
        for e in &edges {
            neighbors.entry(e.source.clone()).or_default().insert(e.target.clone());
            neighbors.entry(e.target.clone()).or_default().insert(e.source.clone());
        }

        let ids: BTreeMap<String, String> = neighbors.keys().map(|id| (id.clone(), label(id))).collect();
        let mut nodes: Vec<GraphNode> = ids
            .into_iter()
            .map(|(id, label)| GraphNode { id, label })
            .collect();
        nodes.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

        Self { nodes, edges, neighbors }
    }

    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.neighbors.get(id).into_iter().flatten().map(String::as_str)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.neighbors.get(id).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.neighbors.contains_key(id)
    }

    pub fn max_weight(&self) -> u64 {
        self.edges.first().map_or(1, |e| e.weight.max(1))
    }

    /// Center plus its direct neighbors and the edges touching the center.
    /// An unknown center yields an empty view.
    pub fn ego(&self, center: &str) -> EgoView<'_> {
        if !self.contains(center) {
            return EgoView { nodes: Vec::new(), edges: Vec::new() };
        }
        let keep: BTreeSet<&str> = std::iter::once(center).chain(self.neighbors(center)).collect();
        let nodes = self.nodes.iter().filter(|n| keep.contains(n.id.as_str())).collect();
        let edges = self.edges.iter().filter(|e| e.touches(center)).collect();
        EgoView { nodes, edges }
    }
}

pub struct EgoView<'a> {
    pub nodes: Vec<&'a GraphNode>,
    pub edges: Vec<&'a Edge>,
}
