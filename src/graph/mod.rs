//! Organizational hierarchy graph: data model and BFS crawler.
//!
//! Entities reference each other purely by ID. A crawl accumulates edges and labels
//! into a [`HierarchyGraph`], which is read-only once the crawl returns.

mod crawler;
mod pacer;

pub use crawler::{CrawlOptions, HierarchyCrawler};
pub use pacer::Pacer;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// An entity in the knowledge graph: stable ID plus cached label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Wikidata item ID, e.g. `Q49210`.
    pub id: String,
    pub label: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A parent→child relation, whatever predicate direction produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub parent: String,
    pub child: String,
    /// Label of the predicate that produced the edge, e.g. `has part(s)`.
    pub relation: String,
    /// Label of the child's `instance of` (P31) value, when it has one.
    pub child_type: Option<String>,
}

/// A down/up property pair expressing the same link in opposite directions.
///
/// `parent --down--> child` and `child --up--> parent` both yield the edge (parent, child).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicatePair {
    pub down: String,
    pub up: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl PredicatePair {
    pub fn new(down: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            down: down.into(),
            up: up.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// has part / part of, subsidiary / parent organization,
    /// business division / parent organization.
    pub fn defaults() -> Vec<Self> {
        vec![
            PredicatePair::new("P527", "P361").with_label("has part / part of"),
            PredicatePair::new("P355", "P749").with_label("subsidiary / parent organization"),
            PredicatePair::new("P199", "P749").with_label("business division / parent organization"),
        ]
    }

    /// Both sides must be property IDs (`P` followed by digits).
    pub fn validate(&self) -> Result<(), String> {
        for prop in [&self.down, &self.up] {
            if !is_property_id(prop) {
                return Err(format!("'{}' is not a property ID (expected P<digits>)", prop));
            }
        }
        Ok(())
    }

    /// Short form used in logs and error context, e.g. `P527/P361`.
    pub fn describe(&self) -> String {
        format!("{}/{}", self.down, self.up)
    }
}

fn has_digit_suffix(s: &str, prefix: char) -> bool {
    s.strip_prefix(prefix)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// `Q` followed by digits.
pub fn is_entity_id(s: &str) -> bool {
    has_digit_suffix(s, 'Q')
}

/// `P` followed by digits.
pub fn is_property_id(s: &str) -> bool {
    has_digit_suffix(s, 'P')
}

/// Result of a crawl: adjacency, labels and the full edge list.
///
/// Every child of any edge has a label, and the root always has both a label and an
/// adjacency entry (possibly empty).
#[derive(Debug, Clone)]
pub struct HierarchyGraph {
    root: String,
    children: BTreeMap<String, BTreeSet<String>>,
    labels: HashMap<String, String>,
    edges: Vec<Edge>,
}

impl HierarchyGraph {
    pub(crate) fn new(root: Entity) -> Self {
        let mut children = BTreeMap::new();
        children.insert(root.id.clone(), BTreeSet::new());
        let mut labels = HashMap::new();
        labels.insert(root.id.clone(), root.label);
        Self {
            root: root.id,
            children,
            labels,
            edges: Vec::new(),
        }
    }

    /// Record an edge. The child's label is only set if it has none yet.
    pub(crate) fn add_edge(&mut self, edge: Edge, child_label: &str) {
        self.labels
            .entry(edge.child.clone())
            .or_insert_with(|| child_label.to_string());
        self.children
            .entry(edge.parent.clone())
            .or_default()
            .insert(edge.child.clone());
        self.edges.push(edge);
    }

    pub fn root_id(&self) -> &str {
        &self.root
    }

    pub fn root(&self) -> Entity {
        Entity::new(self.root.clone(), self.label(&self.root).unwrap_or_default())
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// Edges in discovery order, duplicates included.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges as a set, for comparing crawls.
    pub fn edge_set(&self) -> BTreeSet<&Edge> {
        self.edges.iter().collect()
    }

    /// Number of distinct entities, root included.
    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    /// Child IDs of `id`, in ID order.
    pub fn children_of(&self, id: &str) -> Vec<&str> {
        self.children
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Entities one hop below `id`.
    pub fn direct_children(&self, id: &str) -> Vec<Entity> {
        self.children_of(id)
            .into_iter()
            .map(|child| Entity::new(child, self.label(child).unwrap_or(child)))
            .collect()
    }

    /// Every entity reachable from `id` through one or more edges.
    pub fn descendant_ids(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = self.children_of(id).into_iter().collect();
        while let Some(node) = queue.pop_front() {
            if node == id || !seen.insert(node.to_string()) {
                continue;
            }
            queue.extend(self.children_of(node));
        }
        seen
    }

    /// Relation label of the first edge recorded between `parent` and `child`.
    pub fn relation(&self, parent: &str, child: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.parent == parent && e.child == child)
            .map(|e| e.relation.as_str())
    }

    /// First known type label of `id`.
    pub fn child_type(&self, id: &str) -> Option<&str> {
        self.edges
            .iter()
            .filter(|e| e.child == id)
            .find_map(|e| e.child_type.as_deref())
    }
}
