//! # Recipe Graph Cycle Validator
//!
//! RECIPE-kind components form directed edges `parent → sub-recipe`. That
//! graph must stay acyclic, otherwise expanding a recipe would never end.
//!
//! ## What Counts As A Cycle
//! ```text
//!   Self reference          Transitive loop             Diamond (allowed)
//!   ──────────────          ───────────────             ─────────────────
//!
//!    ┌──────┐               Pizza ──► Dough                  Thali
//!    │ Soup │◄─┐              ▲         │                   /     \
//!    └──┬───┘  │              │         ▼                 Dal     Rice
//!       └──────┘            Sauce ◄── Base                  \     /
//!                                                            Tadka
//!    REJECTED               REJECTED                     ACCEPTED
//! ```
//!
//! The traversal keeps a **path-local** visited set: a recipe is pushed when
//! the search enters it and popped when the search backtracks. Sharing a
//! sub-recipe along two different paths is therefore not a cycle.
//!
//! Edges are held in [`RecipeEdges`], a snapshot larder-db loads inside the
//! write transaction, so this module never touches the database.

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Edge Snapshot
// =============================================================================

/// Adjacency list of recipe → sub-recipe edges.
#[derive(Debug, Clone, Default)]
pub struct RecipeEdges {
    edges: HashMap<String, Vec<String>>,
}

impl RecipeEdges {
    /// Creates an empty edge set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the edge set from `(parent, child)` pairs.
    pub fn from_pairs<I, P, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut edges = Self::new();
        for (parent, child) in pairs {
            edges.add_edge(parent, child);
        }
        edges
    }

    /// Adds `parent → child`. Repeated edges are kept once.
    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        let child = child.into();
        let children = self.edges.entry(parent.into()).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// Drops every outgoing edge of `parent`.
    pub fn remove_outgoing(&mut self, parent: &str) {
        self.edges.remove(parent);
    }

    /// Direct sub-recipes of `parent`.
    pub fn children(&self, parent: &str) -> &[String] {
        self.edges.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Reachability
// =============================================================================

/// Returns true if `target` can be reached from `from` along recipe edges.
pub fn reaches(edges: &RecipeEdges, from: &str, target: &str) -> bool {
    let mut path = HashSet::new();
    reaches_on_path(edges, from, target, &mut path)
}

fn reaches_on_path<'a>(
    edges: &'a RecipeEdges,
    current: &'a str,
    target: &str,
    path: &mut HashSet<&'a str>,
) -> bool {
    if current == target {
        return true;
    }

    // Already on this branch: a cycle that does not involve `target`.
    if !path.insert(current) {
        return false;
    }

    let found = edges
        .children(current)
        .iter()
        .any(|child| reaches_on_path(edges, child, target, path));

    path.remove(current);
    found
}

/// Returns true if adding `parent → child` would close a loop.
///
/// ## Example
/// ```rust
/// use larder_core::graph::{would_create_cycle, RecipeEdges};
///
/// let edges = RecipeEdges::from_pairs([("pizza", "dough"), ("dough", "starter")]);
/// assert!(would_create_cycle(&edges, "starter", "pizza"));
/// assert!(would_create_cycle(&edges, "pizza", "pizza"));
/// assert!(!would_create_cycle(&edges, "pizza", "starter"));
/// ```
pub fn would_create_cycle(edges: &RecipeEdges, parent: &str, child: &str) -> bool {
    parent == child || reaches(edges, child, parent)
}

/// Validates a full replacement of `parent`'s sub-recipe list.
///
/// The parent's current outgoing edges are discarded first. Each accepted
/// child is added to the working set before the next one is checked, so
/// `edges` ends up describing the graph as it will be after the write.
pub fn check_replacement<S: AsRef<str>>(
    edges: &mut RecipeEdges,
    parent: &str,
    children: &[S],
) -> CoreResult<()> {
    edges.remove_outgoing(parent);

    for child in children {
        let child = child.as_ref();
        if would_create_cycle(edges, parent, child) {
            return Err(CoreError::CycleDetected {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        edges.add_edge(parent, child);
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_reference_is_a_cycle() {
        let edges = RecipeEdges::new();
        assert!(would_create_cycle(&edges, "soup", "soup"));
    }

    #[test]
    fn test_transitive_cycle() {
        let edges = RecipeEdges::from_pairs([
            ("pizza", "dough"),
            ("dough", "base"),
            ("base", "sauce"),
        ]);
        assert!(would_create_cycle(&edges, "sauce", "pizza"));
        assert!(would_create_cycle(&edges, "base", "dough"));
        assert!(!would_create_cycle(&edges, "pizza", "sauce"));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut edges = RecipeEdges::from_pairs([("thali", "dal"), ("dal", "tadka")]);
        assert!(check_replacement(&mut edges, "rice", &["tadka"]).is_ok());
        assert!(check_replacement(&mut edges, "thali", &["dal", "rice"]).is_ok());
        assert_eq!(edges.len(), 4);
        assert!(reaches(&edges, "thali", "tadka"));
    }

    #[test]
    fn test_unrelated_cycle_terminates() {
        // Corrupt data: a loop that does not involve the recipes under test.
        let edges = RecipeEdges::from_pairs([("a", "b"), ("b", "a"), ("x", "a")]);
        assert!(!reaches(&edges, "x", "z"));
        assert!(!would_create_cycle(&edges, "z", "x"));
    }

    #[test]
    fn test_replacement_ignores_old_edges() {
        // a → b today; replacing a's list with [c] must not see a → b.
        let mut edges = RecipeEdges::from_pairs([("a", "b"), ("c", "d")]);
        assert!(check_replacement(&mut edges, "b", &["c"]).is_ok());
        assert!(check_replacement(&mut edges, "a", &["c"]).is_ok());
        assert_eq!(edges.children("a"), &["c".to_string()]);

        // d → a would now close d → a → c → d.
        let err = check_replacement(&mut edges, "d", &["a"]).unwrap_err();
        assert!(matches!(err, CoreError::CycleDetected { .. }));
    }

    #[test]
    fn test_replacement_reports_offending_child() {
        let mut edges = RecipeEdges::from_pairs([("b", "c")]);
        let err = check_replacement(&mut edges, "c", &["x", "b"]).unwrap_err();
        match err {
            CoreError::CycleDetected { parent, child } => {
                assert_eq!(parent, "c");
                assert_eq!(child, "b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
