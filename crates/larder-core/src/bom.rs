//! # Requirement Resolver
//!
//! Expands "sell N of recipe R" into the exact quantity of every raw item
//! consumed, walking nested sub-recipes and compounding processing loss.
//!
//! ## Expansion Flow
//! ```text
//!   resolve(Bread, 2)
//!        │
//!        ▼
//!   Bread ── 1 kg PreMix @ 20% loss ──► 2 × 1 / 0.8 = 2.5 kg PreMix
//!                                            │
//!                                            ▼  (multiplier = 2.5)
//!   PreMix ── 1 kg Flour @ 10% loss ──► 2.5 × 1 / 0.9 ≈ 2.7778 kg Flour
//!                                            │
//!                                            ▼
//!                               totals { flour: 2.7778 }
//! ```
//!
//! ## Rules
//! - `effective = multiplier × quantity / (1 − loss_pct / 100)`
//! - ITEM components accumulate into the totals map; the component unit
//!   must equal the item's base unit
//! - RECIPE components recurse with `multiplier = effective`; the
//!   component unit must equal the sub-recipe's yield unit
//! - A non-finite requirement is a validation error
//! - Any failure aborts the whole expansion
//!
//! The resolver is pure. It works on a [`BomGraph`] snapshot that the
//! database layer loads, so it can run outside any lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ComponentKind, Item, Recipe, RecipeComponent};
use crate::validation::{validate_loss_pct, validate_quantity, ValidationResult};

/// Raw item id → total quantity in the item's base unit.
///
/// Ordered by item id so ledger rows are written in a stable order.
pub type Requirements = BTreeMap<String, f64>;

// =============================================================================
// Graph Snapshot
// =============================================================================

/// In-memory view of the recipes, components and items a resolution needs.
#[derive(Debug, Clone, Default)]
pub struct BomGraph {
    recipes: HashMap<String, Recipe>,
    components: HashMap<String, Vec<RecipeComponent>>,
    items: HashMap<String, Item>,
}

impl BomGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipe with its component lines.
    ///
    /// Lines are kept in `sort_order`; equal keys keep their given order.
    pub fn insert_recipe(&mut self, recipe: Recipe, mut components: Vec<RecipeComponent>) {
        components.sort_by_key(|c| c.sort_order);
        self.components.insert(recipe.id.clone(), components);
        self.recipes.insert(recipe.id.clone(), recipe);
    }

    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains_recipe(&self, id: &str) -> bool {
        self.recipes.contains_key(id)
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Component lines of a recipe in `sort_order`. Empty for unknown ids.
    pub fn components(&self, recipe_id: &str) -> &[RecipeComponent] {
        self.components
            .get(recipe_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// =============================================================================
// Quantity Math
// =============================================================================

/// Input needed to end up with `multiplier × quantity` after `loss_pct`
/// percent of it is lost in processing.
pub fn effective_quantity(multiplier: f64, quantity: f64, loss_pct: f64) -> ValidationResult<f64> {
    validate_loss_pct(loss_pct)?;
    Ok(multiplier * quantity / (1.0 - loss_pct / 100.0))
}

// =============================================================================
// Expansion
// =============================================================================

/// Adds the raw requirements of `multiplier` batches of `recipe_id` to
/// `totals`.
///
/// `path` holds the recipe ids on the current descent. Sub-recipes are
/// pushed before recursing and popped afterwards, so a recipe shared by two
/// branches is expanded once per branch while a true loop is an error.
pub fn expand(
    graph: &BomGraph,
    recipe_id: &str,
    multiplier: f64,
    totals: &mut Requirements,
    path: &mut HashSet<String>,
) -> CoreResult<()> {
    for component in graph.components(recipe_id) {
        let unit = component.unit.trim();
        if unit.is_empty() {
            return Err(CoreError::MissingComponentUnit {
                recipe_id: recipe_id.to_string(),
                component_id: component.component_id.clone(),
            });
        }

        let qty = effective_quantity(multiplier, component.quantity, component.loss_pct)
            .map_err(|_| CoreError::InvalidLossPct {
                component_id: component.component_id.clone(),
                loss_pct: component.loss_pct,
            })?;
        if !qty.is_finite() {
            return Err(overflow(&component.component_id));
        }

        match component.component_kind {
            ComponentKind::Item => {
                let item = graph
                    .item(&component.component_id)
                    .ok_or_else(|| CoreError::ItemNotFound(component.component_id.clone()))?;

                if !item.is_active {
                    return Err(CoreError::InactiveItem {
                        item_id: item.id.clone(),
                        name: item.name.clone(),
                    });
                }
                if item.base_unit != unit {
                    return Err(CoreError::UnitMismatch {
                        component: item.name.clone(),
                        expected: item.base_unit.clone(),
                        found: unit.to_string(),
                    });
                }

                let total = totals.entry(item.id.clone()).or_insert(0.0);
                *total += qty;
                if !total.is_finite() {
                    return Err(overflow(&item.id));
                }
            }
            ComponentKind::Recipe => {
                let sub = graph
                    .recipe(&component.component_id)
                    .ok_or_else(|| CoreError::RecipeNotFound(component.component_id.clone()))?;

                if !sub.is_active {
                    return Err(CoreError::InactiveRecipe {
                        recipe_id: sub.id.clone(),
                        name: sub.name.clone(),
                    });
                }

                let yield_unit = sub
                    .default_yield_unit
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| CoreError::MissingYieldUnit(sub.id.clone()))?;
                if yield_unit != unit {
                    return Err(CoreError::UnitMismatch {
                        component: sub.name.clone(),
                        expected: yield_unit.to_string(),
                        found: unit.to_string(),
                    });
                }

                if !path.insert(sub.id.clone()) {
                    return Err(CoreError::CircularReference(sub.id.clone()));
                }
                expand(graph, &sub.id, qty, totals, path)?;
                path.remove(&sub.id);
            }
        }
    }

    Ok(())
}

/// A requirement too large to represent, e.g. a huge sale quantity.
fn overflow(component_id: &str) -> CoreError {
    ValidationError::NotFinite {
        field: format!("requirement for '{component_id}'"),
    }
    .into()
}

/// Resolves the raw item requirements for selling `quantity` of a recipe.
///
/// ## Example
/// ```rust
/// use larder_core::bom::{resolve, BomGraph};
///
/// let graph = BomGraph::new();
/// assert!(resolve(&graph, "missing", 1.0).is_err());
/// ```
pub fn resolve(graph: &BomGraph, recipe_id: &str, quantity: f64) -> CoreResult<Requirements> {
    validate_quantity("quantity", quantity)?;

    let recipe = graph
        .recipe(recipe_id)
        .ok_or_else(|| CoreError::RecipeNotFound(recipe_id.to_string()))?;
    if !recipe.is_active {
        return Err(CoreError::InactiveRecipe {
            recipe_id: recipe.id.clone(),
            name: recipe.name.clone(),
        });
    }

    let mut totals = Requirements::new();
    let mut path = HashSet::from([recipe.id.clone()]);
    expand(graph, &recipe.id, quantity, &mut totals, &mut path)?;

    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, unit: &str) -> Item {
        let now = Utc::now();
        Item {
            id: id.to_string(),
            name: id.to_string(),
            base_unit: unit.to_string(),
            purchase_unit: None,
            category: None,
            sub_category: None,
            reorder_point: 0.0,
            current_stock: 0.0,
            notes: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn recipe(id: &str, yield_unit: Option<&str>) -> Recipe {
        let now = Utc::now();
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            is_active: true,
            recipe_type: None,
            default_yield_qty: yield_unit.map(|_| 1.0),
            default_yield_unit: yield_unit.map(str::to_string),
            plating_notes: None,
            tags: Vec::new(),
            version: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(
        parent: &str,
        kind: ComponentKind,
        id: &str,
        qty: f64,
        unit: &str,
        loss: f64,
        order: i64,
    ) -> RecipeComponent {
        RecipeComponent {
            id: format!("{parent}-{id}"),
            parent_recipe_id: parent.to_string(),
            component_kind: kind,
            component_id: id.to_string(),
            component_name: None,
            quantity: qty,
            unit: unit.to_string(),
            loss_pct: loss,
            sort_order: order,
            notes: None,
        }
    }

    /// Bread → 1 kg PreMix (20% loss); PreMix → 1 kg Flour (10% loss).
    fn bread_graph() -> BomGraph {
        let mut graph = BomGraph::new();
        graph.insert_item(item("flour", "kg"));
        graph.insert_recipe(
            recipe("premix", Some("kg")),
            vec![line("premix", ComponentKind::Item, "flour", 1.0, "kg", 10.0, 1)],
        );
        graph.insert_recipe(
            recipe("bread", Some("loaf")),
            vec![line("bread", ComponentKind::Recipe, "premix", 1.0, "kg", 20.0, 1)],
        );
        graph
    }

    #[test]
    fn test_effective_quantity() {
        assert!((effective_quantity(1.0, 1.0, 0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((effective_quantity(2.0, 3.0, 50.0).unwrap() - 12.0).abs() < 1e-12);
        assert!(effective_quantity(1.0, 1.0, 100.0).is_err());
        assert!(effective_quantity(1.0, 1.0, -1.0).is_err());
    }

    #[test]
    fn test_overflowing_requirement_is_rejected() {
        // 1.7e308 / 0.8 exceeds f64::MAX at the PreMix line.
        let err = resolve(&bread_graph(), "bread", 1.7e308).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NotFinite { .. })
        ));

        // Each line is finite; their sum is not.
        let mut graph = BomGraph::new();
        graph.insert_item(item("salt", "kg"));
        graph.insert_recipe(
            recipe("brine", Some("kg")),
            vec![line("brine", ComponentKind::Item, "salt", 1.0, "kg", 0.0, 1)],
        );
        graph.insert_recipe(
            recipe("jar", None),
            vec![
                line("jar", ComponentKind::Item, "salt", 1.0, "kg", 0.0, 1),
                line("jar", ComponentKind::Recipe, "brine", 1.0, "kg", 0.0, 2),
            ],
        );
        assert!((resolve(&graph, "jar", 1e300).unwrap()["salt"] - 2e300).abs() < 1e288);
        assert!(matches!(
            resolve(&graph, "jar", 1e308),
            Err(CoreError::Validation(ValidationError::NotFinite { .. }))
        ));
    }

    #[test]
    fn test_nested_loss_compounds() {
        let totals = resolve(&bread_graph(), "bread", 2.0).unwrap();
        assert_eq!(totals.len(), 1);
        assert!((totals["flour"] - 2.0 / 0.8 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_diamond_accumulates_both_branches() {
        let mut graph = BomGraph::new();
        graph.insert_item(item("oil", "l"));
        graph.insert_item(item("rice", "kg"));
        graph.insert_recipe(
            recipe("tadka", Some("l")),
            vec![line("tadka", ComponentKind::Item, "oil", 0.5, "l", 0.0, 1)],
        );
        graph.insert_recipe(
            recipe("dal", Some("bowl")),
            vec![line("dal", ComponentKind::Recipe, "tadka", 1.0, "l", 0.0, 1)],
        );
        graph.insert_recipe(
            recipe("jeera_rice", Some("bowl")),
            vec![
                line("jeera_rice", ComponentKind::Item, "rice", 0.2, "kg", 0.0, 1),
                line("jeera_rice", ComponentKind::Recipe, "tadka", 2.0, "l", 0.0, 2),
            ],
        );
        graph.insert_recipe(
            recipe("thali", None),
            vec![
                line("thali", ComponentKind::Recipe, "dal", 1.0, "bowl", 0.0, 1),
                line("thali", ComponentKind::Recipe, "jeera_rice", 1.0, "bowl", 0.0, 2),
            ],
        );

        let totals = resolve(&graph, "thali", 1.0).unwrap();
        assert!((totals["oil"] - 1.5).abs() < 1e-9);
        assert!((totals["rice"] - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_components_abort() {
        let mut graph = bread_graph();
        let mut flour = item("flour", "kg");
        flour.is_active = false;
        graph.insert_item(flour);
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::InactiveItem { .. })
        ));

        let mut graph = bread_graph();
        let premix = recipe("premix", Some("kg"));
        let lines = graph.components("premix").to_vec();
        graph.insert_recipe(Recipe { is_active: false, ..premix }, lines);
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::InactiveRecipe { .. })
        ));
    }

    #[test]
    fn test_inactive_root_is_rejected() {
        let mut graph = bread_graph();
        let lines = graph.components("bread").to_vec();
        let bread = recipe("bread", Some("loaf"));
        graph.insert_recipe(Recipe { is_active: false, ..bread }, lines);
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::InactiveRecipe { .. })
        ));
    }

    #[test]
    fn test_unit_mismatch() {
        let mut graph = bread_graph();
        graph.insert_recipe(
            recipe("premix", Some("kg")),
            vec![line("premix", ComponentKind::Item, "flour", 500.0, "g", 0.0, 1)],
        );
        match resolve(&graph, "bread", 1.0) {
            Err(CoreError::UnitMismatch { expected, found, .. }) => {
                assert_eq!(expected, "kg");
                assert_eq!(found, "g");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_sub_recipe_without_yield_unit() {
        let mut graph = bread_graph();
        let lines = graph.components("premix").to_vec();
        graph.insert_recipe(recipe("premix", None), lines);
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::MissingYieldUnit(_))
        ));
    }

    #[test]
    fn test_full_loss_rejected_at_resolve_time() {
        let mut graph = bread_graph();
        graph.insert_recipe(
            recipe("premix", Some("kg")),
            vec![line("premix", ComponentKind::Item, "flour", 1.0, "kg", 100.0, 1)],
        );
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::InvalidLossPct { .. })
        ));
    }

    #[test]
    fn test_missing_references() {
        let mut graph = bread_graph();
        graph.insert_recipe(
            recipe("premix", Some("kg")),
            vec![line("premix", ComponentKind::Item, "salt", 1.0, "kg", 0.0, 1)],
        );
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::ItemNotFound(_))
        ));
        assert!(matches!(
            resolve(&graph, "cake", 1.0),
            Err(CoreError::RecipeNotFound(_))
        ));
    }

    #[test]
    fn test_stored_cycle_is_a_hard_error() {
        let mut graph = bread_graph();
        graph.insert_recipe(
            recipe("premix", Some("kg")),
            vec![line("premix", ComponentKind::Recipe, "bread", 1.0, "loaf", 0.0, 1)],
        );
        assert!(matches!(
            resolve(&graph, "bread", 1.0),
            Err(CoreError::CircularReference(_))
        ));
    }

    #[test]
    fn test_non_positive_quantity() {
        assert!(resolve(&bread_graph(), "bread", 0.0).is_err());
        assert!(resolve(&bread_graph(), "bread", f64::NAN).is_err());
    }

    #[test]
    fn test_components_follow_sort_order() {
        let mut graph = BomGraph::new();
        graph.insert_recipe(
            recipe("salad", None),
            vec![
                line("salad", ComponentKind::Item, "b", 1.0, "kg", 0.0, 2),
                line("salad", ComponentKind::Item, "a", 1.0, "kg", 0.0, 1),
            ],
        );
        let ids: Vec<_> = graph
            .components("salad")
            .iter()
            .map(|c| c.component_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
