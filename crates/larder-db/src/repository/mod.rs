//! # Repository Module
//!
//! Database repository implementations for Larder.
//!
//! ## Repository Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleRepository (sale orchestrator)                                    │
//! │  └── record_sale(recipe, qty)                                          │
//! │        │                                                                │
//! │        ├──► RecipeRepository::load_bom_graph ──► larder_core::bom      │
//! │        │                                                                │
//! │        └──► ledger::apply_entry (same transaction)                     │
//! │                                                                         │
//! │  RecipeRepository (recipe graph store)                                 │
//! │  └── create / update / replace_components                              │
//! │        └──► larder_core::graph (cycle validator)                       │
//! │                                                                         │
//! │  LedgerRepository (stock ledger)                                       │
//! │  └── record_transaction / record_bulk / remove_transactions            │
//! │                                                                         │
//! │  ItemRepository                                                        │
//! │  └── descriptive fields only, never current_stock                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ItemRepository`](item::ItemRepository) - Item records
//! - [`RecipeRepository`](recipe::RecipeRepository) - Recipes and component lines
//! - [`LedgerRepository`](ledger::LedgerRepository) - Stock transactions
//! - [`SaleRepository`](sale::SaleRepository) - Recipe sales

pub mod item;
pub mod ledger;
pub mod recipe;
pub mod sale;

/// Generates a new entity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use larder_core::{ComponentDraft, Item, ItemDraft, Recipe, RecipeDraft};

    use crate::pool::{Database, DbConfig};

    pub async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn item(db: &Database, name: &str, unit: &str) -> Item {
        db.items().insert(&ItemDraft::new(name, unit)).await.unwrap()
    }

    pub async fn recipe(
        db: &Database,
        name: &str,
        yield_unit: Option<&str>,
        components: Vec<ComponentDraft>,
    ) -> Recipe {
        let mut draft = RecipeDraft::new(name);
        if let Some(unit) = yield_unit {
            draft = draft.yields(1.0, unit);
        }
        db.recipes().create_recipe(&draft, &components).await.unwrap()
    }
}
