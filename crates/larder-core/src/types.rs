//! # Domain Types
//!
//! Core domain types used throughout Larder.
//!
//! ## Type Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  owns   ┌─────────────────────┐                    │
//! │  │     Recipe      │────────►│  RecipeComponent    │                    │
//! │  │  ─────────────  │  1..n   │  ─────────────────  │                    │
//! │  │  id, name       │         │  kind: ITEM|RECIPE  │──┐                 │
//! │  │  yield unit     │◄────────│  component_id       │  │ references      │
//! │  │  is_active      │ RECIPE  │  quantity, unit     │  │                 │
//! │  └─────────────────┘         │  loss_pct           │  │ ITEM            │
//! │          ▲                   └─────────────────────┘  ▼                 │
//! │          │ recipe_id                         ┌─────────────────┐        │
//! │  ┌───────┴─────────┐                         │      Item       │        │
//! │  │ SaleTransaction │                         │  base_unit      │        │
//! │  │  quantity sold  │                         │  current_stock  │◄──┐    │
//! │  └─────────────────┘                         └─────────────────┘   │    │
//! │                                              ┌─────────────────┐   │    │
//! │                                              │StockTransaction │───┘    │
//! │                                              │ quantity_change │ Σ      │
//! │                                              └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Item::current_stock` is a cached sum of its ledger rows. Only the stock
//! ledger in larder-db writes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::bom::Requirements;
use crate::error::ValidationError;

// =============================================================================
// Component Kind
// =============================================================================

/// What a recipe component points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentKind {
    /// A raw inventory item.
    Item,
    /// Another recipe (a sub-recipe such as a sauce or dough).
    Recipe,
}

impl ComponentKind {
    /// Returns the stored label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Item => "ITEM",
            ComponentKind::Recipe => "RECIPE",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ITEM" => Ok(ComponentKind::Item),
            "RECIPE" => Ok(ComponentKind::Recipe),
            other => Err(ValidationError::InvalidFormat {
                field: "component_kind".to_string(),
                reason: format!("'{}' is not ITEM or RECIPE", other),
            }),
        }
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Goods received against a purchase order.
    Receiving,
    /// Manual stock correction.
    Adjustment,
    /// Spoilage, breakage, expiry.
    Wastage,
    /// Stock issued to fulfil a material indent.
    IndentFulfill,
    /// Ingredients consumed by a recipe sale.
    Sale,
}

impl TransactionType {
    /// Returns the stored label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receiving => "RECEIVING",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Wastage => "WASTAGE",
            TransactionType::IndentFulfill => "INDENT_FULFILL",
            TransactionType::Sale => "SALE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RECEIVING" => Ok(TransactionType::Receiving),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "WASTAGE" => Ok(TransactionType::Wastage),
            "INDENT_FULFILL" => Ok(TransactionType::IndentFulfill),
            "SALE" => Ok(TransactionType::Sale),
            other => Err(ValidationError::InvalidFormat {
                field: "transaction_type".to_string(),
                reason: format!("unknown transaction type '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// An inventory item and its cached stock level.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique across items.
    pub name: String,

    /// Unit the ledger counts in (e.g. "kg", "pcs").
    pub base_unit: String,

    /// Unit the supplier sells in, if different.
    pub purchase_unit: Option<String>,

    pub category: Option<String>,

    pub sub_category: Option<String>,

    /// Stock level at or below which the item should be re-ordered.
    pub reorder_point: f64,

    /// Sum of every ledger row for this item.
    pub current_stock: f64,

    pub notes: Option<String>,

    /// Whether item is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// True when stock has fallen to or below the reorder point.
    pub fn needs_reorder(&self) -> bool {
        self.current_stock <= self.reorder_point
    }
}

/// Input for creating or updating an item's descriptive fields.
///
/// Carries no stock field. Stock only moves through the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemDraft {
    pub name: String,
    pub base_unit: String,
    pub purchase_unit: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub reorder_point: f64,
    pub notes: Option<String>,
    pub is_active: bool,
}

impl ItemDraft {
    /// Creates an active item draft.
    pub fn new(name: impl Into<String>, base_unit: impl Into<String>) -> Self {
        ItemDraft {
            name: name.into(),
            base_unit: base_unit.into(),
            is_active: true,
            ..Default::default()
        }
    }

    /// Sets the purchase unit.
    pub fn purchase_unit(mut self, unit: impl Into<String>) -> Self {
        self.purchase_unit = Some(unit.into());
        self
    }

    /// Sets the reorder point.
    pub fn reorder_point(mut self, point: f64) -> Self {
        self.reorder_point = point;
        self
    }

    /// Sets category and sub-category.
    pub fn category(mut self, category: impl Into<String>, sub: Option<&str>) -> Self {
        self.category = Some(category.into());
        self.sub_category = sub.map(str::to_string);
        self
    }
}

// =============================================================================
// Recipe
// =============================================================================

/// A recipe header. Its components live in [`RecipeComponent`] rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Recipe {
    pub id: String,

    /// Unique recipe name.
    pub name: String,

    pub description: Option<String>,

    pub is_active: bool,

    /// Free-form classification ("main", "sauce", "prep", ...).
    #[serde(rename = "type")]
    pub recipe_type: Option<String>,

    /// Output of one batch.
    pub default_yield_qty: Option<f64>,

    /// Unit of the output. Required before the recipe can be a sub-recipe.
    pub default_yield_unit: Option<String>,

    pub plating_notes: Option<String>,

    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub tags: Vec<String>,

    pub version: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a recipe header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(rename = "type")]
    pub recipe_type: Option<String>,
    pub default_yield_qty: Option<f64>,
    pub default_yield_unit: Option<String>,
    pub plating_notes: Option<String>,
    pub tags: Vec<String>,
    pub version: Option<i64>,
}

impl RecipeDraft {
    /// Creates an active recipe draft.
    pub fn new(name: impl Into<String>) -> Self {
        RecipeDraft {
            name: name.into(),
            is_active: true,
            ..Default::default()
        }
    }

    /// Sets the default yield.
    pub fn yields(mut self, qty: f64, unit: impl Into<String>) -> Self {
        self.default_yield_qty = Some(qty);
        self.default_yield_unit = Some(unit.into());
        self
    }

    /// Sets the recipe type.
    pub fn recipe_type(mut self, recipe_type: impl Into<String>) -> Self {
        self.recipe_type = Some(recipe_type.into());
        self
    }

    /// Marks the draft inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

// =============================================================================
// Recipe Component
// =============================================================================

/// One line of a recipe's bill of materials.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeComponent {
    pub id: String,

    /// Recipe that owns this line.
    pub parent_recipe_id: String,

    pub component_kind: ComponentKind,

    /// Item id or sub-recipe id, depending on `component_kind`.
    pub component_id: String,

    /// Name of the referenced item/recipe (read views only).
    pub component_name: Option<String>,

    /// Quantity of usable output needed, in `unit`.
    pub quantity: f64,

    pub unit: String,

    /// Percentage of input lost in processing, in [0, 100).
    pub loss_pct: f64,

    pub sort_order: i64,

    pub notes: Option<String>,
}

/// Input for one component line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComponentDraft {
    pub component_kind: ComponentKind,
    pub component_id: String,
    pub quantity: f64,
    /// Defaults to the item's base unit or the sub-recipe's yield unit.
    ///
    /// Item lines must be written in the item's base unit; the purchase
    /// unit is rejected with `UnitMismatch` so every stored line can be
    /// resolved at sale time.
    pub unit: Option<String>,
    pub loss_pct: f64,
    /// Defaults to the 1-based position in the submitted list.
    pub sort_order: Option<i64>,
    pub notes: Option<String>,
}

impl ComponentDraft {
    /// A raw item line.
    pub fn item(item_id: impl Into<String>, quantity: f64) -> Self {
        ComponentDraft {
            component_kind: ComponentKind::Item,
            component_id: item_id.into(),
            quantity,
            unit: None,
            loss_pct: 0.0,
            sort_order: None,
            notes: None,
        }
    }

    /// A sub-recipe line.
    pub fn recipe(recipe_id: impl Into<String>, quantity: f64) -> Self {
        ComponentDraft {
            component_kind: ComponentKind::Recipe,
            ..ComponentDraft::item(recipe_id, quantity)
        }
    }

    /// Sets an explicit unit label.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the processing loss percentage.
    pub fn loss(mut self, loss_pct: f64) -> Self {
        self.loss_pct = loss_pct;
        self
    }
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// An immutable ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub item_id: String,
    /// Signed change: positive receives stock, negative consumes it.
    pub quantity_change: f64,
    pub transaction_type: TransactionType,
    pub user_id: String,
    /// Material request number, for indent fulfilment.
    pub related_mrn: Option<String>,
    /// Purchase order, for goods receipt.
    pub related_po_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,
}

/// A ledger entry waiting to be written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStockTransaction {
    pub item_id: String,
    pub quantity_change: f64,
    pub transaction_type: TransactionType,
    pub user_id: Option<String>,
    pub related_mrn: Option<String>,
    pub related_po_id: Option<String>,
    pub notes: Option<String>,
}

impl NewStockTransaction {
    /// Creates an entry recorded as the default user.
    pub fn new(
        item_id: impl Into<String>,
        quantity_change: f64,
        transaction_type: TransactionType,
    ) -> Self {
        NewStockTransaction {
            item_id: item_id.into(),
            quantity_change,
            transaction_type,
            user_id: None,
            related_mrn: None,
            related_po_id: None,
            notes: None,
        }
    }

    /// Sets the acting user.
    pub fn by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Links the entry to a purchase order.
    pub fn po(mut self, po_id: impl Into<String>) -> Self {
        self.related_po_id = Some(po_id.into());
        self
    }

    /// Links the entry to a material request.
    pub fn mrn(mut self, mrn: impl Into<String>) -> Self {
        self.related_mrn = Some(mrn.into());
        self
    }

    /// Attaches notes.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Filters for the stock history query. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct StockHistoryFilter {
    pub item_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    /// Case-insensitive substring match.
    pub user_id: Option<String>,
    /// Case-insensitive substring match.
    pub related_mrn: Option<String>,
    pub related_po_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// An item whose cached stock disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BalanceDrift {
    pub item_id: String,
    pub name: String,
    pub current_stock: f64,
    pub ledger_sum: f64,
}

// =============================================================================
// Sale
// =============================================================================

/// One recorded sale of a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleTransaction {
    pub id: String,
    pub recipe_id: String,
    pub quantity: f64,
    pub user_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
}

/// Everything a successful sale wrote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub sale: SaleTransaction,
    /// Raw item id → quantity consumed.
    pub requirements: Requirements,
    pub ledger_entries: Vec<StockTransaction>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flour() -> Item {
        let now = Utc::now();
        Item {
            id: "flour".to_string(),
            name: "Flour".to_string(),
            base_unit: "kg".to_string(),
            purchase_unit: Some("sack".to_string()),
            category: None,
            sub_category: None,
            reorder_point: 5.0,
            current_stock: 5.0,
            notes: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_item_needs_reorder_at_threshold() {
        let mut item = flour();
        assert!(item.needs_reorder());
        item.current_stock = 5.5;
        assert!(!item.needs_reorder());
    }

    #[test]
    fn test_kind_and_type_parsing() {
        assert_eq!("recipe".parse::<ComponentKind>().unwrap(), ComponentKind::Recipe);
        assert!("BATCH".parse::<ComponentKind>().is_err());
        assert_eq!(
            "indent_fulfill".parse::<TransactionType>().unwrap(),
            TransactionType::IndentFulfill
        );
        assert_eq!(TransactionType::Sale.to_string(), "SALE");
    }

    #[test]
    fn test_recipe_type_serializes_as_type() {
        let draft = RecipeDraft::new("Bread").recipe_type("bakery");
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["type"], "bakery");
        assert_eq!(json["is_active"], true);
    }

    #[test]
    fn test_component_draft_builders() {
        let line = ComponentDraft::recipe("premix", 1.0).unit("kg").loss(20.0);
        assert_eq!(line.component_kind, ComponentKind::Recipe);
        assert_eq!(line.unit.as_deref(), Some("kg"));
        assert_eq!(line.loss_pct, 20.0);
    }
}
