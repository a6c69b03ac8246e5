//! # Validation Module
//!
//! Input validation for items, recipes, components and ledger entries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                           │
//! │  ├── Names, labels, quantities, loss percentages                       │
//! │  └── Duplicate component lines                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: larder-db, inside the write transaction                      │
//! │  ├── Referenced item/recipe exists, unit matches                       │
//! │  └── Cycle validator over the stored recipe graph                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints (quantity > 0, loss_pct < 100)       │
//! │  └── UNIQUE and foreign key constraints                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use larder_core::validation::{validate_loss_pct, validate_quantity};
//!
//! assert!(validate_quantity("quantity", 2.5).is_ok());
//! assert!(validate_loss_pct(99.9).is_ok());
//! assert!(validate_loss_pct(100.0).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{ComponentDraft, ItemDraft, NewStockTransaction, RecipeDraft};
use crate::{DEFAULT_USER_ID, MAX_LABEL_LEN, MAX_LOSS_PCT, MAX_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 255 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates a short label (unit, recipe type) and returns it trimmed.
///
/// Unit labels are compared by exact string equality everywhere, so
/// trimming here is the only normalisation they get.
pub fn validate_label(field: &str, label: &str) -> ValidationResult<String> {
    let label = label.trim();

    if label.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    Ok(label.to_string())
}

/// Trims an optional string, mapping blank values to `None`.
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalises the acting user id, falling back to [`DEFAULT_USER_ID`].
pub fn normalize_user_id(user_id: Option<&str>) -> ValidationResult<String> {
    match clean_optional(user_id) {
        Some(user) if user.chars().count() > MAX_LABEL_LEN => Err(ValidationError::TooLong {
            field: "user_id".to_string(),
            max: MAX_LABEL_LEN,
        }),
        Some(user) => Ok(user),
        None => Ok(DEFAULT_USER_ID.to_string()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a strictly positive, finite quantity.
pub fn validate_quantity(field: &str, qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }

    if qty <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a processing loss percentage.
///
/// ## Rules
/// - Finite
/// - `0 <= loss_pct < 100`
///
/// 100% would divide by zero in `quantity / (1 - loss/100)`.
pub fn validate_loss_pct(loss_pct: f64) -> ValidationResult<()> {
    if !loss_pct.is_finite() || !(0.0..MAX_LOSS_PCT).contains(&loss_pct) {
        return Err(ValidationError::LossOutOfRange { value: loss_pct });
    }

    Ok(())
}

/// Validates a ledger delta: finite and non-zero, either sign.
pub fn validate_quantity_change(delta: f64) -> ValidationResult<()> {
    if !delta.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "quantity_change".to_string(),
        });
    }

    if delta == 0.0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity_change".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates an item draft and returns a cleaned copy.
pub fn validate_item_draft(draft: &ItemDraft) -> ValidationResult<ItemDraft> {
    if !draft.reorder_point.is_finite() || draft.reorder_point < 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: "reorder_point".to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }

    let purchase_unit = match clean_optional(draft.purchase_unit.as_deref()) {
        Some(unit) => Some(validate_label("purchase_unit", &unit)?),
        None => None,
    };

    Ok(ItemDraft {
        name: validate_name("name", &draft.name)?,
        base_unit: validate_label("base_unit", &draft.base_unit)?,
        purchase_unit,
        category: clean_optional(draft.category.as_deref()),
        sub_category: clean_optional(draft.sub_category.as_deref()),
        reorder_point: draft.reorder_point,
        notes: clean_optional(draft.notes.as_deref()),
        is_active: draft.is_active,
    })
}

/// Validates a recipe header draft and returns a cleaned copy.
pub fn validate_recipe_draft(draft: &RecipeDraft) -> ValidationResult<RecipeDraft> {
    if let Some(qty) = draft.default_yield_qty {
        validate_quantity("default_yield_qty", qty)?;
    }

    let default_yield_unit = match clean_optional(draft.default_yield_unit.as_deref()) {
        Some(unit) => Some(validate_label("default_yield_unit", &unit)?),
        None => None,
    };
    let recipe_type = match clean_optional(draft.recipe_type.as_deref()) {
        Some(t) => Some(validate_label("type", &t)?),
        None => None,
    };

    Ok(RecipeDraft {
        name: validate_name("name", &draft.name)?,
        description: clean_optional(draft.description.as_deref()),
        is_active: draft.is_active,
        recipe_type,
        default_yield_qty: draft.default_yield_qty,
        default_yield_unit,
        plating_notes: clean_optional(draft.plating_notes.as_deref()),
        tags: draft
            .tags
            .iter()
            .filter_map(|t| clean_optional(Some(t)))
            .collect(),
        version: draft.version,
    })
}

/// Validates the shape of a component list.
///
/// ## Rules
/// - At least one component
/// - Each component id present, quantity positive, loss in [0, 100)
/// - No `(kind, component_id)` pair listed twice
///
/// Existence, units and cycles need the stored graph and are checked by
/// the recipe repository.
pub fn validate_component_drafts(components: &[ComponentDraft]) -> ValidationResult<()> {
    if components.is_empty() {
        return Err(ValidationError::Required {
            field: "components".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for component in components {
        if component.component_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "component_id".to_string(),
            });
        }
        validate_quantity("quantity", component.quantity)?;
        validate_loss_pct(component.loss_pct)?;

        if !seen.insert((component.component_kind, component.component_id.trim())) {
            return Err(ValidationError::Duplicate {
                field: "component".to_string(),
                value: format!("{}:{}", component.component_kind, component.component_id),
            });
        }
    }

    Ok(())
}

/// Validates a ledger entry and returns it normalised.
///
/// The returned entry always carries a user id; blank MRN, PO and notes
/// become `None`.
pub fn validate_stock_entry(entry: &NewStockTransaction) -> ValidationResult<NewStockTransaction> {
    let item_id = entry.item_id.trim();
    if item_id.is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }
    validate_quantity_change(entry.quantity_change)?;

    Ok(NewStockTransaction {
        item_id: item_id.to_string(),
        quantity_change: entry.quantity_change,
        transaction_type: entry.transaction_type,
        user_id: Some(normalize_user_id(entry.user_id.as_deref())?),
        related_mrn: clean_optional(entry.related_mrn.as_deref()),
        related_po_id: clean_optional(entry.related_po_id.as_deref()),
        notes: clean_optional(entry.notes.as_deref()),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
