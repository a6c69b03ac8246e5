//! # Error Types
//!
//! Domain-specific error types for larder-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  larder-core errors (this file)                                        │
//! │  ├── CoreError        - Graph, resolver and domain rule failures       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  larder-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Outcome (larder-db)  - success flag + message for callers             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → Outcome → CRUD layer    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error maps onto one [`ErrorKind`], the taxonomy callers branch on.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse error taxonomy shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cycle detected, unit mismatch, inactive component, bad quantity or loss.
    Validation,
    /// Missing item, recipe, component or transaction id.
    NotFound,
    /// Write contention retries exhausted.
    Concurrency,
    /// Constraint violation such as a duplicate recipe name.
    Integrity,
    /// Anything unexpected.
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Domain errors raised by the cycle validator, the requirement resolver
/// and recipe/ledger rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item referenced by a component or ledger entry does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Recipe (root or sub-recipe) does not exist.
    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    /// Stock transaction id does not exist.
    #[error("Stock transaction not found: {0}")]
    TransactionNotFound(String),

    /// An inactive item was reached while expanding a recipe.
    #[error("Inactive item component encountered: {name} ({item_id})")]
    InactiveItem { item_id: String, name: String },

    /// An inactive recipe was sold or reached as a sub-recipe.
    #[error("Recipe is inactive: {name} ({recipe_id})")]
    InactiveRecipe { recipe_id: String, name: String },

    /// Component unit label does not match the referenced item or recipe.
    ///
    /// ## When This Occurs
    /// ```text
    /// Bread ──► 500 "g" of Flour     Flour.base_unit = "kg"
    ///                │
    ///                ▼
    /// UnitMismatch { component: "Flour", expected: "kg", found: "g" }
    /// ```
    /// Units are opaque labels; there is no conversion.
    #[error("Unit mismatch for {component}: expected '{expected}', found '{found}'")]
    UnitMismatch {
        component: String,
        expected: String,
        found: String,
    },

    /// A sub-recipe used as a component has no default yield unit.
    #[error("Recipe {0} has no yield unit and cannot be used as a component")]
    MissingYieldUnit(String),

    /// A stored component row has an empty unit.
    #[error("Component {component_id} of recipe {recipe_id} has no unit")]
    MissingComponentUnit {
        recipe_id: String,
        component_id: String,
    },

    /// Adding parent → child would close a loop in the recipe graph.
    #[error("Circular recipe reference: {parent} cannot use {child}")]
    CycleDetected { parent: String, child: String },

    /// A recipe already on the current expansion path was reached again.
    #[error("Circular reference detected during expansion at recipe {0}")]
    CircularReference(String),

    /// Loss percentage outside [0, 100).
    #[error("Invalid loss percentage {loss_pct} for component {component_id}")]
    InvalidLossPct { component_id: String, loss_pct: f64 },

    /// A recipe still used as a sub-recipe cannot be deleted.
    #[error("Recipe {recipe_id} is used by {used_by} other recipe(s)")]
    RecipeInUse { recipe_id: String, used_by: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ItemNotFound(_)
            | CoreError::RecipeNotFound(_)
            | CoreError::TransactionNotFound(_) => ErrorKind::NotFound,
            CoreError::RecipeInUse { .. } => ErrorKind::Integrity,
            CoreError::Validation(ValidationError::Duplicate { .. }) => ErrorKind::Integrity,
            _ => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before anything touches the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Value must be a finite number.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Loss percentage outside the half-open range [0, 100).
    #[error("loss_pct must be at least 0 and below 100, got {value}")]
    LossOutOfRange { value: f64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., same component listed twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnitMismatch {
            component: "Flour".to_string(),
            expected: "kg".to_string(),
            found: "g".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unit mismatch for Flour: expected 'kg', found 'g'"
        );

        let err = ValidationError::LossOutOfRange { value: 100.0 };
        assert_eq!(
            err.to_string(),
            "loss_pct must be at least 0 and below 100, got 100"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CoreError::ItemNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::CycleDetected {
                parent: "a".into(),
                child: "b".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::RecipeInUse {
                recipe_id: "a".into(),
                used_by: 2
            }
            .kind(),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
