//! # larder-core: Pure Domain Logic for Larder
//!
//! Recipe bill-of-materials (BOM) resolution and the rules around it,
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Larder Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              CRUD / UI layers (out of this workspace)           │   │
//! │  │      item forms, recipe editor, goods receipt, sale entry       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   graph   │  │    bom    │  │ validation│  │   │
//! │  │   │   Item    │  │  cycle    │  │ resolver  │  │   rules   │  │   │
//! │  │   │  Recipe   │  │  checks   │  │  (expand) │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    larder-db (Database Layer)                   │   │
//! │  │        SQLite, stock ledger, recipe store, sale orchestration   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, Recipe, RecipeComponent, StockTransaction, ...)
//! - [`error`] - Domain error types and the error taxonomy
//! - [`validation`] - Input validation rules
//! - [`graph`] - Cycle validator over recipe-to-recipe edges
//! - [`bom`] - Requirement resolver (recipe × quantity → raw item totals)
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::bom::effective_quantity;
//!
//! // 1 unit at 20% processing loss needs 1.25 units of input
//! let qty = effective_quantity(1.0, 1.0, 20.0).unwrap();
//! assert!((qty - 1.25).abs() < 1e-9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bom;
pub mod error;
pub mod graph;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use bom::{BomGraph, Requirements};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use graph::RecipeEdges;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// User id recorded when a caller does not supply one.
pub const DEFAULT_USER_ID: &str = "System";

/// Exclusive upper bound for a component's processing loss percentage.
///
/// A loss of 100% would mean no usable output, i.e. an infinite input
/// requirement.
pub const MAX_LOSS_PCT: f64 = 100.0;

/// Maximum length of item and recipe names.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of unit labels, recipe types and user ids.
pub const MAX_LABEL_LEN: usize = 50;
