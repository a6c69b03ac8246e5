//! # larder-db: Database Layer for Larder
//!
//! SQLite storage for the kitchen: items, recipes, the stock ledger and
//! recipe sales. Uses sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Larder Data Flow                               │
//! │                                                                         │
//! │  Caller (POS, back office, goods receipt)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    larder-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ItemRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RecipeRepo    │    │ 001_initial  │  │   │
//! │  │   │ RetryPolicy   │    │ LedgerRepo    │    │              │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                                ▼                               │   │
//! │  │                 larder-core (bom, graph, validation)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   <data dir>/larder.db                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - `larder.toml` loading and env overrides
//! - [`migrations`] - Embedded database migrations
//! - [`retry`] - Backoff for busy/locked write transactions
//! - [`error`] - Database error types
//! - [`outcome`] - Caller-facing success/message results
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_db::{Database, LarderConfig, Outcome};
//!
//! let config = LarderConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let result = db.sales().record_sale(&recipe_id, 2.0, Some("cashier"), None).await;
//! let outcome = Outcome::from_result(&result, |r| format!("{} items deducted", r.ledger_entries.len()));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod outcome;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LarderConfig;
pub use error::{DbError, DbResult};
pub use outcome::Outcome;
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

// Repository re-exports for convenience
pub use repository::item::ItemRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::recipe::RecipeRepository;
pub use repository::sale::SaleRepository;
