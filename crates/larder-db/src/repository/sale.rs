//! # Sale Orchestrator
//!
//! Turns "sold N of recipe X" into one sale row plus one SALE ledger entry
//! per raw item, all in a single transaction.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 record_sale(recipe_id, quantity, user)                  │
//! │                                                                         │
//! │  validate quantity > 0, normalize user                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  with_retry ─────────────────────────────────────────────────────┐     │
//! │  │  BEGIN                                                        │     │
//! │  │   load_bom_graph(recipe)      snapshot inside the tx          │     │
//! │  │   bom::resolve(graph, qty)    item id → total needed          │     │
//! │  │   INSERT INTO sales_transactions                              │     │
//! │  │   ledger::apply_entries(-needed, SALE) per item               │     │
//! │  │  COMMIT                                                       │     │
//! │  └── any error: ROLLBACK, no sale row and no ledger rows ────────┘     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is allowed to go negative. Nothing here checks availability.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use crate::repository::ledger::apply_entries;
use crate::repository::recipe::load_bom_graph;
use crate::retry::{with_retry, RetryPolicy};
use larder_core::bom;
use larder_core::validation::{
    clean_optional, normalize_user_id, validate_quantity, validate_stock_entry,
};
use larder_core::{
    CoreError, NewStockTransaction, SaleReceipt, SaleTransaction, TransactionType,
};

const SALE_COLUMNS: &str = "id, recipe_id, quantity, user_id, notes, sale_date";

/// Repository for recipe sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        SaleRepository { pool, retry }
    }

    /// Records a sale and debits every raw item it consumes.
    ///
    /// ## Arguments
    /// * `recipe_id` - Recipe sold
    /// * `quantity` - Number of recipe units sold, must be positive
    /// * `user_id` - Acting user, `"System"` when absent
    /// * `notes` - Free text stored on the sale row
    ///
    /// ## Returns
    /// * `Ok(SaleReceipt)` - Sale row, requirements and ledger rows written
    /// * `Err(DbError::Domain(..))` - Resolution failed (nothing written)
    pub async fn record_sale(
        &self,
        recipe_id: &str,
        quantity: f64,
        user_id: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<SaleReceipt> {
        validate_quantity("quantity", quantity)?;
        let user_id = normalize_user_id(user_id)?;
        let notes = clean_optional(notes);
        let (user_id, notes) = (user_id.as_str(), notes.as_deref());

        let receipt = with_retry(&self.retry, "record_sale", move || async move {
            let mut tx = self.pool.begin().await?;
            let receipt = sell(&mut tx, recipe_id, quantity, user_id, notes).await?;
            tx.commit().await?;
            Ok::<_, DbError>(receipt)
        })
        .await?;

        info!(
            sale_id = %receipt.sale.id,
            recipe_id = %recipe_id,
            quantity,
            items = receipt.ledger_entries.len(),
            "Sale recorded"
        );
        Ok(receipt)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleTransaction>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales_transactions WHERE id = ?1");
        let sale = sqlx::query_as::<_, SaleTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Sales of a recipe, newest first.
    pub async fn list_for_recipe(
        &self,
        recipe_id: &str,
        limit: Option<u32>,
    ) -> DbResult<Vec<SaleTransaction>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales_transactions \
             WHERE recipe_id = ?1 \
             ORDER BY sale_date DESC, rowid DESC \
             LIMIT ?2"
        );
        let sales = sqlx::query_as::<_, SaleTransaction>(&sql)
            .bind(recipe_id)
            .bind(limit.map(i64::from).unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }
}

/// The sale unit of work, on the caller's transaction.
async fn sell(
    conn: &mut SqliteConnection,
    recipe_id: &str,
    quantity: f64,
    user_id: &str,
    notes: Option<&str>,
) -> DbResult<SaleReceipt> {
    let graph = load_bom_graph(conn, recipe_id).await?;
    let requirements = bom::resolve(&graph, recipe_id, quantity)?;
    let recipe_name = graph
        .recipe(recipe_id)
        .map(|r| r.name.clone())
        .ok_or_else(|| CoreError::RecipeNotFound(recipe_id.to_string()))?;

    let sale = SaleTransaction {
        id: generate_id(),
        recipe_id: recipe_id.to_string(),
        quantity,
        user_id: user_id.to_string(),
        notes: notes.map(str::to_string),
        sale_date: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO sales_transactions (id, recipe_id, quantity, user_id, notes, sale_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.recipe_id)
    .bind(sale.quantity)
    .bind(&sale.user_id)
    .bind(&sale.notes)
    .bind(sale.sale_date)
    .execute(&mut *conn)
    .await?;

    let entries = requirements
        .iter()
        .map(|(item_id, needed)| {
            let entry = NewStockTransaction::new(item_id.as_str(), -needed, TransactionType::Sale)
                .by(user_id)
                .notes(format!("Sale {}: {} x {}", sale.id, recipe_name, quantity));
            validate_stock_entry(&entry)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let ledger_entries = apply_entries(conn, &entries, sale.sale_date).await?;

    Ok(SaleReceipt {
        sale,
        requirements,
        ledger_entries,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
