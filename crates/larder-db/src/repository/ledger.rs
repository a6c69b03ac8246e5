//! # Stock Ledger
//!
//! Append-only stock transactions and the cached `items.current_stock`
//! they sum to.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    record_transaction(entry)                            │
//! │                                                                         │
//! │  validate (non-zero delta, user defaults to "System")                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  with_retry ─────────────────────────────────────────────────────┐     │
//! │  │  BEGIN                                                        │     │
//! │  │   UPDATE items SET current_stock = current_stock + :delta     │     │
//! │  │        └── 0 rows? ──► NotFound, ROLLBACK                     │     │
//! │  │   INSERT INTO stock_transactions (...)                        │     │
//! │  │  COMMIT                                                       │     │
//! │  └── SQLITE_BUSY? back off and run the whole unit again ─────────┘     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Relative Updates
//! ```text
//!   ❌ read stock (10) → compute 10 - 3 → write 7     (lost update)
//!   ✅ UPDATE ... SET current_stock = current_stock - 3
//!
//!   Task A: -3 ┐
//!   Task B: -2 ├──► SQLite evaluates each in turn ──► 10 - 3 - 2 + 4 = 9
//!   Task C: +4 ┘
//! ```
//!
//! Invariant: for every item, `current_stock == SUM(quantity_change)`.
//! [`LedgerRepository::verify_balances`] checks it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use crate::retry::{with_retry, RetryPolicy};
use larder_core::validation::{validate_quantity_change, validate_stock_entry};
use larder_core::{
    BalanceDrift, CoreError, NewStockTransaction, StockHistoryFilter, StockTransaction,
    ValidationError, DEFAULT_USER_ID,
};

const TRANSACTION_COLUMNS: &str = "id, item_id, quantity_change, transaction_type, user_id, \
     related_mrn, related_po_id, notes, transaction_date";

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        LedgerRepository { pool, retry }
    }

    /// Records one stock movement atomically.
    ///
    /// Goods receipt calls this once per received line with a positive
    /// delta, `RECEIVING` and the purchase order id.
    ///
    /// ## Returns
    /// * `Ok(StockTransaction)` - The written ledger row
    /// * `Err(DbError::NotFound)` - Item doesn't exist (nothing written)
    /// * `Err(DbError::ContentionExhausted)` - Still busy after retries
    pub async fn record_transaction(
        &self,
        entry: &NewStockTransaction,
    ) -> DbResult<StockTransaction> {
        let entry = validate_stock_entry(entry)?;
        let entry = &entry;

        with_retry(&self.retry, "record_transaction", move || async move {
            let mut tx = self.pool.begin().await?;
            let row = apply_entry(&mut tx, entry, Utc::now()).await?;
            tx.commit().await?;
            Ok::<_, DbError>(row)
        })
        .await
    }

    /// Records a batch of stock movements in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn record_bulk(
        &self,
        entries: &[NewStockTransaction],
    ) -> DbResult<Vec<StockTransaction>> {
        if entries.is_empty() {
            return Err(ValidationError::Required {
                field: "entries".to_string(),
            }
            .into());
        }

        let entries = entries
            .iter()
            .map(validate_stock_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let entries = entries.as_slice();

        let rows = with_retry(&self.retry, "record_bulk", move || async move {
            let mut tx = self.pool.begin().await?;
            let rows = apply_entries(&mut tx, entries, Utc::now()).await?;
            tx.commit().await?;
            Ok::<_, DbError>(rows)
        })
        .await?;

        info!(count = rows.len(), "Recorded stock transaction batch");
        Ok(rows)
    }

    /// Deletes ledger rows, reversing their stock effect.
    ///
    /// A missing id, or the same id twice, aborts the whole batch.
    ///
    /// ## Returns
    /// Number of rows removed.
    pub async fn remove_transactions(&self, ids: &[String]) -> DbResult<usize> {
        if ids.is_empty() {
            return Err(ValidationError::Required {
                field: "transaction_ids".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "transaction_id".to_string(),
                    value: id.clone(),
                }
                .into());
            }
        }

        let removed = with_retry(&self.retry, "remove_transactions", move || async move {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now();
            for id in ids {
                reverse_entry(&mut tx, id, now).await?;
            }
            tx.commit().await?;
            Ok::<_, DbError>(ids.len())
        })
        .await?;

        info!(count = removed, "Removed stock transactions");
        Ok(removed)
    }

    /// Gets one ledger row.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE id = ?1");
        let row = sqlx::query_as::<_, StockTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Current cached stock of an item.
    pub async fn balance(&self, item_id: &str) -> DbResult<f64> {
        sqlx::query_scalar::<_, f64>("SELECT current_stock FROM items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))
    }

    /// Ledger rows matching `filter`, newest first.
    ///
    /// User and MRN filters are case-insensitive substring matches.
    pub async fn history(&self, filter: &StockHistoryFilter) -> DbResult<Vec<StockTransaction>> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM stock_transactions
            WHERE (?1 IS NULL OR item_id = ?1)
              AND (?2 IS NULL OR transaction_type = ?2)
              AND (?3 IS NULL OR lower(user_id) LIKE '%' || lower(?3) || '%')
              AND (?4 IS NULL OR lower(related_mrn) LIKE '%' || lower(?4) || '%')
              AND (?5 IS NULL OR related_po_id = ?5)
              AND (?6 IS NULL OR transaction_date >= ?6)
              AND (?7 IS NULL OR transaction_date <= ?7)
            ORDER BY transaction_date DESC, rowid DESC
            LIMIT ?8
            "#
        );

        // LIMIT -1 is unbounded in SQLite
        let limit = filter.limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query_as::<_, StockTransaction>(&sql)
            .bind(&filter.item_id)
            .bind(filter.transaction_type)
            .bind(&filter.user_id)
            .bind(&filter.related_mrn)
            .bind(&filter.related_po_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Stock history query");
        Ok(rows)
    }

    /// Items whose cached stock disagrees with the sum of their ledger rows.
    ///
    /// Empty when the ledger invariant holds.
    pub async fn verify_balances(&self) -> DbResult<Vec<BalanceDrift>> {
        let drift = sqlx::query_as::<_, BalanceDrift>(
            r#"
            SELECT
                i.id AS item_id,
                i.name AS name,
                i.current_stock AS current_stock,
                CAST(COALESCE(SUM(t.quantity_change), 0) AS REAL) AS ledger_sum
            FROM items i
            LEFT JOIN stock_transactions t ON t.item_id = i.id
            GROUP BY i.id, i.name, i.current_stock
            HAVING abs(i.current_stock - COALESCE(SUM(t.quantity_change), 0)) > 1e-6
            ORDER BY i.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drift)
    }
}

// =============================================================================
// Shared Write Path
// =============================================================================

/// Applies one validated entry inside the caller's transaction.
///
/// Used by the ledger itself and by the sale orchestrator, so a sale's
/// deductions commit or roll back together with the sale row.
pub(crate) async fn apply_entry(
    conn: &mut SqliteConnection,
    entry: &NewStockTransaction,
    at: DateTime<Utc>,
) -> DbResult<StockTransaction> {
    validate_quantity_change(entry.quantity_change)?;

    let result = sqlx::query(
        r#"
        UPDATE items
        SET current_stock = current_stock + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(&entry.item_id)
    .bind(entry.quantity_change)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Item", &entry.item_id));
    }

    let row = StockTransaction {
        id: generate_id(),
        item_id: entry.item_id.clone(),
        quantity_change: entry.quantity_change,
        transaction_type: entry.transaction_type,
        user_id: entry
            .user_id
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
        related_mrn: entry.related_mrn.clone(),
        related_po_id: entry.related_po_id.clone(),
        notes: entry.notes.clone(),
        transaction_date: at,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, item_id, quantity_change, transaction_type, user_id,
            related_mrn, related_po_id, notes, transaction_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&row.id)
    .bind(&row.item_id)
    .bind(row.quantity_change)
    .bind(row.transaction_type)
    .bind(&row.user_id)
    .bind(&row.related_mrn)
    .bind(&row.related_po_id)
    .bind(&row.notes)
    .bind(row.transaction_date)
    .execute(&mut *conn)
    .await?;

    debug!(
        id = %row.id,
        item_id = %row.item_id,
        delta = row.quantity_change,
        kind = %row.transaction_type,
        "Stock transaction recorded"
    );

    Ok(row)
}

/// Applies validated entries in order on the caller's transaction.
pub(crate) async fn apply_entries(
    conn: &mut SqliteConnection,
    entries: &[NewStockTransaction],
    at: DateTime<Utc>,
) -> DbResult<Vec<StockTransaction>> {
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        rows.push(apply_entry(conn, entry, at).await?);
    }
    Ok(rows)
}

/// Undoes one ledger row inside the caller's transaction.
async fn reverse_entry(conn: &mut SqliteConnection, id: &str, at: DateTime<Utc>) -> DbResult<()> {
    let (item_id, delta): (String, f64) = sqlx::query_as(
        "SELECT item_id, quantity_change FROM stock_transactions WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;

    let result = sqlx::query(
        "UPDATE items SET current_stock = current_stock - ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(&item_id)
    .bind(delta)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Item", &item_id));
    }

    sqlx::query("DELETE FROM stock_transactions WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    debug!(id = %id, item_id = %item_id, reversed = -delta, "Stock transaction removed");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
