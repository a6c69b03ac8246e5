//! # Item Repository
//!
//! Database operations for inventory items.
//!
//! Item writes cover names, units, categories and reorder points. The
//! `current_stock` column is never written here: new items start at zero
//! and only [`LedgerRepository`](super::ledger::LedgerRepository) moves it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use larder_core::validation::validate_item_draft;
use larder_core::{Item, ItemDraft};

const ITEM_COLUMNS: &str = "id, name, base_unit, purchase_unit, category, sub_category, \
     reorder_point, current_stock, notes, is_active, created_at, updated_at";

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Inserts a new item with zero stock.
    ///
    /// ## Returns
    /// * `Ok(Item)` - Inserted item
    /// * `Err(DbError::UniqueViolation)` - Name already exists
    pub async fn insert(&self, draft: &ItemDraft) -> DbResult<Item> {
        let draft = validate_item_draft(draft)?;
        let id = generate_id();
        let now = Utc::now();

        debug!(id = %id, name = %draft.name, "Inserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, base_unit, purchase_unit, category, sub_category,
                reorder_point, current_stock, notes, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&id)
        .bind(&draft.name)
        .bind(&draft.base_unit)
        .bind(&draft.purchase_unit)
        .bind(&draft.category)
        .bind(&draft.sub_category)
        .bind(draft.reorder_point)
        .bind(&draft.notes)
        .bind(draft.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &draft.name),
            other => other,
        })?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", &id))
    }

    /// Gets an item by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by its exact name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE name = ?1");
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Updates an item's descriptive fields.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    pub async fn update(&self, id: &str, draft: &ItemDraft) -> DbResult<Item> {
        let draft = validate_item_draft(draft)?;
        debug!(id = %id, "Updating item");

        let result = sqlx::query(
            r#"
            UPDATE items SET
                name = ?2,
                base_unit = ?3,
                purchase_unit = ?4,
                category = ?5,
                sub_category = ?6,
                reorder_point = ?7,
                notes = ?8,
                is_active = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.base_unit)
        .bind(&draft.purchase_unit)
        .bind(&draft.category)
        .bind(&draft.sub_category)
        .bind(draft.reorder_point)
        .bind(&draft.notes)
        .bind(draft.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &draft.name),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    /// Activates or deactivates an item.
    ///
    /// Inactive items stay in the ledger but abort any recipe expansion
    /// that reaches them.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting item active flag");

        let result = sqlx::query("UPDATE items SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Lists active items by name.
    pub async fn list_active(&self) -> DbResult<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE is_active = 1 ORDER BY name");
        let items = sqlx::query_as::<_, Item>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists active items at or below their reorder point.
    pub async fn list_needing_reorder(&self) -> DbResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE is_active = 1 AND current_stock <= reorder_point \
             ORDER BY name"
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::setup;
    use larder_core::ErrorKind;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = db.items();

        let flour = repo
            .insert(&ItemDraft::new(" Flour ", "kg").purchase_unit("sack"))
            .await
            .unwrap();
        assert_eq!(flour.name, "Flour");
        assert_eq!(flour.current_stock, 0.0);
        assert!(flour.is_active);

        let by_id = repo.get_by_id(&flour.id).await.unwrap().unwrap();
        assert_eq!(by_id.purchase_unit.as_deref(), Some("sack"));

        let by_name = repo.get_by_name("Flour").await.unwrap().unwrap();
        assert_eq!(by_name.id, flour.id);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_integrity_error() {
        let db = setup().await;
        let repo = db.items();

        repo.insert(&ItemDraft::new("Salt", "kg")).await.unwrap();
        let err = repo.insert(&ItemDraft::new("Salt", "g")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_update_never_touches_stock() {
        let db = setup().await;
        let repo = db.items();
        let item = repo.insert(&ItemDraft::new("Milk", "l")).await.unwrap();

        sqlx::query("UPDATE items SET current_stock = 4 WHERE id = ?1")
            .bind(&item.id)
            .execute(db.pool())
            .await
            .unwrap();

        let updated = repo
            .update(&item.id, &ItemDraft::new("Whole Milk", "l").reorder_point(2.0))
            .await
            .unwrap();
        assert_eq!(updated.name, "Whole Milk");
        assert_eq!(updated.reorder_point, 2.0);
        assert_eq!(updated.current_stock, 4.0);

        let err = repo
            .update("missing", &ItemDraft::new("X", "l"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_active_and_reorder_lists() {
        let db = setup().await;
        let repo = db.items();

        let eggs = repo
            .insert(&ItemDraft::new("Eggs", "pcs").reorder_point(12.0))
            .await
            .unwrap();
        let rice = repo.insert(&ItemDraft::new("Rice", "kg")).await.unwrap();
        repo.set_active(&rice.id, false).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, eggs.id);

        let low = repo.list_needing_reorder().await.unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].needs_reorder());

        assert!(repo.set_active("missing", true).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_draft_rejected() {
        let db = setup().await;
        let err = db.items().insert(&ItemDraft::new("", "kg")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
