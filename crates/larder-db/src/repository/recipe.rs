//! # Recipe Graph Store
//!
//! Durable storage for recipes and their ordered component lines.
//!
//! ## Component Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │          create_recipe / update_recipe / replace_components             │
//! │                                                                         │
//! │  validate_component_drafts  (shape: qty > 0, loss < 100, no dupes)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │   ├── load RECIPE edges ──► graph::check_replacement (cycles)          │
//! │   ├── per line: referenced item/recipe exists, unit autofill + check   │
//! │   ├── upsert header                                                    │
//! │   ├── DELETE all lines of the recipe                                   │
//! │   └── INSERT the new lines                                             │
//! │  COMMIT          (any error above: ROLLBACK, old lines untouched)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The component set is always swapped whole, never diffed.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use crate::retry::{with_retry, RetryPolicy};
use larder_core::bom::{self, BomGraph, Requirements};
use larder_core::graph::{check_replacement, RecipeEdges};
use larder_core::validation::{
    clean_optional, validate_component_drafts, validate_label, validate_name,
    validate_recipe_draft,
};
use larder_core::{
    ComponentDraft, ComponentKind, CoreError, Item, Recipe, RecipeComponent, RecipeDraft,
};

const RECIPE_COLUMNS: &str = "id, name, description, is_active, type AS recipe_type, \
     default_yield_qty, default_yield_unit, plating_notes, tags, version, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, name, base_unit, purchase_unit, category, sub_category, \
     reorder_point, current_stock, notes, is_active, created_at, updated_at";

/// Repository for recipes and their component lines.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl RecipeRepository {
    /// Creates a new RecipeRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        RecipeRepository { pool, retry }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a recipe header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        fetch_recipe(&mut conn, id).await
    }

    /// Gets a recipe header by its exact name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Recipe>> {
        let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE name = ?1");
        let recipe = sqlx::query_as::<_, Recipe>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(recipe)
    }

    /// Lists recipes by name, optionally including inactive ones and
    /// filtering on the free-form type.
    pub async fn list(
        &self,
        include_inactive: bool,
        recipe_type: Option<&str>,
    ) -> DbResult<Vec<Recipe>> {
        let sql = format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes \
             WHERE (?1 OR is_active = 1) AND (?2 IS NULL OR type = ?2) \
             ORDER BY name"
        );
        let recipes = sqlx::query_as::<_, Recipe>(&sql)
            .bind(include_inactive)
            .bind(recipe_type.map(str::trim))
            .fetch_all(&self.pool)
            .await?;

        Ok(recipes)
    }

    /// Component lines of a recipe in `sort_order`, ties by insertion.
    ///
    /// Each line carries the referenced item's or sub-recipe's name.
    pub async fn get_components(&self, recipe_id: &str) -> DbResult<Vec<RecipeComponent>> {
        let mut conn = self.pool.acquire().await?;
        fetch_components(&mut conn, recipe_id).await
    }

    /// Resolves raw requirements for `quantity` of a recipe without
    /// writing anything.
    pub async fn requirements(&self, recipe_id: &str, quantity: f64) -> DbResult<Requirements> {
        let mut conn = self.pool.acquire().await?;
        let graph = load_bom_graph(&mut conn, recipe_id).await?;
        Ok(bom::resolve(&graph, recipe_id, quantity)?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a recipe with its component lines in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Name already taken
    /// * `Err(DbError::Domain(..))` - Missing component, unit mismatch, ...
    pub async fn create_recipe(
        &self,
        draft: &RecipeDraft,
        components: &[ComponentDraft],
    ) -> DbResult<Recipe> {
        let draft = validate_recipe_draft(draft)?;
        validate_component_drafts(components)?;
        let id = generate_id();
        let (draft, id) = (&draft, id.as_str());

        let recipe = with_retry(&self.retry, "create_recipe", move || async move {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now();
            let rows = stage_components(&mut tx, id, components).await?;
            write_header(&mut tx, id, draft, now).await?;
            swap_components(&mut tx, id, &rows).await?;
            let recipe = fetch_recipe(&mut tx, id)
                .await?
                .ok_or_else(|| CoreError::RecipeNotFound(id.to_string()))?;
            tx.commit().await?;
            Ok::<_, DbError>(recipe)
        })
        .await?;

        info!(id = %recipe.id, name = %recipe.name, lines = components.len(), "Recipe created");
        Ok(recipe)
    }

    /// Replaces a recipe's header and component lines in one transaction.
    pub async fn update_recipe(
        &self,
        id: &str,
        draft: &RecipeDraft,
        components: &[ComponentDraft],
    ) -> DbResult<Recipe> {
        let draft = validate_recipe_draft(draft)?;
        validate_component_drafts(components)?;
        let draft = &draft;

        let recipe = with_retry(&self.retry, "update_recipe", move || async move {
            let mut tx = self.pool.begin().await?;
            ensure_recipe(&mut tx, id).await?;
            let rows = stage_components(&mut tx, id, components).await?;
            write_header(&mut tx, id, draft, Utc::now()).await?;
            swap_components(&mut tx, id, &rows).await?;
            let recipe = fetch_recipe(&mut tx, id)
                .await?
                .ok_or_else(|| CoreError::RecipeNotFound(id.to_string()))?;
            tx.commit().await?;
            Ok::<_, DbError>(recipe)
        })
        .await?;

        info!(id = %recipe.id, lines = components.len(), "Recipe updated");
        Ok(recipe)
    }

    /// Inserts the header when `id` is new, otherwise updates it.
    ///
    /// Component lines are left as they are.
    pub async fn upsert_recipe(&self, id: &str, draft: &RecipeDraft) -> DbResult<Recipe> {
        let draft = validate_recipe_draft(draft)?;
        let draft = &draft;

        with_retry(&self.retry, "upsert_recipe", move || async move {
            let mut tx = self.pool.begin().await?;
            write_header(&mut tx, id, draft, Utc::now()).await?;
            let recipe = fetch_recipe(&mut tx, id)
                .await?
                .ok_or_else(|| CoreError::RecipeNotFound(id.to_string()))?;
            tx.commit().await?;
            Ok::<_, DbError>(recipe)
        })
        .await
    }

    /// Atomically swaps the whole component set of an existing recipe.
    ///
    /// Validation and the cycle check run before anything is written;
    /// on failure the previous lines are untouched.
    pub async fn replace_components(
        &self,
        recipe_id: &str,
        components: &[ComponentDraft],
    ) -> DbResult<Vec<RecipeComponent>> {
        validate_component_drafts(components)?;

        with_retry(&self.retry, "replace_components", move || async move {
            let mut tx = self.pool.begin().await?;
            ensure_recipe(&mut tx, recipe_id).await?;
            let rows = stage_components(&mut tx, recipe_id, components).await?;
            swap_components(&mut tx, recipe_id, &rows).await?;
            touch_recipe(&mut tx, recipe_id, Utc::now()).await?;
            tx.commit().await?;
            Ok::<_, DbError>(rows)
        })
        .await
    }

    /// Activates or deactivates a recipe.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting recipe active flag");

        let result =
            sqlx::query("UPDATE recipes SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Recipe", id));
        }

        Ok(())
    }

    /// Copies a recipe and its lines under a new name.
    pub async fn clone_recipe(&self, id: &str, new_name: &str) -> DbResult<Recipe> {
        let new_name = validate_name("name", new_name)?;
        let new_id = generate_id();
        let (new_name, new_id) = (new_name.as_str(), new_id.as_str());

        let recipe = with_retry(&self.retry, "clone_recipe", move || async move {
            let mut tx = self.pool.begin().await?;
            let source = fetch_recipe(&mut tx, id)
                .await?
                .ok_or_else(|| DbError::not_found("Recipe", id))?;
            let lines = fetch_components(&mut tx, id).await?;

            let draft = RecipeDraft {
                name: new_name.to_string(),
                description: source.description,
                is_active: source.is_active,
                recipe_type: source.recipe_type,
                default_yield_qty: source.default_yield_qty,
                default_yield_unit: source.default_yield_unit,
                plating_notes: source.plating_notes,
                tags: source.tags,
                version: source.version,
            };
            write_header(&mut tx, new_id, &draft, Utc::now()).await?;

            let copies: Vec<RecipeComponent> = lines
                .into_iter()
                .map(|line| RecipeComponent {
                    id: generate_id(),
                    parent_recipe_id: new_id.to_string(),
                    ..line
                })
                .collect();
            swap_components(&mut tx, new_id, &copies).await?;

            let recipe = fetch_recipe(&mut tx, new_id)
                .await?
                .ok_or_else(|| CoreError::RecipeNotFound(new_id.to_string()))?;
            tx.commit().await?;
            Ok::<_, DbError>(recipe)
        })
        .await?;

        info!(source = %id, id = %recipe.id, name = %recipe.name, "Recipe cloned");
        Ok(recipe)
    }

    /// Deletes a recipe and its lines.
    ///
    /// ## Returns
    /// * `Err(CoreError::RecipeInUse)` - Another recipe uses it as a sub-recipe
    /// * `Err(DbError::ForeignKeyViolation)` - Sales reference it
    pub async fn delete_recipe(&self, id: &str) -> DbResult<()> {
        with_retry(&self.retry, "delete_recipe", move || async move {
            let mut tx = self.pool.begin().await?;
            ensure_recipe(&mut tx, id).await?;

            let used_by: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(DISTINCT parent_recipe_id)
                FROM recipe_components
                WHERE component_kind = 'RECIPE' AND component_id = ?1
                  AND parent_recipe_id <> ?1
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if used_by > 0 {
                return Err(CoreError::RecipeInUse {
                    recipe_id: id.to_string(),
                    used_by: used_by as usize,
                }
                .into());
            }

            sqlx::query("DELETE FROM recipes WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(id = %id, "Recipe deleted");
        Ok(())
    }
}

// =============================================================================
// Connection-Level Helpers
// =============================================================================

pub(crate) async fn fetch_recipe(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Recipe>> {
    let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1");
    let recipe = sqlx::query_as::<_, Recipe>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(recipe)
}

async fn fetch_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
    let item = sqlx::query_as::<_, Item>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(item)
}

async fn fetch_components(
    conn: &mut SqliteConnection,
    recipe_id: &str,
) -> DbResult<Vec<RecipeComponent>> {
    let lines = sqlx::query_as::<_, RecipeComponent>(
        r#"
        SELECT
            c.id,
            c.parent_recipe_id,
            c.component_kind,
            c.component_id,
            CASE c.component_kind WHEN 'ITEM' THEN i.name ELSE r.name END AS component_name,
            c.quantity,
            c.unit,
            c.loss_pct,
            c.sort_order,
            c.notes
        FROM recipe_components c
        LEFT JOIN items i ON c.component_kind = 'ITEM' AND i.id = c.component_id
        LEFT JOIN recipes r ON c.component_kind = 'RECIPE' AND r.id = c.component_id
        WHERE c.parent_recipe_id = ?1
        ORDER BY c.sort_order, c.rowid
        "#,
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

async fn ensure_recipe(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM recipes WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("Recipe", id)),
    }
}

/// Every recipe → sub-recipe edge currently stored.
pub(crate) async fn load_edges(conn: &mut SqliteConnection) -> DbResult<RecipeEdges> {
    let pairs: Vec<(String, String)> = sqlx::query_as(
        "SELECT parent_recipe_id, component_id FROM recipe_components WHERE component_kind = 'RECIPE'",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(RecipeEdges::from_pairs(pairs))
}

/// Loads every recipe, line and item reachable from `root_id`.
///
/// Missing references are left out; the resolver reports them.
pub(crate) async fn load_bom_graph(conn: &mut SqliteConnection, root_id: &str) -> DbResult<BomGraph> {
    let mut graph = BomGraph::new();
    let mut queue = VecDeque::from([root_id.to_string()]);
    let mut seen = HashSet::new();

    while let Some(recipe_id) = queue.pop_front() {
        if !seen.insert(recipe_id.clone()) {
            continue;
        }

        let recipe = match fetch_recipe(conn, &recipe_id).await? {
            Some(recipe) => recipe,
            None => continue,
        };
        let lines = fetch_components(conn, &recipe_id).await?;

        for line in &lines {
            match line.component_kind {
                ComponentKind::Recipe => queue.push_back(line.component_id.clone()),
                ComponentKind::Item => {
                    if !graph.contains_item(&line.component_id) {
                        if let Some(item) = fetch_item(conn, &line.component_id).await? {
                            graph.insert_item(item);
                        }
                    }
                }
            }
        }

        graph.insert_recipe(recipe, lines);
    }

    debug!(root = %root_id, recipes = seen.len(), "Loaded BOM snapshot");
    Ok(graph)
}

/// Validates drafts against stored data and builds the rows to insert.
///
/// Runs the cycle check first, then per line: the reference exists and the
/// unit is acceptable. Item lines may use the base or the purchase unit;
/// recipe lines must use the sub-recipe's yield unit. A missing unit is
/// filled from the base/yield unit.
async fn stage_components(
    conn: &mut SqliteConnection,
    parent_id: &str,
    drafts: &[ComponentDraft],
) -> DbResult<Vec<RecipeComponent>> {
    let sub_recipes: Vec<&str> = drafts
        .iter()
        .filter(|d| d.component_kind == ComponentKind::Recipe)
        .map(|d| d.component_id.trim())
        .collect();

    if !sub_recipes.is_empty() {
        let mut edges = load_edges(conn).await?;
        check_replacement(&mut edges, parent_id, &sub_recipes)?;
    }

    let mut rows = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.iter().enumerate() {
        let component_id = draft.component_id.trim();
        let requested = clean_optional(draft.unit.as_deref());

        let (unit, name) = match draft.component_kind {
            ComponentKind::Item => {
                let item = fetch_item(conn, component_id)
                    .await?
                    .ok_or_else(|| CoreError::ItemNotFound(component_id.to_string()))?;

                let unit = match requested {
                    Some(unit) if unit == item.base_unit => unit,
                    Some(unit) => {
                        return Err(CoreError::UnitMismatch {
                            component: item.name,
                            expected: item.base_unit,
                            found: unit,
                        }
                        .into())
                    }
                    None => item.base_unit.clone(),
                };
                (unit, item.name)
            }
            ComponentKind::Recipe => {
                let sub = fetch_recipe(conn, component_id)
                    .await?
                    .ok_or_else(|| CoreError::RecipeNotFound(component_id.to_string()))?;

                let yield_unit = sub
                    .default_yield_unit
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| CoreError::MissingYieldUnit(sub.id.clone()))?;

                let unit = requested.unwrap_or_else(|| yield_unit.clone());
                if unit != yield_unit {
                    return Err(CoreError::UnitMismatch {
                        component: sub.name,
                        expected: yield_unit,
                        found: unit,
                    }
                    .into());
                }
                (unit, sub.name)
            }
        };

        rows.push(RecipeComponent {
            id: generate_id(),
            parent_recipe_id: parent_id.to_string(),
            component_kind: draft.component_kind,
            component_id: component_id.to_string(),
            component_name: Some(name),
            quantity: draft.quantity,
            unit: validate_label("unit", &unit)?,
            loss_pct: draft.loss_pct,
            sort_order: draft.sort_order.unwrap_or(position as i64 + 1),
            notes: clean_optional(draft.notes.as_deref()),
        });
    }

    Ok(rows)
}

/// Inserts or updates a recipe header. `created_at` survives updates.
async fn write_header(
    conn: &mut SqliteConnection,
    id: &str,
    draft: &RecipeDraft,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO recipes (
            id, name, description, is_active, type,
            default_yield_qty, default_yield_unit, plating_notes, tags, version,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            is_active = excluded.is_active,
            type = excluded.type,
            default_yield_qty = excluded.default_yield_qty,
            default_yield_unit = excluded.default_yield_unit,
            plating_notes = excluded.plating_notes,
            tags = excluded.tags,
            version = excluded.version,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(draft.is_active)
    .bind(&draft.recipe_type)
    .bind(draft.default_yield_qty)
    .bind(&draft.default_yield_unit)
    .bind(&draft.plating_notes)
    .bind(Json(&draft.tags))
    .bind(draft.version)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &draft.name),
        other => other,
    })?;

    debug!(id = %id, name = %draft.name, "Recipe header written");
    Ok(())
}

async fn touch_recipe(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<()> {
    sqlx::query("UPDATE recipes SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete-all-then-insert of a recipe's lines.
async fn swap_components(
    conn: &mut SqliteConnection,
    recipe_id: &str,
    rows: &[RecipeComponent],
) -> DbResult<()> {
    sqlx::query("DELETE FROM recipe_components WHERE parent_recipe_id = ?1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO recipe_components (
                id, parent_recipe_id, component_kind, component_id,
                quantity, unit, loss_pct, sort_order, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&row.id)
        .bind(&row.parent_recipe_id)
        .bind(row.component_kind)
        .bind(&row.component_id)
        .bind(row.quantity)
        .bind(&row.unit)
        .bind(row.loss_pct)
        .bind(row.sort_order)
        .bind(&row.notes)
        .execute(&mut *conn)
        .await?;
    }

    debug!(recipe_id = %recipe_id, lines = rows.len(), "Components swapped");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{item, recipe, setup};
    use larder_core::{ErrorKind, ItemDraft};

    #[tokio::test]
    async fn test_create_fills_units_and_orders_lines() {
        let db = setup().await;
        let flour = item(&db, "Flour", "kg").await;
        let yeast = item(&db, "Yeast", "g").await;

        let dough = recipe(
            &db,
            "Dough",
            Some("kg"),
            vec![
                ComponentDraft::item(&yeast.id, 7.0),
                ComponentDraft::item(&flour.id, 1.0).loss(5.0),
            ],
        )
        .await;

        let lines = db.recipes().get_components(&dough.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].component_name.as_deref(), Some("Yeast"));
        assert_eq!(lines[0].unit, "g");
        assert_eq!(lines[0].sort_order, 1);
        assert_eq!(lines[1].unit, "kg");
        assert_eq!(lines[1].loss_pct, 5.0);
    }

    #[tokio::test]
    async fn test_item_lines_must_use_base_unit() {
        let db = setup().await;
        let flour = db
            .items()
            .insert(&ItemDraft::new("Flour", "kg").purchase_unit("sack"))
            .await
            .unwrap();

        let ok = db
            .recipes()
            .create_recipe(
                &RecipeDraft::new("Bulk Dough"),
                &[ComponentDraft::item(&flour.id, 1.0).unit("kg")],
            )
            .await;
        assert!(ok.is_ok());

        // The purchase unit is for receiving only; a line in it could never be sold.
        let err = db
            .recipes()
            .create_recipe(
                &RecipeDraft::new("Sack Dough"),
                &[ComponentDraft::item(&flour.id, 1.0).unit("sack")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnitMismatch { .. })
        ));
        assert!(db.recipes().get_by_name("Sack Dough").await.unwrap().is_none());

        let err = db
            .recipes()
            .create_recipe(
                &RecipeDraft::new("Small Dough"),
                &[ComponentDraft::item(&flour.id, 500.0).unit("g")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnitMismatch { .. })
        ));
        assert!(db.recipes().get_by_name("Small Dough").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_component_leaves_nothing_behind() {
        let db = setup().await;
        let err = db
            .recipes()
            .create_recipe(
                &RecipeDraft::new("Ghost"),
                &[ComponentDraft::item("missing", 1.0)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.recipes().list(true, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let db = setup().await;
        let salt = item(&db, "Salt", "kg").await;
        let repo = db.recipes();

        let dup = repo
            .create_recipe(
                &RecipeDraft::new("Brine"),
                &[
                    ComponentDraft::item(&salt.id, 1.0),
                    ComponentDraft::item(&salt.id, 2.0),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Integrity);

        let empty = repo.create_recipe(&RecipeDraft::new("Nothing"), &[]).await;
        assert!(empty.is_err());

        let full_loss = repo
            .create_recipe(
                &RecipeDraft::new("Vapour"),
                &[ComponentDraft::item(&salt.id, 1.0).loss(100.0)],
            )
            .await
            .unwrap_err();
        assert_eq!(full_loss.kind(), ErrorKind::Validation);

        recipe(&db, "Pickle", None, vec![ComponentDraft::item(&salt.id, 1.0)]).await;
        let taken = repo
            .create_recipe(
                &RecipeDraft::new("Pickle"),
                &[ComponentDraft::item(&salt.id, 1.0)],
            )
            .await
            .unwrap_err();
        assert_eq!(taken.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_full_loss_blocked_by_schema() {
        let db = setup().await;
        let salt = item(&db, "Salt", "kg").await;
        let brine = recipe(&db, "Brine", None, vec![ComponentDraft::item(&salt.id, 1.0)]).await;

        let err = sqlx::query(
            "UPDATE recipe_components SET loss_pct = 100 WHERE parent_recipe_id = ?1",
        )
        .bind(&brine.id)
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_sub_recipe_needs_yield_unit() {
        let db = setup().await;
        let oil = item(&db, "Oil", "l").await;
        let tadka = recipe(&db, "Tadka", None, vec![ComponentDraft::item(&oil.id, 0.1)]).await;

        let err = db
            .recipes()
            .create_recipe(
                &RecipeDraft::new("Dal"),
                &[ComponentDraft::recipe(&tadka.id, 1.0)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::MissingYieldUnit(_))));
    }

    #[tokio::test]
    async fn test_cycle_rejected_and_old_lines_kept() {
        let db = setup().await;
        let flour = item(&db, "Flour", "kg").await;
        let base = recipe(&db, "Base", Some("kg"), vec![ComponentDraft::item(&flour.id, 1.0)])
            .await;
        let pizza = recipe(
            &db,
            "Pizza",
            Some("pcs"),
            vec![ComponentDraft::recipe(&base.id, 0.3)],
        )
        .await;

        let repo = db.recipes();
        let err = repo
            .replace_components(&base.id, &[ComponentDraft::recipe(&pizza.id, 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CycleDetected { .. })));

        let lines = repo.get_components(&base.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].component_id, flour.id);

        let err = repo
            .update_recipe(
                &pizza.id,
                &RecipeDraft::new("Pizza").yields(1.0, "pcs"),
                &[ComponentDraft::recipe(&pizza.id, 1.0)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CycleDetected { .. })));
        assert_eq!(repo.get_components(&pizza.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_diamond_is_accepted() {
        let db = setup().await;
        let oil = item(&db, "Oil", "l").await;
        let rice = item(&db, "Rice", "kg").await;
        let tadka = recipe(&db, "Tadka", Some("l"), vec![ComponentDraft::item(&oil.id, 0.5)])
            .await;
        let dal = recipe(&db, "Dal", Some("bowl"), vec![ComponentDraft::recipe(&tadka.id, 1.0)])
            .await;
        let jeera = recipe(
            &db,
            "Jeera Rice",
            Some("bowl"),
            vec![
                ComponentDraft::item(&rice.id, 0.2),
                ComponentDraft::recipe(&tadka.id, 2.0),
            ],
        )
        .await;
        let thali = recipe(
            &db,
            "Thali",
            Some("plate"),
            vec![
                ComponentDraft::recipe(&dal.id, 1.0),
                ComponentDraft::recipe(&jeera.id, 1.0),
            ],
        )
        .await;

        let needs = db.recipes().requirements(&thali.id, 2.0).await.unwrap();
        assert!((needs[&oil.id] - 3.0).abs() < 1e-9);
        assert!((needs[&rice.id] - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_update_and_upsert() {
        let db = setup().await;
        let milk = item(&db, "Milk", "l").await;
        let sugar = item(&db, "Sugar", "kg").await;
        let repo = db.recipes();

        let header = repo
            .upsert_recipe("kheer-id", &RecipeDraft::new("Kheer").yields(4.0, "bowl"))
            .await
            .unwrap();
        assert_eq!(header.id, "kheer-id");
        assert!(repo.get_components("kheer-id").await.unwrap().is_empty());

        let mut draft = RecipeDraft::new("Rice Kheer").yields(6.0, "bowl").recipe_type("dessert");
        draft.tags = vec!["sweet".into()];
        let updated = repo
            .update_recipe(
                "kheer-id",
                &draft,
                &[
                    ComponentDraft::item(&milk.id, 2.0),
                    ComponentDraft::item(&sugar.id, 0.3),
                ],
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Rice Kheer");
        assert_eq!(updated.recipe_type.as_deref(), Some("dessert"));
        assert_eq!(updated.tags, vec!["sweet".to_string()]);
        assert_eq!(updated.created_at, header.created_at);

        let lines = repo
            .replace_components("kheer-id", &[ComponentDraft::item(&milk.id, 3.0)])
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(repo.get_components("kheer-id").await.unwrap()[0].quantity, 3.0);

        let missing = repo
            .update_recipe("nope", &draft, &[ComponentDraft::item(&milk.id, 1.0)])
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_and_lookup() {
        let db = setup().await;
        let egg = item(&db, "Egg", "pcs").await;
        let repo = db.recipes();

        repo.create_recipe(
            &RecipeDraft::new("Omelette").recipe_type("breakfast"),
            &[ComponentDraft::item(&egg.id, 2.0)],
        )
        .await
        .unwrap();
        let boiled = repo
            .create_recipe(
                &RecipeDraft::new("Boiled Egg").recipe_type("breakfast"),
                &[ComponentDraft::item(&egg.id, 1.0)],
            )
            .await
            .unwrap();
        repo.set_active(&boiled.id, false).await.unwrap();

        assert_eq!(repo.list(false, None).await.unwrap().len(), 1);
        let all = repo.list(true, Some("breakfast")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Boiled Egg");
        assert!(repo.list(true, Some("dinner")).await.unwrap().is_empty());

        let found = repo.get_by_name("Omelette").await.unwrap().unwrap();
        assert_eq!(repo.get_by_id(&found.id).await.unwrap().unwrap().name, "Omelette");
    }

    #[tokio::test]
    async fn test_clone_copies_lines() {
        let db = setup().await;
        let bun = item(&db, "Bun", "pcs").await;
        let patty = item(&db, "Patty", "pcs").await;
        let burger = recipe(
            &db,
            "Burger",
            Some("pcs"),
            vec![
                ComponentDraft::item(&bun.id, 1.0),
                ComponentDraft::item(&patty.id, 1.0),
            ],
        )
        .await;

        let repo = db.recipes();
        let copy = repo.clone_recipe(&burger.id, "Double Burger").await.unwrap();
        assert_ne!(copy.id, burger.id);
        assert_eq!(copy.default_yield_unit.as_deref(), Some("pcs"));

        let lines = repo.get_components(&copy.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.parent_recipe_id == copy.id));
        assert_eq!(repo.get_components(&burger.id).await.unwrap().len(), 2);

        let taken = repo.clone_recipe(&burger.id, "Burger").await.unwrap_err();
        assert_eq!(taken.kind(), ErrorKind::Integrity);
        let missing = repo.clone_recipe("nope", "Anything").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let db = setup().await;
        let flour = item(&db, "Flour", "kg").await;
        let premix = recipe(&db, "PreMix", Some("kg"), vec![ComponentDraft::item(&flour.id, 1.0)])
            .await;
        let bread = recipe(
            &db,
            "Bread",
            Some("loaf"),
            vec![ComponentDraft::recipe(&premix.id, 1.0)],
        )
        .await;

        let repo = db.recipes();
        let err = repo.delete_recipe(&premix.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::RecipeInUse { used_by: 1, .. })
        ));

        repo.delete_recipe(&bread.id).await.unwrap();
        assert!(repo.get_by_id(&bread.id).await.unwrap().is_none());
        assert!(repo.get_components(&bread.id).await.unwrap().is_empty());

        repo.delete_recipe(&premix.id).await.unwrap();
        assert_eq!(
            repo.delete_recipe(&premix.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
