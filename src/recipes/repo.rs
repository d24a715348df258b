use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::matcher::IngredientRole;

pub const APPROVAL_PENDING: &str = "pending";
pub const APPROVAL_APPROVED: &str = "approved";
pub const APPROVAL_REJECTED: &str = "rejected";

/// Embedded ingredient row. `name` is free text, not a catalog reference;
/// `category` may be empty on legacy rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub role: IngredientRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brix: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub base_volume_ml: f64,
    pub target_brix: f64,
    pub contains_alcohol: bool,
    pub color: Option<String>,
    pub recipe_type: Option<String>,
    pub tags: Json<Vec<String>>,
    pub ingredients: Json<Vec<RecipeIngredient>>,
    pub steps: Json<Vec<String>>,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub rating_avg: f64,
    pub rating_count: i64,
    pub view_count: i64,
    pub is_free: bool,
    pub is_published: bool,
    pub approval_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Attribute bag for optional physicochemical fields; survives
    /// round-trips but takes no part in validation.
    pub extra: serde_json::Value,
    pub created_at: OffsetDateTime,
}

const RECIPE_COLUMNS: &str = r#"
    id, name, description, image_url, base_volume_ml, target_brix,
    contains_alcohol, color, recipe_type, tags, ingredients, steps,
    author_id, author_name, rating_avg, rating_count, view_count,
    is_free, is_published, approval_status, rejection_reason, extra, created_at
"#;

/// All recipes, free first, newest first within each group. Visibility is
/// applied by the caller through the access gate.
pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Recipe>> {
    let rows = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY is_free DESC, created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub struct NewRecipe {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub base_volume_ml: f64,
    pub target_brix: f64,
    pub contains_alcohol: bool,
    pub color: Option<String>,
    pub recipe_type: Option<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub steps: Vec<String>,
    pub is_free: bool,
    pub is_published: bool,
    pub extra: serde_json::Value,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    db: &PgPool,
    new: &NewRecipe,
    author_id: Uuid,
    author_name: &str,
    approval_status: &str,
) -> anyhow::Result<Recipe> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        INSERT INTO recipes (name, description, image_url, base_volume_ml, target_brix,
                             contains_alcohol, color, recipe_type, tags, ingredients, steps,
                             author_id, author_name, is_free, is_published, approval_status, extra)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.image_url)
    .bind(new.base_volume_ml)
    .bind(new.target_brix)
    .bind(new.contains_alcohol)
    .bind(&new.color)
    .bind(&new.recipe_type)
    .bind(Json(&new.tags))
    .bind(Json(&new.ingredients))
    .bind(Json(&new.steps))
    .bind(author_id)
    .bind(author_name)
    .bind(new.is_free)
    .bind(new.is_published)
    .bind(approval_status)
    .bind(&new.extra)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    new: &NewRecipe,
    approval_status: &str,
) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        UPDATE recipes
        SET name = $2, description = $3, image_url = $4, base_volume_ml = $5,
            target_brix = $6, contains_alcohol = $7, color = $8, recipe_type = $9,
            tags = $10, ingredients = $11, steps = $12, is_free = $13,
            is_published = $14, approval_status = $15, rejection_reason = NULL,
            extra = $16
        WHERE id = $1
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.image_url)
    .bind(new.base_volume_ml)
    .bind(new.target_brix)
    .bind(new.contains_alcohol)
    .bind(&new.color)
    .bind(&new.recipe_type)
    .bind(Json(&new.tags))
    .bind(Json(&new.ingredients))
    .bind(Json(&new.steps))
    .bind(new.is_free)
    .bind(new.is_published)
    .bind(approval_status)
    .bind(&new.extra)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn bump_view_count(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE recipes SET view_count = view_count + 1 WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_approval(
    db: &PgPool,
    id: Uuid,
    status: &str,
    rejection_reason: Option<&str>,
) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        UPDATE recipes
        SET approval_status = $2, rejection_reason = $3
        WHERE id = $1
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(rejection_reason)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
