use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PantryItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_key: String,
    pub ingredient_name: String,
    pub category: String,
    pub brand: Option<String>,
    pub quantity: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brix: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<Date>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct NewPantryItem {
    pub ingredient_name: String,
    #[serde(default)]
    pub category: String,
    pub brand: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    pub brix: Option<f64>,
    pub expires_on: Option<Date>,
}

fn default_quantity() -> f64 {
    1.0
}

pub async fn list(db: &PgPool, owner_key: &str) -> anyhow::Result<Vec<PantryItem>> {
    let rows = sqlx::query_as::<_, PantryItem>(
        r#"
        SELECT id, owner_key, ingredient_name, category, brand, quantity, unit,
               brix, expires_on, created_at
        FROM pantry_items
        WHERE owner_key = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_key)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert(
    db: &PgPool,
    owner_key: &str,
    new: &NewPantryItem,
) -> anyhow::Result<PantryItem> {
    let row = sqlx::query_as::<_, PantryItem>(
        r#"
        INSERT INTO pantry_items (owner_key, ingredient_name, category, brand, quantity, unit, brix, expires_on)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, owner_key, ingredient_name, category, brand, quantity, unit,
                  brix, expires_on, created_at
        "#,
    )
    .bind(owner_key)
    .bind(&new.ingredient_name)
    .bind(&new.category)
    .bind(&new.brand)
    .bind(new.quantity)
    .bind(&new.unit)
    .bind(new.brix)
    .bind(new.expires_on)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Deletes are owner-scoped so one key can never remove another's items.
pub async fn delete(db: &PgPool, owner_key: &str, id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM pantry_items WHERE id = $1 AND owner_key = $2")
        .bind(id)
        .bind(owner_key)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
