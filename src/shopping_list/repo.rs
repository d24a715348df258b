use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShoppingListItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_key: String,
    pub ingredient_name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
    pub is_checked: bool,
    pub added_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct NewShoppingListItem {
    pub ingredient_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    pub recipe_id: Option<Uuid>,
    pub recipe_name: Option<String>,
}

fn default_quantity() -> f64 {
    1.0
}

pub async fn list(db: &PgPool, owner_key: &str) -> anyhow::Result<Vec<ShoppingListItem>> {
    let rows = sqlx::query_as::<_, ShoppingListItem>(
        r#"
        SELECT id, owner_key, ingredient_name, category, quantity, unit,
               recipe_id, recipe_name, is_checked, added_at
        FROM shopping_list_items
        WHERE owner_key = $1
        ORDER BY added_at DESC
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
    new: &NewShoppingListItem,
) -> anyhow::Result<ShoppingListItem> {
    let row = sqlx::query_as::<_, ShoppingListItem>(
        r#"
        INSERT INTO shopping_list_items (owner_key, ingredient_name, category, quantity, unit, recipe_id, recipe_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, owner_key, ingredient_name, category, quantity, unit,
                  recipe_id, recipe_name, is_checked, added_at
        "#,
    )
    .bind(owner_key)
    .bind(&new.ingredient_name)
    .bind(&new.category)
    .bind(new.quantity)
    .bind(&new.unit)
    .bind(new.recipe_id)
    .bind(&new.recipe_name)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn set_checked(
    db: &PgPool,
    owner_key: &str,
    id: Uuid,
    is_checked: bool,
) -> anyhow::Result<Option<ShoppingListItem>> {
    let row = sqlx::query_as::<_, ShoppingListItem>(
        r#"
        UPDATE shopping_list_items
        SET is_checked = $3
        WHERE id = $1 AND owner_key = $2
        RETURNING id, owner_key, ingredient_name, category, quantity, unit,
                  recipe_id, recipe_name, is_checked, added_at
        "#,
    )
    .bind(id)
    .bind(owner_key)
    .bind(is_checked)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, owner_key: &str, id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM shopping_list_items WHERE id = $1 AND owner_key = $2")
        .bind(id)
        .bind(owner_key)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
