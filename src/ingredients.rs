use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::{types::Json as SqlJson, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Catalog entry for a known slush ingredient. `keywords` maps a language
/// code to search terms; `affiliate_urls` maps a country code to a shop URL.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub brix: Option<f64>,
    pub abv: Option<f64>,
    pub density: Option<f64>,
    pub keywords: SqlJson<BTreeMap<String, Vec<String>>>,
    pub affiliate_urls: SqlJson<BTreeMap<String, String>>,
    pub created_at: OffsetDateTime,
}

const INGREDIENT_COLUMNS: &str =
    "id, name, brand, category, brix, abv, density, keywords, affiliate_urls, created_at";

impl Ingredient {
    /// Case-insensitive substring match over the name, brand and every
    /// localized keyword.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        if self.name.to_lowercase().contains(&q) {
            return true;
        }
        if let Some(brand) = &self.brand {
            if brand.to_lowercase().contains(&q) {
                return true;
            }
        }
        self.keywords
            .values()
            .flatten()
            .any(|kw| kw.to_lowercase().contains(&q))
    }
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Ingredient>> {
    let rows = sqlx::query_as::<_, Ingredient>(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients ORDER BY name ASC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", axum::routing::post(create_ingredient))
        .route(
            "/ingredients/:id",
            axum::routing::put(update_ingredient).delete(delete_ingredient),
        )
}

#[derive(Debug, Deserialize, Default)]
struct CatalogQuery {
    q: Option<String>,
    category: Option<String>,
}

#[instrument(skip(state))]
async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<CatalogQuery>,
) -> ApiResult<Json<Vec<Ingredient>>> {
    let rows = list_all(&state.db).await?;
    let query = q.q.unwrap_or_default();
    let category = q.category.as_deref().map(str::to_lowercase);
    let filtered = rows
        .into_iter()
        .filter(|ing| ing.matches_query(&query))
        .filter(|ing| match &category {
            Some(c) => ing.category.to_lowercase() == *c,
            None => true,
        })
        .collect();
    Ok(Json(filtered))
}

#[instrument(skip(state))]
async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ingredient>> {
    let ing = find_by_id(&state.db, id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ing))
}

fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IngredientBody {
    name: String,
    brand: Option<String>,
    #[serde(default)]
    category: String,
    brix: Option<f64>,
    abv: Option<f64>,
    density: Option<f64>,
    #[serde(default)]
    keywords: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    affiliate_urls: BTreeMap<String, String>,
}

impl IngredientBody {
    fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Ingredient name is required"));
        }
        if let Some(brix) = self.brix {
            if !(0.0..=100.0).contains(&brix) {
                return Err(ApiError::bad_request("brix must be between 0 and 100"));
            }
        }
        if let Some(abv) = self.abv {
            if !(0.0..=100.0).contains(&abv) {
                return Err(ApiError::bad_request("abv must be between 0 and 100"));
            }
        }
        for url in self.affiliate_urls.values() {
            url::Url::parse(url).map_err(|e| ApiError::bad_request(format!("bad url: {e}")))?;
        }
        Ok(())
    }
}

#[instrument(skip(state, auth, body))]
async fn create_ingredient(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<IngredientBody>,
) -> ApiResult<Json<Ingredient>> {
    require_admin(&auth)?;
    body.validate()?;
    let row = sqlx::query_as::<_, Ingredient>(&format!(
        r#"
        INSERT INTO ingredients (name, brand, category, brix, abv, density, keywords, affiliate_urls)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {INGREDIENT_COLUMNS}
        "#
    ))
    .bind(body.name.trim())
    .bind(&body.brand)
    .bind(body.category.trim().to_lowercase())
    .bind(body.brix)
    .bind(body.abv)
    .bind(body.density)
    .bind(SqlJson(&body.keywords))
    .bind(SqlJson(&body.affiliate_urls))
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[instrument(skip(state, auth, body))]
async fn update_ingredient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<IngredientBody>,
) -> ApiResult<Json<Ingredient>> {
    require_admin(&auth)?;
    body.validate()?;
    let row = sqlx::query_as::<_, Ingredient>(&format!(
        r#"
        UPDATE ingredients
        SET name = $2, brand = $3, category = $4, brix = $5, abv = $6,
            density = $7, keywords = $8, affiliate_urls = $9
        WHERE id = $1
        RETURNING {INGREDIENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(body.name.trim())
    .bind(&body.brand)
    .bind(body.category.trim().to_lowercase())
    .bind(body.brix)
    .bind(body.abv)
    .bind(body.density)
    .bind(SqlJson(&body.keywords))
    .bind(SqlJson(&body.affiliate_urls))
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[instrument(skip(state, auth))]
async fn delete_ingredient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let res = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, brand: Option<&str>, keywords: &[(&str, &[&str])]) -> Ingredient {
        Ingredient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            brand: brand.map(str::to_string),
            category: "syrup".into(),
            brix: Some(65.0),
            abv: None,
            density: None,
            keywords: SqlJson(
                keywords
                    .iter()
                    .map(|(lang, kws)| {
                        (
                            lang.to_string(),
                            kws.iter().map(|k| k.to_string()).collect(),
                        )
                    })
                    .collect(),
            ),
            affiliate_urls: SqlJson(BTreeMap::new()),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn query_matches_name_case_insensitively() {
        let ing = entry("Jordbær Sirup", None, &[]);
        assert!(ing.matches_query("jordbær"));
        assert!(ing.matches_query("SIRUP"));
        assert!(!ing.matches_query("hindbær"));
    }

    #[test]
    fn query_matches_localized_keywords() {
        let ing = entry(
            "Jordbær Sirup",
            None,
            &[("en", &["strawberry", "syrup"]), ("de", &["erdbeere"])],
        );
        assert!(ing.matches_query("strawberry"));
        assert!(ing.matches_query("Erdbeere"));
    }

    #[test]
    fn query_matches_brand() {
        let ing = entry("Sirup", Some("Funkin"), &[]);
        assert!(ing.matches_query("funkin"));
    }

    #[test]
    fn empty_query_matches_everything() {
        let ing = entry("Sirup", None, &[]);
        assert!(ing.matches_query(""));
        assert!(ing.matches_query("   "));
    }
}
