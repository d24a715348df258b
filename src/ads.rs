use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::{types::Json as SqlJson, FromRow};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Ad {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub target_url: String,
    pub placement: String,
    pub countries: SqlJson<Vec<String>>,
    pub active: bool,
    pub impressions: i64,
    pub clicks: i64,
    pub created_at: OffsetDateTime,
}

const AD_COLUMNS: &str =
    "id, title, image_url, target_url, placement, countries, active, impressions, clicks, created_at";

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/ads", get(list_ads))
        .route("/ads/:id/impression", post(count_impression))
        .route("/ads/:id/click", post(count_click))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/ads", get(list_all_ads).post(create_ad))
        .route("/ads/:id", axum::routing::put(update_ad).delete(delete_ad))
}

#[derive(Debug, Deserialize, Default)]
struct AdsQuery {
    country: Option<String>,
    placement: Option<String>,
}

/// Active ads for a country and placement. An ad with no countries targets
/// everyone.
#[instrument(skip(state))]
async fn list_ads(
    State(state): State<AppState>,
    Query(q): Query<AdsQuery>,
) -> ApiResult<Json<Vec<Ad>>> {
    let rows = sqlx::query_as::<_, Ad>(&format!(
        "SELECT {AD_COLUMNS} FROM ads WHERE active ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db)
    .await?;

    let country = q.country.as_deref().map(|c| c.trim().to_uppercase());
    let placement = q.placement.as_deref().map(|p| p.trim().to_lowercase());
    let ads = rows
        .into_iter()
        .filter(|ad| match &country {
            Some(c) => ad.countries.is_empty() || ad.countries.iter().any(|x| x == c),
            None => true,
        })
        .filter(|ad| match &placement {
            Some(p) => ad.placement.to_lowercase() == *p,
            None => true,
        })
        .collect();
    Ok(Json(ads))
}

async fn bump(state: &AppState, id: Uuid, column: &str) -> ApiResult<()> {
    let res = sqlx::query(&format!("UPDATE ads SET {column} = {column} + 1 WHERE id = $1"))
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

#[instrument(skip(state))]
async fn count_impression(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    bump(&state, id, "impressions").await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[instrument(skip(state))]
async fn count_click(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    bump(&state, id, "clicks").await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AdBody {
    title: String,
    image_url: Option<String>,
    target_url: String,
    #[serde(default)]
    placement: String,
    #[serde(default)]
    countries: Vec<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl AdBody {
    fn validate(&self) -> ApiResult<()> {
        if self.title.trim().is_empty() {
            return Err(ApiError::bad_request("Ad title is required"));
        }
        url::Url::parse(&self.target_url)
            .map_err(|e| ApiError::bad_request(format!("bad target_url: {e}")))?;
        Ok(())
    }

    fn countries(&self) -> Vec<String> {
        self.countries
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[instrument(skip(state, auth))]
async fn list_all_ads(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Ad>>> {
    require_admin(&auth)?;
    let rows = sqlx::query_as::<_, Ad>(&format!(
        "SELECT {AD_COLUMNS} FROM ads ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state, auth, body))]
async fn create_ad(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AdBody>,
) -> ApiResult<Json<Ad>> {
    require_admin(&auth)?;
    body.validate()?;
    let row = sqlx::query_as::<_, Ad>(&format!(
        r#"
        INSERT INTO ads (title, image_url, target_url, placement, countries, active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {AD_COLUMNS}
        "#
    ))
    .bind(body.title.trim())
    .bind(&body.image_url)
    .bind(&body.target_url)
    .bind(body.placement.trim().to_lowercase())
    .bind(SqlJson(body.countries()))
    .bind(body.active)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[instrument(skip(state, auth, body))]
async fn update_ad(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AdBody>,
) -> ApiResult<Json<Ad>> {
    require_admin(&auth)?;
    body.validate()?;
    let row = sqlx::query_as::<_, Ad>(&format!(
        r#"
        UPDATE ads
        SET title = $2, image_url = $3, target_url = $4, placement = $5,
            countries = $6, active = $7
        WHERE id = $1
        RETURNING {AD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(body.title.trim())
    .bind(&body.image_url)
    .bind(&body.target_url)
    .bind(body.placement.trim().to_lowercase())
    .bind(SqlJson(body.countries()))
    .bind(body.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[instrument(skip(state, auth))]
async fn delete_ad(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let res = sqlx::query("DELETE FROM ads WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
