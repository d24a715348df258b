use axum::{
    extract::{Path, State},
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

use super::comments::{like_row, STATUS_VISIBLE};

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Tip {
    pub id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing)]
    pub status: String,
    pub likes: i64,
    #[serde(skip_serializing)]
    pub liked_by: SqlJson<Vec<String>>,
    pub created_at: OffsetDateTime,
}

const TIP_COLUMNS: &str =
    "id, author_id, author_name, title, body, status, likes, liked_by, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tips", get(list_tips).post(create_tip))
        .route(
            "/tips/:id",
            axum::routing::put(update_tip).delete(delete_tip),
        )
        .route("/tips/:id/like", post(like_tip))
}

#[instrument(skip(state))]
async fn list_tips(State(state): State<AppState>) -> ApiResult<Json<Vec<Tip>>> {
    let rows = sqlx::query_as::<_, Tip>(&format!(
        "SELECT {TIP_COLUMNS} FROM tips WHERE status = $1 ORDER BY created_at DESC"
    ))
    .bind(STATUS_VISIBLE)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

fn require_member(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() == Role::Guest {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TipBody {
    title: String,
    body: String,
}

impl TipBody {
    fn validate(&self) -> ApiResult<()> {
        if self.title.trim().is_empty() || self.body.trim().is_empty() {
            return Err(ApiError::bad_request("Tip title and body are required"));
        }
        Ok(())
    }
}

#[instrument(skip(state, auth, payload))]
async fn create_tip(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TipBody>,
) -> ApiResult<Json<Tip>> {
    require_member(&auth)?;
    payload.validate()?;
    let row = sqlx::query_as::<_, Tip>(&format!(
        r#"
        INSERT INTO tips (author_id, author_name, title, body)
        VALUES ($1, $2, $3, $4)
        RETURNING {TIP_COLUMNS}
        "#
    ))
    .bind(auth.user.id)
    .bind(&auth.user.display_name)
    .bind(payload.title.trim())
    .bind(payload.body.trim())
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[instrument(skip(state, auth, payload))]
async fn update_tip(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TipBody>,
) -> ApiResult<Json<Tip>> {
    require_member(&auth)?;
    payload.validate()?;
    let row = sqlx::query_as::<_, Tip>(&format!(
        r#"
        UPDATE tips SET title = $3, body = $4
        WHERE id = $1 AND author_id = $2
        RETURNING {TIP_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.user.id)
    .bind(payload.title.trim())
    .bind(payload.body.trim())
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[instrument(skip(state, auth))]
async fn delete_tip(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_member(&auth)?;
    let author_id: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT author_id FROM tips WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    let author_id = author_id.ok_or(ApiError::NotFound)?;
    if author_id != Some(auth.user.id) && auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    sqlx::query("DELETE FROM tips WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[instrument(skip(state, auth))]
async fn like_tip(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let likes = like_row(&state.db, "tips", id, auth.user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "likes": likes })))
}
