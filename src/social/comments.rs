use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
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

pub const STATUS_VISIBLE: &str = "visible";

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub body: String,
    #[serde(skip_serializing)]
    pub status: String,
    pub likes: i64,
    #[serde(skip_serializing)]
    pub liked_by: SqlJson<Vec<String>>,
    pub created_at: OffsetDateTime,
}

const COMMENT_COLUMNS: &str =
    "id, recipe_id, author_id, author_name, body, status, likes, liked_by, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/:id",
            axum::routing::put(update_comment).delete(delete_comment),
        )
        .route("/comments/:id/like", post(like_comment))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    recipe_id: Uuid,
}

#[instrument(skip(state))]
async fn list_comments(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    let rows = sqlx::query_as::<_, Comment>(&format!(
        r#"
        SELECT {COMMENT_COLUMNS} FROM comments
        WHERE recipe_id = $1 AND status = $2
        ORDER BY created_at DESC
        "#
    ))
    .bind(q.recipe_id)
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
struct CreateBody {
    recipe_id: Uuid,
    body: String,
}

#[instrument(skip(state, auth, payload))]
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateBody>,
) -> ApiResult<Json<Comment>> {
    require_member(&auth)?;
    if payload.body.trim().is_empty() {
        return Err(ApiError::bad_request("Comment body is required"));
    }
    let row = sqlx::query_as::<_, Comment>(&format!(
        r#"
        INSERT INTO comments (recipe_id, author_id, author_name, body)
        VALUES ($1, $2, $3, $4)
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(payload.recipe_id)
    .bind(auth.user.id)
    .bind(&auth.user.display_name)
    .bind(payload.body.trim())
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    body: String,
}

#[instrument(skip(state, auth, payload))]
async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBody>,
) -> ApiResult<Json<Comment>> {
    require_member(&auth)?;
    if payload.body.trim().is_empty() {
        return Err(ApiError::bad_request("Comment body is required"));
    }
    // Only the author may edit; admins moderate by deletion, not rewriting.
    let row = sqlx::query_as::<_, Comment>(&format!(
        r#"
        UPDATE comments SET body = $3
        WHERE id = $1 AND author_id = $2
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(auth.user.id)
    .bind(payload.body.trim())
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[instrument(skip(state, auth))]
async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_member(&auth)?;
    let existing = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let is_author = existing.author_id == Some(auth.user.id);
    if !is_author && auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Adds one like per user; repeated likes are a no-op so the optimistic
/// counter never drifts from the liker set.
pub async fn like_row(
    db: &PgPool,
    table: &str,
    id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<i64>> {
    let likes: Option<i64> = sqlx::query_scalar(&format!(
        r#"
        UPDATE {table}
        SET liked_by = liked_by || to_jsonb($2::text),
            likes = likes + 1
        WHERE id = $1 AND NOT liked_by @> to_jsonb($2::text)
        RETURNING likes
        "#
    ))
    .bind(id)
    .bind(user_id.to_string())
    .fetch_optional(db)
    .await?;
    if likes.is_some() {
        return Ok(likes);
    }
    // Already liked, or the row is gone; disambiguate for the caller.
    let current: Option<i64> =
        sqlx::query_scalar(&format!("SELECT likes FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?;
    Ok(current)
}

#[instrument(skip(state, auth))]
async fn like_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let likes = like_row(&state.db, "comments", id, auth.user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "likes": likes })))
}
