use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::MaybeAuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Favorite {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_key: String,
    pub recipe_id: Uuid,
    pub created_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites).post(create_favorite))
        .route("/favorites/:recipe_id", axum::routing::delete(delete_favorite))
}

#[derive(Debug, Deserialize, Default)]
struct OwnerQuery {
    session_id: Option<String>,
}

#[instrument(skip(state, maybe))]
async fn list_favorites(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<Favorite>>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let rows = sqlx::query_as::<_, Favorite>(
        r#"
        SELECT id, owner_key, recipe_id, created_at
        FROM favorites
        WHERE owner_key = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(&owner_key)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    recipe_id: Uuid,
}

#[instrument(skip(state, maybe))]
async fn create_favorite(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<CreateBody>,
) -> ApiResult<Json<Favorite>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM recipes WHERE id = $1")
        .bind(body.recipe_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound);
    }
    // Idempotent: favoriting twice keeps the original row.
    let row = sqlx::query_as::<_, Favorite>(
        r#"
        INSERT INTO favorites (owner_key, recipe_id)
        VALUES ($1, $2)
        ON CONFLICT (owner_key, recipe_id) DO UPDATE SET recipe_id = EXCLUDED.recipe_id
        RETURNING id, owner_key, recipe_id, created_at
        "#,
    )
    .bind(&owner_key)
    .bind(body.recipe_id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[instrument(skip(state, maybe))]
async fn delete_favorite(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(recipe_id): Path<Uuid>,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let res = sqlx::query("DELETE FROM favorites WHERE owner_key = $1 AND recipe_id = $2")
        .bind(&owner_key)
        .bind(recipe_id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
