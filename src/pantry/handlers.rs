use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::MaybeAuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::repo::{self, NewPantryItem, PantryItem};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pantry", get(list_items).post(create_item))
        .route("/pantry/:id", axum::routing::delete(delete_item))
}

#[derive(Debug, Deserialize, Default)]
pub struct OwnerQuery {
    pub session_id: Option<String>,
}

#[instrument(skip(state, maybe))]
async fn list_items(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<PantryItem>>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let items = repo::list(&state.db, &owner_key).await?;
    Ok(Json(items))
}

#[instrument(skip(state, maybe, body))]
async fn create_item(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<NewPantryItem>,
) -> ApiResult<Json<PantryItem>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    if body.ingredient_name.trim().is_empty() {
        return Err(ApiError::bad_request("ingredient_name is required"));
    }
    if body.quantity <= 0.0 {
        return Err(ApiError::bad_request("quantity must be > 0"));
    }
    let item = repo::insert(&state.db, &owner_key, &body).await?;
    Ok(Json(item))
}

#[instrument(skip(state, maybe))]
async fn delete_item(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let removed = repo::delete(&state.db, &owner_key, id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
