use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::session::MaybeAuthUser;
use crate::domain::matcher::normalize_name;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::repo::{self, NewShoppingListItem, ShoppingListItem};

/// Names the shopping list silently refuses. Tap water never needs buying,
/// and the frontend adds it to every recipe's ingredient list.
const FILTERED_NAMES: [&str; 2] = ["vand", "isvand"];

/// The single place that decides whether a shopping-list write is dropped.
pub fn is_filtered_name(ingredient_name: &str) -> bool {
    let normalized = normalize_name(ingredient_name);
    FILTERED_NAMES.contains(&normalized.as_str())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shopping-list", get(list_items).post(create_item))
        .route(
            "/shopping-list/:id",
            axum::routing::put(update_item).delete(delete_item),
        )
}

#[derive(Debug, Deserialize, Default)]
struct OwnerQuery {
    session_id: Option<String>,
}

#[instrument(skip(state, maybe))]
async fn list_items(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<ShoppingListItem>>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let items = repo::list(&state.db, &owner_key).await?;
    Ok(Json(items))
}

#[instrument(skip(state, maybe, body))]
async fn create_item(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<NewShoppingListItem>,
) -> ApiResult<Json<ShoppingListItem>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    if body.ingredient_name.trim().is_empty() {
        return Err(ApiError::bad_request("ingredient_name is required"));
    }
    if body.quantity <= 0.0 {
        return Err(ApiError::bad_request("quantity must be > 0"));
    }

    // Water writes answer 200 without persisting so the frontend's
    // optimistic UI stays consistent. This is a contract, not an error.
    if is_filtered_name(&body.ingredient_name) {
        debug!(name = %body.ingredient_name, "shopping-list write filtered");
        return Ok(Json(ShoppingListItem {
            id: Uuid::new_v4(),
            owner_key,
            ingredient_name: body.ingredient_name,
            category: body.category,
            quantity: body.quantity,
            unit: body.unit,
            recipe_id: body.recipe_id,
            recipe_name: body.recipe_name,
            is_checked: false,
            added_at: OffsetDateTime::now_utc(),
        }));
    }

    let item = repo::insert(&state.db, &owner_key, &body).await?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    is_checked: bool,
}

#[instrument(skip(state, maybe))]
async fn update_item(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<ShoppingListItem>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let item = repo::set_checked(&state.db, &owner_key, id, body.is_checked)
        .await?
        .ok_or(ApiError::NotFound)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_names_are_filtered() {
        assert!(is_filtered_name("vand"));
        assert!(is_filtered_name("Vand"));
        assert!(is_filtered_name("  ISVAND "));
        assert!(!is_filtered_name("jordbær sirup"));
        assert!(!is_filtered_name("vandmelon sirup"));
    }
}
