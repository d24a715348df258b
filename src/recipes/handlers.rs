use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::session::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::access::{self, ListFilters, Viewer};
use super::dto::RecipeBody;
use super::repo::{self, Recipe};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/approve", post(approve_recipe))
        .route("/recipes/:id/reject", post(reject_recipe))
}

fn viewer_of(maybe: &MaybeAuthUser) -> Viewer {
    Viewer {
        role: maybe.role(),
        user_id: maybe.0.as_ref().map(|a| a.user.id),
    }
}

#[instrument(skip(state, maybe))]
async fn list_recipes(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(filters): Query<ListFilters>,
) -> ApiResult<Json<Vec<Recipe>>> {
    let viewer = viewer_of(&maybe);
    let mut recipes: Vec<Recipe> = repo::list_all(&state.db)
        .await?
        .into_iter()
        .filter(|r| access::can_view(r, &viewer))
        .filter(|r| access::matches_filters(r, &filters))
        .collect();
    recipes.sort_by(access::listing_order);
    Ok(Json(recipes))
}

#[instrument(skip(state, maybe))]
async fn get_recipe(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Recipe>> {
    let viewer = viewer_of(&maybe);
    let recipe = repo::find_by_id(&state.db, id)
        .await?
        .filter(|r| access::can_view(r, &viewer))
        .ok_or(ApiError::NotFound)?;
    repo::bump_view_count(&state.db, id).await?;
    Ok(Json(recipe))
}

#[instrument(skip(state, auth, body))]
async fn create_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RecipeBody>,
) -> ApiResult<Json<Recipe>> {
    let role = auth.user.role();
    if !access::can_create(role) {
        return Err(ApiError::Forbidden);
    }
    let new = body.into_new_recipe()?;
    let approval = access::initial_approval(role, new.is_published);
    let recipe = repo::insert(
        &state.db,
        &new,
        auth.user.id,
        &auth.user.display_name,
        approval,
    )
    .await?;
    info!(recipe_id = %recipe.id, approval, "recipe created");
    Ok(Json(recipe))
}

#[instrument(skip(state, auth, body))]
async fn update_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RecipeBody>,
) -> ApiResult<Json<Recipe>> {
    let viewer = Viewer {
        role: auth.user.role(),
        user_id: Some(auth.user.id),
    };
    let existing = repo::find_by_id(&state.db, id)
        .await?
        .filter(|r| access::can_view(r, &viewer))
        .ok_or(ApiError::NotFound)?;
    if !access::can_edit(&existing, &viewer) {
        return Err(ApiError::Forbidden);
    }
    let new = body.into_new_recipe()?;
    let approval = access::approval_after_edit(&existing, &viewer);
    let recipe = repo::update(&state.db, id, &new, approval)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(recipe))
}

#[instrument(skip(state, auth))]
async fn delete_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = Viewer {
        role: auth.user.role(),
        user_id: Some(auth.user.id),
    };
    let existing = repo::find_by_id(&state.db, id)
        .await?
        .filter(|r| access::can_view(r, &viewer))
        .ok_or(ApiError::NotFound)?;
    if !access::can_edit(&existing, &viewer) {
        return Err(ApiError::Forbidden);
    }
    repo::delete(&state.db, id).await?;
    info!(recipe_id = %id, "recipe deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() != crate::auth::session::Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, auth))]
async fn approve_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Recipe>> {
    require_admin(&auth)?;
    let recipe = repo::set_approval(&state.db, id, repo::APPROVAL_APPROVED, None)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(recipe_id = %id, "recipe approved");
    Ok(Json(recipe))
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    reason: String,
}

#[instrument(skip(state, auth, body))]
async fn reject_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> ApiResult<Json<Recipe>> {
    require_admin(&auth)?;
    if body.reason.trim().is_empty() {
        return Err(ApiError::Unprocessable("A rejection reason is required".into()));
    }
    let recipe = repo::set_approval(
        &state.db,
        id,
        repo::APPROVAL_REJECTED,
        Some(body.reason.trim()),
    )
    .await?
    .ok_or(ApiError::NotFound)?;
    info!(recipe_id = %id, "recipe rejected");
    Ok(Json(recipe))
}
