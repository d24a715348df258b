use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::MaybeAuthUser;
use crate::domain::brix::{self, Adjustment, AdjustmentKind, MixtureSummary};
use crate::domain::ingredient::IngredientMeasure;
use crate::domain::matcher::{self, MatchCandidate, MatchReport};
use crate::domain::scaler::{self, ScalableIngredient, ScaleOutcome, DEFAULT_LOSS_MARGIN_PCT};
use crate::error::{ApiError, ApiResult};
use crate::pantry;
use crate::recipes::access::{self, Viewer};
use crate::recipes::repo::{self as recipes_repo, Recipe};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/brix/calculate", post(brix_calculate))
        .route("/brix/adjust", post(brix_adjust))
        .route("/scale", post(scale))
        .route("/match", post(find_matches))
}

fn validated(ingredients: Vec<IngredientMeasure>) -> ApiResult<Vec<IngredientMeasure>> {
    for i in &ingredients {
        i.validate().map_err(ApiError::bad_request)?;
    }
    Ok(ingredients)
}

#[derive(Debug, Deserialize)]
struct CalculateBody {
    ingredients: Vec<IngredientMeasure>,
}

#[instrument(skip_all)]
async fn brix_calculate(Json(body): Json<CalculateBody>) -> ApiResult<Json<MixtureSummary>> {
    let ingredients = validated(body.ingredients)?;
    let summary = brix::calculate(&ingredients)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct AdjustBody {
    ingredients: Vec<IngredientMeasure>,
    target_brix: f64,
    adjustment_type: AdjustmentKind,
    syrup_brix: Option<f64>,
}

#[instrument(skip_all)]
async fn brix_adjust(Json(body): Json<AdjustBody>) -> ApiResult<Json<Adjustment>> {
    if !(0.0..=100.0).contains(&body.target_brix) {
        return Err(ApiError::bad_request("target_brix must be within [0, 100]"));
    }
    let ingredients = validated(body.ingredients)?;
    let adjustment = brix::adjust_to_target(
        &ingredients,
        body.target_brix,
        body.adjustment_type,
        body.syrup_brix,
    )?;
    Ok(Json(adjustment))
}

#[derive(Debug, Deserialize)]
struct ScaleBody {
    recipe_id: Uuid,
    target_volume_ml: f64,
    margin_pct: Option<f64>,
}

#[instrument(skip(state, maybe))]
async fn scale(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Json(body): Json<ScaleBody>,
) -> ApiResult<Json<ScaleOutcome>> {
    let viewer = Viewer {
        role: maybe.role(),
        user_id: maybe.0.as_ref().map(|a| a.user.id),
    };
    let recipe = recipes_repo::find_by_id(&state.db, body.recipe_id)
        .await?
        .filter(|r| access::can_view(r, &viewer))
        .ok_or(ApiError::NotFound)?;

    let ingredients: Vec<ScalableIngredient> = recipe
        .ingredients
        .iter()
        .map(|i| ScalableIngredient {
            name: i.name.clone(),
            quantity: i.quantity,
            unit: i.unit.clone(),
            brix: i.brix,
            abv: None,
            role: i.role,
        })
        .collect();

    let outcome = scaler::scale_recipe(
        &ingredients,
        recipe.base_volume_ml,
        recipe.target_brix,
        body.target_volume_ml,
        body.margin_pct.unwrap_or(DEFAULT_LOSS_MARGIN_PCT),
    )?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Default)]
struct MatchBody {
    session_id: Option<String>,
}

/// Joins the caller's pantry against every recipe they can see. Both sides
/// are read fresh on every call; nothing is cached between requests.
#[instrument(skip(state, maybe))]
async fn find_matches(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Json(body): Json<MatchBody>,
) -> ApiResult<Json<MatchReport<Recipe>>> {
    let owner_key = maybe.owner_key(body.session_id.as_deref())?;
    let viewer = Viewer {
        role: maybe.role(),
        user_id: maybe.0.as_ref().map(|a| a.user.id),
    };

    let recipes: Vec<Recipe> = recipes_repo::list_all(&state.db)
        .await?
        .into_iter()
        .filter(|r| access::can_view(r, &viewer))
        .collect();
    let pantry_names: Vec<String> = pantry::repo::list(&state.db, &owner_key)
        .await?
        .into_iter()
        .map(|item| item.ingredient_name)
        .collect();

    let candidates: Vec<MatchCandidate<Recipe>> = recipes
        .into_iter()
        .map(|r| MatchCandidate {
            name: r.name.clone(),
            ingredients: r
                .ingredients
                .iter()
                .map(|i| (i.name.clone(), i.role))
                .collect(),
            payload: r,
        })
        .collect();

    Ok(Json(matcher::find_matches(candidates, &pantry_names)))
}
