use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ratings", post(rate_recipe))
}

#[derive(Debug, Deserialize)]
struct RatingBody {
    recipe_id: Uuid,
    stars: i32,
}

#[instrument(skip(state, auth))]
async fn rate_recipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RatingBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if auth.user.role() == Role::Guest {
        return Err(ApiError::Forbidden);
    }
    if !(1..=5).contains(&body.stars) {
        return Err(ApiError::bad_request("stars must be between 1 and 5"));
    }

    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM recipes WHERE id = $1")
        .bind(body.recipe_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound);
    }

    sqlx::query(
        r#"
        INSERT INTO ratings (owner_key, recipe_id, stars)
        VALUES ($1, $2, $3)
        ON CONFLICT (owner_key, recipe_id) DO UPDATE SET stars = EXCLUDED.stars
        "#,
    )
    .bind(auth.user.id.to_string())
    .bind(body.recipe_id)
    .bind(body.stars)
    .execute(&state.db)
    .await?;

    // Denormalized aggregate on the recipe row; recomputed whole so the
    // average never drifts.
    let row: Option<(f64, i64)> = sqlx::query_as(
        r#"
        UPDATE recipes r
        SET rating_avg = agg.avg, rating_count = agg.count
        FROM (
            SELECT coalesce(avg(stars), 0)::float8 AS avg, count(*) AS count
            FROM ratings WHERE recipe_id = $1
        ) agg
        WHERE r.id = $1
        RETURNING agg.avg, agg.count
        "#,
    )
    .bind(body.recipe_id)
    .fetch_optional(&state.db)
    .await?;

    let (avg, count) = row.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({
        "recipe_id": body.recipe_id,
        "rating_avg": avg,
        "rating_count": count,
    })))
}
