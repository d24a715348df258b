use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Everything under /admin. Membership management lives here; the affiliate,
/// ads and catalog admin surfaces are merged in from their own modules.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members", get(list_members))
        .route("/members/:id", get(get_member).delete(delete_member))
        .merge(crate::affiliate::admin_router())
        .merge(crate::ads::admin_router())
        .merge(crate::ingredients::admin_router())
}

fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, FromRow, Serialize)]
struct MemberRow {
    id: Uuid,
    email: String,
    display_name: String,
    role: String,
    country: Option<String>,
    created_at: OffsetDateTime,
    recipe_count: i64,
    session_count: i64,
}

const MEMBER_QUERY: &str = r#"
    SELECT u.id, u.email, u.display_name, u.role, u.country, u.created_at,
           (SELECT count(*) FROM recipes r WHERE r.author_id = u.id) AS recipe_count,
           (SELECT count(*) FROM sessions s
            WHERE s.user_id = u.id AND s.expires_at > now()) AS session_count
    FROM users u
"#;

#[instrument(skip(state, auth))]
async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<MemberRow>>> {
    require_admin(&auth)?;
    let rows = sqlx::query_as::<_, MemberRow>(&format!(
        "{MEMBER_QUERY} ORDER BY u.created_at DESC"
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state, auth))]
async fn get_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MemberRow>> {
    require_admin(&auth)?;
    let row = sqlx::query_as::<_, MemberRow>(&format!("{MEMBER_QUERY} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

/// Admins cannot remove their own account; that is an ownership violation,
/// not a malformed request.
fn ensure_not_self(admin_id: Uuid, target_id: Uuid) -> ApiResult<()> {
    if admin_id == target_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Rows keyed by the member's id in the owner_key text column. Comments and
/// tips stay behind as authored content.
async fn purge_owned_rows(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let key = user_id.to_string();
    for table in [
        "pantry_items",
        "shopping_list_items",
        "machines",
        "favorites",
        "ratings",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE owner_key = $1"))
            .bind(&key)
            .execute(db)
            .await?;
    }
    Ok(())
}

#[instrument(skip(state, auth))]
async fn delete_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    ensure_not_self(auth.user.id, id)?;

    purge_owned_rows(&state.db, id).await?;
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    info!(member_id = %id, "member deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_delete_is_forbidden() {
        let me = Uuid::new_v4();
        assert!(matches!(
            ensure_not_self(me, me).unwrap_err(),
            ApiError::Forbidden
        ));
        assert!(ensure_not_self(me, Uuid::new_v4()).is_ok());
    }
}
