use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::{types::Json as SqlJson, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::session::MaybeAuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Machine {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_key: String,
    pub name: String,
    pub tank_volumes_ml: SqlJson<Vec<f64>>,
    pub loss_margin_pct: f64,
    pub is_default: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct MachineBody {
    pub name: String,
    #[serde(default)]
    pub tank_volumes_ml: Vec<f64>,
    #[serde(default = "default_margin")]
    pub loss_margin_pct: f64,
    #[serde(default)]
    pub is_default: bool,
}

fn default_margin() -> f64 {
    5.0
}

impl MachineBody {
    fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Machine name is required"));
        }
        if self.tank_volumes_ml.iter().any(|v| *v <= 0.0) {
            return Err(ApiError::bad_request("Tank volumes must be > 0"));
        }
        if !(0.0..=100.0).contains(&self.loss_margin_pct) {
            return Err(ApiError::bad_request("loss_margin_pct must be within [0, 100]"));
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/machines", get(list_machines).post(create_machine))
        .route(
            "/machines/:id",
            axum::routing::put(update_machine).delete(delete_machine),
        )
}

#[derive(Debug, Deserialize, Default)]
struct OwnerQuery {
    session_id: Option<String>,
}

const MACHINE_COLUMNS: &str =
    "id, owner_key, name, tank_volumes_ml, loss_margin_pct, is_default, created_at";

/// A new default machine demotes the previous one; the pair of updates is
/// per-owner and tolerates the races the store allows.
async fn clear_default(db: &PgPool, owner_key: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE machines SET is_default = false WHERE owner_key = $1")
        .bind(owner_key)
        .execute(db)
        .await?;
    Ok(())
}

#[instrument(skip(state, maybe))]
async fn list_machines(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<Machine>>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let rows = sqlx::query_as::<_, Machine>(&format!(
        "SELECT {MACHINE_COLUMNS} FROM machines WHERE owner_key = $1 ORDER BY created_at DESC"
    ))
    .bind(&owner_key)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state, maybe, body))]
async fn create_machine(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<MachineBody>,
) -> ApiResult<Json<Machine>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    body.validate()?;
    if body.is_default {
        clear_default(&state.db, &owner_key).await?;
    }
    let row = sqlx::query_as::<_, Machine>(&format!(
        r#"
        INSERT INTO machines (owner_key, name, tank_volumes_ml, loss_margin_pct, is_default)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {MACHINE_COLUMNS}
        "#
    ))
    .bind(&owner_key)
    .bind(body.name.trim())
    .bind(SqlJson(&body.tank_volumes_ml))
    .bind(body.loss_margin_pct)
    .bind(body.is_default)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

#[instrument(skip(state, maybe, body))]
async fn update_machine(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<OwnerQuery>,
    Json(body): Json<MachineBody>,
) -> ApiResult<Json<Machine>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    body.validate()?;
    if body.is_default {
        clear_default(&state.db, &owner_key).await?;
    }
    let row = sqlx::query_as::<_, Machine>(&format!(
        r#"
        UPDATE machines
        SET name = $3, tank_volumes_ml = $4, loss_margin_pct = $5, is_default = $6
        WHERE id = $1 AND owner_key = $2
        RETURNING {MACHINE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&owner_key)
    .bind(body.name.trim())
    .bind(SqlJson(&body.tank_volumes_ml))
    .bind(body.loss_margin_pct)
    .bind(body.is_default)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[instrument(skip(state, maybe))]
async fn delete_machine(
    State(state): State<AppState>,
    maybe: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner_key = maybe.owner_key(q.session_id.as_deref())?;
    let res = sqlx::query("DELETE FROM machines WHERE id = $1 AND owner_key = $2")
        .bind(id)
        .bind(&owner_key)
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
