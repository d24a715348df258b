use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::importer::{self, ImportReport};
use super::repo::{
    self, AffiliateMapping, AffiliateOption, MappingBody, OptionBody, OPTION_ACTIVE, OPTION_BROKEN,
};
use super::resolver;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/go/:slug", get(redirect))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/affiliate/mappings", get(list_mappings).post(upsert_mapping))
        .route("/affiliate/mappings/:id", axum::routing::delete(delete_mapping))
        .route(
            "/affiliate/mappings/:id/options",
            get(list_options).post(create_option),
        )
        .route("/affiliate/options/:id", axum::routing::delete(delete_option))
        .route("/affiliate/options/:id/status", axum::routing::put(set_option_status))
        .route("/affiliate/import", post(import_csv))
        .route("/affiliate/link-health", post(link_health))
}

#[derive(Debug, Deserialize, Default)]
struct RedirectQuery {
    country: Option<String>,
}

/// The affiliate redirect: picks a supplier for the caller's country,
/// decorates the URL with UTM parameters and 302s. Click recording is
/// queued and never blocks the response.
#[instrument(skip(state))]
async fn redirect(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(q): Query<RedirectQuery>,
) -> Response {
    let mapping = match repo::find_mapping_by_slug(&state.db, &slug).await {
        Ok(Some(m)) => m,
        Ok(None) => return ApiError::NotFound.into_response(),
        Err(e) => return ApiError::Internal(e).into_response(),
    };

    let options = match repo::active_options(&state.db, mapping.id).await {
        Ok(o) => o,
        Err(e) => return ApiError::Internal(e).into_response(),
    };

    let Some(option) = resolver::pick_option(&options, q.country.as_deref()) else {
        // No active supplier left; send the caller somewhere useful if we can.
        if let Some(fallback) = &state.config.affiliate_fallback_url {
            return Redirect::temporary(fallback).into_response();
        }
        return ApiError::NotFound.into_response();
    };

    let location = match resolver::decorate_url(&option.url) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, option_id = %option.id, "stored option url failed to parse");
            return ApiError::Internal(e).into_response();
        }
    };

    state.clicks.record(option.id);
    Redirect::temporary(&location).into_response()
}

fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.user.role() != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, auth))]
async fn list_mappings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<AffiliateMapping>>> {
    require_admin(&auth)?;
    Ok(Json(repo::list_mappings(&state.db).await?))
}

#[instrument(skip(state, auth, body))]
async fn upsert_mapping(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut body): Json<MappingBody>,
) -> ApiResult<Json<AffiliateMapping>> {
    require_admin(&auth)?;
    if body.product_name.trim().is_empty() {
        return Err(ApiError::bad_request("product_name is required"));
    }
    if body.slug.trim().is_empty() {
        body.slug = importer::slugify(&body.product_name);
    }
    Ok(Json(repo::upsert_mapping(&state.db, &body).await?))
}

#[instrument(skip(state, auth))]
async fn delete_mapping(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    if repo::delete_mapping(&state.db, id).await? == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[instrument(skip(state, auth))]
async fn list_options(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<AffiliateOption>>> {
    require_admin(&auth)?;
    Ok(Json(repo::list_options(&state.db, id).await?))
}

#[instrument(skip(state, auth, body))]
async fn create_option(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<OptionBody>,
) -> ApiResult<Json<AffiliateOption>> {
    require_admin(&auth)?;
    url::Url::parse(&body.url).map_err(|e| ApiError::bad_request(format!("bad url: {e}")))?;
    Ok(Json(repo::insert_option(&state.db, id, &body).await?))
}

#[instrument(skip(state, auth))]
async fn delete_option(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    if repo::delete_option(&state.db, id).await? == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[instrument(skip(state, auth, body))]
async fn set_option_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&auth)?;
    if ![OPTION_ACTIVE, OPTION_BROKEN, repo::OPTION_PENDING].contains(&body.status.as_str()) {
        return Err(ApiError::bad_request("unknown option status"));
    }
    if repo::set_option_status(&state.db, id, &body.status).await? == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct ImportBody {
    csv: String,
}

#[instrument(skip(state, auth, body))]
async fn import_csv(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ImportBody>,
) -> ApiResult<Json<ImportReport>> {
    require_admin(&auth)?;
    let report = importer::import_csv(&state.db, &body.csv).await?;
    info!(
        imported = report.imported,
        errors = report.errors.len(),
        "affiliate csv import finished"
    );
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct LinkHealthEntry {
    option_id: Uuid,
    url: String,
    ok: bool,
}

/// HEAD-probes every active option and marks the dead ones broken.
#[instrument(skip(state, auth))]
async fn link_health(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<LinkHealthEntry>>> {
    require_admin(&auth)?;
    let options = repo::all_active_options(&state.db).await?;
    let mut report = Vec::with_capacity(options.len());
    for option in options {
        let ok = match state
            .http
            .head(&option.url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success() || resp.status().is_redirection(),
            Err(e) => {
                warn!(error = %e, url = %option.url, "link probe failed");
                false
            }
        };
        if !ok {
            repo::set_option_status(&state.db, option.id, OPTION_BROKEN).await?;
        }
        report.push(LinkHealthEntry {
            option_id: option.id,
            url: option.url,
            ok,
        });
    }
    Ok(Json(report))
}
