use axum::{
    extract::State,
    http::header,
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::{
    DeviceInfo, DeviceLogoutRequest, DevicesResponse, ForgotPasswordRequest, LoginRequest,
    LoginResponse, PublicUser, ResetPasswordRequest, SignupRequest, SignupResponse,
};
use super::password::{hash_password, is_valid_email, verify_password};
use super::session::{self, AuthUser, User};

const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/devices", get(devices))
        .route("/auth/devices/logout", post(device_logout))
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash, payload.name.trim()).await?;

    info!(user_id = %user.id, "user signed up");
    Ok(Json(SignupResponse { user_id: user.id }))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::Unauthorized);
    }

    let device_id = payload
        .device_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok());

    let token = session::create_session(
        &state.db,
        &user,
        &device_id,
        payload.device_name.as_deref(),
        user_agent,
        None,
    )
    .await?;

    info!(user_id = %user.id, %device_id, "user logged in");
    Ok(Json(LoginResponse {
        session_token: token,
        user: user.into(),
    }))
}

#[instrument(skip_all)]
async fn me(auth: AuthUser) -> Json<PublicUser> {
    Json(auth.user.into())
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<serde_json::Value>> {
    session::delete_session(&state.db, &auth.token).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Always answers 200 so callers cannot probe which emails exist.
#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = payload.email.trim().to_lowercase();
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        let token = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO password_resets (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token)
        .bind(user.id)
        .bind(OffsetDateTime::now_utc() + RESET_TOKEN_TTL)
        .execute(&state.db)
        .await?;
        // Delivery happens out of band; the token never appears in the response.
        info!(user_id = %user.id, "password reset token issued");
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let user_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE password_resets
        SET used = true
        WHERE token = $1 AND NOT used AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(payload.reset_token)
    .fetch_optional(&state.db)
    .await?;

    let user_id = user_id.ok_or(ApiError::bad_request("Invalid or expired reset token"))?;
    let hash = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(&hash)
        .bind(user_id)
        .execute(&state.db)
        .await?;
    // All sessions drop so a stolen token cannot outlive the reset.
    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    info!(%user_id, "password reset completed");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[instrument(skip_all)]
async fn devices(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<DevicesResponse>> {
    let sessions = session::recent_devices(&state.db, auth.user.id).await?;
    let devices: Vec<DeviceInfo> = sessions.into_iter().map(DeviceInfo::from).collect();
    Ok(Json(DevicesResponse {
        current_count: devices.len(),
        max_devices: auth.user.role().device_limit(),
        devices,
    }))
}

#[instrument(skip_all)]
async fn device_logout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<DeviceLogoutRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let device_id = payload
        .device_id
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::Unprocessable("device_id is required".into()))?;
    let removed = session::delete_device_sessions(&state.db, auth.user.id, &device_id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })))
}
