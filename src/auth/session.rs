use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_TTL: Duration = Duration::days(30);
/// Sessions older than this are hidden from the device list but stay valid
/// until the 30-day ceiling.
pub const DEVICE_LIST_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Pro,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "guest" => Role::Guest,
            _ => Role::Pro,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Pro => "pro",
            Role::Admin => "admin",
        }
    }

    /// Concurrent device limit at login; None means unlimited.
    pub fn device_limit(&self) -> Option<i64> {
        match self {
            Role::Guest => Some(1),
            Role::Pro => Some(3),
            Role::Admin => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub country: Option<String>,
    pub preferences: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, role, country, preferences, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, role, country, preferences, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Returns the raw sqlx error so callers can map a lost unique-email
    /// race to a conflict instead of a server fault.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, display_name, role, country, preferences, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
    #[serde(skip_serializing)]
    pub ip: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_active: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Every authenticated request pushes the expiry a full TTL past `now`, so
/// an active session never lapses.
fn rolled_expiry(now: OffsetDateTime) -> OffsetDateTime {
    now + SESSION_TTL
}

fn generate_token() -> String {
    // Two v4 uuids give 64 hex chars of entropy for the opaque token.
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Creates a session for a fresh login, evicting the oldest session first
/// when the role's device limit would be exceeded.
pub async fn create_session(
    db: &PgPool,
    user: &User,
    device_id: &str,
    device_name: Option<&str>,
    user_agent: Option<&str>,
    ip: Option<&str>,
) -> anyhow::Result<String> {
    let now = OffsetDateTime::now_utc();

    if let Some(limit) = user.role().device_limit() {
        let active: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM sessions WHERE user_id = $1 AND expires_at > $2",
        )
        .bind(user.id)
        .bind(now)
        .fetch_one(db)
        .await?;
        if active >= limit {
            let evict = active - limit + 1;
            sqlx::query(
                r#"
                DELETE FROM sessions
                WHERE token IN (
                    SELECT token FROM sessions
                    WHERE user_id = $1
                    ORDER BY last_active ASC
                    LIMIT $2
                )
                "#,
            )
            .bind(user.id)
            .bind(evict)
            .execute(db)
            .await?;
        }
    }

    let token = generate_token();
    sqlx::query(
        r#"
        INSERT INTO sessions (token, user_id, device_id, device_name, user_agent, ip, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&token)
    .bind(user.id)
    .bind(device_id)
    .bind(device_name)
    .bind(user_agent)
    .bind(ip)
    .bind(rolled_expiry(now))
    .execute(db)
    .await?;

    Ok(token)
}

/// Validates a token, rolls the 30-day expiry forward and stamps
/// last_active. Returns the owning user.
pub async fn authenticate(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
    let now = OffsetDateTime::now_utc();
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE sessions s
        SET last_active = $2, expires_at = $3
        FROM users u
        WHERE s.token = $1 AND s.expires_at > $2 AND u.id = s.user_id
        RETURNING u.id, u.email, u.password_hash, u.display_name, u.role, u.country,
                  u.preferences, u.created_at
        "#,
    )
    .bind(token)
    .bind(now)
    .bind(rolled_expiry(now))
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn delete_session(db: &PgPool, token: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_device_sessions(
    db: &PgPool,
    user_id: Uuid,
    device_id: &str,
) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND device_id = $2")
        .bind(user_id)
        .bind(device_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

/// Sessions whose last_active falls within the 7-day device window.
pub async fn recent_devices(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Session>> {
    let cutoff = OffsetDateTime::now_utc() - DEVICE_LIST_WINDOW;
    let rows = sqlx::query_as::<_, Session>(
        r#"
        SELECT token, user_id, device_id, device_name, user_agent, ip,
               created_at, last_active, expires_at
        FROM sessions
        WHERE user_id = $1 AND last_active > $2 AND expires_at > now()
        ORDER BY last_active DESC
        "#,
    )
    .bind(user_id)
    .bind(cutoff)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Startup sweep: drops sessions idle for longer than the session TTL.
/// Logs and continues on failure.
pub async fn sweep_stale_sessions(db: &PgPool) {
    let cutoff = OffsetDateTime::now_utc() - SESSION_TTL;
    match sqlx::query("DELETE FROM sessions WHERE last_active < $1")
        .bind(cutoff)
        .execute(db)
        .await
    {
        Ok(res) => {
            if res.rows_affected() > 0 {
                tracing::info!(deleted = res.rows_affected(), "swept stale sessions");
            }
        }
        Err(e) => tracing::warn!(error = %e, "session sweep failed"),
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(auth) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
        {
            return Some(token.to_string());
        }
    }
    // Session cookie fallback for browser clients.
    parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                c.trim()
                    .strip_prefix("session_token=")
                    .map(|v| v.to_string())
            })
        })
}

/// Authenticated caller: a valid, freshly rolled session.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let user = authenticate(&state.db, &token)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser { user, token })
    }
}

/// Caller that may or may not be logged in; guest endpoints use this.
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeAuthUser(None));
        };
        let user = authenticate(&state.db, &token)
            .await
            .map_err(ApiError::Internal)?;
        Ok(MaybeAuthUser(
            user.map(|user| AuthUser { user, token }),
        ))
    }
}

impl MaybeAuthUser {
    pub fn role(&self) -> Role {
        self.0
            .as_ref()
            .map(|a| a.user.role())
            .unwrap_or(Role::Guest)
    }

    /// Owner key for private collections: the user id when logged in, the
    /// caller-supplied opaque session key otherwise.
    pub fn owner_key(&self, session_id: Option<&str>) -> Result<String, ApiError> {
        if let Some(auth) = &self.0 {
            return Ok(auth.user.id.to_string());
        }
        match session_id {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let t = generate_token();
        assert_eq!(t.len(), 64);
        assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn device_limits_by_role() {
        assert_eq!(Role::Guest.device_limit(), Some(1));
        assert_eq!(Role::Pro.device_limit(), Some(3));
        assert_eq!(Role::Admin.device_limit(), None);
    }

    #[test]
    fn role_parse_defaults_to_pro() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("weird"), Role::Pro);
    }

    #[test]
    fn expiry_rolls_a_full_ttl_past_now() {
        let now = OffsetDateTime::now_utc();
        let rolled = rolled_expiry(now);
        assert_eq!(rolled - now, Duration::days(30));

        // A later touch always extends further than an earlier one.
        let later = now + Duration::hours(1);
        assert!(rolled_expiry(later) > rolled);
    }

    fn user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.dk".into(),
            password_hash: String::new(),
            display_name: "A".into(),
            role: role.into(),
            country: None,
            preferences: serde_json::json!({}),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn anonymous_caller_owns_via_session_key() {
        let maybe = MaybeAuthUser(None);
        assert_eq!(
            maybe.owner_key(Some("device-abc")).unwrap(),
            "device-abc".to_string()
        );
    }

    #[test]
    fn anonymous_caller_without_key_is_unauthorized() {
        let maybe = MaybeAuthUser(None);
        assert!(maybe.owner_key(None).is_err());
        assert!(maybe.owner_key(Some("")).is_err());
    }

    #[test]
    fn logged_in_caller_ignores_client_session_key() {
        let u = user("pro");
        let id = u.id;
        let maybe = MaybeAuthUser(Some(AuthUser {
            user: u,
            token: "t".into(),
        }));
        assert_eq!(maybe.owner_key(Some("device-abc")).unwrap(), id.to_string());
    }
}
