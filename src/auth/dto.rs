use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::session::{Session, User};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub preferences: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        PublicUser {
            id: u.id,
            email: u.email,
            name: u.display_name,
            role: u.role,
            country: u.country,
            preferences: u.preferences,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub reset_token: Uuid,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_active: OffsetDateTime,
}

impl From<Session> for DeviceInfo {
    fn from(s: Session) -> Self {
        DeviceInfo {
            device_id: s.device_id,
            device_name: s.device_name,
            created_at: s.created_at,
            last_active: s.last_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceInfo>,
    pub current_count: usize,
    /// None means the role has no device cap.
    pub max_devices: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceLogoutRequest {
    pub device_id: Option<String>,
}
