use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    /// Global role: `submitter`, `manager` or `admin`.
    pub role: String,
    pub account_locked: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<String>, // Raw password, will be hashed
    pub email: Option<String>,
    pub role: Option<String>,
    pub account_locked: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.account_locked.is_none()
    }
}

/// Lightweight projection used by routing fallback and notification fan-out.
#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
}
