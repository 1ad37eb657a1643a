// src/db/models/notification.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, ToSchema)]
pub enum NotificationScope {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "team")]
    Team,
    #[serde(rename = "team_leads")]
    TeamLeads,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationTargetInput {
    pub scope: NotificationScope,
    pub target_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Default, IntoParams, ToSchema)]
pub struct NotificationFilter {
    pub include_dismissed: Option<bool>,
    pub include_expired: Option<bool>,
    #[serde(rename = "type")]
    pub type_field: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A notification as seen by one user, with their dismissal state folded in.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserNotification {
    pub id: i32,
    pub title: String,
    pub body: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub type_field: String,
    pub action_type: Option<String>,
    pub action_data: Option<Value>,
    pub global: bool,
    pub dismissible: bool,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub dismissed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationCountResponse {
    pub total: i64,
    pub unread: i64,
}
