// src/db/models/requests.rs
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Hardware,
    Toner,
    Marketing,
    Department,
    UserAccount,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Hardware => "hardware",
            RequestType::Toner => "toner",
            RequestType::Marketing => "marketing",
            RequestType::Department => "department",
            RequestType::UserAccount => "user_account",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed status set for the request lifecycle. Toner orders use the
/// `open`/`in_progress`/`ordered` variants; every other type starts at
/// `submitted`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    Open,
    InProgress,
    Ordered,
    PendingManagerApproval,
    PendingAdminApproval,
    Approved,
    Declined,
    Cancelled,
    Completed,
}

impl RequestStatus {
    /// Terminal statuses reject any further approve/decline action.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Approved
                | RequestStatus::Declined
                | RequestStatus::Cancelled
                | RequestStatus::Completed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::Open => "open",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Ordered => "ordered",
            RequestStatus::PendingManagerApproval => "pending_manager_approval",
            RequestStatus::PendingAdminApproval => "pending_admin_approval",
            RequestStatus::Approved => "approved",
            RequestStatus::Declined => "declined",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: i32,
    /// Human-readable sequence number, e.g. `REQ-000042`.
    pub request_number: Option<String>,
    pub request_type: RequestType,
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    #[schema(value_type = Option<f64>)]
    pub amount: Option<BigDecimal>,
    pub brand_id: Option<i32>,
    pub location_id: Option<i32>,
    pub submitted_by: i32,
    pub assigned_team_id: Option<i32>,
    pub assigned_to: Option<i32>,
    pub status: RequestStatus,
    pub manager_approved_by: Option<i32>,
    pub manager_approved_at: Option<NaiveDateTime>,
    pub manager_notes: Option<String>,
    pub admin_approved_by: Option<i32>,
    pub admin_approved_at: Option<NaiveDateTime>,
    pub admin_notes: Option<String>,
    pub declined_by: Option<i32>,
    pub declined_at: Option<NaiveDateTime>,
    pub decline_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewRequest {
    pub request_type: RequestType,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    #[schema(value_type = Option<f64>)]
    pub amount: Option<BigDecimal>,
    pub brand_id: Option<i32>,
    pub location_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeclineRequest {
    pub reason: String,
}

/// Target status for the toner fulfilment track.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FulfilmentUpdate {
    pub status: RequestStatus,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub submitted_by: Option<i32>,
    pub assigned_to: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
