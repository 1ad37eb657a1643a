use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub brand_id: Option<i32>,
    pub location_id: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewTeam {
    pub name: String,
    pub brand_id: Option<i32>,
    pub location_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTeam {
    pub name: Option<String>,
    pub brand_id: Option<i32>,
    pub location_id: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTeamMember {
    pub user_id: i32,
    /// `lead` or `member`.
    pub role_in_team: Option<String>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTeamMember {
    pub role_in_team: Option<String>,
    pub skills: Option<Vec<String>>,
    pub on_leave: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TeamMember {
    pub user_id: i32,
    pub username: String,
    pub team_id: i32,
    pub role_in_team: String,
    pub skills: Vec<String>,
    pub on_leave: bool,
    pub last_assigned_at: Option<NaiveDateTime>,
}
