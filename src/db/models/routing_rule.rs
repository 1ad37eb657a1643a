// src/db/models/routing_rule.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::requests::RequestType;

/// Assignee-selection strategy carried by a routing rule.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "routing_strategy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    DefaultAssignee,
    RoundRobin,
    LoadBalance,
    TeamLeadFirst,
    SkillBased,
    FallbackToDepartment,
}

impl RoutingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingStrategy::DefaultAssignee => "default_assignee",
            RoutingStrategy::RoundRobin => "round_robin",
            RoutingStrategy::LoadBalance => "load_balance",
            RoutingStrategy::TeamLeadFirst => "team_lead_first",
            RoutingStrategy::SkillBased => "skill_based",
            RoutingStrategy::FallbackToDepartment => "fallback_to_department",
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RoutingRule {
    pub id: i32,
    pub request_type: RequestType,
    pub strategy: RoutingStrategy,
    pub team_id: Option<i32>,
    pub default_assignee: Option<i32>,
    /// Lower values are evaluated first.
    pub priority: i32,
    pub is_active: bool,
    pub required_skills: Vec<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewRoutingRule {
    pub request_type: RequestType,
    pub strategy: RoutingStrategy,
    pub team_id: Option<i32>,
    pub default_assignee: Option<i32>,
    pub priority: Option<i32>,
    pub required_skills: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct UpdateRoutingRule {
    pub strategy: Option<RoutingStrategy>,
    pub team_id: Option<i32>,
    pub default_assignee: Option<i32>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub required_skills: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ApprovalPolicy {
    pub request_type: RequestType,
    #[schema(value_type = f64)]
    pub escalation_threshold: bigdecimal::BigDecimal,
    pub updated_by: Option<i32>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertApprovalPolicy {
    #[schema(value_type = f64)]
    pub escalation_threshold: bigdecimal::BigDecimal,
}
