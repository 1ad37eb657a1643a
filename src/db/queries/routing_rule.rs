use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::db::models::requests::RequestType;
use crate::db::models::routing_rule::{NewRoutingRule, RoutingRule, UpdateRoutingRule};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

const RULE_COLUMNS: &str =
    "id, request_type, strategy, team_id, default_assignee, priority, is_active, required_skills, created_at";

fn require_routing_admin(permissions: &UserPermissions) -> Result<(), ApiResponse<()>> {
    if !permissions.can_manage_routing() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can manage routing rules",
            None,
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/routing-rules",
    request_body = NewRoutingRule,
    responses(
        (status = 201, description = "Routing rule created", body = RoutingRule),
        (status = 400, description = "Rule cannot resolve an assignee"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to insert routing rule")
    ),
    tag = "Routing",
    security(("bearerAuth" = []))
)]
pub async fn create_routing_rule(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Json(payload): Json<NewRoutingRule>,
) -> Result<ApiResponse<RoutingRule>, ApiResponse<()>> {
    require_routing_admin(&permissions)?;

    // A rule must name either a team or a default assignee, otherwise it
    // can never resolve.
    if payload.team_id.is_none() && payload.default_assignee.is_none() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "A routing rule needs a team or a default assignee",
            None,
        ));
    }

    let rule = sqlx::query_as::<_, RoutingRule>(&format!(
        r#"
        INSERT INTO routing_rules (request_type, strategy, team_id, default_assignee, priority, required_skills)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(payload.request_type)
    .bind(payload.strategy)
    .bind(payload.team_id)
    .bind(payload.default_assignee)
    .bind(payload.priority.unwrap_or(100))
    .bind(payload.required_skills.unwrap_or_default())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to insert routing rule",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!("Routing rule {} created for {}", rule.id, rule.request_type);

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Routing rule created",
        rule,
    ))
}

#[utoipa::path(
    get,
    path = "/routing-rules",
    params(("request_type" = Option<RequestType>, Query, description = "Filter by request type")),
    responses(
        (status = 200, description = "Routing rules in evaluation order", body = Vec<RoutingRule>),
        (status = 500, description = "Failed to retrieve routing rules")
    ),
    tag = "Routing",
    security(("bearerAuth" = []))
)]
pub async fn list_routing_rules(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Query(filter): Query<RuleFilter>,
) -> Result<ApiResponse<Vec<RoutingRule>>, ApiResponse<()>> {
    require_routing_admin(&permissions)?;

    let rules = sqlx::query_as::<_, RoutingRule>(&format!(
        r#"
        SELECT {RULE_COLUMNS} FROM routing_rules
        WHERE ($1::request_type IS NULL OR request_type = $1)
        ORDER BY request_type, priority ASC, id ASC
        "#
    ))
    .bind(filter.request_type)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve routing rules",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Routing rules", rules))
}

use axum::extract::Query;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct RuleFilter {
    pub request_type: Option<RequestType>,
}

#[utoipa::path(
    get,
    path = "/routing-rules/{rule_id}",
    params(("rule_id" = i32, Path, description = "Routing rule ID")),
    responses(
        (status = 200, description = "Routing rule retrieved", body = RoutingRule),
        (status = 404, description = "Routing rule not found")
    ),
    tag = "Routing",
    security(("bearerAuth" = []))
)]
pub async fn get_routing_rule(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(rule_id): Path<i32>,
) -> Result<ApiResponse<RoutingRule>, ApiResponse<()>> {
    require_routing_admin(&permissions)?;

    let rule = sqlx::query_as::<_, RoutingRule>(&format!(
        "SELECT {RULE_COLUMNS} FROM routing_rules WHERE id = $1"
    ))
    .bind(rule_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Routing rule not found", None)
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Routing rule retrieved",
        rule,
    ))
}

#[utoipa::path(
    patch,
    path = "/routing-rules/{rule_id}",
    params(("rule_id" = i32, Path, description = "Routing rule ID")),
    request_body = UpdateRoutingRule,
    responses(
        (status = 200, description = "Routing rule updated", body = RoutingRule),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Routing rule not found")
    ),
    tag = "Routing",
    security(("bearerAuth" = []))
)]
pub async fn update_routing_rule(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(rule_id): Path<i32>,
    Json(payload): Json<UpdateRoutingRule>,
) -> Result<ApiResponse<RoutingRule>, ApiResponse<()>> {
    require_routing_admin(&permissions)?;

    let rule = sqlx::query_as::<_, RoutingRule>(&format!(
        r#"
        UPDATE routing_rules
        SET strategy = COALESCE($1, strategy),
            team_id = COALESCE($2, team_id),
            default_assignee = COALESCE($3, default_assignee),
            priority = COALESCE($4, priority),
            is_active = COALESCE($5, is_active),
            required_skills = COALESCE($6, required_skills)
        WHERE id = $7
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(payload.strategy)
    .bind(payload.team_id)
    .bind(payload.default_assignee)
    .bind(payload.priority)
    .bind(payload.is_active)
    .bind(payload.required_skills)
    .bind(rule_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update routing rule",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Routing rule not found", None)
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Routing rule updated",
        rule,
    ))
}

#[utoipa::path(
    delete,
    path = "/routing-rules/{rule_id}",
    params(("rule_id" = i32, Path, description = "Routing rule ID")),
    responses(
        (status = 200, description = "Routing rule deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Routing rule not found")
    ),
    tag = "Routing",
    security(("bearerAuth" = []))
)]
pub async fn delete_routing_rule(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(rule_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_routing_admin(&permissions)?;

    let result = sqlx::query("DELETE FROM routing_rules WHERE id = $1")
        .bind(rule_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete routing rule",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Routing rule not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Routing rule deleted",
        (),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_routing_rule,
        list_routing_rules,
        get_routing_rule,
        update_routing_rule,
        delete_routing_rule
    ),
    components(schemas(RoutingRule, NewRoutingRule, UpdateRoutingRule, crate::db::models::routing_rule::RoutingStrategy)),
    tags(
        (name = "Routing", description = "Admin endpoints for routing rules")
    )
)]
pub struct RoutingRuleDoc;
