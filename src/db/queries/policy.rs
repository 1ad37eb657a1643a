use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::requests::RequestType;
use crate::db::models::routing_rule::{ApprovalPolicy, UpsertApprovalPolicy};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

#[utoipa::path(
    get,
    path = "/approval-policies/{request_type}",
    params(("request_type" = RequestType, Path, description = "Request type")),
    responses(
        (status = 200, description = "Effective approval policy", body = ApprovalPolicy),
        (status = 500, description = "Failed to retrieve policy")
    ),
    tag = "Policies",
    security(("bearerAuth" = []))
)]
pub async fn get_approval_policy(
    State(pool): State<PgPool>,
    Path(request_type): Path<RequestType>,
) -> Result<ApiResponse<ApprovalPolicy>, ApiResponse<()>> {
    let stored = sqlx::query_as::<_, ApprovalPolicy>(
        r#"
        SELECT request_type, escalation_threshold, updated_by, updated_at
        FROM approval_policies
        WHERE request_type = $1
        "#,
    )
    .bind(request_type)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve approval policy",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Without an override row the service default applies.
    let policy = stored.unwrap_or(ApprovalPolicy {
        request_type,
        escalation_threshold: Config::get().escalation_threshold.clone(),
        updated_by: None,
        updated_at: None,
    });

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Approval policy",
        policy,
    ))
}

#[utoipa::path(
    put,
    path = "/approval-policies/{request_type}",
    params(("request_type" = RequestType, Path, description = "Request type")),
    request_body = UpsertApprovalPolicy,
    responses(
        (status = 200, description = "Approval policy stored", body = ApprovalPolicy),
        (status = 400, description = "Threshold must be positive"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to store policy")
    ),
    tag = "Policies",
    security(("bearerAuth" = []))
)]
pub async fn upsert_approval_policy(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Path(request_type): Path<RequestType>,
    Json(payload): Json<UpsertApprovalPolicy>,
) -> Result<ApiResponse<ApprovalPolicy>, ApiResponse<()>> {
    if !permissions.can_manage_routing() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can change approval policies",
            None,
        ));
    }

    if payload.escalation_threshold < bigdecimal::BigDecimal::from(0) {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Threshold must not be negative",
            None,
        ));
    }

    let user_id = claims.user_id()?;

    let policy = sqlx::query_as::<_, ApprovalPolicy>(
        r#"
        INSERT INTO approval_policies (request_type, escalation_threshold, updated_by, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (request_type)
        DO UPDATE SET escalation_threshold = EXCLUDED.escalation_threshold,
                      updated_by = EXCLUDED.updated_by,
                      updated_at = NOW()
        RETURNING request_type, escalation_threshold, updated_by, updated_at
        "#,
    )
    .bind(request_type)
    .bind(&payload.escalation_threshold)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store approval policy",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!(
        "Approval policy for {} set to {} by user {}",
        request_type, policy.escalation_threshold, user_id
    );

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Approval policy stored",
        policy,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_approval_policy, upsert_approval_policy),
    components(schemas(ApprovalPolicy, UpsertApprovalPolicy)),
    tags(
        (name = "Policies", description = "Escalation threshold configuration")
    )
)]
pub struct PolicyDoc;
