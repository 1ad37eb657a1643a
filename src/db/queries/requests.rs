use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::outbox::RequestEvent;
use crate::db::models::requests::{
    ApproveRequest, DeclineRequest, FulfilmentUpdate, NewRequest, Request, RequestFilter,
    RequestStatus, RequestType,
};
use crate::db::models::routing_rule::RoutingStrategy;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::mailer::Mailer;
use crate::utils::notification::{self, approval_email_body, outcome_email_body};
use crate::workflow::lifecycle::{self, ApprovalTier, TransitionError};
use crate::workflow::policy;
use crate::workflow::routing::{self, MemberSnapshot, RoutingOutcome, RuleSnapshot};

const REQUEST_COLUMNS: &str = r#"
    id, request_number, request_type, title, description, priority, amount,
    brand_id, location_id, submitted_by, assigned_team_id, assigned_to, status,
    manager_approved_by, manager_approved_at, manager_notes,
    admin_approved_by, admin_approved_at, admin_notes,
    declined_by, declined_at, decline_reason,
    cancelled_at, completed_at, created_at, updated_at
"#;

pub async fn get_request_by_id(
    pool: &PgPool,
    request_id: i32,
) -> Result<Request, ApiResponse<()>> {
    sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Request not found", None))
}

/// Effective escalation threshold for a request type: per-type policy row
/// if configured, otherwise the service default.
pub async fn escalation_threshold_for(
    pool: &PgPool,
    request_type: RequestType,
) -> Result<BigDecimal, sqlx::Error> {
    let override_value: Option<BigDecimal> = sqlx::query_scalar(
        "SELECT escalation_threshold FROM approval_policies WHERE request_type = $1",
    )
    .bind(request_type)
    .fetch_optional(pool)
    .await?;

    Ok(policy::effective_threshold(
        override_value,
        &Config::get().escalation_threshold,
    ))
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created and routed", body = Request),
        (status = 400, description = "Invalid request payload"),
        (status = 500, description = "Failed to create request")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(mailer): Extension<Mailer>,
    Json(payload): Json<NewRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    if payload.title.trim().is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Title must not be empty",
            None,
        ));
    }

    let initial_status = lifecycle::initial_status(payload.request_type);

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut request = sqlx::query_as::<_, Request>(&format!(
        r#"
        INSERT INTO requests (request_type, title, description, priority, amount,
                              brand_id, location_id, submitted_by, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(payload.request_type)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.priority.unwrap_or(3))
    .bind(&payload.amount)
    .bind(payload.brand_id)
    .bind(payload.location_id)
    .bind(user_id)
    .bind(initial_status)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to insert request",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Sequence number is derived from the row id so it is unique without a
    // second sequence object.
    let request_number = format!(
        "{}-{:06}",
        Config::get().request_number_prefix,
        request.id
    );
    sqlx::query("UPDATE requests SET request_number = $1 WHERE id = $2")
        .bind(&request_number)
        .bind(request.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to assign request number",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
    request.request_number = Some(request_number);

    // Resolve who acts first.
    let outcome = route_request(&mut tx, &request).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to evaluate routing rules",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut outbox_ids: Vec<i32> = Vec::new();
    match &outcome {
        RoutingOutcome::Assigned(assignment) => {
            sqlx::query(
                "UPDATE requests SET assigned_team_id = $1, assigned_to = $2 WHERE id = $3",
            )
            .bind(assignment.team_id)
            .bind(assignment.user_id)
            .bind(request.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to persist assignment",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;
            request.assigned_team_id = assignment.team_id;
            request.assigned_to = Some(assignment.user_id);

            if let Some(team_id) = assignment.team_id {
                sqlx::query(
                    "UPDATE team_members SET last_assigned_at = NOW() WHERE user_id = $1 AND team_id = $2",
                )
                .bind(assignment.user_id)
                .bind(team_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    ApiResponse::<()>::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to update assignment history",
                        Some(json!({ "error": e.to_string() })),
                    )
                })?;
            }

            let assignee_email: Option<String> =
                sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                    .bind(assignment.user_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| {
                        ApiResponse::<()>::error(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Failed to load assignee",
                            Some(json!({ "error": e.to_string() })),
                        )
                    })?
                    .flatten();

            if let Some(email) = assignee_email {
                let body = approval_email_body(&request, &email);
                let outbox_id = notification::enqueue_request_email(
                    &mut tx,
                    request.id,
                    RequestEvent::Submitted,
                    assignment.user_id,
                    &format!("Approval needed: {}", request.title),
                    &body,
                )
                .await
                .map_err(|e| {
                    ApiResponse::<()>::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to queue notification",
                        Some(json!({ "error": e.to_string() })),
                    )
                })?;
                outbox_ids.push(outbox_id);
            } else {
                warn!(
                    "Assignee {} has no email; request {} will only get an in-app notification",
                    assignment.user_id, request.id
                );
            }

            info!(
                "Request {} routed to user {} via rule {} ({})",
                request.id, assignment.user_id, assignment.rule_id, assignment.strategy
            );
        }
        RoutingOutcome::Escalated { approver_ids } => {
            info!(
                "Request {} did not match a routing rule; escalating to {} approver(s)",
                request.id,
                approver_ids.len()
            );
        }
        RoutingOutcome::Unroutable => {
            // Kept visible in the log: this should only happen on an empty
            // directory, e.g. a freshly seeded environment.
            error!(
                "Request {} is unroutable: no rules matched and no manager/admin exists in scope",
                request.id
            );
        }
    }

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Post-commit side effects: email delivery and in-app notifications are
    // advisory and never fail the create.
    for outbox_id in outbox_ids {
        let pool = pool.clone();
        let mailer = mailer.clone();
        tokio::spawn(async move {
            notification::dispatch_outbox_entry(&pool, &mailer, outbox_id).await;
        });
    }
    match outcome {
        RoutingOutcome::Assigned(assignment) => {
            if let Err(e) = notification::notify_assignment(&pool, &request, assignment.user_id).await
            {
                error!("Failed to create assignment notification: {e}");
            }
        }
        RoutingOutcome::Escalated { approver_ids } => {
            if let Err(e) =
                notification::notify_routing_escalation(&pool, &request, approver_ids).await
            {
                error!("Failed to create escalation notification: {e}");
            }
        }
        RoutingOutcome::Unroutable => {}
    }

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Request created",
        request,
    ))
}

/// Fetch the routing inputs and evaluate the rule set for a new request.
async fn route_request(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request: &Request,
) -> Result<RoutingOutcome, sqlx::Error> {
    let rule_rows: Vec<(i32, RoutingStrategy, Option<i32>, Option<i32>, i32, Vec<String>)> =
        sqlx::query_as(
            r#"
            SELECT id, strategy, team_id, default_assignee, priority, required_skills
            FROM routing_rules
            WHERE request_type = $1 AND is_active = TRUE
            ORDER BY priority ASC, id ASC
            "#,
        )
        .bind(request.request_type)
        .fetch_all(&mut **tx)
        .await?;

    let rules: Vec<RuleSnapshot> = rule_rows
        .into_iter()
        .map(
            |(id, strategy, team_id, default_assignee, priority, required_skills)| RuleSnapshot {
                id,
                strategy,
                team_id,
                default_assignee,
                priority,
                required_skills,
            },
        )
        .collect();

    let team_ids: Vec<i32> = rules.iter().filter_map(|rule| rule.team_id).collect();
    let members: Vec<MemberSnapshot> = if team_ids.is_empty() {
        Vec::new()
    } else {
        let member_rows: Vec<(i32, i32, String, Vec<String>, bool, i64, Option<chrono::NaiveDateTime>)> =
            sqlx::query_as(
                r#"
                SELECT tm.user_id, tm.team_id, tm.role_in_team, tm.skills, tm.on_leave,
                       (SELECT COUNT(*) FROM requests r
                        WHERE r.assigned_to = tm.user_id
                          AND r.status NOT IN ('approved', 'declined', 'cancelled', 'completed')) AS open_assignments,
                       tm.last_assigned_at
                FROM team_members tm
                JOIN users u ON u.id = tm.user_id
                WHERE tm.team_id = ANY($1) AND u.account_locked = FALSE
                "#,
            )
            .bind(&team_ids)
            .fetch_all(&mut **tx)
            .await?;

        member_rows
            .into_iter()
            .map(
                |(user_id, team_id, role_in_team, skills, on_leave, open_assignments, last_assigned_at)| {
                    MemberSnapshot {
                        user_id,
                        team_id,
                        role_in_team,
                        skills,
                        on_leave,
                        open_assignments,
                        last_assigned_at,
                    }
                },
            )
            .collect()
    };

    let scope_approvers: Vec<(i32,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT u.id
        FROM users u
        LEFT JOIN team_members tm ON tm.user_id = u.id
        LEFT JOIN teams t ON t.id = tm.team_id
        WHERE u.role IN ('manager', 'admin')
          AND u.account_locked = FALSE
          AND ($1::int IS NULL OR t.brand_id = $1 OR t.brand_id IS NULL)
          AND ($2::int IS NULL OR t.location_id = $2 OR t.location_id IS NULL)
        "#,
    )
    .bind(request.brand_id)
    .bind(request.location_id)
    .fetch_all(&mut **tx)
    .await?;
    let scope_approvers: Vec<i32> = scope_approvers.into_iter().map(|row| row.0).collect();

    Ok(routing::resolve_assignee(&rules, &members, &scope_approvers))
}

#[utoipa::path(
    get,
    path = "/requests",
    params(RequestFilter),
    responses(
        (status = 200, description = "List of requests", body = Vec<Request>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(pool): State<PgPool>,
    Query(filter): Query<RequestFilter>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let requests = sqlx::query_as::<_, Request>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS} FROM requests
        WHERE ($1::request_status IS NULL OR status = $1)
          AND ($2::request_type IS NULL OR request_type = $2)
          AND ($3::int IS NULL OR submitted_by = $3)
          AND ($4::int IS NULL OR assigned_to = $4)
        ORDER BY created_at DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(filter.status)
    .bind(filter.request_type)
    .bind(filter.submitted_by)
    .bind(filter.assigned_to)
    .bind(filter.limit.unwrap_or(50))
    .bind(filter.offset.unwrap_or(0))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Requests", requests))
}

#[utoipa::path(
    get,
    path = "/requests/pending",
    responses(
        (status = 200, description = "Requests awaiting an approval decision", body = Vec<Request>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_requests(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let requests = sqlx::query_as::<_, Request>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS} FROM requests
        WHERE status IN ('submitted', 'open', 'pending_manager_approval', 'pending_admin_approval')
        ORDER BY created_at DESC
        "#
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Pending requests",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request retrieved", body = Request),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request_handler(
    State(pool): State<PgPool>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let request = get_request_by_id(&pool, request_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved",
        request,
    ))
}

/// Apply a computed transition with a conditional update. Zero affected
/// rows means another writer got there first (or the caller saw a stale
/// status); both cases surface as a state conflict.
pub async fn apply_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request: &Request,
    next: RequestStatus,
    tier: Option<ApprovalTier>,
    actor_id: i32,
    notes: Option<&str>,
    decline_reason: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = match (next, tier) {
        (RequestStatus::PendingAdminApproval, Some(ApprovalTier::Manager))
        | (RequestStatus::Approved, Some(ApprovalTier::Manager)) => {
            sqlx::query(
                r#"
                UPDATE requests
                SET status = $1, manager_approved_by = $2, manager_approved_at = NOW(),
                    manager_notes = $3, updated_at = NOW()
                WHERE id = $4 AND status = $5
                "#,
            )
            .bind(next)
            .bind(actor_id)
            .bind(notes)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
        (RequestStatus::Approved, Some(ApprovalTier::Admin)) => {
            sqlx::query(
                r#"
                UPDATE requests
                SET status = $1, admin_approved_by = $2, admin_approved_at = NOW(),
                    admin_notes = $3, updated_at = NOW()
                WHERE id = $4 AND status = $5
                "#,
            )
            .bind(next)
            .bind(actor_id)
            .bind(notes)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
        (RequestStatus::Declined, _) => {
            sqlx::query(
                r#"
                UPDATE requests
                SET status = $1, declined_by = $2, declined_at = NOW(),
                    decline_reason = $3, updated_at = NOW()
                WHERE id = $4 AND status = $5
                "#,
            )
            .bind(next)
            .bind(actor_id)
            .bind(decline_reason)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
        (RequestStatus::Cancelled, _) => {
            sqlx::query(
                r#"
                UPDATE requests
                SET status = $1, cancelled_at = NOW(), updated_at = NOW()
                WHERE id = $2 AND status = $3
                "#,
            )
            .bind(next)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
        (RequestStatus::Completed, _) => {
            sqlx::query(
                r#"
                UPDATE requests
                SET status = $1, completed_at = NOW(), updated_at = NOW()
                WHERE id = $2 AND status = $3
                "#,
            )
            .bind(next)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
        (next, _) => {
            sqlx::query(
                "UPDATE requests SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
            )
            .bind(next)
            .bind(request.id)
            .bind(request.status)
            .execute(&mut **tx)
            .await?
        }
    };

    Ok(result.rows_affected() == 1)
}

fn transition_error_response(err: TransitionError) -> ApiResponse<()> {
    match err {
        TransitionError::AlreadyProcessed(status) => ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            format!("Request has already been processed (status `{status}`)"),
            None,
        ),
        TransitionError::InvalidTransition { from, action } => ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            format!("Cannot {action} a request in status `{from}`"),
            None,
        ),
        TransitionError::EmptyDeclineReason => ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "A decline reason is required",
            None,
        ),
    }
}

/// Shared by the API and email-approval paths: run the transition inside a
/// transaction, queue the submitter email, commit, then dispatch.
pub async fn finalize_transition(
    pool: &PgPool,
    mailer: &Mailer,
    request: &Request,
    next: RequestStatus,
    tier: Option<ApprovalTier>,
    actor_id: i32,
    notes: Option<&str>,
    decline_reason: Option<&str>,
    event: RequestEvent,
    event_notes: Option<&str>,
) -> Result<Request, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let applied = apply_transition(&mut tx, request, next, tier, actor_id, notes, decline_reason)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update request",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if !applied {
        // Raced with another writer between our read and the update.
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Request has already been processed",
            None,
        ));
    }

    // Exactly one notification event per successful transition, addressed
    // to the original submitter.
    let email_body = outcome_email_body(request, event, event_notes);
    let subject = format!(
        "Request {} {}",
        request.request_number.as_deref().unwrap_or("-"),
        event.as_str()
    );
    let outbox_id = notification::enqueue_request_email(
        &mut tx,
        request.id,
        event,
        request.submitted_by,
        &subject,
        &email_body,
    )
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to queue notification",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let updated = get_request_by_id(pool, request.id).await?;

    {
        let pool = pool.clone();
        let mailer = mailer.clone();
        tokio::spawn(async move {
            notification::dispatch_outbox_entry(&pool, &mailer, outbox_id).await;
        });
    }
    if let Err(e) = notification::notify_request_outcome(pool, &updated, event, event_notes).await {
        error!("Failed to create outcome notification: {e}");
    }

    Ok(updated)
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/approve",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approval recorded", body = Request),
        (status = 403, description = "Actor may not approve this tier"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn approve_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Extension(mailer): Extension<Mailer>,
    Path(request_id): Path<i32>,
    Json(payload): Json<ApproveRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let request = get_request_by_id(&pool, request_id).await?;

    // Tier gate: the admin tier is admin-only, the first tier needs
    // manager or admin.
    if request.status == RequestStatus::PendingAdminApproval {
        if !permissions.can_approve_admin_tier() {
            return Err(ApiResponse::<()>::error(
                StatusCode::FORBIDDEN,
                "Only an admin can approve an escalated request",
                None,
            ));
        }
    } else if !permissions.can_approve_manager_tier() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only a manager or admin can approve requests",
            None,
        ));
    }

    let threshold = escalation_threshold_for(&pool, request.request_type)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load approval policy",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let transition = lifecycle::approve(request.status, request.amount.as_ref(), &threshold)
        .map_err(transition_error_response)?;

    let event_notes = match transition.next {
        RequestStatus::PendingAdminApproval => Some("escalated for admin approval"),
        _ => payload.notes.as_deref(),
    };

    let updated = finalize_transition(
        &pool,
        &mailer,
        &request,
        transition.next,
        transition.tier,
        actor_id,
        payload.notes.as_deref(),
        None,
        RequestEvent::Approved,
        event_notes,
    )
    .await?;

    info!(
        "Request {} approved by user {} -> {}",
        request_id, actor_id, updated.status
    );

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Approval recorded",
        updated,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/decline",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = DeclineRequest,
    responses(
        (status = 200, description = "Decline recorded", body = Request),
        (status = 400, description = "Missing decline reason"),
        (status = 403, description = "Actor may not decline"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn decline_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Extension(mailer): Extension<Mailer>,
    Path(request_id): Path<i32>,
    Json(payload): Json<DeclineRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;

    if !permissions.can_approve_manager_tier() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only a manager or admin can decline requests",
            None,
        ));
    }

    let request = get_request_by_id(&pool, request_id).await?;

    let transition =
        lifecycle::decline(request.status, &payload.reason).map_err(transition_error_response)?;

    let reason = payload.reason.trim().to_string();
    let updated = finalize_transition(
        &pool,
        &mailer,
        &request,
        transition.next,
        transition.tier,
        actor_id,
        None,
        Some(reason.as_str()),
        RequestEvent::Declined,
        Some(reason.as_str()),
    )
    .await?;

    info!("Request {} declined by user {}", request_id, actor_id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Decline recorded",
        updated,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/cancel",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request cancelled", body = Request),
        (status = 403, description = "Only the submitter or an admin can cancel"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn cancel_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let request = get_request_by_id(&pool, request_id).await?;

    if request.submitted_by != actor_id && !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only the submitter or an admin can cancel a request",
            None,
        ));
    }

    let transition = lifecycle::cancel(request.status).map_err(transition_error_response)?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    let applied = apply_transition(&mut tx, &request, transition.next, None, actor_id, None, None)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update request",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
    if !applied {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Request has already been processed",
            None,
        ));
    }
    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let updated = get_request_by_id(&pool, request_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request cancelled",
        updated,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/complete",
    params(("request_id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request completed", body = Request),
        (status = 403, description = "Only the assignee or an admin can complete"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request not in a completable status")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn complete_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let request = get_request_by_id(&pool, request_id).await?;

    if request.assigned_to != Some(actor_id) && !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only the assignee or an admin can complete a request",
            None,
        ));
    }

    let transition = lifecycle::complete(request.status).map_err(transition_error_response)?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    let applied = apply_transition(&mut tx, &request, transition.next, None, actor_id, None, None)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update request",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
    if !applied {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Request status changed; refresh and retry",
            None,
        ));
    }
    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let updated = get_request_by_id(&pool, request_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request completed",
        updated,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/fulfilment",
    params(("request_id" = i32, Path, description = "Request ID")),
    request_body = FulfilmentUpdate,
    responses(
        (status = 200, description = "Fulfilment status advanced", body = Request),
        (status = 403, description = "Only the assignee or an admin can advance fulfilment"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Invalid fulfilment step")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn advance_fulfilment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Path(request_id): Path<i32>,
    Json(payload): Json<FulfilmentUpdate>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let request = get_request_by_id(&pool, request_id).await?;

    if request.assigned_to != Some(actor_id) && !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only the assignee or an admin can advance fulfilment",
            None,
        ));
    }

    let transition = lifecycle::advance_fulfilment(request.status, payload.status)
        .map_err(transition_error_response)?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    let applied = apply_transition(&mut tx, &request, transition.next, None, actor_id, None, None)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update request",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
    if !applied {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Request status changed; refresh and retry",
            None,
        ));
    }
    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let updated = get_request_by_id(&pool, request_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Fulfilment status advanced",
        updated,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        list_requests,
        get_pending_requests,
        get_request_handler,
        approve_request,
        decline_request,
        cancel_request,
        complete_request,
        advance_fulfilment
    ),
    components(schemas(Request, NewRequest, ApproveRequest, DeclineRequest, FulfilmentUpdate, RequestStatus, RequestType)),
    tags(
        (name = "Requests", description = "Endpoints for submitting and deciding requests")
    )
)]
pub struct RequestDoc;
