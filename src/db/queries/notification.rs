use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde_json::json;
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::notification::{
    NotificationCountResponse, NotificationFilter, UserNotification,
};
use crate::utils::api_response::ApiResponse;

// A user sees a notification when it is global, targets them directly,
// targets a team they belong to, or targets the leads of a team they lead.
const VISIBILITY_CLAUSE: &str = r#"
    (
        n.global = TRUE
        OR EXISTS (
            SELECT 1 FROM notification_targets t
            WHERE t.notification_id = n.id AND t.scope = 'user' AND t.target_id = $1
        )
        OR EXISTS (
            SELECT 1 FROM notification_targets t
            JOIN team_members tm ON tm.team_id = t.target_id AND tm.user_id = $1
            WHERE t.notification_id = n.id AND t.scope = 'team'
        )
        OR EXISTS (
            SELECT 1 FROM notification_targets t
            JOIN team_members tm ON tm.team_id = t.target_id
                AND tm.user_id = $1 AND tm.role_in_team = 'lead'
            WHERE t.notification_id = n.id AND t.scope = 'team_leads'
        )
    )
"#;

#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Notifications for the current user", body = Vec<UserNotification>),
        (status = 500, description = "Failed to retrieve notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> Result<ApiResponse<Vec<UserNotification>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let notifications = sqlx::query_as::<_, UserNotification>(&format!(
        r#"
        SELECT n.id, n.title, n.body, n.type, n.action_type, n.action_data,
               n.global, n.dismissible, n.created_at, n.expires_at,
               EXISTS (
                   SELECT 1 FROM notification_dismissals d
                   WHERE d.notification_id = n.id AND d.user_id = $1
               ) AS dismissed
        FROM notifications n
        WHERE {VISIBILITY_CLAUSE}
          AND ($2 OR NOT EXISTS (
              SELECT 1 FROM notification_dismissals d
              WHERE d.notification_id = n.id AND d.user_id = $1
          ))
          AND ($3 OR n.expires_at IS NULL OR n.expires_at > NOW())
          AND ($4::text IS NULL OR n.type = $4)
        ORDER BY n.created_at DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(user_id)
    .bind(filter.include_dismissed.unwrap_or(false))
    .bind(filter.include_expired.unwrap_or(false))
    .bind(filter.type_field)
    .bind(filter.limit.unwrap_or(50))
    .bind(filter.offset.unwrap_or(0))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve notifications",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications",
        notifications,
    ))
}

#[utoipa::path(
    get,
    path = "/notifications/count",
    responses(
        (status = 200, description = "Notification counts for the current user", body = NotificationCountResponse),
        (status = 500, description = "Failed to count notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notification_count(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<NotificationCountResponse>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let (total, unread): (i64, i64) = sqlx::query_as(&format!(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE NOT EXISTS (
                   SELECT 1 FROM notification_dismissals d
                   WHERE d.notification_id = n.id AND d.user_id = $1
               ))
        FROM notifications n
        WHERE {VISIBILITY_CLAUSE}
          AND (n.expires_at IS NULL OR n.expires_at > NOW())
        "#
    ))
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to count notifications",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification counts",
        NotificationCountResponse { total, unread },
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/{notification_id}/dismiss",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification dismissed"),
        (status = 400, description = "Notification is not dismissible"),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn dismiss_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let dismissible: Option<bool> =
        sqlx::query_scalar("SELECT dismissible FROM notifications WHERE id = $1")
            .bind(notification_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    match dismissible {
        None => {
            return Err(ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                "Notification not found",
                None,
            ))
        }
        Some(false) => {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Notification is not dismissible",
                None,
            ))
        }
        Some(true) => {}
    }

    sqlx::query(
        r#"
        INSERT INTO notification_dismissals (notification_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (notification_id, user_id) DO NOTHING
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to dismiss notification",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification dismissed",
        (),
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/dismiss-all",
    responses(
        (status = 200, description = "All dismissible notifications dismissed"),
        (status = 500, description = "Failed to dismiss notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn dismiss_all_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    sqlx::query(&format!(
        r#"
        INSERT INTO notification_dismissals (notification_id, user_id)
        SELECT n.id, $1 FROM notifications n
        WHERE n.dismissible = TRUE
          AND {VISIBILITY_CLAUSE}
        ON CONFLICT (notification_id, user_id) DO NOTHING
        "#
    ))
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to dismiss notifications",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications dismissed",
        (),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        get_notifications,
        get_notification_count,
        dismiss_notification,
        dismiss_all_notifications
    ),
    components(schemas(UserNotification, NotificationCountResponse)),
    tags(
        (name = "Notifications", description = "In-app notification center")
    )
)]
pub struct NotificationDoc;
