use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::db::models::outbox::OutboxEntry;
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::mailer::Mailer;
use crate::utils::notification;

const OUTBOX_COLUMNS: &str = r#"
    id, request_id, event, recipient_id, subject, body, status, attempts,
    last_error, created_at, sent_at
"#;

#[utoipa::path(
    get,
    path = "/outbox/failed",
    responses(
        (status = 200, description = "Failed outbox entries awaiting manual resend", body = Vec<OutboxEntry>),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Failed to retrieve outbox entries")
    ),
    tag = "Outbox",
    security(("bearerAuth" = []))
)]
pub async fn list_failed_entries(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<OutboxEntry>>, ApiResponse<()>> {
    if !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can inspect the outbox",
            None,
        ));
    }

    let entries = sqlx::query_as::<_, OutboxEntry>(&format!(
        r#"
        SELECT {OUTBOX_COLUMNS} FROM email_outbox
        WHERE status = 'failed'
        ORDER BY created_at DESC
        "#
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve outbox entries",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Failed outbox entries",
        entries,
    ))
}

#[utoipa::path(
    post,
    path = "/outbox/{outbox_id}/resend",
    params(("outbox_id" = i32, Path, description = "Outbox entry ID")),
    responses(
        (status = 202, description = "Resend queued", body = OutboxEntry),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Outbox entry not found")
    ),
    tag = "Outbox",
    security(("bearerAuth" = []))
)]
pub async fn resend_entry(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Extension(mailer): Extension<Mailer>,
    Path(outbox_id): Path<i32>,
) -> Result<ApiResponse<OutboxEntry>, ApiResponse<()>> {
    if !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can resend outbox entries",
            None,
        ));
    }

    let entry = sqlx::query_as::<_, OutboxEntry>(&format!(
        r#"
        UPDATE email_outbox SET status = 'pending', last_error = NULL
        WHERE id = $1
        RETURNING {OUTBOX_COLUMNS}
        "#
    ))
    .bind(outbox_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to reset outbox entry",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Outbox entry not found", None)
    })?;

    info!("Outbox entry {} queued for resend", outbox_id);

    {
        let pool = pool.clone();
        let mailer = mailer.clone();
        tokio::spawn(async move {
            notification::dispatch_outbox_entry(&pool, &mailer, outbox_id).await;
        });
    }

    Ok(ApiResponse::success(
        StatusCode::ACCEPTED,
        "Resend queued",
        entry,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(list_failed_entries, resend_entry),
    components(schemas(OutboxEntry, crate::db::models::outbox::OutboxStatus)),
    tags(
        (name = "Outbox", description = "Email outbox inspection and resend")
    )
)]
pub struct OutboxDoc;
