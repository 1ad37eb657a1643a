use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::notification::{
    dismiss_all_notifications, dismiss_notification, get_notification_count, get_notifications,
};
use crate::db::queries::outbox::{list_failed_entries, resend_entry};

pub fn notification_routes() -> Router<PgPool> {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/count", get(get_notification_count))
        .route(
            "/notifications/{notification_id}/dismiss",
            post(dismiss_notification),
        )
        .route("/notifications/dismiss-all", post(dismiss_all_notifications))
}

pub fn outbox_routes() -> Router<PgPool> {
    Router::new()
        .route("/outbox/failed", get(list_failed_entries))
        .route("/outbox/{outbox_id}/resend", post(resend_entry))
}
