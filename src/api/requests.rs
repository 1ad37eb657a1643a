use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::requests::*;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/pending", get(get_pending_requests))
        .route("/requests/{request_id}", get(get_request_handler))
        .route("/requests/{request_id}/approve", post(approve_request))
        .route("/requests/{request_id}/decline", post(decline_request))
        .route("/requests/{request_id}/cancel", post(cancel_request))
        .route("/requests/{request_id}/complete", post(complete_request))
        .route("/requests/{request_id}/fulfilment", post(advance_fulfilment))
}
