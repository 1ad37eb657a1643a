use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::user::{get_user, get_users, update_user};

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/{user_id}", get(get_user).patch(update_user))
}
