use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::policy::{get_approval_policy, upsert_approval_policy};
use crate::db::queries::routing_rule::{
    create_routing_rule, delete_routing_rule, get_routing_rule, list_routing_rules,
    update_routing_rule,
};

pub fn routing_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/routing-rules",
            get(list_routing_rules).post(create_routing_rule),
        )
        .route(
            "/routing-rules/{rule_id}",
            get(get_routing_rule)
                .patch(update_routing_rule)
                .delete(delete_routing_rule),
        )
        .route(
            "/approval-policies/{request_type}",
            get(get_approval_policy).put(upsert_approval_policy),
        )
}
