use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::team::{
    add_team_member, create_team, delete_team, get_team, get_team_members, get_teams,
    remove_team_member, update_team, update_team_member,
};

pub fn team_routes() -> Router<PgPool> {
    Router::new()
        .route("/teams", post(create_team).get(get_teams))
        .route(
            "/teams/{team_id}",
            get(get_team).patch(update_team).delete(delete_team),
        )
        .route(
            "/teams/{team_id}/members",
            get(get_team_members).post(add_team_member),
        )
        .route(
            "/teams/{team_id}/members/{user_id}",
            patch(update_team_member).delete(remove_team_member),
        )
}
