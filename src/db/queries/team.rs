use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::db::models::team::{
    AddTeamMember, NewTeam, PaginationParams, Team, TeamMember, UpdateTeam, UpdateTeamMember,
};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

#[utoipa::path(
    post,
    path = "/teams",
    request_body = NewTeam,
    responses(
        (status = 201, description = "Team created", body = Team),
        (status = 403, description = "Manager or admin only"),
        (status = 409, description = "Team name already taken"),
        (status = 500, description = "Failed to insert team")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn create_team(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Json(payload): Json<NewTeam>,
) -> Result<ApiResponse<Team>, ApiResponse<()>> {
    if !permissions.is_admin() && !permissions.is_manager() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only a manager or admin can create teams",
            None,
        ));
    }

    let result = sqlx::query_as::<_, Team>(
        r#"
        INSERT INTO teams (name, brand_id, location_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, brand_id, location_id, created_at
        "#,
    )
    .bind(&payload.name)
    .bind(payload.brand_id)
    .bind(payload.location_id)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(team) => {
            info!("Team {} created", team.id);
            Ok(ApiResponse::success(
                StatusCode::CREATED,
                "Team created",
                team,
            ))
        }
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::<()>::error(
                        StatusCode::CONFLICT,
                        "Team name already taken",
                        None,
                    ));
                }
            }
            Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to insert team",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/teams",
    params(PaginationParams),
    responses(
        (status = 200, description = "List of teams", body = Vec<Team>),
        (status = 500, description = "Failed to retrieve teams")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn get_teams(
    State(pool): State<PgPool>,
    Query(pagination): Query<PaginationParams>,
) -> Result<ApiResponse<Vec<Team>>, ApiResponse<()>> {
    let limit = pagination.limit.unwrap_or(50).min(200) as i64;
    let offset = (pagination.page.unwrap_or(0) as i64) * limit;

    let teams = sqlx::query_as::<_, Team>(
        r#"
        SELECT id, name, brand_id, location_id, created_at
        FROM teams
        ORDER BY name
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve teams",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Teams", teams))
}

#[utoipa::path(
    get,
    path = "/teams/{team_id}",
    params(("team_id" = i32, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team retrieved", body = Team),
        (status = 404, description = "Team not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn get_team(
    State(pool): State<PgPool>,
    Path(team_id): Path<i32>,
) -> Result<ApiResponse<Team>, ApiResponse<()>> {
    let team = sqlx::query_as::<_, Team>(
        "SELECT id, name, brand_id, location_id, created_at FROM teams WHERE id = $1",
    )
    .bind(team_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Team not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Team retrieved", team))
}

#[utoipa::path(
    patch,
    path = "/teams/{team_id}",
    params(("team_id" = i32, Path, description = "Team ID")),
    request_body = UpdateTeam,
    responses(
        (status = 200, description = "Team updated", body = Team),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Team not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn update_team(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(team_id): Path<i32>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ApiResponse<Team>, ApiResponse<()>> {
    if !permissions.is_admin() && !permissions.is_manager() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only a manager or admin can update teams",
            None,
        ));
    }

    let team = sqlx::query_as::<_, Team>(
        r#"
        UPDATE teams
        SET name = COALESCE($1, name),
            brand_id = COALESCE($2, brand_id),
            location_id = COALESCE($3, location_id)
        WHERE id = $4
        RETURNING id, name, brand_id, location_id, created_at
        "#,
    )
    .bind(payload.name)
    .bind(payload.brand_id)
    .bind(payload.location_id)
    .bind(team_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update team",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Team not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Team updated", team))
}

#[utoipa::path(
    delete,
    path = "/teams/{team_id}",
    params(("team_id" = i32, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Team not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn delete_team(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(team_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can delete teams",
            None,
        ));
    }

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("DELETE FROM team_members WHERE team_id = $1")
        .bind(team_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove team members",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(team_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete team",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Team not found",
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

    Ok(ApiResponse::success(StatusCode::OK, "Team deleted", ()))
}

#[utoipa::path(
    get,
    path = "/teams/{team_id}/members",
    params(("team_id" = i32, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team members", body = Vec<TeamMember>),
        (status = 500, description = "Failed to retrieve members")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn get_team_members(
    State(pool): State<PgPool>,
    Path(team_id): Path<i32>,
) -> Result<ApiResponse<Vec<TeamMember>>, ApiResponse<()>> {
    let members = sqlx::query_as::<_, TeamMember>(
        r#"
        SELECT tm.user_id, u.username, tm.team_id, tm.role_in_team, tm.skills,
               tm.on_leave, tm.last_assigned_at
        FROM team_members tm
        JOIN users u ON u.id = tm.user_id
        WHERE tm.team_id = $1
        ORDER BY u.username
        "#,
    )
    .bind(team_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve team members",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Team members", members))
}

#[utoipa::path(
    post,
    path = "/teams/{team_id}/members",
    params(("team_id" = i32, Path, description = "Team ID")),
    request_body = AddTeamMember,
    responses(
        (status = 201, description = "Member added"),
        (status = 403, description = "Lead, manager or admin only"),
        (status = 500, description = "Failed to add member")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn add_team_member(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(team_id): Path<i32>,
    Json(payload): Json<AddTeamMember>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !permissions.can_manage_team(team_id) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to manage this team",
            None,
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO team_members (user_id, team_id, role_in_team, skills)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, team_id)
        DO UPDATE SET role_in_team = EXCLUDED.role_in_team, skills = EXCLUDED.skills
        "#,
    )
    .bind(payload.user_id)
    .bind(team_id)
    .bind(payload.role_in_team.unwrap_or_else(|| "member".to_string()))
    .bind(payload.skills.unwrap_or_default())
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to add team member",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Member added",
        (),
    ))
}

#[utoipa::path(
    patch,
    path = "/teams/{team_id}/members/{user_id}",
    params(
        ("team_id" = i32, Path, description = "Team ID"),
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateTeamMember,
    responses(
        (status = 200, description = "Member updated", body = TeamMember),
        (status = 403, description = "Lead, manager or admin only"),
        (status = 404, description = "Membership not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn update_team_member(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path((team_id, user_id)): Path<(i32, i32)>,
    Json(payload): Json<UpdateTeamMember>,
) -> Result<ApiResponse<TeamMember>, ApiResponse<()>> {
    if !permissions.can_manage_team(team_id) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to manage this team",
            None,
        ));
    }

    let member = sqlx::query_as::<_, TeamMember>(
        r#"
        UPDATE team_members tm
        SET role_in_team = COALESCE($1, tm.role_in_team),
            skills = COALESCE($2, tm.skills),
            on_leave = COALESCE($3, tm.on_leave)
        FROM users u
        WHERE tm.user_id = $4 AND tm.team_id = $5 AND u.id = tm.user_id
        RETURNING tm.user_id, u.username, tm.team_id, tm.role_in_team, tm.skills,
                  tm.on_leave, tm.last_assigned_at
        "#,
    )
    .bind(payload.role_in_team)
    .bind(payload.skills)
    .bind(payload.on_leave)
    .bind(user_id)
    .bind(team_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update team member",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Membership not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Member updated", member))
}

#[utoipa::path(
    delete,
    path = "/teams/{team_id}/members/{user_id}",
    params(
        ("team_id" = i32, Path, description = "Team ID"),
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Member removed"),
        (status = 403, description = "Lead, manager or admin only"),
        (status = 404, description = "Membership not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn remove_team_member(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path((team_id, user_id)): Path<(i32, i32)>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !permissions.can_manage_team(team_id) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to manage this team",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove team member",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Membership not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Member removed", ()))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_team,
        get_teams,
        get_team,
        update_team,
        delete_team,
        get_team_members,
        add_team_member,
        update_team_member,
        remove_team_member
    ),
    components(schemas(Team, NewTeam, UpdateTeam, AddTeamMember, UpdateTeamMember, TeamMember)),
    tags(
        (name = "Teams", description = "Team and membership management")
    )
)]
pub struct TeamDoc;
