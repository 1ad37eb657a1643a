use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::api::auth::Claims;
use crate::db::models::user::{UpdateUser, User, UserSummary};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;

const USER_COLUMNS: &str =
    "id, username, password_hash, email, role, account_locked, created_at, updated_at";

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "List of users", body = Vec<UserSummary>),
        (status = 403, description = "Manager or admin only"),
        (status = 500, description = "Failed to retrieve users")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_users(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<UserSummary>>, ApiResponse<()>> {
    if !permissions.is_admin() && !permissions.is_manager() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only a manager or admin can list users",
            None,
        ));
    }

    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, email, role FROM users ORDER BY username",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve users",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Users", users))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User retrieved", body = User),
        (status = 403, description = "Self, manager or admin only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(permissions): Extension<UserPermissions>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<User>, ApiResponse<()>> {
    let requester_id = claims.user_id()?;
    if requester_id != user_id && !permissions.is_admin() && !permissions.is_manager() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You may only view your own account",
            None,
        ));
    }

    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?
            .ok_or_else(|| {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None)
            })?;

    Ok(ApiResponse::success(StatusCode::OK, "User retrieved", user))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Empty update"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(permissions): Extension<UserPermissions>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> Result<ApiResponse<User>, ApiResponse<()>> {
    if !permissions.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only an admin can update users",
            None,
        ));
    }

    if payload.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "No fields to update",
            None,
        ));
    }

    if let Some(role) = &payload.role {
        if !matches!(role.as_str(), "submitter" | "manager" | "admin") {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Role must be submitter, manager or admin",
                None,
            ));
        }
    }

    let password_hash = match &payload.password {
        Some(password) => Some(hash(password, DEFAULT_COST).map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password hashing failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?),
        None => None,
    };

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET username = COALESCE($1, username),
            password_hash = COALESCE($2, password_hash),
            email = COALESCE($3, email),
            role = COALESCE($4, role),
            account_locked = COALESCE($5, account_locked),
            updated_at = NOW()
        WHERE id = $6
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(payload.username)
    .bind(password_hash)
    .bind(payload.email)
    .bind(payload.role)
    .bind(payload.account_locked)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update user",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    info!("User {} updated", user_id);

    Ok(ApiResponse::success(StatusCode::OK, "User updated", user))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_users, get_user, update_user),
    components(schemas(User, UserSummary, UpdateUser)),
    tags(
        (name = "Users", description = "User directory administration")
    )
)]
pub struct UserDoc;
