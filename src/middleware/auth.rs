use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache; // ✅ High-performance TTL Cache
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;

/// ✅ **RBAC Permissions Cache Using `moka`**
pub type PermissionCache = Arc<Cache<i32, UserPermissions>>;

/// ✅ **Initialize the `moka` Cache**
pub fn create_permission_cache() -> PermissionCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // ✅ TTL = 10 minutes
            .build(),
    )
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        error!("Invalid Authorization header format");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    // Step 5: Insert claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    // Step 6: Proceed to the next middleware
    Ok(next.run(req).await)
}

/// ✅ **User Permissions Structure**
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub global_role: String,
    pub teams: HashMap<i32, String>, // Team ID -> role_in_team (lead, member)
}

impl UserPermissions {
    /// ✅ **Check if user is a system-wide administrator**
    pub fn is_admin(&self) -> bool {
        self.global_role == "admin"
    }

    /// ✅ **Check if user is a system-wide manager**
    pub fn is_manager(&self) -> bool {
        self.global_role == "manager"
    }

    /// ✅ **Check if user is a team lead for a specific team**
    pub fn is_team_lead(&self, team_id: i32) -> bool {
        matches!(self.teams.get(&team_id), Some(role) if role == "lead")
    }

    /// ✅ **Check if user is on a specific team (any role)**
    pub fn is_on_team(&self, team_id: i32) -> bool {
        self.teams.contains_key(&team_id)
    }

    /// ✅ **Check if user may act on the manager approval tier**
    pub fn can_approve_manager_tier(&self) -> bool {
        self.is_admin() || self.is_manager()
    }

    /// ✅ **Check if user may act on the admin approval tier**
    pub fn can_approve_admin_tier(&self) -> bool {
        self.is_admin()
    }

    /// ✅ **Check if user can administer routing rules and policies**
    pub fn can_manage_routing(&self) -> bool {
        self.is_admin()
    }

    /// ✅ **Check if user can manage a team's membership**
    pub fn can_manage_team(&self, team_id: i32) -> bool {
        self.is_admin() || self.is_manager() || self.is_team_lead(team_id)
    }
}

/// ✅ **RBAC Middleware with `moka`**
pub async fn rbac_middleware(
    State(db_pool): State<PgPool>,
    Extension(permission_cache): Extension<PermissionCache>, // ✅ Uses Axum **Extension**
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: i32 = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    // ✅ **Check cache first before querying DB**
    if let Some(cached_permissions) = permission_cache.get(&user_id) {
        req.extensions_mut().insert(cached_permissions.clone());
        return Ok(next.run(req).await);
    }

    // ❌ **If not cached, query database**
    let user_permissions = match fetch_rbac_from_db(user_id, &db_pool).await {
        Ok(permissions) => permissions,
        Err(err) => {
            error!("Database query failed: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user permissions",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    // ✅ **Cache the retrieved permissions**
    permission_cache.insert(user_id, user_permissions.clone());

    // ✅ **Attach to request & continue**
    req.extensions_mut().insert(user_permissions);
    Ok(next.run(req).await)
}

/// ✅ **Query Database for RBAC Data**
async fn fetch_rbac_from_db(user_id: i32, pool: &PgPool) -> Result<UserPermissions, sqlx::Error> {
    let global_role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let memberships: Vec<(i32, String)> = sqlx::query_as(
        "SELECT team_id, role_in_team FROM team_members WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(UserPermissions {
        user_id,
        global_role: global_role.unwrap_or_else(|| "submitter".to_string()),
        teams: memberships.into_iter().collect(),
    })
}
