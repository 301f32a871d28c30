//! Account endpoints: profile lookup and role elevation.

use axum::{
    Json,
    extract::{Extension, Path},
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::auth::{
    Principal, Role,
    storage::{account_by_id, fetch_role_names, grant_role},
    types::AccountResponse,
};
use crate::api::error::ApiError;

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The authenticated account", body = AccountResponse),
        (status = 401, description = "Authentication required", body = crate::api::error::ErrorBody),
    ),
    tag = "users"
)]
/// Returns the caller's own profile and role set.
#[instrument(skip_all, fields(caller = %principal.username))]
pub async fn me(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let account = account_by_id(&pool, principal.id)
        .await?
        .ok_or(ApiError::NotFound("Account"))?;
    let roles = fetch_role_names(&pool, account.id).await?;

    Ok(Json(AccountResponse {
        id: account.id,
        email: account.email,
        username: account.username,
        first_name: account.first_name,
        last_name: account.last_name,
        phone: account.phone,
        roles,
    }))
}

#[utoipa::path(
    put,
    path = "/users/{id}/promote-to-admin",
    responses(
        (status = 200, description = "ADMIN role granted (idempotent)"),
        (status = 403, description = "SUPER_ADMIN role required", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such account", body = crate::api::error::ErrorBody),
    ),
    tag = "users"
)]
/// Grants the ADMIN role to an account. SUPER_ADMIN only, via the route policy.
#[instrument(skip_all, fields(account_id = %account_id, caller = %principal.username))]
pub async fn promote_to_admin(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !grant_role(&pool, account_id, Role::Admin).await? {
        return Err(ApiError::NotFound("Account"));
    }

    info!(
        "account {account_id} promoted to ADMIN by {}",
        principal.username
    );
    Ok("Role ADMIN granted")
}
