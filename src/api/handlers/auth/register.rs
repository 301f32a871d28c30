//! Account registration.

use axum::{
    Json,
    extract::Extension,
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::{
    principal::Role,
    storage::{NewAccount, email_exists, insert_account, role_id, username_exists},
    types::RegisterRequest,
    utils::{hash_password, is_unique_violation, normalize_email, validate_register},
};
use crate::api::error::ApiError;

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; Location points at the login endpoint"),
        (status = 400, description = "Field validation failed", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email or username already taken", body = crate::api::error::ErrorBody),
    ),
    tag = "auth"
)]
/// Registers a new account with the default USER role.
///
/// Duplicate checks run email first, then username; the storage uniqueness
/// constraints settle concurrent registrations.
#[instrument(skip_all, fields(username = %payload.username))]
pub async fn register(
    pool: Extension<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_register(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let email = normalize_email(&payload.email);

    if email_exists(&pool, &email).await? {
        return Err(ApiError::Duplicate("email already taken".to_string()));
    }
    if username_exists(&pool, &payload.username).await? {
        return Err(ApiError::Duplicate("username already taken".to_string()));
    }

    // The default role is seeded by the schema; a missing row is a deployment
    // problem, not a client one, but surfaces as 404 per the taxonomy.
    let default_role_id = role_id(&pool, Role::User)
        .await?
        .ok_or(ApiError::NotFound("USER role"))?;

    let account = NewAccount {
        email,
        username: payload.username.clone(),
        password_hash: hash_password(&payload.password)?,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone: payload.phone.trim().to_string(),
    };

    let account_id = insert_account(&pool, &account, default_role_id)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::Duplicate("email or username already taken".to_string())
            } else {
                ApiError::Database(err)
            }
        })?;

    debug!("account {account_id} created");

    Ok((
        StatusCode::CREATED,
        [(LOCATION, "/auth/login")],
        "Account created",
    ))
}
