//! Login and token issuance.

use axum::{Json, extract::Extension, response::IntoResponse};
use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::{
    storage::find_by_email_or_username,
    types::{LoginRequest, LoginResponse},
    utils::{normalize_email, validate_login, verify_password},
};
use crate::{
    api::error::ApiError,
    cli::globals::GlobalArgs,
    token::{Claims, sign_hs512},
};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::api::error::ErrorBody),
    ),
    tag = "auth"
)]
/// Verifies credentials and issues a bearer token with the username as subject.
///
/// Unknown identifier and wrong password produce the identical 401 message so
/// callers cannot enumerate accounts.
#[instrument(skip_all)]
pub async fn login(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_login(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Emails are stored normalized at registration; match them the same way.
    let identifier = payload.username.trim();
    let account = find_by_email_or_username(&pool, &normalize_email(identifier), identifier)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let claims = Claims::new(account.username.as_str(), Utc::now().timestamp());
    let token = sign_hs512(globals.jwt_secret.expose_secret().as_bytes(), &claims)
        .map_err(anyhow::Error::from)?;

    debug!("login successful for account {}", account.id);

    Ok(Json(LoginResponse {
        authorization_token: format!("Bearer {token}"),
    }))
}
