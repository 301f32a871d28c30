//! Request gate: bearer-token authentication plus the route policy table.
//!
//! The gate runs once per request. An invalid or absent token never rejects
//! by itself; it leaves the request unauthenticated and the policy table
//! decides between permit, 401 and 403. Unmatched routes default to
//! permit-all.

use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, Method, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::debug;

use super::{
    principal::{Principal, Role},
    storage::load_principal,
};
use crate::{api::error::ApiError, cli::globals::GlobalArgs, token::verify_hs512};

/// Declarative access policy: {method, path pattern} -> required role.
/// `{param}` segments match any single path segment. Ownership of posts and
/// comments is enforced by the handlers on top of the role required here.
static POLICY_TABLE: [(Method, &str, Role); 12] = [
    (Method::POST, "/posts", Role::User),
    (Method::PUT, "/posts/{id}", Role::User),
    (Method::DELETE, "/posts/{id}", Role::User),
    (Method::POST, "/posts/{id}/comments", Role::User),
    (Method::DELETE, "/comments/{id}", Role::User),
    (Method::POST, "/categories", Role::Admin),
    (Method::PUT, "/categories/{id}", Role::Admin),
    (Method::DELETE, "/categories/{id}", Role::Admin),
    (Method::POST, "/tags", Role::Admin),
    (Method::DELETE, "/tags/{id}", Role::Admin),
    (Method::GET, "/users/me", Role::User),
    (Method::PUT, "/users/{id}/promote-to-admin", Role::SuperAdmin),
];

/// Minimum role required for a request, or `None` when the route is open.
#[must_use]
pub fn required_role(method: &Method, path: &str) -> Option<Role> {
    POLICY_TABLE
        .iter()
        .find(|(m, pattern, _)| m == method && matches_pattern(pattern, path))
        .map(|(_, _, role)| *role)
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.trim_matches('/').split('/');
    let mut path_segments = path.trim_matches('/').split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(pattern_segment), Some(path_segment)) => {
                if !pattern_segment.starts_with('{') && pattern_segment != path_segment {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Per-request authentication filter and access gate.
///
/// # Errors
///
/// Returns `Unauthenticated` (401) when the route requires a role and no
/// valid principal is attached, `Forbidden` (403) when the principal's roles
/// are insufficient, and `Database` (500) if the account lookup fails.
pub async fn gate(
    Extension(pool): Extension<PgPool>,
    Extension(globals): Extension<GlobalArgs>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match bearer_token(request.headers()) {
        Some(token) => authenticate(&pool, &globals, &token).await?,
        None => None,
    };

    if let Some(required) = required_role(request.method(), request.uri().path()) {
        match &principal {
            None => return Err(ApiError::Unauthenticated),
            Some(principal) if !principal.satisfies(required) => {
                return Err(ApiError::Forbidden);
            }
            Some(_) => {}
        }
    }

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }

    Ok(next.run(request).await)
}

/// Validate a bearer token and resolve its subject to a principal.
/// Every token failure is treated uniformly as "unauthenticated".
async fn authenticate(
    pool: &PgPool,
    globals: &GlobalArgs,
    token: &str,
) -> Result<Option<Principal>, ApiError> {
    let claims = match verify_hs512(
        token,
        globals.jwt_secret.expose_secret().as_bytes(),
        Utc::now().timestamp(),
    ) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("rejected bearer token: {err}");
            return Ok(None);
        }
    };

    let principal = load_principal(pool, &claims.sub).await?;
    if principal.is_none() {
        debug!("token subject {} has no account", claims.sub);
    }
    Ok(principal)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn unmatched_routes_are_open() {
        assert_eq!(required_role(&Method::GET, "/posts"), None);
        assert_eq!(required_role(&Method::GET, "/posts/42"), None);
        assert_eq!(required_role(&Method::GET, "/categories"), None);
        assert_eq!(required_role(&Method::POST, "/auth/login"), None);
        assert_eq!(required_role(&Method::GET, "/health"), None);
    }

    #[test]
    fn mutations_require_roles() {
        assert_eq!(required_role(&Method::POST, "/posts"), Some(Role::User));
        assert_eq!(required_role(&Method::PUT, "/posts/42"), Some(Role::User));
        assert_eq!(
            required_role(&Method::POST, "/posts/42/comments"),
            Some(Role::User)
        );
        assert_eq!(
            required_role(&Method::POST, "/categories"),
            Some(Role::Admin)
        );
        assert_eq!(
            required_role(&Method::DELETE, "/tags/3"),
            Some(Role::Admin)
        );
        assert_eq!(required_role(&Method::GET, "/users/me"), Some(Role::User));
        assert_eq!(
            required_role(&Method::PUT, "/users/9/promote-to-admin"),
            Some(Role::SuperAdmin)
        );
    }

    #[test]
    fn pattern_params_match_single_segments_only() {
        assert!(matches_pattern("/posts/{id}", "/posts/42"));
        assert!(!matches_pattern("/posts/{id}", "/posts"));
        assert!(!matches_pattern("/posts/{id}", "/posts/42/comments"));
        assert!(matches_pattern(
            "/users/{id}/promote-to-admin",
            "/users/9/promote-to-admin"
        ));
        assert!(!matches_pattern(
            "/users/{id}/promote-to-admin",
            "/users/9/demote"
        ));
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
