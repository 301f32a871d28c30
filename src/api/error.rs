//! Domain error taxonomy and the single boundary translator.
//!
//! Handlers return `ApiError`; the translator layer turns every error-status
//! response into the wire shape `{path, errors, status_code, timestamp}`.
//! Database errors are logged server-side and surfaced as `500` without
//! leaking details.

use axum::{
    Json,
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// One offending field reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid username/password supplied")]
    InvalidCredentials,
    #[error("Full authentication is required to access this resource")]
    Unauthenticated,
    #[error("You don't have permission to make this request")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Duplicate(String),
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(fields) => fields
                .iter()
                .map(|field| format!("{}: {}", field.field, field.message))
                .collect(),
            Self::Database(err) => {
                error!("Database error: {err}");
                vec!["Internal server error".to_string()]
            }
            Self::Internal(err) => {
                error!("Internal error: {err:?}");
                vec!["Internal server error".to_string()]
            }
            other => vec![other.to_string()],
        }
    }
}

/// Messages carried from `ApiError` to the translator through response extensions.
#[derive(Debug, Clone)]
pub(crate) struct ErrorMessages(pub Vec<String>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let messages = self.messages();
        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorMessages(messages));
        response
    }
}

/// Wire shape for every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub path: String,
    pub errors: Vec<String>,
    pub status_code: u16,
    pub timestamp: String,
}

/// Boundary translator: rewrites error-status responses into `ErrorBody`.
///
/// `ApiError` responses carry their messages in an extension; anything else
/// (extractor rejections, stray failures) is wrapped using its text body, so
/// no error leaves the service in another shape.
pub async fn error_body(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let messages = response.extensions().get::<ErrorMessages>().cloned();

    // Responses that already ship a structured JSON body (e.g. the health
    // endpoint reporting 503) pass through untouched.
    if messages.is_none() {
        let is_json = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if is_json {
            return response;
        }
    }

    let (parts, body) = response.into_parts();
    let errors = match messages {
        Some(ErrorMessages(messages)) => messages,
        None => match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) if !bytes.is_empty() => {
                vec![String::from_utf8_lossy(&bytes).into_owned()]
            }
            _ => vec![
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            ],
        },
    };

    let body = ErrorBody {
        path,
        errors,
        status_code: status.as_u16(),
        timestamp: Utc::now().to_rfc3339(),
    };

    let mut response = (status, Json(body)).into_response();
    *response.extensions_mut() = parts.extensions;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("Post").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Duplicate("email already taken".to_string()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_reports_one_entry_per_field() {
        let err = ApiError::Validation(vec![
            FieldError::new("email", "must be a valid email address"),
            FieldError::new("password", "must be at least 8 characters"),
        ]);
        assert_eq!(
            err.messages(),
            vec![
                "email: must be a valid email address".to_string(),
                "password: must be at least 8 characters".to_string(),
            ]
        );
    }

    #[test]
    fn login_failure_message_is_uniform() {
        assert_eq!(
            ApiError::InvalidCredentials.messages(),
            vec!["Invalid username/password supplied".to_string()]
        );
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = ApiError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.messages(), vec!["Internal server error".to_string()]);
    }

    #[test]
    fn into_response_carries_messages_extension() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let messages = response
            .extensions()
            .get::<ErrorMessages>()
            .map(|m| m.0.clone());
        assert_eq!(
            messages,
            Some(vec![
                "You don't have permission to make this request".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn translator_renders_error_body() -> anyhow::Result<()> {
        use axum::{Router, routing::get};
        use tower::ServiceExt;

        async fn forbidden() -> ApiError {
            ApiError::Forbidden
        }

        let app = Router::new()
            .route("/posts/1", get(forbidden))
            .layer(axum::middleware::from_fn(error_body));

        let response = app
            .oneshot(Request::builder().uri("/posts/1").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(body.path, "/posts/1");
        assert_eq!(body.status_code, 403);
        assert_eq!(
            body.errors,
            vec!["You don't have permission to make this request".to_string()]
        );
        assert!(!body.timestamp.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn translator_leaves_success_untouched() -> anyhow::Result<()> {
        use axum::{Router, routing::get};
        use tower::ServiceExt;

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(error_body));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], b"ok");
        Ok(())
    }
}
