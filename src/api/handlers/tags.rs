//! Tag handlers and storage. Writes are ADMIN-only via the route policy.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::{
    error::{ApiError, FieldError},
    handlers::auth::utils::is_unique_violation,
};

const NAME_MAX: usize = 40;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TagRequest {
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
}

fn validate_tag(request: &TagRequest) -> Vec<FieldError> {
    let name = request.name.trim();
    if name.is_empty() || name.len() > NAME_MAX {
        vec![FieldError::new(
            "name",
            "must be between 1 and 40 characters",
        )]
    } else {
        Vec::new()
    }
}

#[utoipa::path(
    post,
    path = "/tags",
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 403, description = "ADMIN role required", body = crate::api::error::ErrorBody),
        (status = 409, description = "Tag name already taken", body = crate::api::error::ErrorBody),
    ),
    tag = "tags"
)]
#[instrument(skip_all)]
pub async fn create_tag(
    pool: Extension<PgPool>,
    Json(payload): Json<TagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_tag(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let row = sqlx::query("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
        .bind(payload.name.trim())
        .fetch_one(&pool.0)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::Duplicate("tag name already taken".to_string())
            } else {
                ApiError::Database(err)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(TagResponse {
            id: row.get("id"),
            name: row.get("name"),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/tags",
    responses(
        (status = 200, description = "All tags, alphabetical", body = [TagResponse]),
    ),
    tag = "tags"
)]
pub async fn list_tags(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(&pool.0)
        .await?;
    let tags: Vec<TagResponse> = rows
        .iter()
        .map(|row| TagResponse {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();
    Ok(Json(tags))
}

#[utoipa::path(
    delete,
    path = "/tags/{id}",
    responses(
        (status = 204, description = "Tag deleted and detached from posts"),
        (status = 404, description = "No such tag", body = crate::api::error::ErrorBody),
    ),
    tag = "tags"
)]
#[instrument(skip_all, fields(tag_id = %tag_id))]
pub async fn delete_tag(
    pool: Extension<PgPool>,
    Path(tag_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(tag_id)
        .execute(&pool.0)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Tag"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_tag_rejects_blank_and_oversized() {
        let request = TagRequest {
            name: String::new(),
        };
        assert_eq!(validate_tag(&request).len(), 1);

        let request = TagRequest {
            name: "x".repeat(NAME_MAX + 1),
        };
        assert_eq!(validate_tag(&request).len(), 1);

        let request = TagRequest {
            name: "rust".to_string(),
        };
        assert!(validate_tag(&request).is_empty());
    }
}
