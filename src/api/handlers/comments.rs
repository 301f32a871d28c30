//! Comment handlers and storage.
//!
//! Comments live under a post. Creation requires the USER role; deletion is
//! owner-or-admin. Listing is public.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::instrument;
use utoipa::ToSchema;

use super::{
    Audit, Page, PageParams,
    auth::{Principal, authorize_owner_or_admin},
    posts::post_exists,
};
use crate::api::error::{ApiError, FieldError};

const COMMENT_MAX: usize = 2000;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub owner_id: i64,
    pub owner_username: String,
    #[serde(flatten)]
    pub audit: Audit,
}

fn validate_comment(request: &CommentRequest) -> Vec<FieldError> {
    let body = request.body.trim();
    if body.is_empty() || body.len() > COMMENT_MAX {
        vec![FieldError::new(
            "body",
            "must be between 1 and 2000 characters",
        )]
    } else {
        Vec::new()
    }
}

#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 401, description = "Authentication required", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such post", body = crate::api::error::ErrorBody),
    ),
    tag = "comments"
)]
/// Adds a comment to a post, owned by the authenticated caller.
#[instrument(skip_all, fields(post_id = %post_id, owner = %principal.username))]
pub async fn create_comment(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_comment(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    if !post_exists(&pool, post_id).await? {
        return Err(ApiError::NotFound("Post"));
    }

    let row = sqlx::query(
        "INSERT INTO comments (post_id, body, owner_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(post_id)
    .bind(payload.body.trim())
    .bind(principal.id)
    .fetch_one(&pool.0)
    .await?;
    let comment_id: i64 = row.get("id");

    let comment = fetch_comment(&pool, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(PageParams),
    responses(
        (status = 200, description = "One page of comments for the post, oldest first"),
        (status = 404, description = "No such post", body = crate::api::error::ErrorBody),
    ),
    tag = "comments"
)]
/// Lists a post's comments with paging metadata.
pub async fn list_comments(
    pool: Extension<PgPool>,
    Path(post_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    if !post_exists(&pool, post_id).await? {
        return Err(ApiError::NotFound("Post"));
    }

    let (_, _, limit, offset) = params.resolve();
    let (items, total) = fetch_comments(&pool, post_id, limit, offset).await?;
    Ok(Json(Page::new(items, &params, total)))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Caller is neither owner nor admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such comment", body = crate::api::error::ErrorBody),
    ),
    tag = "comments"
)]
/// Deletes a comment. Owner or ADMIN only.
#[instrument(skip_all, fields(comment_id = %comment_id, caller = %principal.username))]
pub async fn delete_comment(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = comment_owner(&pool, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    authorize_owner_or_admin(owner_id, &principal)?;

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&pool.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn comment_owner(pool: &PgPool, comment_id: i64) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT owner_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("owner_id")))
}

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.body, c.owner_id, \
       a.username AS owner_username, c.created_at, c.updated_at \
  FROM comments c JOIN accounts a ON a.id = c.owner_id";

fn row_to_comment(row: &sqlx::postgres::PgRow) -> CommentResponse {
    CommentResponse {
        id: row.get("id"),
        post_id: row.get("post_id"),
        body: row.get("body"),
        owner_id: row.get("owner_id"),
        owner_username: row.get("owner_username"),
        audit: Audit {
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
    }
}

async fn fetch_comment(
    pool: &PgPool,
    comment_id: i64,
) -> Result<Option<CommentResponse>, sqlx::Error> {
    let query = format!("{COMMENT_SELECT} WHERE c.id = $1");
    let row = sqlx::query(&query)
        .bind(comment_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row_to_comment(&row)))
}

async fn fetch_comments(
    pool: &PgPool,
    post_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CommentResponse>, i64), sqlx::Error> {
    let query =
        format!("{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.id LIMIT $2 OFFSET $3");
    let rows = sqlx::query(&query)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    let items = rows.iter().map(row_to_comment).collect();

    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(pool)
        .await?
        .get("count");

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_comment_accepts_text() {
        let request = CommentRequest {
            body: "nice post".to_string(),
        };
        assert!(validate_comment(&request).is_empty());
    }

    #[test]
    fn validate_comment_rejects_blank_and_oversized() {
        let request = CommentRequest {
            body: "  ".to_string(),
        };
        assert_eq!(validate_comment(&request).len(), 1);

        let request = CommentRequest {
            body: "x".repeat(COMMENT_MAX + 1),
        };
        assert_eq!(validate_comment(&request).len(), 1);
    }
}
