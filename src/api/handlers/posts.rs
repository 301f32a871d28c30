//! Post CRUD handlers and storage.
//!
//! Creation requires the USER role (enforced by the route policy); updates
//! and deletes additionally require ownership or ADMIN. Reads are public.

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
};
use crate::api::error::{ApiError, FieldError};

const TITLE_MAX: usize = 200;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PostRequest {
    pub title: String,
    pub body: String,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

fn validate_post(request: &PostRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let title = request.title.trim();
    if title.is_empty() || title.len() > TITLE_MAX {
        errors.push(FieldError::new(
            "title",
            "must be between 1 and 200 characters",
        ));
    }
    if request.body.trim().is_empty() {
        errors.push(FieldError::new("body", "must not be blank"));
    }
    errors
}

#[utoipa::path(
    post,
    path = "/posts",
    request_body = PostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Field validation failed", body = crate::api::error::ErrorBody),
        (status = 401, description = "Authentication required", body = crate::api::error::ErrorBody),
        (status = 404, description = "Referenced category or tag does not exist", body = crate::api::error::ErrorBody),
    ),
    tag = "posts"
)]
/// Creates a post owned by the authenticated caller.
#[instrument(skip_all, fields(owner = %principal.username))]
pub async fn create_post(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<PostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_post(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    check_references(&pool, &payload).await?;

    let post_id = insert_post(&pool, principal.id, &payload).await?;
    let post = fetch_post(&pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/posts",
    params(PageParams),
    responses(
        (status = 200, description = "One page of posts, newest first"),
    ),
    tag = "posts"
)]
/// Lists posts, newest first, with paging metadata.
pub async fn list_posts(
    pool: Extension<PgPool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, _, limit, offset) = params.resolve();
    let (items, total) = fetch_posts(&pool, limit, offset).await?;
    Ok(Json(Page::new(items, &params, total)))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    responses(
        (status = 200, description = "Post found", body = PostResponse),
        (status = 404, description = "No such post", body = crate::api::error::ErrorBody),
    ),
    tag = "posts"
)]
pub async fn get_post(
    pool: Extension<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = fetch_post(&pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post))
}

#[utoipa::path(
    put,
    path = "/posts/{id}",
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 403, description = "Caller is neither owner nor admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such post", body = crate::api::error::ErrorBody),
    ),
    tag = "posts"
)]
/// Updates a post. Owner or ADMIN only.
#[instrument(skip_all, fields(post_id = %post_id, caller = %principal.username))]
pub async fn update_post(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Path(post_id): Path<i64>,
    Json(payload): Json<PostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_post(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let owner_id = post_owner(&pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    authorize_owner_or_admin(owner_id, &principal)?;
    check_references(&pool, &payload).await?;

    store_update(&pool, post_id, &payload).await?;
    let post = fetch_post(&pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}",
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Caller is neither owner nor admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such post", body = crate::api::error::ErrorBody),
    ),
    tag = "posts"
)]
/// Deletes a post. Owner or ADMIN only.
#[instrument(skip_all, fields(post_id = %post_id, caller = %principal.username))]
pub async fn delete_post(
    pool: Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = post_owner(&pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    authorize_owner_or_admin(owner_id, &principal)?;

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(&pool.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reject payloads referencing a missing category or tag before writing.
async fn check_references(pool: &PgPool, payload: &PostRequest) -> Result<(), ApiError> {
    if let Some(category_id) = payload.category_id {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1) AS exists")
            .bind(category_id)
            .fetch_one(pool)
            .await?;
        if !row.get::<bool, _>("exists") {
            return Err(ApiError::NotFound("Category"));
        }
    }
    if !payload.tags.is_empty() {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tags WHERE id = ANY($1)")
            .bind(&payload.tags)
            .fetch_one(pool)
            .await?;
        let found: i64 = row.get("count");
        if found != i64::try_from(payload.tags.len()).unwrap_or(i64::MAX) {
            return Err(ApiError::NotFound("Tag"));
        }
    }
    Ok(())
}

pub(crate) async fn post_owner(pool: &PgPool, post_id: i64) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT owner_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("owner_id")))
}

pub(crate) async fn post_exists(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1) AS exists")
        .bind(post_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("exists"))
}

async fn insert_post(
    pool: &PgPool,
    owner_id: i64,
    payload: &PostRequest,
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "INSERT INTO posts (title, body, owner_id, category_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(payload.title.trim())
    .bind(&payload.body)
    .bind(owner_id)
    .bind(payload.category_id)
    .fetch_one(&mut *tx)
    .await?;
    let post_id: i64 = row.get("id");

    if !payload.tags.is_empty() {
        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) \
             SELECT $1, id FROM tags WHERE id = ANY($2)",
        )
        .bind(post_id)
        .bind(&payload.tags)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(post_id)
}

async fn store_update(
    pool: &PgPool,
    post_id: i64,
    payload: &PostRequest,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE posts SET title = $2, body = $3, category_id = $4, updated_at = now() \
         WHERE id = $1",
    )
    .bind(post_id)
    .bind(payload.title.trim())
    .bind(&payload.body)
    .bind(payload.category_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
    if !payload.tags.is_empty() {
        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) \
             SELECT $1, id FROM tags WHERE id = ANY($2)",
        )
        .bind(post_id)
        .bind(&payload.tags)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

const POST_SELECT: &str = "SELECT p.id, p.title, p.body, p.owner_id, \
       a.username AS owner_username, c.name AS category, \
       COALESCE(array_agg(t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL), '{}') AS tags, \
       p.created_at, p.updated_at \
  FROM posts p \
  JOIN accounts a ON a.id = p.owner_id \
  LEFT JOIN categories c ON c.id = p.category_id \
  LEFT JOIN post_tags pt ON pt.post_id = p.id \
  LEFT JOIN tags t ON t.id = pt.tag_id";

const POST_GROUP_BY: &str =
    " GROUP BY p.id, p.title, p.body, p.owner_id, a.username, c.name, p.created_at, p.updated_at";

fn row_to_post(row: &sqlx::postgres::PgRow) -> PostResponse {
    PostResponse {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        owner_id: row.get("owner_id"),
        owner_username: row.get("owner_username"),
        category: row.get("category"),
        tags: row.get("tags"),
        audit: Audit {
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
    }
}

async fn fetch_post(pool: &PgPool, post_id: i64) -> Result<Option<PostResponse>, sqlx::Error> {
    let query = format!("{POST_SELECT} WHERE p.id = $1{POST_GROUP_BY}");
    let row = sqlx::query(&query).bind(post_id).fetch_optional(pool).await?;
    Ok(row.map(|row| row_to_post(&row)))
}

async fn fetch_posts(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PostResponse>, i64), sqlx::Error> {
    let query = format!(
        "{POST_SELECT}{POST_GROUP_BY} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2"
    );
    let rows = sqlx::query(&query)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    let items = rows.iter().map(row_to_post).collect();

    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM posts")
        .fetch_one(pool)
        .await?
        .get("count");

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, body: &str) -> PostRequest {
        PostRequest {
            title: title.to_string(),
            body: body.to_string(),
            category_id: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn validate_post_accepts_well_formed_payload() {
        assert!(validate_post(&request("Hello", "world")).is_empty());
    }

    #[test]
    fn validate_post_rejects_blank_fields() {
        let errors = validate_post(&request(" ", " "));
        let fields: Vec<&str> = errors.iter().map(|error| error.field).collect();
        assert_eq!(fields, vec!["title", "body"]);
    }

    #[test]
    fn validate_post_rejects_oversized_title() {
        let errors = validate_post(&request(&"x".repeat(TITLE_MAX + 1), "body"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn post_request_tags_default_to_empty() -> anyhow::Result<()> {
        let decoded: PostRequest =
            serde_json::from_str(r#"{"title":"t","body":"b","category_id":null}"#)?;
        assert!(decoded.tags.is_empty());
        Ok(())
    }
}
