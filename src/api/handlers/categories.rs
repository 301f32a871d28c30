//! Category handlers and storage. Writes are ADMIN-only via the route policy.

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

use super::Audit;
use crate::api::{
    error::{ApiError, FieldError},
    handlers::auth::utils::is_unique_violation,
};

const NAME_MAX: usize = 60;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub audit: Audit,
}

fn validate_category(request: &CategoryRequest) -> Vec<FieldError> {
    let name = request.name.trim();
    if name.is_empty() || name.len() > NAME_MAX {
        vec![FieldError::new(
            "name",
            "must be between 1 and 60 characters",
        )]
    } else {
        Vec::new()
    }
}

fn map_insert_error(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Duplicate("category name already taken".to_string())
    } else {
        ApiError::Database(err)
    }
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 403, description = "ADMIN role required", body = crate::api::error::ErrorBody),
        (status = 409, description = "Category name already taken", body = crate::api::error::ErrorBody),
    ),
    tag = "categories"
)]
#[instrument(skip_all)]
pub async fn create_category(
    pool: Extension<PgPool>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_category(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let row = sqlx::query(
        "INSERT INTO categories (name) VALUES ($1) \
         RETURNING id, name, created_at, updated_at",
    )
    .bind(payload.name.trim())
    .fetch_one(&pool.0)
    .await
    .map_err(map_insert_error)?;

    Ok((StatusCode::CREATED, Json(row_to_category(&row))))
}

#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "All categories, alphabetical", body = [CategoryResponse]),
    ),
    tag = "categories"
)]
pub async fn list_categories(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query("SELECT id, name, created_at, updated_at FROM categories ORDER BY name")
        .fetch_all(&pool.0)
        .await?;
    let categories: Vec<CategoryResponse> = rows.iter().map(row_to_category).collect();
    Ok(Json(categories))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    responses(
        (status = 200, description = "Category found", body = CategoryResponse),
        (status = 404, description = "No such category", body = crate::api::error::ErrorBody),
    ),
    tag = "categories"
)]
pub async fn get_category(
    pool: Extension<PgPool>,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query("SELECT id, name, created_at, updated_at FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&pool.0)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(Json(row_to_category(&row)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = CategoryResponse),
        (status = 404, description = "No such category", body = crate::api::error::ErrorBody),
        (status = 409, description = "Category name already taken", body = crate::api::error::ErrorBody),
    ),
    tag = "categories"
)]
#[instrument(skip_all, fields(category_id = %category_id))]
pub async fn update_category(
    pool: Extension<PgPool>,
    Path(category_id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_category(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let row = sqlx::query(
        "UPDATE categories SET name = $2, updated_at = now() WHERE id = $1 \
         RETURNING id, name, created_at, updated_at",
    )
    .bind(category_id)
    .bind(payload.name.trim())
    .fetch_optional(&pool.0)
    .await
    .map_err(map_insert_error)?
    .ok_or(ApiError::NotFound("Category"))?;

    Ok(Json(row_to_category(&row)))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    responses(
        (status = 204, description = "Category deleted; posts keep no category"),
        (status = 404, description = "No such category", body = crate::api::error::ErrorBody),
    ),
    tag = "categories"
)]
#[instrument(skip_all, fields(category_id = %category_id))]
pub async fn delete_category(
    pool: Extension<PgPool>,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&pool.0)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Category"));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn row_to_category(row: &sqlx::postgres::PgRow) -> CategoryResponse {
    CategoryResponse {
        id: row.get("id"),
        name: row.get("name"),
        audit: Audit {
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_category_rejects_blank_and_oversized() {
        let request = CategoryRequest {
            name: " ".to_string(),
        };
        assert_eq!(validate_category(&request).len(), 1);

        let request = CategoryRequest {
            name: "x".repeat(NAME_MAX + 1),
        };
        assert_eq!(validate_category(&request).len(), 1);

        let request = CategoryRequest {
            name: "Rust".to_string(),
        };
        assert!(validate_category(&request).is_empty());
    }
}
