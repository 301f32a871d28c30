use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database is healthy", body = Health),
        (status = 503, description = "Database is unhealthy", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(pool: Extension<PgPool>) -> impl IntoResponse {
    let database = match pool.0.acquire().await {
        Ok(mut conn) => match conn.ping().await {
            Ok(()) => Ok(()),
            Err(error) => {
                error!("Failed to ping database: {}", error);
                Err(StatusCode::SERVICE_UNAVAILABLE)
            }
        },
        Err(error) => {
            error!("Failed to acquire database connection: {}", error);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let status = match database {
        Ok(()) => StatusCode::OK,
        Err(status) => status,
    };

    let body = Json(Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if status == StatusCode::OK {
            "up".to_string()
        } else {
            "down".to_string()
        },
    });

    (status, body)
}
