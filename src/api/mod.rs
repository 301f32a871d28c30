use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{delete, get, post, put},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub(crate) mod error;
pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

use handlers::{auth, categories, comments, posts, tags, users};

/// Build the application router with all routes and layers wired.
///
/// The layer order matters: the error-body translator sits outside the auth
/// gate so 401/403 decisions are rendered in the common error shape, and the
/// extensions sit outside both so every layer and handler can extract them.
#[must_use]
pub fn app(pool: PgPool, globals: GlobalArgs) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/", get(|| async { env!("CARGO_PKG_NAME") }))
        .route("/health", get(handlers::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/auth/register", post(auth::register::register))
        .route("/auth/login", post(auth::login::login))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/posts/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/comments/:id", delete(comments::delete_comment))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/:id", delete(tags::delete_tag))
        .route("/users/me", get(users::me))
        .route("/users/:id/promote-to-admin", put(users::promote_to_admin))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(middleware::from_fn(error::error_body))
                .layer(Extension(pool))
                .layer(Extension(globals))
                .layer(middleware::from_fn(auth::gate)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let app = app(pool, globals);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
