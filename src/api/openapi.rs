//! OpenAPI document for the service, served at `/openapi.json`.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "quill",
        description = "Blogging REST API with JWT authentication"
    ),
    paths(
        handlers::health::health,
        handlers::auth::register::register,
        handlers::auth::login::login,
        handlers::posts::create_post,
        handlers::posts::list_posts,
        handlers::posts::get_post,
        handlers::posts::update_post,
        handlers::posts::delete_post,
        handlers::comments::create_comment,
        handlers::comments::list_comments,
        handlers::comments::delete_comment,
        handlers::categories::create_category,
        handlers::categories::list_categories,
        handlers::categories::get_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::tags::create_tag,
        handlers::tags::list_tags,
        handlers::tags::delete_tag,
        handlers::users::me,
        handlers::users::promote_to_admin,
    ),
    components(schemas(
        crate::api::error::ErrorBody,
        handlers::Audit,
        handlers::auth::types::RegisterRequest,
        handlers::auth::types::LoginRequest,
        handlers::auth::types::LoginResponse,
        handlers::auth::types::AccountResponse,
        handlers::posts::PostRequest,
        handlers::posts::PostResponse,
        handlers::comments::CommentRequest,
        handlers::comments::CommentResponse,
        handlers::categories::CategoryRequest,
        handlers::categories::CategoryResponse,
        handlers::tags::TagRequest,
        handlers::tags::TagResponse,
    )),
    tags(
        (name = "auth", description = "Registration, login and token issuance"),
        (name = "posts", description = "Post CRUD"),
        (name = "comments", description = "Comments under posts"),
        (name = "categories", description = "Category management"),
        (name = "tags", description = "Tag management"),
        (name = "users", description = "Account profile and roles"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

/// The assembled OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/auth/register",
            "/auth/login",
            "/posts",
            "/posts/{id}",
            "/posts/{id}/comments",
            "/comments/{id}",
            "/categories",
            "/categories/{id}",
            "/tags",
            "/tags/{id}",
            "/users/me",
            "/users/{id}/promote-to-admin",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
