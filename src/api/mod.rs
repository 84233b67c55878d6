// REST API served behind the authentication layer

mod error;

pub use error::{ApiError, ErrorBody, ErrorResponse};

use axum::{
    Router,
    extract::Path,
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthContext;
use crate::middleware::{AuthLayerState, CurrentUser, authenticate};

/// Routes whose protection comes from the compiled route table.
pub fn create_router(auth: AuthLayerState) -> Router {
    let api = Router::new()
        .route("/api/v1/me", get(me))
        .route("/api/v1/posts", get(list_posts))
        .route("/api/v1/posts/{id}", get(show_post))
        .route_layer(middleware::from_fn_with_state(auth, authenticate));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Who the caller is and which provider vouched for them.
async fn me(ctx: AuthContext) -> Result<Json<Value>, ApiError> {
    let user = ctx.require_user().await?;

    Ok(Json(serde_json::json!({
        "user": user,
        "display": user.display(),
        "provider": ctx.provider_used(),
    })))
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Post {
    id: u64,
    title: &'static str,
    draft: bool,
}

const POSTS: &[Post] = &[
    Post {
        id: 1,
        title: "Chaining authentication providers",
        draft: false,
    },
    Post {
        id: 2,
        title: "Optional authentication in practice",
        draft: false,
    },
    Post {
        id: 3,
        title: "Route groups and precedence",
        draft: true,
    },
];

/// Anonymous callers see published posts; authenticated ones also see drafts.
async fn list_posts(CurrentUser(user): CurrentUser) -> Json<Value> {
    let posts: Vec<&Post> = POSTS
        .iter()
        .filter(|p| !p.draft || user.is_some())
        .collect();

    Json(serde_json::json!({
        "posts": posts,
        "count": posts.len(),
        "viewer": user.map(|u| u.display()),
    }))
}

async fn show_post(
    Path(id): Path<u64>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let post = POSTS
        .iter()
        .find(|p| p.id == id && (!p.draft || user.is_some()))
        .ok_or(ApiError::NotFound { resource: "post" })?;

    Ok(Json(serde_json::json!({ "post": post })))
}
