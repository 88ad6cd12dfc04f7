use axum::{middleware, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::database;
use crate::error::ApiError;
use crate::middleware::{auth as auth_middleware, roles, AuthUser};
use crate::models::{Retailer, Role};

pub mod branch;
pub mod offer;
pub mod plan;
pub mod profile;
pub mod retailer;
pub mod user;

/// Assemble the full application router: one sub-router per feature behind
/// the JWT middleware and the roles gate, CORS and tracing outermost.
pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(user::routes())
        .merge(profile::routes())
        .merge(retailer::routes())
        .merge(branch::routes())
        .merge(offer::routes())
        .merge(plan::routes())
        // Request order: jwt_auth runs first, then the gate
        .layer(middleware::from_fn(roles::gate))
        .layer(middleware::from_fn(auth_middleware::jwt_auth))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Offers API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Retail offers backend - users, profiles, retailers, branches, offers and plans",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "POST /user/login (public)",
                "user": "/user (administrator)",
                "profile": "/profile",
                "retailer": "/retailer",
                "branch": "/branch",
                "offer": "/offer",
                "plan": "/plan"
            }
        }
    }))
}

async fn health() -> Result<Json<Value>, ApiError> {
    database::health_check()
        .await
        .map_err(|e| {
            tracing::error!("Health check failed: {}", e);
            ApiError::service_unavailable("Database temporarily unavailable")
        })?;

    Ok(Json(json!({ "success": true, "data": { "status": "ok" } })))
}

/// Resolve the retailer a caller wants to manage resources for.
///
/// Administrators may target any existing retailer. A caller with the
/// retailer role may only target the retailer owned by their own user
/// account. Everything else, including a nonexistent target, is refused
/// with the same 403 so callers cannot probe for retailer ids.
pub(crate) async fn authorize_retailer(auth: &AuthUser, retailer_id: Uuid) -> Result<Retailer, ApiError> {
    let refused = |auth: &AuthUser| {
        tracing::warn!(user = %auth.id, retailer = %retailer_id, "Refused retailer-scoped operation");
        ApiError::forbidden("You are not allowed to manage resources for that retailer")
    };

    let Some(retailer) = sqlx::query_as::<_, Retailer>("SELECT * FROM retailers WHERE id = $1")
        .bind(retailer_id)
        .fetch_optional(database::pool())
        .await?
    else {
        return Err(refused(auth));
    };

    if auth.roles.contains(&Role::Administrator) {
        return Ok(retailer);
    }

    if auth.roles.contains(&Role::Retailer) {
        let owned: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM retailers WHERE user_id = $1")
            .bind(auth.id)
            .fetch_optional(database::pool())
            .await?;
        if owned.map(|(id,)| id) == Some(retailer_id) {
            return Ok(retailer);
        }
    }

    Err(refused(auth))
}
