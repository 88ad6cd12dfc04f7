use axum::{
    extract::{MatchedPath, Request},
    http::Method,
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::models::Role;

/// Per-route permission metadata: method, route template, allowed roles.
pub type Permissions = &'static [(Method, &'static str, &'static [Role])];

pub const ADMIN: &[Role] = &[Role::Administrator];
pub const ADMIN_OR_RETAILER: &[Role] = &[Role::Administrator, Role::Retailer];
pub const USER: &[Role] = &[Role::User];
/// Routes open to unauthenticated callers
pub const PUBLIC: &[Role] = &[Role::Unknown];

/// Paths outside the permission system entirely
const IGNORED: &[&str] = &["/", "/health"];

// Aggregated permission table, contributed by each feature module the same
// way each of its routes is merged into the router.
static PERMISSION_TABLE: Lazy<Vec<(Method, &'static str, &'static [Role])>> = Lazy::new(|| {
    let tables: &[Permissions] = &[
        crate::handlers::user::PERMISSIONS,
        crate::handlers::profile::PERMISSIONS,
        crate::handlers::retailer::PERMISSIONS,
        crate::handlers::branch::PERMISSIONS,
        crate::handlers::offer::PERMISSIONS,
        crate::handlers::plan::PERMISSIONS,
    ];

    tables
        .iter()
        .flat_map(|table| table.iter().cloned())
        .collect()
});

/// Look up the allowed roles for a routed request. HEAD requests are served
/// by GET handlers and carry the GET permissions.
pub fn lookup(method: &Method, path: &str) -> Option<&'static [Role]> {
    let method = if *method == Method::HEAD { &Method::GET } else { method };
    PERMISSION_TABLE
        .iter()
        .find(|(m, p, _)| m == method && *p == path)
        .map(|(_, _, allowed)| *allowed)
}

/// Authorization gate, applied router-wide after the JWT middleware.
///
/// Inspects the matched route template against the declarative permission
/// table. Routes without an entry are refused: a route that forgot to
/// declare its roles must not be reachable.
pub async fn gate(request: Request, next: Next) -> Result<Response, ApiError> {
    // No matched path means no route matched; let the router 404.
    let Some(path) = request.extensions().get::<MatchedPath>().map(|m| m.as_str().to_string()) else {
        return Ok(next.run(request).await);
    };

    if IGNORED.contains(&path.as_str()) {
        return Ok(next.run(request).await);
    }

    let Some(allowed) = lookup(request.method(), &path) else {
        debug!("No access roles configured for route {}", path);
        return Err(ApiError::forbidden(format!(
            "That route should contain a configured roles section: {path}"
        )));
    };

    if allowed.contains(&Role::Unknown) {
        return Ok(next.run(request).await);
    }

    let Some(user) = request.extensions().get::<AuthUser>() else {
        return Err(ApiError::unauthorized("User not authorised"));
    };

    if allowed.iter().any(|required| user.roles.contains(required)) {
        return Ok(next.run(request).await);
    }

    warn!(user = %user.id, route = %path, "Unauthorized access attempt");
    Err(ApiError::forbidden(format!("You don't have access to the route {path}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn auth_user(roles: Vec<Role>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            login: "tester".to_string(),
            roles,
        }
    }

    /// Router with stub handlers on real route templates, so the gate sees
    /// the same matched paths production traffic produces.
    fn gated_router(user: Option<AuthUser>) -> Router {
        let mut router = Router::new()
            .route("/", get(|| async { "home" }))
            .route("/plan", get(|| async { "plans" }))
            .route("/user", get(|| async { "users" }))
            .route("/retailer/:id", get(|| async { "retailer" }))
            .route("/unlisted", get(|| async { "unlisted" }))
            .layer(middleware::from_fn(gate));

        if let Some(user) = user {
            // Outermost layer, so the extension is present before the gate runs
            router = router.layer(Extension(user));
        }
        router
    }

    async fn status_for(router: Router, method: Method, path: &str) -> StatusCode {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn ignored_paths_bypass_the_gate() {
        let status = status_for(gated_router(None), Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn public_routes_pass_without_a_user() {
        let status = status_for(gated_router(None), Method::GET, "/plan").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_requires_authentication() {
        let status = status_for(gated_router(None), Method::GET, "/user").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden() {
        let router = gated_router(Some(auth_user(vec![Role::User])));
        let status = status_for(router, Method::GET, "/user").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn matching_role_is_allowed() {
        let router = gated_router(Some(auth_user(vec![Role::Administrator])));
        let status = status_for(router, Method::GET, "/user").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn role_intersection_is_enough() {
        // /retailer/:id allows administrator or retailer
        let router = gated_router(Some(auth_user(vec![Role::Retailer, Role::User])));
        let status = status_for(router, Method::GET, "/retailer/abc").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn head_requests_follow_get_permissions() {
        let status = status_for(gated_router(None), Method::HEAD, "/plan").await;
        assert_eq!(status, StatusCode::OK);

        let status = status_for(gated_router(None), Method::HEAD, "/user").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unlisted_route_fails_closed() {
        let router = gated_router(Some(auth_user(vec![Role::Administrator])));
        let status = status_for(router, Method::GET, "/unlisted").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unmatched_request_falls_through_to_404() {
        let status = status_for(gated_router(None), Method::GET, "/no/such/route").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn every_registered_route_has_an_entry() {
        // The list mirrors handlers::router(); a route added there without a
        // permission entry would be refused by the gate at runtime.
        let expected: &[(Method, &str)] = &[
            (Method::GET, "/user"),
            (Method::GET, "/user/:id"),
            (Method::POST, "/user"),
            (Method::PUT, "/user/:id"),
            (Method::DELETE, "/user/:id"),
            (Method::POST, "/user/login"),
            (Method::PUT, "/user/auth"),
            (Method::PUT, "/user/logout"),
            (Method::GET, "/profile/:id"),
            (Method::POST, "/profile/list"),
            (Method::POST, "/profile"),
            (Method::PATCH, "/profile/:id"),
            (Method::DELETE, "/profile/:id"),
            (Method::GET, "/retailer"),
            (Method::GET, "/retailer/:id"),
            (Method::POST, "/retailer"),
            (Method::PUT, "/retailer/:id"),
            (Method::DELETE, "/retailer/:id"),
            (Method::GET, "/branch"),
            (Method::GET, "/branch/:id"),
            (Method::POST, "/branch"),
            (Method::PUT, "/branch/:id"),
            (Method::DELETE, "/branch/:id"),
            (Method::GET, "/offer"),
            (Method::GET, "/offer/:id"),
            (Method::POST, "/offer"),
            (Method::PUT, "/offer/:id"),
            (Method::DELETE, "/offer/:id"),
            (Method::GET, "/plan"),
            (Method::GET, "/plan/:id"),
            (Method::POST, "/plan"),
            (Method::PUT, "/plan/:id"),
            (Method::DELETE, "/plan/:id"),
        ];

        for (method, path) in expected {
            assert!(
                lookup(method, path).is_some(),
                "missing permission entry for {method} {path}"
            );
        }
    }

    #[test]
    fn login_is_public_and_user_management_is_admin_only() {
        assert_eq!(lookup(&Method::POST, "/user/login"), Some(PUBLIC));
        assert_eq!(lookup(&Method::POST, "/user"), Some(ADMIN));
        assert_eq!(lookup(&Method::DELETE, "/profile/:id"), Some(ADMIN));
        assert_eq!(lookup(&Method::POST, "/branch"), Some(ADMIN_OR_RETAILER));
    }
}
