use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth;
use crate::database;
use crate::error::ApiError;
use crate::models::{Role, User};

/// Authenticated user context extracted from a validated JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub login: String,
    pub roles: Vec<Role>,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            roles: user.role_set(),
        }
    }
}

/// Bearer token middleware.
///
/// A missing Authorization header is not an error here: public routes carry
/// none, and the roles gate decides whether authentication is required. A
/// header that is present but malformed, expired, or pointing at a missing
/// or disabled account is refused outright.
pub async fn jwt_auth(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = match extract_bearer(request.headers())? {
        Some(token) => token,
        None => return Ok(next.run(request).await),
    };

    let claims = auth::validate_jwt(&token)?;

    // The token only proves who the caller was at issuance; the account
    // must still exist and be active, as the original validate function
    // re-checks on every request.
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| ApiError::unauthorized("User does not exist"))?;

    if !user.is_active {
        return Err(ApiError::unauthorized("User account is disabled"));
    }

    request.extensions_mut().insert(AuthUser::from(&user));
    Ok(next.run(request).await)
}

/// Pull the bearer token out of the Authorization header, if any.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authorization header must use Bearer token format"))?;

    if token.trim().is_empty() {
        return Err(ApiError::unauthorized("Empty bearer token"));
    }

    Ok(Some(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn no_header_is_not_an_error() {
        assert!(extract_bearer(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn bearer_token_is_extracted() {
        let token = extract_bearer(&headers_with("Bearer abc.def.ghi")).unwrap();
        assert_eq!(token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_scheme_is_refused() {
        assert!(extract_bearer(&headers_with("Basic dXNlcjpwYXNz")).is_err());
    }

    #[test]
    fn empty_bearer_token_is_refused() {
        assert!(extract_bearer(&headers_with("Bearer ")).is_err());
    }
}
