use axum::{
    extract::Path,
    http::Method,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::{ApiResponse, ApiResult, ACCESS_TOKEN_HEADER};
use crate::auth::{self, Claims};
use crate::database;
use crate::error::ApiError;
use crate::middleware::roles::{self, Permissions};
use crate::middleware::AuthUser;
use crate::models::{Role, User};

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/user", roles::ADMIN),
    (Method::GET, "/user/:id", roles::ADMIN),
    (Method::POST, "/user", roles::ADMIN),
    (Method::PUT, "/user/:id", roles::ADMIN),
    (Method::DELETE, "/user/:id", roles::ADMIN),
    (Method::POST, "/user/login", roles::PUBLIC),
    (Method::PUT, "/user/auth", roles::USER),
    (Method::PUT, "/user/logout", roles::USER),
];

pub fn routes() -> Router {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/login", post(login_user))
        .route("/user/auth", put(auth_user))
        .route("/user/logout", put(logout_user))
        .route("/user/:id", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserPayload {
    #[validate(length(min = 1, message = "login must not be empty"))]
    pub login: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
    #[validate(
        length(min = 1, message = "at least one role is required"),
        custom(function = known_roles)
    )]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, message = "login must not be empty"))]
    pub login: Option<String>,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: Option<String>,
    #[validate(
        length(min = 1, message = "at least one role is required"),
        custom(function = known_roles)
    )]
    pub roles: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(length(min = 1, message = "login must not be empty"))]
    pub login: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

fn known_roles(values: &[String]) -> Result<(), ValidationError> {
    for value in values {
        if Role::parse(value).is_none() {
            let mut error = ValidationError::new("unknown_role");
            error.message = Some(format!("\"{value}\" is not an allowed role").into());
            return Err(error);
        }
    }
    Ok(())
}

async fn find_user(id: Uuid) -> Result<Option<User>, ApiError> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?)
}

/// GET /user - list all users
async fn list_users() -> ApiResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
        .fetch_all(database::pool())
        .await?;
    Ok(ApiResponse::success(users))
}

/// GET /user/:id - detailed information about one user
async fn get_user(Path(id): Path<Uuid>) -> ApiResult<User> {
    let user = find_user(id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Can't find user with ID: {id}")))?;
    Ok(ApiResponse::success(user))
}

/// POST /user - create a new user record
async fn create_user(Json(payload): Json<CreateUserPayload>) -> ApiResult<User> {
    payload.validate()?;

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE login = $1")
        .bind(&payload.login)
        .fetch_optional(database::pool())
        .await?;
    if existing.is_some() {
        return Err(ApiError::unprocessable_entity(format!(
            "User with login \"{}\" already exists",
            payload.login
        )));
    }

    let password_hash = auth::hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (login, password_hash, roles) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&payload.login)
    .bind(&password_hash)
    .bind(&payload.roles)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::success(user))
}

/// PUT /user/:id - partial update of an existing user
async fn update_user(Path(id): Path<Uuid>, Json(payload): Json<UpdateUserPayload>) -> ApiResult<User> {
    payload.validate()?;

    if find_user(id).await?.is_none() {
        return Err(ApiError::bad_request(format!("Can't find user with ID: {id}")));
    }

    if let Some(login) = &payload.login {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE login = $1 AND id <> $2")
            .bind(login)
            .bind(id)
            .fetch_optional(database::pool())
            .await?;
        if existing.is_some() {
            return Err(ApiError::unprocessable_entity(format!(
                "User with login \"{login}\" already exists"
            )));
        }
    }

    let password_hash = match &payload.password {
        Some(password) => Some(auth::hash_password(password)?),
        None => None,
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET \
             login = COALESCE($2, login), \
             password_hash = COALESCE($3, password_hash), \
             roles = COALESCE($4, roles), \
             is_active = COALESCE($5, is_active), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.login)
    .bind(&password_hash)
    .bind(&payload.roles)
    .bind(payload.is_active)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::success(user))
}

/// DELETE /user/:id - disallow the user to log in, keeping the record
async fn delete_user(Path(id): Path<Uuid>) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| ApiError::bad_request(format!("Can't find user with ID: {id}")))?;

    Ok(ApiResponse::success(user))
}

/// POST /user/login - validate credentials and issue an access token
async fn login_user(Json(payload): Json<LoginPayload>) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE login = $1")
        .bind(&payload.login)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| ApiError::unauthorized("User does not exist"))?;

    if !user.is_active {
        return Err(ApiError::unauthorized("User account is disabled"));
    }

    if !auth::verify_password(&payload.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Password is invalid"));
    }

    let token = auth::generate_jwt(&Claims::for_user(&user))?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET token = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(&token)
    .fetch_one(database::pool())
    .await?;

    Ok((
        AppendHeaders([(ACCESS_TOKEN_HEADER, token)]),
        ApiResponse::success(user),
    ))
}

/// PUT /user/auth - return the authenticated user (whoami)
async fn auth_user(Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let user = find_user(auth.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User does not exist"))?;
    Ok(ApiResponse::success(user))
}

/// PUT /user/logout - drop the stored authorization token
async fn logout_user(Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET token = NULL, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(auth.id)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| ApiError::unauthorized("User does not exist"))?;

    Ok(ApiResponse::success(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_accepts_known_roles() {
        let payload = CreateUserPayload {
            login: "alice".to_string(),
            password: "password123".to_string(),
            roles: vec!["administrator".to_string(), "user".to_string()],
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn create_payload_rejects_unknown_role() {
        let payload = CreateUserPayload {
            login: "alice".to_string(),
            password: "password123".to_string(),
            roles: vec!["superuser".to_string()],
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("roles"));
    }

    #[test]
    fn create_payload_rejects_empty_fields() {
        let payload = CreateUserPayload {
            login: String::new(),
            password: String::new(),
            roles: vec![],
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("login"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("roles"));
    }

    #[test]
    fn update_payload_allows_omitted_fields() {
        let payload = UpdateUserPayload {
            login: None,
            password: None,
            roles: None,
            is_active: Some(false),
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn update_payload_still_checks_present_fields() {
        let payload = UpdateUserPayload {
            login: Some(String::new()),
            password: None,
            roles: Some(vec!["bogus".to_string()]),
            is_active: None,
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("login"));
        assert!(fields.contains_key("roles"));
    }
}
