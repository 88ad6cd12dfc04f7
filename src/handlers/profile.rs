use axum::{
    extract::Path,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiResponse, ApiResult};
use crate::database;
use crate::error::ApiError;
use crate::middleware::roles::{self, Permissions};
use crate::models::Profile;

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/profile/:id", roles::PUBLIC),
    (Method::POST, "/profile/list", roles::PUBLIC),
    (Method::POST, "/profile", roles::USER),
    (Method::PATCH, "/profile/:id", roles::USER),
    (Method::DELETE, "/profile/:id", roles::ADMIN),
];

pub fn routes() -> Router {
    Router::new()
        .route("/profile", post(create_profile))
        .route("/profile/list", post(list_profiles))
        .route(
            "/profile/:id",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfilePayload {
    pub user_id: Uuid,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "first name must not be empty"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name must not be empty"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfilePayload {
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "first name must not be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "last name must not be empty"))]
    pub last_name: Option<String>,
}

/// Pagination envelope for POST /profile/list. Sort accepts a whitelisted
/// column name, prefixed with `-` for descending order.
#[derive(Debug, Default, Deserialize)]
pub struct ListPayload {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

const SORTABLE: &[&str] = &["created_at", "updated_at", "email", "first_name", "last_name"];

/// Clamp client paging values; negative skip or limit would be refused by
/// the database and must not reach it.
fn page_bounds(payload: &ListPayload) -> (i64, Option<i64>) {
    (
        payload.skip.unwrap_or(0).max(0),
        payload.limit.map(|limit| limit.max(0)),
    )
}

fn order_clause(sort: Option<&str>) -> Result<String, ApiError> {
    let Some(sort) = sort else {
        return Ok("created_at ASC".to_string());
    };

    let (column, direction) = match sort.strip_prefix('-') {
        Some(column) => (column, "DESC"),
        None => (sort, "ASC"),
    };

    if !SORTABLE.contains(&column) {
        return Err(ApiError::bad_request(format!("Cannot sort profiles by \"{column}\"")));
    }

    Ok(format!("{column} {direction}"))
}

fn missing_profile(id: Uuid) -> ApiError {
    ApiError::unprocessable_entity(format!("Can't find profile with ID: {id}"))
}

/// GET /profile/:id
async fn get_profile(Path(id): Path<Uuid>) -> ApiResult<Profile> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| missing_profile(id))?;

    Ok(ApiResponse::success(profile))
}

/// POST /profile/list - paged listing
async fn list_profiles(payload: Option<Json<ListPayload>>) -> ApiResult<Vec<Profile>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let order = order_clause(payload.sort.as_deref())?;
    let (skip, limit) = page_bounds(&payload);

    // The order clause is assembled from the whitelist above, never from
    // raw client input.
    let sql = format!("SELECT * FROM profiles ORDER BY {order} OFFSET $1 LIMIT $2");
    let profiles = sqlx::query_as::<_, Profile>(&sql)
        .bind(skip)
        .bind(limit) // NULL means no limit
        .fetch_all(database::pool())
        .await?;

    Ok(ApiResponse::success(profiles))
}

/// POST /profile - create the profile for a user account
async fn create_profile(Json(payload): Json<CreateProfilePayload>) -> ApiResult<Profile> {
    payload.validate()?;

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM profiles WHERE user_id = $1")
        .bind(payload.user_id)
        .fetch_optional(database::pool())
        .await?;
    if existing.is_some() {
        return Err(ApiError::unprocessable_entity(format!(
            "Profile for user \"{}\" already exists",
            payload.user_id
        )));
    }

    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (user_id, email, first_name, last_name) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(payload.user_id)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::created(profile))
}

/// PATCH /profile/:id - partial update
async fn update_profile(Path(id): Path<Uuid>, Json(payload): Json<UpdateProfilePayload>) -> ApiResult<Profile> {
    payload.validate()?;

    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET \
             email = COALESCE($2, email), \
             first_name = COALESCE($3, first_name), \
             last_name = COALESCE($4, last_name), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| missing_profile(id))?;

    Ok(ApiResponse::success(profile))
}

/// DELETE /profile/:id - remove the profile, returning the deleted record
async fn delete_profile(Path(id): Path<Uuid>) -> ApiResult<Profile> {
    let profile = sqlx::query_as::<_, Profile>("DELETE FROM profiles WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| missing_profile(id))?;

    Ok(ApiResponse::success(profile))
}
