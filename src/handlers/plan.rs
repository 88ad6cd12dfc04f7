use axum::{extract::Path, http::Method, routing::get, Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiResponse, ApiResult};
use crate::database;
use crate::error::ApiError;
use crate::middleware::roles::{self, Permissions};
use crate::models::Plan;

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/plan", roles::PUBLIC),
    (Method::GET, "/plan/:id", roles::PUBLIC),
    (Method::POST, "/plan", roles::ADMIN_OR_RETAILER),
    (Method::PUT, "/plan/:id", roles::ADMIN_OR_RETAILER),
    (Method::DELETE, "/plan/:id", roles::ADMIN_OR_RETAILER),
];

pub fn routes() -> Router {
    Router::new()
        .route("/plan", get(list_plans).post(create_plan))
        .route("/plan/:id", get(get_plan).put(update_plan).delete(delete_plan))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanPayload {
    #[validate(length(min = 1, message = "plan name must not be empty"))]
    pub name: String,
    #[validate(range(min = 0, message = "branch limit cannot be negative"))]
    pub maximum_number_of_branches: i32,
    #[validate(range(min = 0, message = "offer limit cannot be negative"))]
    pub maximum_number_of_offers: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanPayload {
    #[validate(length(min = 1, message = "plan name must not be empty"))]
    pub name: Option<String>,
    #[validate(range(min = 0, message = "branch limit cannot be negative"))]
    pub maximum_number_of_branches: Option<i32>,
    #[validate(range(min = 0, message = "offer limit cannot be negative"))]
    pub maximum_number_of_offers: Option<i32>,
}

/// GET /plan
async fn list_plans() -> ApiResult<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY created_at")
        .fetch_all(database::pool())
        .await?;
    Ok(ApiResponse::success(plans))
}

/// GET /plan/:id
async fn get_plan(Path(id): Path<Uuid>) -> ApiResult<Plan> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find plan with ID \"{id}\"")))?;
    Ok(ApiResponse::success(plan))
}

/// POST /plan
async fn create_plan(Json(payload): Json<CreatePlanPayload>) -> ApiResult<Plan> {
    payload.validate()?;

    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (name, maximum_number_of_branches, maximum_number_of_offers) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&payload.name)
    .bind(payload.maximum_number_of_branches)
    .bind(payload.maximum_number_of_offers)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::created(plan))
}

/// PUT /plan/:id - partial update
async fn update_plan(Path(id): Path<Uuid>, Json(payload): Json<UpdatePlanPayload>) -> ApiResult<Plan> {
    payload.validate()?;

    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans SET \
             name = COALESCE($2, name), \
             maximum_number_of_branches = COALESCE($3, maximum_number_of_branches), \
             maximum_number_of_offers = COALESCE($4, maximum_number_of_offers), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.name)
    .bind(payload.maximum_number_of_branches)
    .bind(payload.maximum_number_of_offers)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find plan with ID \"{id}\"")))?;

    Ok(ApiResponse::success(plan))
}

/// DELETE /plan/:id - refused while any retailer is assigned to the plan
async fn delete_plan(Path(id): Path<Uuid>) -> ApiResult<Plan> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find plan with ID \"{id}\"")))?;

    let (assigned,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM retailers WHERE plan_id = $1")
        .bind(id)
        .fetch_one(database::pool())
        .await?;
    if assigned > 0 {
        return Err(ApiError::unprocessable_entity(
            "You can't delete plans assigned to retailers",
        ));
    }

    sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(database::pool())
        .await?;

    Ok(ApiResponse::success(plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limits_are_refused() {
        let payload = CreatePlanPayload {
            name: "Starter".to_string(),
            maximum_number_of_branches: -1,
            maximum_number_of_offers: 10,
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("maximum_number_of_branches"));
    }

    #[test]
    fn zero_limits_are_allowed() {
        let payload = CreatePlanPayload {
            name: "Free".to_string(),
            maximum_number_of_branches: 0,
            maximum_number_of_offers: 0,
        };
        assert!(payload.validate().is_ok());
    }
}
