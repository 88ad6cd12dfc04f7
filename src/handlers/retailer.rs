use axum::{extract::Path, http::Method, routing::get, Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiResponse, ApiResult};
use crate::database;
use crate::error::ApiError;
use crate::middleware::roles::{self, Permissions};
use crate::middleware::AuthUser;
use crate::models::{Retailer, Role};

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/retailer", roles::ADMIN),
    (Method::GET, "/retailer/:id", roles::ADMIN_OR_RETAILER),
    (Method::POST, "/retailer", roles::ADMIN),
    (Method::PUT, "/retailer/:id", roles::ADMIN),
    (Method::DELETE, "/retailer/:id", roles::ADMIN),
];

pub fn routes() -> Router {
    Router::new()
        .route("/retailer", get(list_retailers).post(create_retailer))
        .route(
            "/retailer/:id",
            get(get_retailer).put(update_retailer).delete(delete_retailer),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRetailerPayload {
    pub is_active: bool,
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "brand name must not be empty"))]
    pub brand_name: String,
    pub logo: Uuid,
    #[validate(length(min = 1, message = "commercial record number must not be empty"))]
    pub commercial_record_number: String,
    #[validate(length(min = 1, message = "company name must not be empty"))]
    pub company_name: String,
    #[validate(email(message = "invalid representative email"))]
    pub representative_email: String,
    #[validate(length(min = 1, message = "representative mobile number must not be empty"))]
    pub representative_mobile_number: String,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRetailerPayload {
    pub is_active: Option<bool>,
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, message = "brand name must not be empty"))]
    pub brand_name: Option<String>,
    pub logo: Option<Uuid>,
    #[validate(length(min = 1, message = "commercial record number must not be empty"))]
    pub commercial_record_number: Option<String>,
    #[validate(length(min = 1, message = "company name must not be empty"))]
    pub company_name: Option<String>,
    #[validate(email(message = "invalid representative email"))]
    pub representative_email: Option<String>,
    #[validate(length(min = 1, message = "representative mobile number must not be empty"))]
    pub representative_mobile_number: Option<String>,
    pub plan_id: Option<Uuid>,
}

async fn find_retailer(id: Uuid) -> Result<Option<Retailer>, ApiError> {
    Ok(sqlx::query_as::<_, Retailer>("SELECT * FROM retailers WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?)
}

/// GET /retailer - all retailers, active or not
async fn list_retailers() -> ApiResult<Vec<Retailer>> {
    let retailers = sqlx::query_as::<_, Retailer>("SELECT * FROM retailers ORDER BY created_at")
        .fetch_all(database::pool())
        .await?;
    Ok(ApiResponse::success(retailers))
}

/// GET /retailer/:id - admins see every retailer, a retailer only their own
async fn get_retailer(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Retailer> {
    let retailer = find_retailer(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find retailer with ID \"{id}\"")))?;

    if !auth.roles.contains(&Role::Administrator) && retailer.user_id != auth.id {
        tracing::warn!(user = %auth.id, retailer = %retailer.id, "Cross-retailer read refused");
        return Err(ApiError::forbidden("You can't see other retailers information"));
    }

    Ok(ApiResponse::success(retailer))
}

/// POST /retailer
async fn create_retailer(Json(payload): Json<CreateRetailerPayload>) -> ApiResult<Retailer> {
    payload.validate()?;

    let retailer = sqlx::query_as::<_, Retailer>(
        "INSERT INTO retailers (is_active, user_id, brand_name, logo, commercial_record_number, \
                                company_name, representative_email, representative_mobile_number, plan_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(payload.is_active)
    .bind(payload.user_id)
    .bind(&payload.brand_name)
    .bind(payload.logo)
    .bind(&payload.commercial_record_number)
    .bind(&payload.company_name)
    .bind(&payload.representative_email)
    .bind(&payload.representative_mobile_number)
    .bind(payload.plan_id)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::created(retailer))
}

/// PUT /retailer/:id - partial update
async fn update_retailer(Path(id): Path<Uuid>, Json(payload): Json<UpdateRetailerPayload>) -> ApiResult<Retailer> {
    payload.validate()?;

    let retailer = sqlx::query_as::<_, Retailer>(
        "UPDATE retailers SET \
             is_active = COALESCE($2, is_active), \
             user_id = COALESCE($3, user_id), \
             brand_name = COALESCE($4, brand_name), \
             logo = COALESCE($5, logo), \
             commercial_record_number = COALESCE($6, commercial_record_number), \
             company_name = COALESCE($7, company_name), \
             representative_email = COALESCE($8, representative_email), \
             representative_mobile_number = COALESCE($9, representative_mobile_number), \
             plan_id = COALESCE($10, plan_id), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.is_active)
    .bind(payload.user_id)
    .bind(&payload.brand_name)
    .bind(payload.logo)
    .bind(&payload.commercial_record_number)
    .bind(&payload.company_name)
    .bind(&payload.representative_email)
    .bind(&payload.representative_mobile_number)
    .bind(payload.plan_id)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find retailer with ID \"{id}\"")))?;

    Ok(ApiResponse::success(retailer))
}

/// DELETE /retailer/:id - mark the retailer as disabled
async fn delete_retailer(Path(id): Path<Uuid>) -> ApiResult<Retailer> {
    let retailer = sqlx::query_as::<_, Retailer>(
        "UPDATE retailers SET is_active = FALSE, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(database::pool())
    .await?
    .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find retailer with ID \"{id}\"")))?;

    Ok(ApiResponse::success(retailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> CreateRetailerPayload {
        CreateRetailerPayload {
            is_active: true,
            user_id: Uuid::new_v4(),
            brand_name: "Some Brand".to_string(),
            logo: Uuid::new_v4(),
            commercial_record_number: "CRN-1234".to_string(),
            company_name: "Some Company".to_string(),
            representative_email: "rep@example.com".to_string(),
            representative_mobile_number: "+12024561111".to_string(),
            plan_id: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(valid_payload().validate().is_ok());
    }

    #[test]
    fn bad_representative_email_is_refused() {
        let mut payload = valid_payload();
        payload.representative_email = "nope".to_string();
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("representative_email"));
    }

    #[test]
    fn empty_brand_name_is_refused() {
        let mut payload = valid_payload();
        payload.brand_name = String::new();
        assert!(payload.validate().is_err());
    }
}
