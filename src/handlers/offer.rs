use std::collections::BTreeSet;

use axum::{extract::Path, http::Method, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiResponse, ApiResult};
use crate::database;
use crate::error::ApiError;
use crate::handlers::authorize_retailer;
use crate::middleware::roles::{self, Permissions};
use crate::middleware::AuthUser;
use crate::models::{Offer, Retailer};

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/offer", roles::PUBLIC),
    (Method::GET, "/offer/:id", roles::PUBLIC),
    (Method::POST, "/offer", roles::ADMIN_OR_RETAILER),
    (Method::PUT, "/offer/:id", roles::ADMIN_OR_RETAILER),
    (Method::DELETE, "/offer/:id", roles::ADMIN_OR_RETAILER),
];

pub fn routes() -> Router {
    Router::new()
        .route("/offer", get(list_offers).post(create_offer))
        .route("/offer/:id", get(get_offer).put(update_offer).delete(delete_offer))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOfferPayload {
    #[validate(length(min = 1, message = "offer title must not be empty"))]
    pub title: String,
    pub retailer_id: Uuid,
    pub campaign_start_date: Option<DateTime<Utc>>,
    pub campaign_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub branches: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOfferPayload {
    #[validate(length(min = 1, message = "offer title must not be empty"))]
    pub title: Option<String>,
    pub retailer_id: Option<Uuid>,
    pub campaign_start_date: Option<DateTime<Utc>>,
    pub campaign_end_date: Option<DateTime<Utc>>,
    pub branches: Option<Vec<Uuid>>,
}

async fn find_offer(id: Uuid) -> Result<Option<Offer>, ApiError> {
    Ok(sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?)
}

/// Every branch attached to an offer must belong to the offer's retailer.
async fn assert_branches_belong(retailer_id: Uuid, branches: &[Uuid]) -> Result<(), ApiError> {
    let unique: BTreeSet<Uuid> = branches.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = unique.iter().copied().collect();
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM branches WHERE id = ANY($1) AND retailer_id = $2")
            .bind(&ids)
            .bind(retailer_id)
            .fetch_one(database::pool())
            .await?;

    if count as usize != unique.len() {
        return Err(ApiError::forbidden(format!(
            "Offer branches must belong to retailer with ID \"{retailer_id}\""
        )));
    }

    Ok(())
}

/// GET /offer - offers of active retailers only
async fn list_offers() -> ApiResult<Vec<Offer>> {
    let offers = sqlx::query_as::<_, Offer>(
        "SELECT o.* FROM offers o \
         JOIN retailers r ON r.id = o.retailer_id \
         WHERE r.is_active ORDER BY o.created_at",
    )
    .fetch_all(database::pool())
    .await?;
    Ok(ApiResponse::success(offers))
}

/// GET /offer/:id - refused when the owning retailer is disabled
async fn get_offer(Path(id): Path<Uuid>) -> ApiResult<Offer> {
    let offer = find_offer(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find offer with ID \"{id}\"")))?;

    let retailer = sqlx::query_as::<_, Retailer>("SELECT * FROM retailers WHERE id = $1")
        .bind(offer.retailer_id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| {
            ApiError::unprocessable_entity(format!("Can't find retailer for requested offer ID \"{id}\""))
        })?;

    if !retailer.is_active {
        return Err(ApiError::forbidden(format!("Retailer with ID \"{}\" is disabled", retailer.id)));
    }

    Ok(ApiResponse::success(offer))
}

/// POST /offer
async fn create_offer(Extension(auth): Extension<AuthUser>, Json(payload): Json<CreateOfferPayload>) -> ApiResult<Offer> {
    payload.validate()?;
    authorize_retailer(&auth, payload.retailer_id).await?;
    assert_branches_belong(payload.retailer_id, &payload.branches).await?;

    let offer = sqlx::query_as::<_, Offer>(
        "INSERT INTO offers (title, retailer_id, campaign_start_date, campaign_end_date, branches) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&payload.title)
    .bind(payload.retailer_id)
    .bind(payload.campaign_start_date)
    .bind(payload.campaign_end_date)
    .bind(&payload.branches)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::created(offer))
}

/// PUT /offer/:id - partial update with the same ownership checks as create
async fn update_offer(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOfferPayload>,
) -> ApiResult<Offer> {
    payload.validate()?;

    let offer = find_offer(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find offer with ID \"{id}\"")))?;

    let retailer_id = payload.retailer_id.unwrap_or(offer.retailer_id);
    authorize_retailer(&auth, retailer_id).await?;

    let branches = payload.branches.as_ref().unwrap_or(&offer.branches);
    assert_branches_belong(retailer_id, branches).await?;

    let offer = sqlx::query_as::<_, Offer>(
        "UPDATE offers SET \
             title = COALESCE($2, title), \
             retailer_id = COALESCE($3, retailer_id), \
             campaign_start_date = COALESCE($4, campaign_start_date), \
             campaign_end_date = COALESCE($5, campaign_end_date), \
             branches = COALESCE($6, branches), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.title)
    .bind(payload.retailer_id)
    .bind(payload.campaign_start_date)
    .bind(payload.campaign_end_date)
    .bind(&payload.branches)
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::success(offer))
}

/// DELETE /offer/:id - hard delete, returning the removed record
async fn delete_offer(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Offer> {
    let offer = find_offer(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find offer with ID \"{id}\"")))?;

    authorize_retailer(&auth, offer.retailer_id).await?;

    sqlx::query("DELETE FROM offers WHERE id = $1")
        .bind(id)
        .execute(database::pool())
        .await?;

    Ok(ApiResponse::success(offer))
}
