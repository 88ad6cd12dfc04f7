use axum::{extract::Path, http::Method, routing::get, Extension, Json, Router};
use serde::Deserialize;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::{ApiResponse, ApiResult};
use crate::database;
use crate::error::ApiError;
use crate::handlers::authorize_retailer;
use crate::middleware::roles::{self, Permissions};
use crate::middleware::AuthUser;
use crate::models::{Branch, GeoPoint, Retailer};

pub const PERMISSIONS: Permissions = &[
    (Method::GET, "/branch", roles::PUBLIC),
    (Method::GET, "/branch/:id", roles::PUBLIC),
    (Method::POST, "/branch", roles::ADMIN_OR_RETAILER),
    (Method::PUT, "/branch/:id", roles::ADMIN_OR_RETAILER),
    (Method::DELETE, "/branch/:id", roles::ADMIN_OR_RETAILER),
];

pub fn routes() -> Router {
    Router::new()
        .route("/branch", get(list_branches).post(create_branch))
        .route(
            "/branch/:id",
            get(get_branch).put(update_branch).delete(delete_branch),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBranchPayload {
    #[validate(length(min = 1, message = "branch name must not be empty"))]
    pub name: String,
    pub retailer_id: Uuid,
    #[validate(custom(function = geo_point))]
    pub location: GeoPoint,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBranchPayload {
    #[validate(length(min = 1, message = "branch name must not be empty"))]
    pub name: Option<String>,
    pub retailer_id: Option<Uuid>,
    #[validate(custom(function = geo_point))]
    pub location: Option<GeoPoint>,
}

pub(crate) fn geo_point(point: &GeoPoint) -> Result<(), ValidationError> {
    if point.kind != "Point" {
        let mut error = ValidationError::new("geojson_type");
        error.message = Some("only GeoJSON Point is supported".into());
        return Err(error);
    }
    if point.coordinates.len() != 2 {
        let mut error = ValidationError::new("geojson_coordinates");
        error.message = Some("coordinates must be [longitude, latitude]".into());
        return Err(error);
    }
    Ok(())
}

async fn find_branch(id: Uuid) -> Result<Option<Branch>, ApiError> {
    Ok(sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE id = $1")
        .bind(id)
        .fetch_optional(database::pool())
        .await?)
}

/// GET /branch - branches of active retailers only
async fn list_branches() -> ApiResult<Vec<Branch>> {
    let branches = sqlx::query_as::<_, Branch>(
        "SELECT b.* FROM branches b \
         JOIN retailers r ON r.id = b.retailer_id \
         WHERE r.is_active ORDER BY b.created_at",
    )
    .fetch_all(database::pool())
    .await?;
    Ok(ApiResponse::success(branches))
}

/// GET /branch/:id - refused when the owning retailer is disabled
async fn get_branch(Path(id): Path<Uuid>) -> ApiResult<Branch> {
    let branch = find_branch(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find branch with ID \"{id}\"")))?;

    let retailer = sqlx::query_as::<_, Retailer>("SELECT * FROM retailers WHERE id = $1")
        .bind(branch.retailer_id)
        .fetch_optional(database::pool())
        .await?
        .ok_or_else(|| {
            ApiError::unprocessable_entity(format!("Can't find retailer for requested branch ID \"{id}\""))
        })?;

    if !retailer.is_active {
        return Err(ApiError::forbidden(format!("Retailer with ID \"{}\" is disabled", retailer.id)));
    }

    Ok(ApiResponse::success(branch))
}

/// POST /branch - ownership checked against the target retailer
async fn create_branch(Extension(auth): Extension<AuthUser>, Json(payload): Json<CreateBranchPayload>) -> ApiResult<Branch> {
    payload.validate()?;
    authorize_retailer(&auth, payload.retailer_id).await?;

    let branch = sqlx::query_as::<_, Branch>(
        "INSERT INTO branches (name, retailer_id, location) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&payload.name)
    .bind(payload.retailer_id)
    .bind(Jsonb(&payload.location))
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::created(branch))
}

/// PUT /branch/:id - partial update; moving the branch to another retailer
/// requires authorization for the new retailer as well
async fn update_branch(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBranchPayload>,
) -> ApiResult<Branch> {
    payload.validate()?;

    let branch = find_branch(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find branch with ID \"{id}\"")))?;

    authorize_retailer(&auth, branch.retailer_id).await?;
    if let Some(target) = payload.retailer_id {
        if target != branch.retailer_id {
            authorize_retailer(&auth, target).await?;
        }
    }

    let branch = sqlx::query_as::<_, Branch>(
        "UPDATE branches SET \
             name = COALESCE($2, name), \
             retailer_id = COALESCE($3, retailer_id), \
             location = COALESCE($4, location), \
             updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.name)
    .bind(payload.retailer_id)
    .bind(payload.location.as_ref().map(Jsonb))
    .fetch_one(database::pool())
    .await?;

    Ok(ApiResponse::success(branch))
}

/// DELETE /branch/:id - hard delete, returning the removed record
async fn delete_branch(Extension(auth): Extension<AuthUser>, Path(id): Path<Uuid>) -> ApiResult<Branch> {
    let branch = find_branch(id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Can't find branch with ID \"{id}\"")))?;

    authorize_retailer(&auth, branch.retailer_id).await?;

    sqlx::query("DELETE FROM branches WHERE id = $1")
        .bind(id)
        .execute(database::pool())
        .await?;

    Ok(ApiResponse::success(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(kind: &str, coordinates: Vec<f64>) -> GeoPoint {
        GeoPoint {
            kind: kind.to_string(),
            coordinates,
        }
    }

    #[test]
    fn geo_point_accepts_lng_lat_pair() {
        assert!(geo_point(&point("Point", vec![46.67, 24.71])).is_ok());
    }

    #[test]
    fn geo_point_rejects_other_geometries() {
        assert!(geo_point(&point("Polygon", vec![0.0, 0.0])).is_err());
    }

    #[test]
    fn geo_point_rejects_wrong_arity() {
        assert!(geo_point(&point("Point", vec![1.0])).is_err());
        assert!(geo_point(&point("Point", vec![1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn payload_validation_covers_location() {
        let payload = CreateBranchPayload {
            name: "Main".to_string(),
            retailer_id: Uuid::new_v4(),
            location: point("Circle", vec![1.0, 2.0]),
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("location"));
    }
}
