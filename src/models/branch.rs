use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// GeoJSON point, stored as JSONB. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

/// Physical branch of a retailer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub retailer_id: Uuid,
    pub location: Json<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
