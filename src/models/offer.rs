use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Campaign offer published by a retailer across a set of its branches.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub title: String,
    pub retailer_id: Uuid,
    pub campaign_start_date: Option<DateTime<Utc>>,
    pub campaign_end_date: Option<DateTime<Utc>>,
    pub branches: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
