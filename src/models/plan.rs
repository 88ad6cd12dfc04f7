use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription plan limiting how many branches and offers a retailer may
/// create. A plan referenced by any retailer cannot be deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub maximum_number_of_branches: i32,
    pub maximum_number_of_offers: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
