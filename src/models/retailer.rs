use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Retailer record owned by a user account.
///
/// A disabled retailer (`is_active = false`) is excluded from the public
/// branch and offer listings and its resources refuse reads.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Retailer {
    pub id: Uuid,
    pub is_active: bool,
    pub user_id: Uuid,
    pub brand_name: String,
    /// File id of the logotype image. File storage has no routes here.
    pub logo: Uuid,
    pub commercial_record_number: String,
    pub company_name: String,
    pub representative_email: String,
    pub representative_mobile_number: String,
    pub plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
