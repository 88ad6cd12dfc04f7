use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::role::Role;

/// Account record. The password hash never leaves the server; deleting a
/// user flips `is_active` instead of removing the row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role_set(&self) -> Vec<Role> {
        Role::parse_all(&self.roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            login: "admin".to_string(),
            password_hash: "$2a$08$secret".to_string(),
            roles: vec!["administrator".to_string()],
            token: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let value = serde_json::to_value(sample_user()).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["login"], "admin");
    }

    #[test]
    fn role_set_parses_stored_strings() {
        let user = sample_user();
        assert_eq!(user.role_set(), vec![Role::Administrator]);
    }
}
