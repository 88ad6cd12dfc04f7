use serde::{Deserialize, Serialize};

/// Access roles understood by the authorization gate.
///
/// `Unknown` marks a route as public when it appears in a permission table;
/// assigned to a user it grants nothing beyond those public routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Retailer,
    User,
    Unknown,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::Administrator, Role::Retailer, Role::User, Role::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Retailer => "retailer",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }

    /// Parse a role stored as a database string. Returns `None` for values
    /// outside the known set.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "administrator" => Some(Role::Administrator),
            "retailer" => Some(Role::Retailer),
            "user" => Some(Role::User),
            "unknown" => Some(Role::Unknown),
            _ => None,
        }
    }

    /// Map a list of stored role strings to typed roles, dropping anything
    /// the schema validation should have refused in the first place.
    pub fn parse_all(values: &[String]) -> Vec<Role> {
        values.iter().filter_map(|v| Role::parse(v)).collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_role() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(*role));
        }
    }

    #[test]
    fn parse_rejects_unlisted_role() {
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("Administrator"), None);
    }

    #[test]
    fn parse_all_drops_unknown_strings() {
        let stored = vec!["administrator".to_string(), "bogus".to_string(), "user".to_string()];
        assert_eq!(Role::parse_all(&stored), vec![Role::Administrator, Role::User]);
    }
}
