//! User profile types and roles.

use serde::{Deserialize, Serialize};

/// Role claim carried in the access token and on user profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    User,
    Organisation,
    SystemAdministrator,
}

impl UserRole {
    /// Parse the role claim string from a decoded token.
    /// Unknown roles map to `None` rather than failing the session.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(UserRole::User),
            "Organisation" => Some(UserRole::Organisation),
            "SystemAdministrator" => Some(UserRole::SystemAdministrator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Body for `PUT /api/v1/users/me`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("User"), Some(UserRole::User));
        assert_eq!(UserRole::parse("Organisation"), Some(UserRole::Organisation));
        assert_eq!(
            UserRole::parse("SystemAdministrator"),
            Some(UserRole::SystemAdministrator)
        );
        assert_eq!(UserRole::parse("Superuser"), None);
    }

    #[test]
    fn test_user_deserializes_with_missing_optionals() {
        let user: User =
            serde_json::from_str(r#"{"id": 7, "email": "a@b.c", "role": "User"}"#).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, Some(UserRole::User));
        assert!(user.first_name.is_none());
    }
}
