use serde::{Deserialize, Serialize};

use super::ProfileUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Therapist,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Therapist => write!(f, "therapist"),
        }
    }
}

/// Authenticated identity. The session store is the source of truth;
/// role flags come from the login response, never from token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub is_therapist: bool,
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.is_admin,
            Role::Therapist => self.is_therapist,
        }
    }

    /// An empty role list admits any authenticated user.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.is_empty() || roles.iter().any(|r| self.has_role(*r))
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Merge a profile response into this identity, keeping fields the
    /// response leaves out.
    pub fn apply_profile(&mut self, profile: &ProfileUpdate) {
        if let Some(ref email) = profile.email {
            self.email = email.clone();
        }
        if let Some(ref first_name) = profile.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(ref last_name) = profile.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(ref phone_number) = profile.phone_number {
            self.phone_number = phone_number.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            is_therapist: true,
            is_admin: false,
        }
    }

    #[test]
    fn test_roles() {
        let user = alice();
        assert!(user.has_role(Role::Therapist));
        assert!(!user.has_role(Role::Admin));
        assert!(user.has_any_role(&[]));
        assert!(user.has_any_role(&[Role::Admin, Role::Therapist]));
        assert!(!user.has_any_role(&[Role::Admin]));
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = alice();
        assert_eq!(user.display_name(), "alice");
        user.first_name = "Alice".to_string();
        user.last_name = "Moreau".to_string();
        assert_eq!(user.display_name(), "Alice Moreau");
    }

    #[test]
    fn test_apply_profile_keeps_missing_fields() {
        let mut user = alice();
        user.phone_number = "555".to_string();
        user.apply_profile(&ProfileUpdate {
            email: Some("alice@example.com".to_string()),
            first_name: Some("Alice".to_string()),
            ..Default::default()
        });
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.phone_number, "555");
        assert_eq!(user.id, 7);
    }

    #[test]
    fn test_deserialize_login_shaped_user() {
        let json = r#"{"id": 7, "username": "alice", "is_therapist": true, "is_admin": false}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user, alice());
    }
}
