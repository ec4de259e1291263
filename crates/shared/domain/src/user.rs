//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NAMESPACE_USERS;
use crate::email::Email;
use crate::entity::{Entity, Identity};
use crate::query::{EntityField, FieldKind};

/// Queryable user properties. The password hash is stored but never
/// filterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    DisplayName,
    Email,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

impl EntityField for UserField {
    const ALL: &'static [Self] = &[
        UserField::Id,
        UserField::DisplayName,
        UserField::Email,
        UserField::IsActive,
        UserField::CreatedAt,
        UserField::UpdatedAt,
    ];

    fn name(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::DisplayName => "displayName",
            UserField::Email => "email",
            UserField::IsActive => "isActive",
            UserField::CreatedAt => "createdAt",
            UserField::UpdatedAt => "updatedAt",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            UserField::Id => FieldKind::Id,
            UserField::DisplayName | UserField::Email => FieldKind::Text,
            UserField::IsActive => FieldKind::Boolean,
            UserField::CreatedAt | UserField::UpdatedAt => FieldKind::Timestamp,
        }
    }
}

/// User domain entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Identity,
    pub display_name: String,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user. Without a display name the email's local part
    /// is used.
    pub fn new(email: Email, password_hash: String, display_name: Option<String>) -> Self {
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.local_part().to_string());
        Self {
            id: Identity::transient(),
            display_name,
            email,
            password_hash,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Update user's display name
    pub fn update_display_name(&mut self, name: String) {
        self.display_name = name;
        self.updated_at = Some(Utc::now());
    }

    /// Replace the stored password hash
    pub fn change_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.updated_at = Some(Utc::now());
    }

    /// Soft delete the user
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Some(Utc::now());
    }
}

impl Entity for User {
    type Field = UserField;
    const NAMESPACE: &'static str = NAMESPACE_USERS;

    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_defaults_to_local_part() {
        let email = Email::parse("grace@navy.mil").unwrap();
        let user = User::new(email.clone(), "hash".into(), None);
        assert_eq!(user.display_name, "grace");

        let user = User::new(email, "hash".into(), Some("  ".into()));
        assert_eq!(user.display_name, "grace");
    }

    #[test]
    fn test_serialized_user_hides_hash() {
        let email = Email::parse("grace@navy.mil").unwrap();
        let user = User::new(email, "secret-hash".into(), Some("Grace".into()));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
