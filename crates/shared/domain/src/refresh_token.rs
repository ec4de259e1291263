//! Refresh token entity. Only the hash of the raw token is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NAMESPACE_REFRESH_TOKENS;
use crate::entity::{Entity, Identity};
use crate::query::{EntityField, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTokenField {
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
    RevokedAt,
}

impl EntityField for RefreshTokenField {
    const ALL: &'static [Self] = &[
        RefreshTokenField::Id,
        RefreshTokenField::UserId,
        RefreshTokenField::TokenHash,
        RefreshTokenField::ExpiresAt,
        RefreshTokenField::CreatedAt,
        RefreshTokenField::RevokedAt,
    ];

    fn name(&self) -> &'static str {
        match self {
            RefreshTokenField::Id => "id",
            RefreshTokenField::UserId => "userId",
            RefreshTokenField::TokenHash => "tokenHash",
            RefreshTokenField::ExpiresAt => "expiresAt",
            RefreshTokenField::CreatedAt => "createdAt",
            RefreshTokenField::RevokedAt => "revokedAt",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            RefreshTokenField::Id => FieldKind::Id,
            RefreshTokenField::UserId | RefreshTokenField::TokenHash => FieldKind::Text,
            RefreshTokenField::ExpiresAt | RefreshTokenField::CreatedAt | RefreshTokenField::RevokedAt => {
                FieldKind::Timestamp
            }
        }
    }
}

/// Client details captured when a token is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Identity,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_by_ip: Option<String>,
    pub user_agent: Option<String>,
    pub device_name: Option<String>,
}

impl RefreshToken {
    pub fn new(
        user_id: impl Into<String>,
        token_hash: impl Into<String>,
        expires_at: DateTime<Utc>,
        client: ClientInfo,
    ) -> Self {
        Self {
            id: Identity::transient(),
            user_id: user_id.into(),
            token_hash: token_hash.into(),
            expires_at,
            created_at: Utc::now(),
            revoked_at: None,
            created_by_ip: client.ip,
            user_agent: client.user_agent,
            device_name: client.device_name,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    /// Revoke once; later calls keep the first timestamp.
    pub fn revoke(&mut self) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(Utc::now());
        }
    }
}

impl Entity for RefreshToken {
    type Field = RefreshTokenField;
    const NAMESPACE: &'static str = NAMESPACE_REFRESH_TOKENS;

    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_token_usability() {
        let now = Utc::now();
        let mut token = RefreshToken::new("u1", "h", now + Duration::days(7), ClientInfo::default());
        assert!(token.is_usable_at(now));
        assert!(!token.is_usable_at(now + Duration::days(8)));

        token.revoke();
        let first = token.revoked_at;
        token.revoke();
        assert_eq!(token.revoked_at, first);
        assert!(!token.is_usable_at(now));
    }
}
