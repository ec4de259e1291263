//! Authentication use cases.
//!
//! Password hashing and token issuance are injected collaborators; this
//! module only decides who gets tokens and keeps the refresh-token records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AppError, AppResult};
use domain::{ClientInfo, Email, Entity, RefreshToken, User};
use persistence::{
    with_transaction, RefreshTokenFinder, Repository, UnitOfWork, UnitOfWorkFactory, UserFinder,
};

use crate::dto::{validate_request, LoginRequest, RegisterRequest};
use crate::security::{IssuedTokens, PasswordHasher, TokenIssuer};

/// Verified against when the email is unknown so both paths cost the same.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0MTIzNDU2$6qaKF0yCvXkJUPLfD0cGwq9aqKiGxUOAqeM3CrH7MKo";

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> AppResult<User>;

    /// Check credentials, issue tokens and record the refresh token.
    async fn login(&self, request: LoginRequest, client: ClientInfo) -> AppResult<IssuedTokens>;

    /// Exchange a usable refresh token for a new pair. The old one is revoked.
    async fn refresh(&self, refresh_token: &str, client: ClientInfo) -> AppResult<IssuedTokens>;

    /// Revoke a refresh token. Unknown or already revoked tokens are ignored.
    async fn revoke(&self, refresh_token: &str) -> AppResult<()>;
}

pub struct AuthManager<F> {
    uow_factory: Arc<F>,
    hasher: Arc<dyn PasswordHasher>,
    issuer: Arc<dyn TokenIssuer>,
}

impl<F: UnitOfWorkFactory> AuthManager<F> {
    pub fn new(
        uow_factory: Arc<F>,
        hasher: Arc<dyn PasswordHasher>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            uow_factory,
            hasher,
            issuer,
        }
    }

    /// Issue tokens for `user` and stage the refresh-token record.
    async fn issue_for<U: UnitOfWork>(
        &self,
        uow: &U,
        user: &User,
        client: ClientInfo,
    ) -> AppResult<IssuedTokens> {
        let tokens = self.issuer.issue(user)?;
        let record = RefreshToken::new(
            user.id(),
            self.issuer.hash_refresh_token(&tokens.refresh_token),
            tokens.refresh_expires_at,
            client,
        );
        uow.refresh_tokens().add(record).await?;
        Ok(tokens)
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory> AuthService for AuthManager<F> {
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        validate_request(&request)?;
        let email = Email::parse(&request.email)?;
        let password_hash = self.hasher.hash(&request.password)?;
        let candidate = User::new(email, password_hash, request.display_name);

        let uow = self.uow_factory.create();
        let user = with_transaction!(uow, |tx| {
            if tx.users().find_by_email(&candidate.email).await?.is_some() {
                return Err(AppError::conflict("Email is already registered"));
            }
            tx.users().add(candidate).await
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    #[tracing::instrument(skip(self, request, client))]
    async fn login(&self, request: LoginRequest, client: ClientInfo) -> AppResult<IssuedTokens> {
        validate_request(&request)?;
        let email = Email::parse(&request.email).map_err(|_| AppError::InvalidCredentials)?;

        let uow = self.uow_factory.create();
        let user = uow
            .users()
            .find_by_email(&email)
            .await?
            .filter(|user| user.is_active);

        let hash = user
            .as_ref()
            .map(|user| user.password_hash.as_str())
            .unwrap_or(DUMMY_HASH);
        let password_valid = self.hasher.verify(&request.password, hash);

        let user = match user {
            Some(user) if password_valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        let tokens = self.issue_for(&uow, &user, client).await?;
        uow.save_changes().await?;
        Ok(tokens)
    }

    #[tracing::instrument(skip(self, refresh_token, client))]
    async fn refresh(&self, refresh_token: &str, client: ClientInfo) -> AppResult<IssuedTokens> {
        let token_hash = self.issuer.hash_refresh_token(refresh_token);
        let uow = self.uow_factory.create();

        let mut record = uow
            .refresh_tokens()
            .find_by_token_hash(&token_hash)
            .await?
            .filter(|record| record.is_usable_at(Utc::now()))
            .ok_or(AppError::Unauthorized)?;
        let user = uow
            .users()
            .get(&record.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AppError::Unauthorized)?;

        record.revoke();
        uow.refresh_tokens().update(&record).await?;
        let tokens = self.issue_for(&uow, &user, client).await?;
        uow.save_changes().await?;
        Ok(tokens)
    }

    #[tracing::instrument(skip(self, refresh_token))]
    async fn revoke(&self, refresh_token: &str) -> AppResult<()> {
        let token_hash = self.issuer.hash_refresh_token(refresh_token);
        let uow = self.uow_factory.create();

        let Some(mut record) = uow
            .refresh_tokens()
            .find_by_token_hash(&token_hash)
            .await?
        else {
            return Ok(());
        };
        if record.is_revoked() {
            return Ok(());
        }

        record.revoke();
        uow.refresh_tokens().update(&record).await?;
        uow.save_changes().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{MockPasswordHasher, MockTokenIssuer};
    use chrono::Duration;
    use persistence::document::{DocumentUnitOfWorkFactory, InMemoryDocumentStore};

    fn factory() -> Arc<DocumentUnitOfWorkFactory> {
        Arc::new(DocumentUnitOfWorkFactory::new(
            Arc::new(InMemoryDocumentStore::new()),
            None,
        ))
    }

    /// Hashes as `hashed:<plain>` and accepts the matching plain text.
    fn plain_hasher() -> MockPasswordHasher {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|plain| Ok(format!("hashed:{}", plain)));
        hasher
            .expect_verify()
            .returning(|plain, hash| hash == format!("hashed:{}", plain));
        hasher
    }

    /// Issues numbered refresh tokens; hashing prefixes `h:`.
    fn counting_issuer() -> MockTokenIssuer {
        let mut issuer = MockTokenIssuer::new();
        let mut issued = 0;
        issuer.expect_issue().returning(move |user| {
            issued += 1;
            let now = Utc::now();
            Ok(IssuedTokens {
                access_token: format!("access-{}-{}", user.id(), issued),
                access_expires_at: now + Duration::minutes(15),
                refresh_token: format!("refresh-{}", issued),
                refresh_expires_at: now + Duration::days(7),
            })
        });
        issuer
            .expect_hash_refresh_token()
            .returning(|raw| format!("h:{}", raw));
        issuer
    }

    fn manager(factory: Arc<DocumentUnitOfWorkFactory>) -> AuthManager<DocumentUnitOfWorkFactory> {
        AuthManager::new(factory, Arc::new(plain_hasher()), Arc::new(counting_issuer()))
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "CorrectHorse1".to_string(),
            display_name: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_rejects_duplicates() {
        let service = manager(factory());
        let user = service
            .register(register_request("Ada@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");
        assert_eq!(user.display_name, "ada");
        assert_eq!(user.password_hash, "hashed:CorrectHorse1");

        assert!(matches!(
            service.register(register_request("ada@example.com")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_register_never_hashes_invalid_input() {
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().never();
        let service = AuthManager::new(factory(), Arc::new(hasher), Arc::new(counting_issuer()));

        let result = service.register(register_request("nope")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_records_hashed_refresh_token() {
        let factory = factory();
        let service = manager(factory.clone());
        let user = service.register(register_request("ada@example.com")).await.unwrap();

        let client = ClientInfo {
            ip: Some("10.0.0.7".to_string()),
            user_agent: Some("cli/1.0".to_string()),
            device_name: None,
        };
        let tokens = service
            .login(login_request("ada@example.com", "CorrectHorse1"), client)
            .await
            .unwrap();
        assert_eq!(tokens.refresh_token, "refresh-1");

        let stored = factory
            .create()
            .refresh_tokens()
            .find_by_token_hash("h:refresh-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, user.id());
        assert_eq!(stored.created_by_ip.as_deref(), Some("10.0.0.7"));
        assert!(!stored.is_revoked());
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let service = manager(factory());
        service.register(register_request("ada@example.com")).await.unwrap();

        let wrong_password = service
            .login(login_request("ada@example.com", "WrongHorse1"), ClientInfo::default())
            .await;
        let unknown_user = service
            .login(login_request("bob@example.com", "CorrectHorse1"), ClientInfo::default())
            .await;
        assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));
        assert!(matches!(unknown_user, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let service = manager(factory());
        service.register(register_request("ada@example.com")).await.unwrap();
        let first = service
            .login(login_request("ada@example.com", "CorrectHorse1"), ClientInfo::default())
            .await
            .unwrap();

        let second = service
            .refresh(&first.refresh_token, ClientInfo::default())
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        // The first token was revoked by the rotation
        assert!(matches!(
            service.refresh(&first.refresh_token, ClientInfo::default()).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let factory = factory();
        let service = manager(factory.clone());
        let user = service.register(register_request("ada@example.com")).await.unwrap();
        let tokens = service
            .login(login_request("ada@example.com", "CorrectHorse1"), ClientInfo::default())
            .await
            .unwrap();

        service.revoke(&tokens.refresh_token).await.unwrap();
        service.revoke(&tokens.refresh_token).await.unwrap();
        service.revoke("never-issued").await.unwrap();

        let stored = factory
            .create()
            .refresh_tokens()
            .find_by_user(user.id())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.iter().all(|token| token.is_revoked()));
        assert!(matches!(
            service.refresh(&tokens.refresh_token, ClientInfo::default()).await,
            Err(AppError::Unauthorized)
        ));
    }
}
