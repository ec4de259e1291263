//! Named finders built on the generic query model.
//!
//! Each finder is an extension trait implemented for every repository of the
//! right entity type, so they work the same on both backends.

use async_trait::async_trait;
use common::AppResult;
use domain::{
    Email, FilterValue, Label, LabelField, NormalizedName, Operator, PagedResult, Pagination,
    Query, RefreshToken, RefreshTokenField, SortDirection, Task, TaskField, User, UserField,
};

use crate::repository::Repository;

async fn first<E, R>(repo: &R, query: Query<E::Field>) -> AppResult<Option<E>>
where
    E: domain::Entity,
    R: Repository<E> + ?Sized,
{
    let page = repo.query(&query.paginate(Some(0), Some(1))).await?;
    Ok(page.items.into_iter().next())
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
pub trait UserFinder {
    async fn find_by_email(&self, email: &Email) -> AppResult<Option<User>>;
}

#[async_trait]
impl<R: Repository<User> + ?Sized> UserFinder for R {
    async fn find_by_email(&self, email: &Email) -> AppResult<Option<User>> {
        let query = Query::new().filter(UserField::Email, Operator::Eq, email.as_str())?;
        first(self, query).await
    }
}

// ============================================================================
// Labels
// ============================================================================

#[async_trait]
pub trait LabelFinder {
    /// Active label of `user_id` whose normalized name matches `name`.
    async fn find_by_name(&self, user_id: &str, name: &str) -> AppResult<Option<Label>>;

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<Label>>;

    async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<Label>>;
}

#[async_trait]
impl<R: Repository<Label> + ?Sized> LabelFinder for R {
    async fn find_by_name(&self, user_id: &str, name: &str) -> AppResult<Option<Label>> {
        let normalized = NormalizedName::new(name)?;
        let query = Query::new()
            .filter(LabelField::CreatedBy, Operator::Eq, user_id)?
            .filter(LabelField::NormalizedName, Operator::Eq, normalized.as_str())?
            .filter(LabelField::IsActive, Operator::Eq, true)?;
        first(self, query).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<Label>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().filter(
            LabelField::Id,
            Operator::In,
            FilterValue::from(ids.to_vec()),
        )?;
        Ok(self.query(&query).await?.items)
    }

    async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<Label>> {
        let query = Query::new()
            .filter(LabelField::CreatedBy, Operator::Eq, user_id)?
            .filter(LabelField::IsActive, Operator::Eq, true)?
            .sort(LabelField::NormalizedName, SortDirection::Asc)?;
        Ok(self.query(&query).await?.items)
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[async_trait]
pub trait TaskFinder {
    async fn find_active_by_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<PagedResult<Task>>;
}

#[async_trait]
impl<R: Repository<Task> + ?Sized> TaskFinder for R {
    async fn find_active_by_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<PagedResult<Task>> {
        let query = Query::new()
            .filter(TaskField::CreatedBy, Operator::Eq, user_id)?
            .filter(TaskField::IsActive, Operator::Eq, true)?
            .sort(TaskField::CreatedAt, SortDirection::Desc)?
            .with_pagination(pagination);
        self.query(&query).await
    }
}

// ============================================================================
// Refresh tokens
// ============================================================================

#[async_trait]
pub trait RefreshTokenFinder {
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>>;

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<RefreshToken>>;
}

#[async_trait]
impl<R: Repository<RefreshToken> + ?Sized> RefreshTokenFinder for R {
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        let query = Query::new().filter(RefreshTokenField::TokenHash, Operator::Eq, token_hash)?;
        first(self, query).await
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<RefreshToken>> {
        let query = Query::new()
            .filter(RefreshTokenField::UserId, Operator::Eq, user_id)?
            .sort(RefreshTokenField::CreatedAt, SortDirection::Desc)?;
        Ok(self.query(&query).await?.items)
    }
}
