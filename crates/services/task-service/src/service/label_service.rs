//! Label use cases.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Entity, Label};
use persistence::{LabelFinder, Repository, UnitOfWork, UnitOfWorkFactory};

use crate::dto::{validate_request, LabelRequest};

#[async_trait]
pub trait LabelService: Send + Sync {
    /// Names are unique per user, compared after normalization.
    async fn create_label(&self, user_id: &str, request: LabelRequest) -> AppResult<Label>;

    async fn rename_label(
        &self,
        user_id: &str,
        label_id: &str,
        request: LabelRequest,
    ) -> AppResult<Label>;

    async fn list_labels(&self, user_id: &str) -> AppResult<Vec<Label>>;

    async fn delete_label(&self, user_id: &str, label_id: &str) -> AppResult<()>;
}

pub struct LabelManager<F> {
    uow_factory: Arc<F>,
}

impl<F: UnitOfWorkFactory> LabelManager<F> {
    pub fn new(uow_factory: Arc<F>) -> Self {
        Self { uow_factory }
    }
}

async fn owned_label<U: UnitOfWork>(uow: &U, user_id: &str, label_id: &str) -> AppResult<Label> {
    uow.labels()
        .get(label_id)
        .await?
        .filter(|label| label.is_active && label.created_by == user_id)
        .ok_or(AppError::NotFound)
}

async fn ensure_name_free<U: UnitOfWork>(
    uow: &U,
    user_id: &str,
    name: &str,
    except: Option<&str>,
) -> AppResult<()> {
    match uow.labels().find_by_name(user_id, name).await? {
        Some(existing) if Some(existing.id()) != except => Err(AppError::conflict(format!(
            "Label '{}' already exists",
            existing.name
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory> LabelService for LabelManager<F> {
    #[tracing::instrument(skip(self, request))]
    async fn create_label(&self, user_id: &str, request: LabelRequest) -> AppResult<Label> {
        validate_request(&request)?;
        let label = Label::new(request.name, user_id)?;

        let uow = self.uow_factory.create();
        ensure_name_free(&uow, user_id, &label.name, None).await?;
        let label = uow.labels().add(label).await?;
        uow.save_changes().await?;
        Ok(label)
    }

    #[tracing::instrument(skip(self, request))]
    async fn rename_label(
        &self,
        user_id: &str,
        label_id: &str,
        request: LabelRequest,
    ) -> AppResult<Label> {
        validate_request(&request)?;
        let uow = self.uow_factory.create();
        let mut label = owned_label(&uow, user_id, label_id).await?;

        label.rename(request.name)?;
        ensure_name_free(&uow, user_id, &label.name, Some(label.id())).await?;
        uow.labels().update(&label).await?;
        uow.save_changes().await?;
        Ok(label)
    }

    async fn list_labels(&self, user_id: &str) -> AppResult<Vec<Label>> {
        let uow = self.uow_factory.create();
        uow.labels().find_active_by_user(user_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_label(&self, user_id: &str, label_id: &str) -> AppResult<()> {
        let uow = self.uow_factory.create();
        let mut label = owned_label(&uow, user_id, label_id).await?;

        label.soft_delete();
        uow.labels().update(&label).await?;
        uow.save_changes().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::document::{DocumentUnitOfWorkFactory, InMemoryDocumentStore};

    const OWNER: &str = "owner-1";

    fn service() -> LabelManager<DocumentUnitOfWorkFactory> {
        LabelManager::new(Arc::new(DocumentUnitOfWorkFactory::new(
            Arc::new(InMemoryDocumentStore::new()),
            None,
        )))
    }

    fn named(name: &str) -> LabelRequest {
        LabelRequest {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let service = service();
        service.create_label(OWNER, named("Work")).await.unwrap();

        assert!(matches!(
            service.create_label(OWNER, named("  work ")).await,
            Err(AppError::Conflict(_))
        ));
        // Other users have their own namespace
        assert!(service.create_label("owner-2", named("Work")).await.is_ok());
    }

    #[tokio::test]
    async fn test_rename_keeps_color() {
        let service = service();
        let label = service.create_label(OWNER, named("Errands")).await.unwrap();

        let renamed = service
            .rename_label(OWNER, label.id(), named("Chores"))
            .await
            .unwrap();
        assert_eq!(renamed.normalized_name, "chores");
        assert_eq!(renamed.color, label.color);

        // Renaming to its own name is not a conflict
        assert!(service
            .rename_label(OWNER, label.id(), named("CHORES"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_conflicts() {
        let service = service();
        service.create_label(OWNER, named("Home")).await.unwrap();
        let other = service.create_label(OWNER, named("Garden")).await.unwrap();

        assert!(matches!(
            service.rename_label(OWNER, other.id(), named("home")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_excludes_deleted() {
        let service = service();
        let zebra = service.create_label(OWNER, named("Zebra")).await.unwrap();
        service.create_label(OWNER, named("apple")).await.unwrap();
        service.create_label(OWNER, named("Mango")).await.unwrap();
        service.delete_label(OWNER, zebra.id()).await.unwrap();

        let names: Vec<String> = service
            .list_labels(OWNER)
            .await
            .unwrap()
            .into_iter()
            .map(|label| label.name)
            .collect();
        assert_eq!(names, vec!["apple".to_string(), "Mango".to_string()]);

        // The name is free again once deleted
        assert!(service.create_label(OWNER, named("zebra")).await.is_ok());
    }
}
