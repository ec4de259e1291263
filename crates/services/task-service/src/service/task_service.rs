//! Task use cases. Every operation runs on its own unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{
    Entity, FilterDescriptor, Operator, PagedResult, Pagination, Query, SortDescriptor,
    SortDirection, Task, TaskField, TaskStatus,
};
use persistence::{LabelFinder, Repository, UnitOfWork, UnitOfWorkFactory};

use crate::dto::{validate_request, CreateTaskRequest, SearchTasksRequest, UpdateTaskRequest};

/// Task service trait for dependency injection.
///
/// Tasks are only visible to their creator. Deleted tasks are soft deleted
/// and behave as missing afterwards.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, user_id: &str, request: CreateTaskRequest) -> AppResult<Task>;

    async fn get_task(&self, user_id: &str, task_id: &str) -> AppResult<Task>;

    /// Filter, sort and page the caller's active tasks. Newest first unless
    /// sorts are given.
    async fn search_tasks(
        &self,
        user_id: &str,
        request: SearchTasksRequest,
    ) -> AppResult<PagedResult<Task>>;

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        request: UpdateTaskRequest,
    ) -> AppResult<Task>;

    async fn add_label(&self, user_id: &str, task_id: &str, label_id: &str) -> AppResult<Task>;

    async fn remove_label(&self, user_id: &str, task_id: &str, label_id: &str)
        -> AppResult<Task>;

    async fn delete_task(&self, user_id: &str, task_id: &str) -> AppResult<()>;
}

pub struct TaskManager<F> {
    uow_factory: Arc<F>,
}

impl<F: UnitOfWorkFactory> TaskManager<F> {
    pub fn new(uow_factory: Arc<F>) -> Self {
        Self { uow_factory }
    }
}

fn parse_status(raw: &str) -> AppResult<TaskStatus> {
    raw.trim().parse::<TaskStatus>().map_err(AppError::from)
}

/// Active task owned by `user_id`, or `NotFound`.
async fn owned_task<U: UnitOfWork>(uow: &U, user_id: &str, task_id: &str) -> AppResult<Task> {
    uow.tasks()
        .get(task_id)
        .await?
        .filter(|task| task.is_active && task.is_owned_by(user_id))
        .ok_or(AppError::NotFound)
}

/// Fail unless every id names an active label of `user_id`.
async fn ensure_labels<U: UnitOfWork>(
    uow: &U,
    user_id: &str,
    label_ids: &[String],
) -> AppResult<()> {
    if label_ids.is_empty() {
        return Ok(());
    }
    let found = uow.labels().find_by_ids(label_ids).await?;
    let missing: Vec<&str> = label_ids
        .iter()
        .filter(|id| {
            !found.iter().any(|label| {
                label.id() == id.as_str() && label.is_active && label.created_by == user_id
            })
        })
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!("Unknown labels: {}", missing.join(", "))))
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory> TaskService for TaskManager<F> {
    #[tracing::instrument(skip(self, request))]
    async fn create_task(&self, user_id: &str, request: CreateTaskRequest) -> AppResult<Task> {
        validate_request(&request)?;
        let status = match request.status.as_deref() {
            Some(raw) => parse_status(raw)?,
            None => TaskStatus::Draft,
        };

        let mut task = Task::new(
            request.title,
            request.description.unwrap_or_default(),
            status,
            request.priority.unwrap_or(0),
            user_id,
        )?;
        for label_id in &request.label_ids {
            task.add_label(label_id.trim())?;
        }

        let uow = self.uow_factory.create();
        ensure_labels(&uow, user_id, &task.label_ids).await?;
        let task = uow.tasks().add(task).await?;
        uow.save_changes().await?;

        tracing::info!(task_id = %task.id, "Task created");
        Ok(task)
    }

    async fn get_task(&self, user_id: &str, task_id: &str) -> AppResult<Task> {
        let uow = self.uow_factory.create();
        owned_task(&uow, user_id, task_id).await
    }

    #[tracing::instrument(skip(self, request))]
    async fn search_tasks(
        &self,
        user_id: &str,
        request: SearchTasksRequest,
    ) -> AppResult<PagedResult<Task>> {
        validate_request(&request)?;
        let pagination = Pagination::from_page(request.page, request.page_size)?;
        let mut query: Query<TaskField> =
            Query::from_raw(&request.filters, &request.sorts, pagination)?;

        // Scope to the caller's live tasks whatever the client asked for
        query.filters.insert(
            0,
            FilterDescriptor::new(TaskField::CreatedBy, Operator::Eq, user_id)?,
        );
        query.filters.insert(
            1,
            FilterDescriptor::new(TaskField::IsActive, Operator::Eq, true)?,
        );
        if query.sorts.is_empty() {
            query
                .sorts
                .push(SortDescriptor::new(TaskField::CreatedAt, SortDirection::Desc)?);
        }

        let uow = self.uow_factory.create();
        uow.tasks().query(&query).await
    }

    #[tracing::instrument(skip(self, request))]
    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        request: UpdateTaskRequest,
    ) -> AppResult<Task> {
        validate_request(&request)?;
        let uow = self.uow_factory.create();
        let mut task = owned_task(&uow, user_id, task_id).await?;

        if let Some(title) = request.title {
            task.rename(title)?;
        }
        if let Some(description) = request.description {
            task.describe(description);
        }
        if let Some(priority) = request.priority {
            task.prioritize(priority)?;
        }
        if let Some(raw) = request.status.as_deref() {
            let next = parse_status(raw)?;
            if next != task.status {
                task.change_status(next)?;
            }
        }

        uow.tasks().update(&task).await?;
        uow.save_changes().await?;
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    async fn add_label(&self, user_id: &str, task_id: &str, label_id: &str) -> AppResult<Task> {
        let uow = self.uow_factory.create();
        let mut task = owned_task(&uow, user_id, task_id).await?;
        let label_id = label_id.trim().to_string();
        ensure_labels(&uow, user_id, std::slice::from_ref(&label_id)).await?;

        task.add_label(label_id)?;
        uow.tasks().update(&task).await?;
        uow.save_changes().await?;
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    async fn remove_label(
        &self,
        user_id: &str,
        task_id: &str,
        label_id: &str,
    ) -> AppResult<Task> {
        let uow = self.uow_factory.create();
        let mut task = owned_task(&uow, user_id, task_id).await?;

        task.remove_label(label_id.trim())?;
        uow.tasks().update(&task).await?;
        uow.save_changes().await?;
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, user_id: &str, task_id: &str) -> AppResult<()> {
        let uow = self.uow_factory.create();
        let mut task = owned_task(&uow, user_id, task_id).await?;

        task.soft_delete();
        uow.tasks().update(&task).await?;
        uow.save_changes().await?;
        tracing::info!(task_id, "Task deleted");
        Ok(())
    }
}
