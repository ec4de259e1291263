//! Task aggregate and its status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NAMESPACE_TASKS;
use crate::entity::{Entity, Identity};
use crate::error::{DomainError, DomainResult};
use crate::query::{EntityField, FieldKind};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Draft,
    ToDo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "Draft",
            TaskStatus::ToDo => "ToDo",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Done => "Done",
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (*self, next),
            (Draft, ToDo)
                | (ToDo, InProgress)
                | (ToDo, Done)
                | (InProgress, Done)
                | (InProgress, ToDo)
                | (Done, InProgress)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(TaskStatus::Draft),
            "ToDo" => Ok(TaskStatus::ToDo),
            "InProgress" => Ok(TaskStatus::InProgress),
            "Done" => Ok(TaskStatus::Done),
            other => Err(DomainError::validation(format!("Invalid task status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    Id,
    Title,
    Description,
    Status,
    Priority,
    LabelIds,
    CreatedBy,
    IsActive,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

impl EntityField for TaskField {
    const ALL: &'static [Self] = &[
        TaskField::Id,
        TaskField::Title,
        TaskField::Description,
        TaskField::Status,
        TaskField::Priority,
        TaskField::LabelIds,
        TaskField::CreatedBy,
        TaskField::IsActive,
        TaskField::CreatedAt,
        TaskField::UpdatedAt,
        TaskField::CompletedAt,
    ];

    fn name(&self) -> &'static str {
        match self {
            TaskField::Id => "id",
            TaskField::Title => "title",
            TaskField::Description => "description",
            TaskField::Status => "status",
            TaskField::Priority => "priority",
            TaskField::LabelIds => "labelIds",
            TaskField::CreatedBy => "createdBy",
            TaskField::IsActive => "isActive",
            TaskField::CreatedAt => "createdAt",
            TaskField::UpdatedAt => "updatedAt",
            TaskField::CompletedAt => "completedAt",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            TaskField::Id => FieldKind::Id,
            TaskField::Title | TaskField::Description | TaskField::Status | TaskField::CreatedBy => {
                FieldKind::Text
            }
            TaskField::Priority => FieldKind::Integer,
            TaskField::LabelIds => FieldKind::TextList,
            TaskField::IsActive => FieldKind::Boolean,
            TaskField::CreatedAt | TaskField::UpdatedAt | TaskField::CompletedAt => {
                FieldKind::Timestamp
            }
        }
    }
}

/// Task aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Identity,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub label_ids: Vec<String>,
    pub created_by: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new, not yet persisted task.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        status: TaskStatus,
        priority: i32,
        created_by: impl Into<String>,
    ) -> DomainResult<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("Task title is required"));
        }
        if priority < 0 {
            return Err(DomainError::validation("Task priority cannot be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Identity::transient(),
            title,
            description: description.into(),
            status,
            priority,
            label_ids: Vec::new(),
            created_by: created_by.into(),
            is_active: true,
            created_at: now,
            updated_at: None,
            completed_at: (status == TaskStatus::Done).then_some(now),
        })
    }

    pub fn rename(&mut self, title: impl Into<String>) -> DomainResult<()> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("Task title is required"));
        }
        self.title = title;
        self.touch();
        Ok(())
    }

    pub fn describe(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn prioritize(&mut self, priority: i32) -> DomainResult<()> {
        if priority < 0 {
            return Err(DomainError::validation("Task priority cannot be negative"));
        }
        self.priority = priority;
        self.touch();
        Ok(())
    }

    /// Move to `next`, stamping or clearing the completion time.
    pub fn change_status(&mut self, next: TaskStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "Cannot move task from {} to {}",
                self.status, next
            )));
        }
        let now = Utc::now();
        self.status = next;
        self.completed_at = (next == TaskStatus::Done).then_some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    pub fn add_label(&mut self, label_id: impl Into<String>) -> DomainResult<()> {
        let label_id = label_id.into();
        if self.label_ids.contains(&label_id) {
            return Err(DomainError::conflict(format!(
                "Label {} is already attached to this task",
                label_id
            )));
        }
        self.label_ids.push(label_id);
        self.touch();
        Ok(())
    }

    pub fn remove_label(&mut self, label_id: &str) -> DomainResult<()> {
        let before = self.label_ids.len();
        self.label_ids.retain(|id| id != label_id);
        if self.label_ids.len() == before {
            return Err(DomainError::not_found(format!("Label {} on task", label_id)));
        }
        self.touch();
        Ok(())
    }

    pub fn soft_delete(&mut self) {
        self.is_active = false;
        self.touch();
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

impl Entity for Task {
    type Field = TaskField;
    const NAMESPACE: &'static str = NAMESPACE_TASKS;

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

    fn draft() -> Task {
        Task::new("Write report", "", TaskStatus::Draft, 0, "user-1").unwrap()
    }

    #[test]
    fn test_new_task_is_transient_and_active() {
        let task = draft();
        assert!(task.id.is_transient());
        assert!(task.is_active);
        assert!(task.completed_at.is_none());
        assert!(task.updated_at.is_none());
    }

    #[test]
    fn test_new_task_validation() {
        assert!(Task::new("   ", "", TaskStatus::Draft, 0, "u").is_err());
        assert!(Task::new("ok", "", TaskStatus::Draft, -1, "u").is_err());
    }

    #[test]
    fn test_status_transitions() {
        let mut task = draft();
        assert!(matches!(
            task.change_status(TaskStatus::Done),
            Err(DomainError::Conflict(_))
        ));

        task.change_status(TaskStatus::ToDo).unwrap();
        task.change_status(TaskStatus::Done).unwrap();
        assert!(task.completed_at.is_some());

        task.change_status(TaskStatus::InProgress).unwrap();
        assert!(task.completed_at.is_none());
        assert!(task.updated_at.is_some());
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        let mut task = draft();
        assert!(task.change_status(TaskStatus::Draft).is_err());
    }

    #[test]
    fn test_labels() {
        let mut task = draft();
        task.add_label("l1").unwrap();
        assert!(matches!(task.add_label("l1"), Err(DomainError::Conflict(_))));
        task.remove_label("l1").unwrap();
        assert!(matches!(task.remove_label("l1"), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [TaskStatus::Draft, TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_field_names_resolve() {
        assert_eq!(TaskField::parse("labelIds").unwrap(), TaskField::LabelIds);
        assert!(TaskField::parse("label_ids").is_err());
    }
}
