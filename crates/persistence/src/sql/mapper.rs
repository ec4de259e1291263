//! Static mapping between domain entities and SeaORM models.

use common::{AppError, AppResult};
use domain::{
    Email, Entity, FilterDescriptor, Identity, Label, LabelField, RefreshToken, RefreshTokenField,
    Scalar, Task, TaskField, TaskStatus, User, UserField,
};
use futures::future::BoxFuture;
use sea_orm::sea_query::{Query as SeaQuery, SimpleExpr};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait,
    DatabaseTransaction, EntityName, EntityTrait, FromQueryResult, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::{label, refresh_token, task, task_label, user};
use crate::identity::parse_identity;

pub type FieldOf<M> = <<M as SqlMapper>::Record as Entity>::Field;
pub type ColumnOf<M> = <<M as SqlMapper>::Entity as EntityTrait>::Column;
pub type ModelOf<M> = <M as SqlMapper>::Model;

/// Binds one domain entity type to its table.
pub trait SqlMapper: Send + Sync + 'static {
    type Record: Entity;
    type Entity: EntityTrait<Model = Self::Model>;
    type Model: IntoActiveModel<Self::ActiveModel> + FromQueryResult + Send + Sync + 'static;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity>
        + ActiveModelBehavior
        + Send
        + Sync
        + 'static;

    fn id_column() -> ColumnOf<Self>;

    /// Column holding a field, or `None` when the field lives elsewhere.
    fn column(field: FieldOf<Self>) -> Option<ColumnOf<Self>>;

    /// Filters on fields stored in a related table.
    fn relation_filter(_filter: &FilterDescriptor<FieldOf<Self>>) -> AppResult<Option<SimpleExpr>> {
        Ok(None)
    }

    /// Full row for an insert under `id`.
    fn to_active_model(record: &Self::Record, id: Uuid) -> Self::ActiveModel;

    /// Settable columns only. Identity and creation metadata stay `NotSet`.
    fn to_partial_active_model(record: &Self::Record) -> Self::ActiveModel;

    fn from_model(model: ModelOf<Self>) -> AppResult<Self::Record>;

    fn load_related<'a, C: ConnectionTrait>(
        _conn: &'a C,
        _records: &'a mut [Self::Record],
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Replace the related rows of `id`.
    fn write_related<'a>(
        _txn: &'a DatabaseTransaction,
        _id: Uuid,
        _record: &'a Self::Record,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn delete_related<'a>(_txn: &'a DatabaseTransaction, _id: Uuid) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn corrupt(namespace: &str, id: Uuid, detail: impl std::fmt::Display) -> AppError {
    AppError::corrupt_record(format!("{}/{}: {}", namespace, id, detail))
}

// ============================================================================
// Tasks
// ============================================================================

pub struct TaskSqlMapper;

impl SqlMapper for TaskSqlMapper {
    type Record = Task;
    type Entity = task::Entity;
    type Model = task::Model;
    type ActiveModel = task::ActiveModel;

    fn id_column() -> task::Column {
        task::Column::Id
    }

    fn column(field: TaskField) -> Option<task::Column> {
        let column = match field {
            TaskField::Id => task::Column::Id,
            TaskField::Title => task::Column::Title,
            TaskField::Description => task::Column::Description,
            TaskField::Status => task::Column::Status,
            TaskField::Priority => task::Column::Priority,
            TaskField::LabelIds => return None,
            TaskField::CreatedBy => task::Column::CreatedBy,
            TaskField::IsActive => task::Column::IsActive,
            TaskField::CreatedAt => task::Column::CreatedAt,
            TaskField::UpdatedAt => task::Column::UpdatedAt,
            TaskField::CompletedAt => task::Column::CompletedAt,
        };
        Some(column)
    }

    fn relation_filter(filter: &FilterDescriptor<TaskField>) -> AppResult<Option<SimpleExpr>> {
        if filter.field != TaskField::LabelIds {
            return Ok(None);
        }
        let label_id = filter
            .value
            .as_single()
            .and_then(Scalar::as_text)
            .ok_or_else(|| AppError::invalid_argument("labelIds filters take one label id"))?;

        let tagged = SeaQuery::select()
            .column(task_label::Column::TaskId)
            .from(task_label::Entity)
            .and_where(task_label::Column::LabelId.eq(label_id))
            .to_owned();
        Ok(Some(task::Column::Id.in_subquery(tagged)))
    }

    fn to_active_model(record: &Task, id: Uuid) -> task::ActiveModel {
        task::ActiveModel {
            id: Set(id),
            title: Set(record.title.clone()),
            description: Set(record.description.clone()),
            status: Set(record.status.as_str().to_string()),
            priority: Set(record.priority),
            created_by: Set(record.created_by.clone()),
            is_active: Set(record.is_active),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
            completed_at: Set(record.completed_at),
        }
    }

    fn to_partial_active_model(record: &Task) -> task::ActiveModel {
        task::ActiveModel {
            id: NotSet,
            title: Set(record.title.clone()),
            description: Set(record.description.clone()),
            status: Set(record.status.as_str().to_string()),
            priority: Set(record.priority),
            created_by: NotSet,
            is_active: Set(record.is_active),
            created_at: NotSet,
            updated_at: Set(record.updated_at),
            completed_at: Set(record.completed_at),
        }
    }

    fn from_model(model: task::Model) -> AppResult<Task> {
        let status: TaskStatus = model
            .status
            .parse()
            .map_err(|err| corrupt(task::Entity.table_name(), model.id, err))?;
        Ok(Task {
            id: Identity::persisted(model.id.to_string()),
            title: model.title,
            description: model.description,
            status,
            priority: model.priority,
            label_ids: Vec::new(),
            created_by: model.created_by,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        })
    }

    fn load_related<'a, C: ConnectionTrait>(
        conn: &'a C,
        records: &'a mut [Task],
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(());
            }
            let ids = records
                .iter()
                .map(|task| parse_identity(task.id()))
                .collect::<AppResult<Vec<Uuid>>>()?;

            let links = task_label::Entity::find()
                .filter(task_label::Column::TaskId.is_in(ids))
                .order_by_asc(task_label::Column::Position)
                .all(conn)
                .await?;

            let mut by_task: std::collections::HashMap<Uuid, Vec<String>> =
                std::collections::HashMap::new();
            for link in links {
                by_task.entry(link.task_id).or_default().push(link.label_id);
            }
            for task in records.iter_mut() {
                let id = parse_identity(task.id())?;
                task.label_ids = by_task.remove(&id).unwrap_or_default();
            }
            Ok(())
        })
    }

    fn write_related<'a>(
        txn: &'a DatabaseTransaction,
        id: Uuid,
        record: &'a Task,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            Self::delete_related(txn, id).await?;
            if record.label_ids.is_empty() {
                return Ok(());
            }
            let links = record
                .label_ids
                .iter()
                .enumerate()
                .map(|(position, label_id)| task_label::ActiveModel {
                    task_id: Set(id),
                    label_id: Set(label_id.clone()),
                    position: Set(position as i32),
                });
            task_label::Entity::insert_many(links)
                .exec_without_returning(txn)
                .await?;
            Ok(())
        })
    }

    fn delete_related<'a>(txn: &'a DatabaseTransaction, id: Uuid) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            task_label::Entity::delete_many()
                .filter(task_label::Column::TaskId.eq(id))
                .exec(txn)
                .await?;
            Ok(())
        })
    }
}

// ============================================================================
// Labels
// ============================================================================

pub struct LabelSqlMapper;

impl SqlMapper for LabelSqlMapper {
    type Record = Label;
    type Entity = label::Entity;
    type Model = label::Model;
    type ActiveModel = label::ActiveModel;

    fn id_column() -> label::Column {
        label::Column::Id
    }

    fn column(field: LabelField) -> Option<label::Column> {
        Some(match field {
            LabelField::Id => label::Column::Id,
            LabelField::Name => label::Column::Name,
            LabelField::NormalizedName => label::Column::NormalizedName,
            LabelField::Color => label::Column::Color,
            LabelField::CreatedBy => label::Column::CreatedBy,
            LabelField::IsActive => label::Column::IsActive,
            LabelField::CreatedAt => label::Column::CreatedAt,
            LabelField::UpdatedAt => label::Column::UpdatedAt,
        })
    }

    fn to_active_model(record: &Label, id: Uuid) -> label::ActiveModel {
        label::ActiveModel {
            id: Set(id),
            name: Set(record.name.clone()),
            normalized_name: Set(record.normalized_name.clone()),
            color: Set(record.color.clone()),
            created_by: Set(record.created_by.clone()),
            is_active: Set(record.is_active),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        }
    }

    fn to_partial_active_model(record: &Label) -> label::ActiveModel {
        label::ActiveModel {
            id: NotSet,
            name: Set(record.name.clone()),
            normalized_name: Set(record.normalized_name.clone()),
            color: Set(record.color.clone()),
            created_by: NotSet,
            is_active: Set(record.is_active),
            created_at: NotSet,
            updated_at: Set(record.updated_at),
        }
    }

    fn from_model(model: label::Model) -> AppResult<Label> {
        Ok(Label {
            id: Identity::persisted(model.id.to_string()),
            name: model.name,
            normalized_name: model.normalized_name,
            color: model.color,
            created_by: model.created_by,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

// ============================================================================
// Users
// ============================================================================

pub struct UserSqlMapper;

impl SqlMapper for UserSqlMapper {
    type Record = User;
    type Entity = user::Entity;
    type Model = user::Model;
    type ActiveModel = user::ActiveModel;

    fn id_column() -> user::Column {
        user::Column::Id
    }

    fn column(field: UserField) -> Option<user::Column> {
        Some(match field {
            UserField::Id => user::Column::Id,
            UserField::DisplayName => user::Column::DisplayName,
            UserField::Email => user::Column::Email,
            UserField::IsActive => user::Column::IsActive,
            UserField::CreatedAt => user::Column::CreatedAt,
            UserField::UpdatedAt => user::Column::UpdatedAt,
        })
    }

    fn to_active_model(record: &User, id: Uuid) -> user::ActiveModel {
        user::ActiveModel {
            id: Set(id),
            display_name: Set(record.display_name.clone()),
            email: Set(record.email.as_str().to_string()),
            password_hash: Set(record.password_hash.clone()),
            is_active: Set(record.is_active),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        }
    }

    fn to_partial_active_model(record: &User) -> user::ActiveModel {
        user::ActiveModel {
            id: NotSet,
            display_name: Set(record.display_name.clone()),
            email: Set(record.email.as_str().to_string()),
            password_hash: Set(record.password_hash.clone()),
            is_active: Set(record.is_active),
            created_at: NotSet,
            updated_at: Set(record.updated_at),
        }
    }

    fn from_model(model: user::Model) -> AppResult<User> {
        let email =
            Email::parse(&model.email).map_err(|err| corrupt(user::Entity.table_name(), model.id, err))?;
        Ok(User {
            id: Identity::persisted(model.id.to_string()),
            display_name: model.display_name,
            email,
            password_hash: model.password_hash,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

// ============================================================================
// Refresh tokens
// ============================================================================

pub struct RefreshTokenSqlMapper;

impl SqlMapper for RefreshTokenSqlMapper {
    type Record = RefreshToken;
    type Entity = refresh_token::Entity;
    type Model = refresh_token::Model;
    type ActiveModel = refresh_token::ActiveModel;

    fn id_column() -> refresh_token::Column {
        refresh_token::Column::Id
    }

    fn column(field: RefreshTokenField) -> Option<refresh_token::Column> {
        Some(match field {
            RefreshTokenField::Id => refresh_token::Column::Id,
            RefreshTokenField::UserId => refresh_token::Column::UserId,
            RefreshTokenField::TokenHash => refresh_token::Column::TokenHash,
            RefreshTokenField::ExpiresAt => refresh_token::Column::ExpiresAt,
            RefreshTokenField::CreatedAt => refresh_token::Column::CreatedAt,
            RefreshTokenField::RevokedAt => refresh_token::Column::RevokedAt,
        })
    }

    fn to_active_model(record: &RefreshToken, id: Uuid) -> refresh_token::ActiveModel {
        refresh_token::ActiveModel {
            id: Set(id),
            user_id: Set(record.user_id.clone()),
            token_hash: Set(record.token_hash.clone()),
            expires_at: Set(record.expires_at),
            created_at: Set(record.created_at),
            revoked_at: Set(record.revoked_at),
            created_by_ip: Set(record.created_by_ip.clone()),
            user_agent: Set(record.user_agent.clone()),
            device_name: Set(record.device_name.clone()),
        }
    }

    // Only expiry and revocation change after issue
    fn to_partial_active_model(record: &RefreshToken) -> refresh_token::ActiveModel {
        refresh_token::ActiveModel {
            id: NotSet,
            user_id: NotSet,
            token_hash: NotSet,
            expires_at: Set(record.expires_at),
            created_at: NotSet,
            revoked_at: Set(record.revoked_at),
            created_by_ip: NotSet,
            user_agent: NotSet,
            device_name: NotSet,
        }
    }

    fn from_model(model: refresh_token::Model) -> AppResult<RefreshToken> {
        Ok(RefreshToken {
            id: Identity::persisted(model.id.to_string()),
            user_id: model.user_id,
            token_hash: model.token_hash,
            expires_at: model.expires_at,
            created_at: model.created_at,
            revoked_at: model.revoked_at,
            created_by_ip: model.created_by_ip,
            user_agent: model.user_agent,
            device_name: model.device_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_tables_match_namespaces() {
        assert_eq!(task::Entity.table_name(), Task::NAMESPACE);
        assert_eq!(label::Entity.table_name(), Label::NAMESPACE);
        assert_eq!(user::Entity.table_name(), User::NAMESPACE);
        assert_eq!(refresh_token::Entity.table_name(), RefreshToken::NAMESPACE);
    }

    #[test]
    fn test_every_stored_field_has_a_column() {
        use domain::EntityField;
        for field in TaskField::ALL {
            assert_eq!(
                TaskSqlMapper::column(*field).is_none(),
                *field == TaskField::LabelIds
            );
        }
        assert!(UserField::ALL
            .iter()
            .all(|field| UserSqlMapper::column(*field).is_some()));
    }

    #[test]
    fn test_corrupt_status_is_rejected() {
        let model = task::Model {
            id: Uuid::new_v4(),
            title: "Write report".to_string(),
            description: String::new(),
            status: "Archived".to_string(),
            priority: 1,
            created_by: "user-1".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };
        assert!(matches!(
            TaskSqlMapper::from_model(model),
            Err(AppError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_user_round_trip_keeps_hash() {
        let id = Uuid::new_v4();
        let model = user::Model {
            id,
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        let user = UserSqlMapper::from_model(model).unwrap();
        assert_eq!(user.id(), id.to_string());
        assert_eq!(user.password_hash, "$argon2id$hash");
    }
}
