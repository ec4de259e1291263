//! Static mapping between domain entities and stored documents.
//!
//! Document keys are the entity field names, so translated queries address
//! exactly what the mappers write. Timestamps are RFC 3339 strings in UTC
//! with microsecond precision, which keeps lexical and temporal order equal.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use common::{AppError, AppResult};
use domain::{
    Email, Entity, EntityField, Identity, Label, LabelField, RefreshToken, RefreshTokenField,
    Task, TaskField, TaskStatus, User, UserField,
};
use serde_json::{json, Value};

use super::store::{Document, Fields};

/// Key of the one stored user property that is not a queryable field.
const PASSWORD_HASH: &str = "passwordHash";
const CREATED_BY_IP: &str = "createdByIp";
const USER_AGENT: &str = "userAgent";
const DEVICE_NAME: &str = "deviceName";

pub trait DocumentMapper: Send + Sync + 'static {
    type Record: Entity;

    /// Every stored property. The id lives outside the fields.
    fn to_document(record: &Self::Record) -> Fields;

    /// Settable properties only, nulls included so cleared values persist.
    fn to_partial_document(record: &Self::Record) -> Fields;

    fn from_document(document: Document) -> AppResult<Self::Record>;
}

pub fn timestamp_value(at: &DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn optional_timestamp(at: &Option<DateTime<Utc>>) -> Value {
    at.as_ref().map(timestamp_value).unwrap_or(Value::Null)
}

/// Read a stored date: an RFC 3339 string, or epoch milliseconds.
pub fn to_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        Value::Number(millis) => Utc.timestamp_millis_opt(millis.as_i64()?).single(),
        _ => None,
    }
}

// ============================================================================
// Field readers
// ============================================================================

/// Typed access to one document's fields with corruption reporting.
struct Reader<'a> {
    namespace: &'static str,
    document: &'a Document,
}

impl<'a> Reader<'a> {
    fn new<E: Entity>(document: &'a Document) -> Self {
        Self {
            namespace: E::NAMESPACE,
            document,
        }
    }

    fn corrupt(&self, key: &str, expected: &str) -> AppError {
        AppError::corrupt_record(format!(
            "{}/{}: field {} is missing or not {}",
            self.namespace, self.document.id, key, expected
        ))
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.document.fields.get(key).filter(|value| !value.is_null())
    }

    fn text(&self, key: &str) -> AppResult<String> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.corrupt(key, "text"))
    }

    fn optional_text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn flag(&self, key: &str) -> AppResult<bool> {
        self.get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.corrupt(key, "a boolean"))
    }

    fn integer(&self, key: &str) -> AppResult<i64> {
        self.get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.corrupt(key, "an integer"))
    }

    fn date(&self, key: &str) -> AppResult<DateTime<Utc>> {
        to_date(self.get(key)).ok_or_else(|| self.corrupt(key, "a date"))
    }

    fn optional_date(&self, key: &str) -> Option<DateTime<Utc>> {
        to_date(self.get(key))
    }

    fn text_list(&self, key: &str) -> AppResult<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.corrupt(key, "a list of text"))
                })
                .collect(),
            Some(_) => Err(self.corrupt(key, "a list of text")),
        }
    }

    fn identity(&self) -> Identity {
        Identity::persisted(self.document.id.to_string())
    }
}

fn insert(fields: &mut Fields, key: &str, value: Value) {
    fields.insert(key.to_string(), value);
}

// ============================================================================
// Tasks
// ============================================================================

pub struct TaskDocumentMapper;

impl DocumentMapper for TaskDocumentMapper {
    type Record = Task;

    fn to_document(task: &Task) -> Fields {
        let mut fields = Self::to_partial_document(task);
        insert(&mut fields, TaskField::CreatedBy.name(), json!(task.created_by));
        insert(&mut fields, TaskField::CreatedAt.name(), timestamp_value(&task.created_at));
        fields
    }

    fn to_partial_document(task: &Task) -> Fields {
        let mut fields = Fields::new();
        insert(&mut fields, TaskField::Title.name(), json!(task.title));
        insert(&mut fields, TaskField::Description.name(), json!(task.description));
        insert(&mut fields, TaskField::Status.name(), json!(task.status.as_str()));
        insert(&mut fields, TaskField::Priority.name(), json!(task.priority));
        insert(&mut fields, TaskField::LabelIds.name(), json!(task.label_ids));
        insert(&mut fields, TaskField::IsActive.name(), json!(task.is_active));
        insert(&mut fields, TaskField::UpdatedAt.name(), optional_timestamp(&task.updated_at));
        insert(
            &mut fields,
            TaskField::CompletedAt.name(),
            optional_timestamp(&task.completed_at),
        );
        fields
    }

    fn from_document(document: Document) -> AppResult<Task> {
        let reader = Reader::new::<Task>(&document);
        let status: TaskStatus = reader
            .text(TaskField::Status.name())?
            .parse()
            .map_err(|_| reader.corrupt(TaskField::Status.name(), "a task status"))?;
        let priority = i32::try_from(reader.integer(TaskField::Priority.name())?)
            .map_err(|_| reader.corrupt(TaskField::Priority.name(), "a 32-bit integer"))?;

        Ok(Task {
            id: reader.identity(),
            title: reader.text(TaskField::Title.name())?,
            description: reader
                .optional_text(TaskField::Description.name())
                .unwrap_or_default(),
            status,
            priority,
            label_ids: reader.text_list(TaskField::LabelIds.name())?,
            created_by: reader.text(TaskField::CreatedBy.name())?,
            is_active: reader.flag(TaskField::IsActive.name())?,
            created_at: reader.date(TaskField::CreatedAt.name())?,
            updated_at: reader.optional_date(TaskField::UpdatedAt.name()),
            completed_at: reader.optional_date(TaskField::CompletedAt.name()),
        })
    }
}

// ============================================================================
// Labels
// ============================================================================

pub struct LabelDocumentMapper;

impl DocumentMapper for LabelDocumentMapper {
    type Record = Label;

    fn to_document(label: &Label) -> Fields {
        let mut fields = Self::to_partial_document(label);
        insert(&mut fields, LabelField::CreatedBy.name(), json!(label.created_by));
        insert(&mut fields, LabelField::CreatedAt.name(), timestamp_value(&label.created_at));
        fields
    }

    fn to_partial_document(label: &Label) -> Fields {
        let mut fields = Fields::new();
        insert(&mut fields, LabelField::Name.name(), json!(label.name));
        insert(
            &mut fields,
            LabelField::NormalizedName.name(),
            json!(label.normalized_name),
        );
        insert(&mut fields, LabelField::Color.name(), json!(label.color));
        insert(&mut fields, LabelField::IsActive.name(), json!(label.is_active));
        insert(
            &mut fields,
            LabelField::UpdatedAt.name(),
            optional_timestamp(&label.updated_at),
        );
        fields
    }

    fn from_document(document: Document) -> AppResult<Label> {
        let reader = Reader::new::<Label>(&document);
        Ok(Label {
            id: reader.identity(),
            name: reader.text(LabelField::Name.name())?,
            normalized_name: reader.text(LabelField::NormalizedName.name())?,
            color: reader.text(LabelField::Color.name())?,
            created_by: reader.text(LabelField::CreatedBy.name())?,
            is_active: reader.flag(LabelField::IsActive.name())?,
            created_at: reader.date(LabelField::CreatedAt.name())?,
            updated_at: reader.optional_date(LabelField::UpdatedAt.name()),
        })
    }
}

// ============================================================================
// Users
// ============================================================================

pub struct UserDocumentMapper;

impl DocumentMapper for UserDocumentMapper {
    type Record = User;

    fn to_document(user: &User) -> Fields {
        let mut fields = Self::to_partial_document(user);
        insert(&mut fields, UserField::CreatedAt.name(), timestamp_value(&user.created_at));
        fields
    }

    fn to_partial_document(user: &User) -> Fields {
        let mut fields = Fields::new();
        insert(&mut fields, UserField::DisplayName.name(), json!(user.display_name));
        insert(&mut fields, UserField::Email.name(), json!(user.email.as_str()));
        insert(&mut fields, PASSWORD_HASH, json!(user.password_hash));
        insert(&mut fields, UserField::IsActive.name(), json!(user.is_active));
        insert(
            &mut fields,
            UserField::UpdatedAt.name(),
            optional_timestamp(&user.updated_at),
        );
        fields
    }

    fn from_document(document: Document) -> AppResult<User> {
        let reader = Reader::new::<User>(&document);
        let email = Email::parse(reader.text(UserField::Email.name())?)
            .map_err(|_| reader.corrupt(UserField::Email.name(), "an email address"))?;
        Ok(User {
            id: reader.identity(),
            display_name: reader.text(UserField::DisplayName.name())?,
            email,
            password_hash: reader.text(PASSWORD_HASH)?,
            is_active: reader.flag(UserField::IsActive.name())?,
            created_at: reader.date(UserField::CreatedAt.name())?,
            updated_at: reader.optional_date(UserField::UpdatedAt.name()),
        })
    }
}

// ============================================================================
// Refresh tokens
// ============================================================================

pub struct RefreshTokenDocumentMapper;

impl DocumentMapper for RefreshTokenDocumentMapper {
    type Record = RefreshToken;

    fn to_document(token: &RefreshToken) -> Fields {
        let mut fields = Self::to_partial_document(token);
        insert(&mut fields, RefreshTokenField::UserId.name(), json!(token.user_id));
        insert(&mut fields, RefreshTokenField::TokenHash.name(), json!(token.token_hash));
        insert(
            &mut fields,
            RefreshTokenField::CreatedAt.name(),
            timestamp_value(&token.created_at),
        );
        insert(&mut fields, CREATED_BY_IP, json!(token.created_by_ip));
        insert(&mut fields, USER_AGENT, json!(token.user_agent));
        insert(&mut fields, DEVICE_NAME, json!(token.device_name));
        fields
    }

    fn to_partial_document(token: &RefreshToken) -> Fields {
        let mut fields = Fields::new();
        insert(
            &mut fields,
            RefreshTokenField::ExpiresAt.name(),
            timestamp_value(&token.expires_at),
        );
        insert(
            &mut fields,
            RefreshTokenField::RevokedAt.name(),
            optional_timestamp(&token.revoked_at),
        );
        fields
    }

    fn from_document(document: Document) -> AppResult<RefreshToken> {
        let reader = Reader::new::<RefreshToken>(&document);
        Ok(RefreshToken {
            id: reader.identity(),
            user_id: reader.text(RefreshTokenField::UserId.name())?,
            token_hash: reader.text(RefreshTokenField::TokenHash.name())?,
            expires_at: reader.date(RefreshTokenField::ExpiresAt.name())?,
            created_at: reader.date(RefreshTokenField::CreatedAt.name())?,
            revoked_at: reader.optional_date(RefreshTokenField::RevokedAt.name()),
            created_by_ip: reader.optional_text(CREATED_BY_IP),
            user_agent: reader.optional_text(USER_AGENT),
            device_name: reader.optional_text(DEVICE_NAME),
        })
    }
}
