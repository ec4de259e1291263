//! Use-case inputs, validated before anything touches a store.

use common::{AppError, AppResult};
use serde::Deserialize;
use validator::Validate;

/// Run `validator` rules and flatten failures into one `Validation` error.
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|e| AppError::validation(format_validation_errors(&e)))
}

/// Format validation errors into a user-friendly string
fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

// =============================================================================
// Authentication
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "Display name must be at most 100 characters"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `Draft`
    pub status: Option<String>,
    #[validate(range(min = 0, message = "Priority cannot be negative"))]
    pub priority: Option<i32>,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    #[validate(range(min = 0, message = "Priority cannot be negative"))]
    pub priority: Option<i32>,
}

/// Raw search parameters as they arrive from a client.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchTasksRequest {
    /// `field:operator:value`
    #[serde(default)]
    pub filters: Vec<String>,
    /// `field:direction`
    #[serde(default)]
    pub sorts: Vec<String>,
    #[validate(range(min = 1, max = 100_000, message = "Page number must be 1 to 100000"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, message = "Page size must be positive"))]
    pub page_size: Option<u64>,
}

// =============================================================================
// Labels
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    #[validate(length(min = 1, max = 50, message = "Label name must be 1 to 50 characters"))]
    pub name: String,
}
