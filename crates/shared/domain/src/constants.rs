//! Domain-level constants.
//!
//! These constants define storage namespaces, paging defaults and
//! validation requirements.

// =============================================================================
// Namespaces
// =============================================================================

/// Storage container for tasks
pub const NAMESPACE_TASKS: &str = "tasks";

/// Storage container for labels
pub const NAMESPACE_LABELS: &str = "labels";

/// Storage container for users
pub const NAMESPACE_USERS: &str = "users";

/// Storage container for refresh tokens
pub const NAMESPACE_REFRESH_TOKENS: &str = "refresh_tokens";

// =============================================================================
// Pagination
// =============================================================================

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Maximum allowed items per page
pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page number a client may ask for
pub const MAX_PAGE_NUMBER: u64 = 100_000;

// =============================================================================
// Query syntax
// =============================================================================

/// Separator between the parts of a raw `field:operator:value` filter
pub const FILTER_PART_SEPARATOR: char = ':';

/// Separator between the items of an `in`/`nin` list value
pub const FILTER_LIST_SEPARATOR: char = ',';

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum task title length
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Maximum label name length
pub const MAX_LABEL_NAME_LENGTH: usize = 50;

/// Colors assigned to labels, picked by the first character of the name
pub const LABEL_PALETTE: &[&str] = &[
    "#E57373", "#F06292", "#BA68C8", "#9575CD", "#7986CB", "#64B5F6", "#4FC3F7", "#4DD0E1",
    "#4DB6AC", "#81C784", "#AED581", "#DCE775", "#FFD54F", "#FFB74D", "#FF8A65", "#A1887F",
];
