//! Backend-neutral query model: filters, sorts and pagination.
//!
//! A [`Query`] is pure data. Field names are constrained by the entity's
//! field enum, so an unknown field can never reach a store. Operator and
//! value compatibility is checked when a [`FilterDescriptor`] is built, which
//! is the boundary raw API input passes through.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, FILTER_LIST_SEPARATOR, FILTER_PART_SEPARATOR,
    MAX_PAGE_SIZE,
};
use crate::error::{DomainError, DomainResult};

// =============================================================================
// Operators
// =============================================================================

/// Closed set of comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::In,
        Operator::Nin,
        Operator::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Contains => "contains",
        }
    }

    /// `in` and `nin` compare against a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == lowered)
            .ok_or_else(|| DomainError::validation(format!("Unsupported operator: {}", s)))
    }
}

// =============================================================================
// Values
// =============================================================================

/// A single comparable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Text(_) => "string",
            Scalar::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Timestamp(value)
    }
}

/// Right-hand side of a filter: one value, or a list for `in`/`nin`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(Scalar),
    List(Vec<Scalar>),
}

impl FilterValue {
    /// All scalars carried by this value.
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            FilterValue::Single(scalar) => std::slice::from_ref(scalar),
            FilterValue::List(items) => items,
        }
    }

    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            FilterValue::Single(scalar) => Some(scalar),
            FilterValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            FilterValue::List(items) => Some(items),
            FilterValue::Single(_) => None,
        }
    }
}

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        FilterValue::Single(value)
    }
}

impl From<Vec<Scalar>> for FilterValue {
    fn from(values: Vec<Scalar>) -> Self {
        FilterValue::List(values)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::List(values.into_iter().map(Scalar::Text).collect())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::List(values.into_iter().map(Scalar::from).collect())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Single(value.into())
    }
}

// =============================================================================
// Fields
// =============================================================================

/// Storage type of an entity property, which decides the legal operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Store-assigned identity, compared in the backend's native id type
    Id,
    Text,
    Integer,
    Boolean,
    Timestamp,
    /// List of strings; `contains` tests membership
    TextList,
}

impl FieldKind {
    pub fn supports(&self, operator: Operator) -> bool {
        use Operator::*;
        match self {
            FieldKind::Id | FieldKind::Boolean => matches!(operator, Eq | Ne | In | Nin),
            FieldKind::Integer | FieldKind::Timestamp => operator != Contains,
            FieldKind::Text => true,
            FieldKind::TextList => operator == Contains,
        }
    }

    pub fn is_sortable(&self) -> bool {
        *self != FieldKind::TextList
    }

    /// Whether a scalar has the right type for this field.
    pub fn accepts(&self, scalar: &Scalar) -> bool {
        matches!(
            (self, scalar),
            (FieldKind::Id, Scalar::Text(_))
                | (FieldKind::Text, Scalar::Text(_))
                | (FieldKind::TextList, Scalar::Text(_))
                | (FieldKind::Integer, Scalar::Int(_))
                | (FieldKind::Boolean, Scalar::Bool(_))
                | (FieldKind::Timestamp, Scalar::Timestamp(_))
        )
    }

    /// Parse a raw string value into the scalar type this field stores.
    pub fn parse_scalar(&self, raw: &str) -> DomainResult<Scalar> {
        match self {
            FieldKind::Id | FieldKind::Text | FieldKind::TextList => Ok(Scalar::Text(raw.to_string())),
            FieldKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Scalar::Int)
                .map_err(|_| DomainError::validation(format!("Expected an integer, got '{}'", raw))),
            FieldKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Scalar::Bool(true)),
                "false" => Ok(Scalar::Bool(false)),
                _ => Err(DomainError::validation(format!("Expected a boolean, got '{}'", raw))),
            },
            FieldKind::Timestamp => DateTime::parse_from_rfc3339(raw.trim())
                .map(|t| Scalar::Timestamp(t.with_timezone(&Utc)))
                .map_err(|_| DomainError::validation(format!("Expected an RFC 3339 timestamp, got '{}'", raw))),
        }
    }
}

/// Queryable property set of one entity type.
///
/// `name` is the stored property name and is matched case-sensitively.
pub trait EntityField: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every field, in declaration order.
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;

    fn kind(&self) -> FieldKind;

    fn is_id(&self) -> bool {
        self.kind() == FieldKind::Id
    }

    /// Resolve a raw field name, rejecting anything that is not a property.
    fn parse(name: &str) -> DomainResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| DomainError::validation(format!("Unknown field: {}", name)))
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// One `field operator value` predicate. Filters of a query are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor<F> {
    pub field: F,
    pub operator: Operator,
    pub value: FilterValue,
}

impl<F: EntityField> FilterDescriptor<F> {
    pub fn new(field: F, operator: Operator, value: impl Into<FilterValue>) -> DomainResult<Self> {
        let descriptor = Self {
            field,
            operator,
            value: value.into(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check operator support, value shape and scalar types.
    pub fn validate(&self) -> DomainResult<()> {
        let kind = self.field.kind();
        if !kind.supports(self.operator) {
            return Err(DomainError::validation(format!(
                "Operator '{}' is not supported on field '{}'",
                self.operator,
                self.field.name()
            )));
        }

        match (&self.value, self.operator.takes_list()) {
            (FilterValue::List(_), false) => {
                return Err(DomainError::validation(format!(
                    "Operator '{}' requires a single value",
                    self.operator
                )))
            }
            (FilterValue::Single(_), true) => {
                return Err(DomainError::validation(format!(
                    "Operator '{}' requires a list value",
                    self.operator
                )))
            }
            _ => {}
        }

        if let Some(bad) = self.value.scalars().iter().find(|s| !kind.accepts(s)) {
            return Err(DomainError::validation(format!(
                "Field '{}' cannot be compared with a {} value",
                self.field.name(),
                bad.type_name()
            )));
        }

        Ok(())
    }

    /// Parse `field:operator:value`. The value keeps any further `:`.
    /// List operators split their value on `,`.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let mut parts = raw.splitn(3, FILTER_PART_SEPARATOR);
        let (field, operator, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(f), Some(o), Some(v)) => (f, o, v),
            _ => {
                return Err(DomainError::validation(format!(
                    "Filter must have the form field:operator:value, got '{}'",
                    raw
                )))
            }
        };

        let field = F::parse(field.trim())?;
        let operator: Operator = operator.parse()?;
        let kind = field.kind();

        let value = if operator.takes_list() {
            let items = value
                .split(FILTER_LIST_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| kind.parse_scalar(item))
                .collect::<DomainResult<Vec<_>>>()?;
            FilterValue::List(items)
        } else {
            FilterValue::Single(kind.parse_scalar(value)?)
        };

        Self::new(field, operator, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(DomainError::validation(format!("Unsupported sort direction: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDescriptor<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: EntityField> SortDescriptor<F> {
    pub fn new(field: F, direction: SortDirection) -> DomainResult<Self> {
        if !field.kind().is_sortable() {
            return Err(DomainError::validation(format!(
                "Field '{}' cannot be sorted",
                field.name()
            )));
        }
        Ok(Self { field, direction })
    }

    /// Parse `field` or `field:direction`.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let (field, direction) = match raw.split_once(FILTER_PART_SEPARATOR) {
            Some((field, direction)) => (field, direction.parse()?),
            None => (raw, SortDirection::Asc),
        };
        Self::new(F::parse(field.trim())?, direction)
    }
}

/// Offset/limit window. `None` means no bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl Pagination {
    pub fn new(skip: Option<u64>, take: Option<u64>) -> Self {
        Self { skip, take }
    }

    /// Convert a 1-based page request. Missing values fall back to the
    /// defaults; the page size is capped.
    pub fn from_page(page: Option<u64>, page_size: Option<u64>) -> DomainResult<Self> {
        let page = page.unwrap_or(DEFAULT_PAGE_NUMBER);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(DomainError::validation("Page numbers start at 1"));
        }
        if page_size == 0 {
            return Err(DomainError::validation("Page size must be positive"));
        }
        let take = page_size.min(MAX_PAGE_SIZE);
        let skip = (page - 1)
            .checked_mul(take)
            .ok_or_else(|| DomainError::invalid_argument("Page number is too large"))?;
        Ok(Self {
            skip: Some(skip),
            take: Some(take),
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.skip.is_none() && self.take.is_none()
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Query<F> {
    pub filters: Vec<FilterDescriptor<F>>,
    pub sorts: Vec<SortDescriptor<F>>,
    pub pagination: Pagination,
}

impl<F> Default for Query<F> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sorts: Vec::new(),
            pagination: Pagination::default(),
        }
    }
}

impl<F: EntityField> Query<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        field: F,
        operator: Operator,
        value: impl Into<FilterValue>,
    ) -> DomainResult<Self> {
        self.filters.push(FilterDescriptor::new(field, operator, value)?);
        Ok(self)
    }

    pub fn sort(mut self, field: F, direction: SortDirection) -> DomainResult<Self> {
        self.sorts.push(SortDescriptor::new(field, direction)?);
        Ok(self)
    }

    pub fn paginate(mut self, skip: Option<u64>, take: Option<u64>) -> Self {
        self.pagination = Pagination::new(skip, take);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Parse raw API filters and sorts. Every entry must be valid.
    pub fn from_raw<S: AsRef<str>>(filters: &[S], sorts: &[S], pagination: Pagination) -> DomainResult<Self> {
        Ok(Self {
            filters: filters
                .iter()
                .map(|raw| FilterDescriptor::parse(raw.as_ref()))
                .collect::<DomainResult<_>>()?,
            sorts: sorts
                .iter()
                .map(|raw| SortDescriptor::parse(raw.as_ref()))
                .collect::<DomainResult<_>>()?,
            pagination,
        })
    }

    /// No filter, no sort, no window: a full scan.
    pub fn is_unbounded(&self) -> bool {
        self.filters.is_empty() && self.sorts.is_empty() && self.pagination.is_unbounded()
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub skip: u64,
    pub take: u64,
    pub total_count: u64,
}

impl<T> PagedResult<T> {
    /// `take` echoes the requested limit, or the item count when unbounded.
    pub fn new(items: Vec<T>, pagination: Pagination, total_count: u64) -> Self {
        let take = pagination.take.unwrap_or(items.len() as u64);
        Self {
            skip: pagination.skip.unwrap_or(0),
            take,
            total_count,
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            skip: self.skip,
            take: self.take,
            total_count: self.total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum NoteField {
        Id,
        Title,
        Rank,
        Pinned,
        Tags,
    }

    impl EntityField for NoteField {
        const ALL: &'static [Self] = &[
            NoteField::Id,
            NoteField::Title,
            NoteField::Rank,
            NoteField::Pinned,
            NoteField::Tags,
        ];

        fn name(&self) -> &'static str {
            match self {
                NoteField::Id => "id",
                NoteField::Title => "title",
                NoteField::Rank => "rank",
                NoteField::Pinned => "pinned",
                NoteField::Tags => "tags",
            }
        }

        fn kind(&self) -> FieldKind {
            match self {
                NoteField::Id => FieldKind::Id,
                NoteField::Title => FieldKind::Text,
                NoteField::Rank => FieldKind::Integer,
                NoteField::Pinned => FieldKind::Boolean,
                NoteField::Tags => FieldKind::TextList,
            }
        }
    }

    #[test]
    fn test_operator_parse_is_closed() {
        assert_eq!("GTE".parse::<Operator>().unwrap(), Operator::Gte);
        assert!(matches!(
            "like".parse::<Operator>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_in_requires_list() {
        let result = FilterDescriptor::new(NoteField::Rank, Operator::In, 3i64);
        assert!(matches!(result, Err(DomainError::Validation(_))));

        let result = FilterDescriptor::new(NoteField::Rank, Operator::In, vec![Scalar::Int(1), Scalar::Int(2)]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_scalar_operator_rejects_list() {
        let result = FilterDescriptor::new(NoteField::Title, Operator::Eq, vec!["a", "b"]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_value_type_must_match_field() {
        let result = FilterDescriptor::new(NoteField::Rank, Operator::Gte, "three");
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_contains_only_on_text_like_fields() {
        assert!(FilterDescriptor::new(NoteField::Title, Operator::Contains, "abc").is_ok());
        assert!(FilterDescriptor::new(NoteField::Tags, Operator::Contains, "urgent").is_ok());
        assert!(FilterDescriptor::new(NoteField::Rank, Operator::Contains, 1i64).is_err());
        assert!(FilterDescriptor::new(NoteField::Tags, Operator::Eq, "urgent").is_err());
        assert!(FilterDescriptor::new(NoteField::Pinned, Operator::Gt, true).is_err());
    }

    #[test]
    fn test_parse_filter() {
        let filter = FilterDescriptor::<NoteField>::parse("rank:gte:3").unwrap();
        assert_eq!(filter.field, NoteField::Rank);
        assert_eq!(filter.operator, Operator::Gte);
        assert_eq!(filter.value, FilterValue::Single(Scalar::Int(3)));

        let filter = FilterDescriptor::<NoteField>::parse("title:eq:a:b").unwrap();
        assert_eq!(filter.value, FilterValue::Single(Scalar::Text("a:b".into())));

        let filter = FilterDescriptor::<NoteField>::parse("rank:nin:1, 2,3").unwrap();
        assert_eq!(
            filter.value,
            FilterValue::List(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)])
        );
    }

    #[test]
    fn test_parse_filter_rejects_unknown_field() {
        let result = FilterDescriptor::<NoteField>::parse("Title:eq:x");
        assert!(matches!(result, Err(DomainError::Validation(_))));

        let result = FilterDescriptor::<NoteField>::parse("titel:eq:x");
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_parse_filter_rejects_malformed() {
        assert!(FilterDescriptor::<NoteField>::parse("title").is_err());
        assert!(FilterDescriptor::<NoteField>::parse("pinned:eq:maybe").is_err());
    }

    #[test]
    fn test_parse_sort() {
        let sort = SortDescriptor::<NoteField>::parse("rank:desc").unwrap();
        assert_eq!(sort.direction, SortDirection::Desc);

        let sort = SortDescriptor::<NoteField>::parse("title").unwrap();
        assert_eq!(sort.direction, SortDirection::Asc);

        assert!(SortDescriptor::<NoteField>::parse("tags:asc").is_err());
        assert!(SortDescriptor::<NoteField>::parse("rank:up").is_err());
    }

    #[test]
    fn test_pagination_from_page() {
        let p = Pagination::from_page(None, None).unwrap();
        assert_eq!(p, Pagination::new(Some(0), Some(DEFAULT_PAGE_SIZE)));

        let p = Pagination::from_page(Some(3), Some(20)).unwrap();
        assert_eq!(p, Pagination::new(Some(40), Some(20)));

        let p = Pagination::from_page(Some(2), Some(10_000)).unwrap();
        assert_eq!(p.take, Some(MAX_PAGE_SIZE));

        assert!(Pagination::from_page(Some(0), None).is_err());
    }

    #[test]
    fn test_pagination_from_page_rejects_overflowing_offset() {
        assert!(matches!(
            Pagination::from_page(Some(u64::MAX), Some(MAX_PAGE_SIZE)),
            Err(DomainError::InvalidArgument(_))
        ));

        let last = Pagination::from_page(Some(u64::MAX), Some(1)).unwrap();
        assert_eq!(last.skip, Some(u64::MAX - 1));
    }

    #[test]
    fn test_query_from_raw() {
        let query = Query::<NoteField>::from_raw(
            &["pinned:eq:true", "title:contains:road"],
            &["rank:desc"],
            Pagination::new(Some(0), Some(5)),
        )
        .unwrap();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.sorts.len(), 1);
        assert!(!query.is_unbounded());
        assert!(Query::<NoteField>::new().is_unbounded());
    }

    #[test]
    fn test_paged_result_defaults() {
        let page = PagedResult::new(vec![1, 2], Pagination::default(), 2);
        assert_eq!(page.skip, 0);
        assert_eq!(page.take, 2);

        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_count, 2);
    }
}
