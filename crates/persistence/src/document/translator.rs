//! Translate generic queries into [`DocumentQuery`].

use common::{AppError, AppResult};
use domain::{
    Entity, EntityField, FieldKind, FilterDescriptor, Operator, Query, Scalar, SortDirection,
};
use serde_json::{json, Value};

use super::filter::{Condition, DocumentFilter, DocumentQuery, Predicate, SortKey, ID_PATH};
use super::mapper::timestamp_value;
use crate::identity::parse_identity;

pub fn translate<E: Entity>(query: &Query<E::Field>) -> AppResult<DocumentQuery> {
    let filter = translate_filters::<E>(&query.filters)?;

    let mut sort = Vec::with_capacity(query.sorts.len() + 1);
    for descriptor in &query.sorts {
        if !descriptor.field.kind().is_sortable() {
            return Err(unsupported::<E>(descriptor.field, "sort"));
        }
        sort.push(SortKey {
            path: path_of(descriptor.field).to_string(),
            descending: descriptor.direction == SortDirection::Desc,
        });
    }
    // Deterministic pages
    if !query.sorts.iter().any(|descriptor| descriptor.field.is_id()) {
        sort.push(SortKey {
            path: ID_PATH.to_string(),
            descending: false,
        });
    }

    tracing::trace!(
        namespace = E::NAMESPACE,
        filter = %filter.to_json(),
        "Translated query"
    );

    Ok(DocumentQuery {
        filter,
        sort,
        skip: query.pagination.skip,
        limit: query.pagination.take,
    })
}

pub fn translate_filters<E: Entity>(
    filters: &[FilterDescriptor<E::Field>],
) -> AppResult<DocumentFilter> {
    let predicates = filters
        .iter()
        .map(translate_filter::<E>)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(DocumentFilter { predicates })
}

fn path_of<F: EntityField>(field: F) -> &'static str {
    if field.is_id() {
        ID_PATH
    } else {
        field.name()
    }
}

fn translate_filter<E: Entity>(filter: &FilterDescriptor<E::Field>) -> AppResult<Predicate> {
    let kind = filter.field.kind();
    if !kind.supports(filter.operator) {
        return Err(unsupported::<E>(filter.field, filter.operator.as_str()));
    }

    let condition = match filter.operator {
        Operator::Eq => Condition::Eq(single(filter)?),
        Operator::Ne => Condition::Ne(single(filter)?),
        Operator::Lt => Condition::Lt(single(filter)?),
        Operator::Lte => Condition::Lte(single(filter)?),
        Operator::Gt => Condition::Gt(single(filter)?),
        Operator::Gte => Condition::Gte(single(filter)?),
        Operator::In => Condition::In(list(filter)?),
        Operator::Nin => Condition::Nin(list(filter)?),
        Operator::Contains => match (kind, single(filter)?) {
            (FieldKind::TextList, element) => Condition::ArrayContains(element),
            (_, Value::String(needle)) => Condition::ContainsText(needle.to_lowercase()),
            _ => return Err(shape_error(filter, "text")),
        },
    };
    Ok(Predicate::new(path_of(filter.field), condition))
}

fn single<F: EntityField>(filter: &FilterDescriptor<F>) -> AppResult<Value> {
    let scalar = filter
        .value
        .as_single()
        .ok_or_else(|| shape_error(filter, "a single value"))?;
    native_value(filter, scalar)
}

fn list<F: EntityField>(filter: &FilterDescriptor<F>) -> AppResult<Vec<Value>> {
    filter
        .value
        .as_list()
        .ok_or_else(|| shape_error(filter, "a list of values"))?
        .iter()
        .map(|scalar| native_value(filter, scalar))
        .collect()
}

fn native_value<F: EntityField>(filter: &FilterDescriptor<F>, scalar: &Scalar) -> AppResult<Value> {
    let kind = filter.field.kind();
    if !kind.accepts(scalar) {
        return Err(shape_error(filter, scalar_label(kind)));
    }
    let value = match scalar {
        Scalar::Text(raw) if kind == FieldKind::Id => json!(parse_identity(raw)?.to_string()),
        Scalar::Text(text) => json!(text),
        Scalar::Bool(flag) => json!(flag),
        Scalar::Int(number) => json!(number),
        Scalar::Timestamp(at) => timestamp_value(at),
    };
    Ok(value)
}

fn scalar_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Id => "an id",
        FieldKind::Text | FieldKind::TextList => "text",
        FieldKind::Integer => "an integer",
        FieldKind::Boolean => "a boolean",
        FieldKind::Timestamp => "a timestamp",
    }
}

fn shape_error<F: EntityField>(filter: &FilterDescriptor<F>, expected: &str) -> AppError {
    AppError::invalid_argument(format!(
        "{} on {} expects {}",
        filter.operator,
        filter.field.name(),
        expected
    ))
}

fn unsupported<E: Entity>(field: E::Field, operation: &str) -> AppError {
    AppError::unsupported_operator(format!(
        "'{}' on {}.{}",
        operation,
        E::NAMESPACE,
        field.name()
    ))
}
