//! Translate generic queries into SeaORM conditions and ordering.

use common::{AppError, AppResult};
use domain::{
    Entity, EntityField, FieldKind, FilterDescriptor, Operator, Query, Scalar, SortDirection,
};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, Order, Value};

use super::mapper::{ColumnOf, FieldOf, SqlMapper};
use crate::identity::parse_identity;

/// Native form of one query.
pub struct SqlQuery<E: EntityTrait> {
    pub condition: Condition,
    pub order: Vec<(E::Column, Order)>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Translate filters, sorts and the window. Results are always ordered by
/// id last so pages are deterministic.
pub fn translate<M: SqlMapper>(query: &Query<FieldOf<M>>) -> AppResult<SqlQuery<M::Entity>> {
    let condition = translate_filters::<M>(&query.filters)?;

    let mut order = Vec::with_capacity(query.sorts.len() + 1);
    for sort in &query.sorts {
        if !sort.field.kind().is_sortable() {
            return Err(unsupported::<M>(sort.field, "sort"));
        }
        let column = M::column(sort.field).ok_or_else(|| unsupported::<M>(sort.field, "sort"))?;
        let direction = match sort.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        order.push((column, direction));
    }
    if !query.sorts.iter().any(|sort| sort.field.is_id()) {
        order.push((M::id_column(), Order::Asc));
    }

    tracing::trace!(
        namespace = <M::Record as Entity>::NAMESPACE,
        filters = query.filters.len(),
        sorts = query.sorts.len(),
        "Translated query"
    );

    Ok(SqlQuery {
        condition,
        order,
        offset: query.pagination.skip,
        limit: query.pagination.take,
    })
}

/// AND of every filter. An empty list matches everything.
pub fn translate_filters<M: SqlMapper>(
    filters: &[FilterDescriptor<FieldOf<M>>],
) -> AppResult<Condition> {
    filters.iter().try_fold(Condition::all(), |condition, filter| {
        Ok(condition.add(translate_filter::<M>(filter)?))
    })
}

fn translate_filter<M: SqlMapper>(filter: &FilterDescriptor<FieldOf<M>>) -> AppResult<SimpleExpr> {
    let kind = filter.field.kind();
    if !kind.supports(filter.operator) {
        return Err(unsupported::<M>(filter.field, filter.operator.as_str()));
    }
    if let Some(expr) = M::relation_filter(filter)? {
        return Ok(expr);
    }
    let column = M::column(filter.field)
        .ok_or_else(|| unsupported::<M>(filter.field, filter.operator.as_str()))?;

    let expr = match filter.operator {
        Operator::Eq => column.eq(single_value::<M>(filter)?),
        Operator::Ne => column.ne(single_value::<M>(filter)?),
        Operator::Lt => column.lt(single_value::<M>(filter)?),
        Operator::Lte => column.lte(single_value::<M>(filter)?),
        Operator::Gt => column.gt(single_value::<M>(filter)?),
        Operator::Gte => column.gte(single_value::<M>(filter)?),
        Operator::In => column.is_in(list_values::<M>(filter)?),
        Operator::Nin => column.is_not_in(list_values::<M>(filter)?),
        Operator::Contains => contains::<M>(column, filter)?,
    };
    Ok(expr)
}

/// Case-insensitive substring match.
fn contains<M: SqlMapper>(
    column: ColumnOf<M>,
    filter: &FilterDescriptor<FieldOf<M>>,
) -> AppResult<SimpleExpr> {
    let needle = match filter.value.as_single() {
        Some(Scalar::Text(text)) => text.to_lowercase(),
        _ => return Err(shape_error::<M>(filter, "a single text value")),
    };
    let pattern = format!("%{}%", escape_like(&needle));
    let lowered = Func::lower(Expr::col((M::Entity::default(), column)));
    Ok(Expr::expr(lowered).like(LikeExpr::new(pattern).escape('\\')))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn single_value<M: SqlMapper>(filter: &FilterDescriptor<FieldOf<M>>) -> AppResult<Value> {
    let scalar = filter
        .value
        .as_single()
        .ok_or_else(|| shape_error::<M>(filter, "a single value"))?;
    native_value::<M>(filter, scalar)
}

fn list_values<M: SqlMapper>(filter: &FilterDescriptor<FieldOf<M>>) -> AppResult<Vec<Value>> {
    filter
        .value
        .as_list()
        .ok_or_else(|| shape_error::<M>(filter, "a list of values"))?
        .iter()
        .map(|scalar| native_value::<M>(filter, scalar))
        .collect()
}

fn native_value<M: SqlMapper>(
    filter: &FilterDescriptor<FieldOf<M>>,
    scalar: &Scalar,
) -> AppResult<Value> {
    let kind = filter.field.kind();
    if !kind.accepts(scalar) {
        return Err(shape_error::<M>(filter, kind_label(kind)));
    }
    let value = match scalar {
        Scalar::Text(raw) if kind == FieldKind::Id => parse_identity(raw)?.into(),
        Scalar::Text(text) => text.clone().into(),
        Scalar::Bool(flag) => (*flag).into(),
        Scalar::Int(number) => (*number).into(),
        Scalar::Timestamp(at) => (*at).into(),
    };
    Ok(value)
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Id => "an id",
        FieldKind::Text | FieldKind::TextList => "text",
        FieldKind::Integer => "an integer",
        FieldKind::Boolean => "a boolean",
        FieldKind::Timestamp => "a timestamp",
    }
}

fn shape_error<M: SqlMapper>(filter: &FilterDescriptor<FieldOf<M>>, expected: &str) -> AppError {
    AppError::invalid_argument(format!(
        "{} on {} expects {}",
        filter.operator,
        filter.field.name(),
        expected
    ))
}

fn unsupported<M: SqlMapper>(field: FieldOf<M>, operation: &str) -> AppError {
    AppError::unsupported_operator(format!(
        "'{}' on {}.{}",
        operation,
        <M::Record as Entity>::NAMESPACE,
        field.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::mapper::TaskSqlMapper;
    use domain::{FilterValue, TaskField};
    use sea_orm::{DbBackend, QueryFilter, QueryTrait};

    fn where_clause(query: &Query<TaskField>) -> String {
        let native = translate::<TaskSqlMapper>(query).unwrap();
        crate::sql::entities::task::Entity::find()
            .filter(native.condition)
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_comparison_filters() {
        let query = Query::new()
            .filter(TaskField::Priority, Operator::Gte, 3i64)
            .unwrap()
            .filter(TaskField::IsActive, Operator::Eq, true)
            .unwrap();
        let sql = where_clause(&query);
        assert!(sql.contains(r#""tasks"."priority" >= 3"#), "{}", sql);
        assert!(sql.contains(r#""tasks"."is_active" = TRUE"#), "{}", sql);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let query = Query::new()
            .filter(TaskField::Title, Operator::Contains, "Buy")
            .unwrap();
        let sql = where_clause(&query);
        assert!(sql.contains(r#"LOWER("tasks"."title") LIKE '%buy%'"#), "{}", sql);
    }

    #[test]
    fn test_label_filter_uses_link_table() {
        let query = Query::new()
            .filter(TaskField::LabelIds, Operator::Contains, "label-1")
            .unwrap();
        let sql = where_clause(&query);
        assert!(sql.contains(r#""tasks"."id" IN (SELECT "task_id" FROM "task_labels""#), "{}", sql);
    }

    #[test]
    fn test_id_tiebreak_is_appended() {
        let query = Query::new()
            .sort(TaskField::Priority, SortDirection::Desc)
            .unwrap();
        let native = translate::<TaskSqlMapper>(&query).unwrap();
        assert_eq!(native.order.len(), 2);
        assert_eq!(format!("{:?}", native.order[1].0), "Id");

        let by_id = Query::new().sort(TaskField::Id, SortDirection::Desc).unwrap();
        assert_eq!(translate::<TaskSqlMapper>(&by_id).unwrap().order.len(), 1);
    }

    #[test]
    fn test_malformed_id_value() {
        let query = Query::new()
            .filter(TaskField::Id, Operator::Eq, "not-a-uuid")
            .unwrap();
        assert!(matches!(
            translate::<TaskSqlMapper>(&query),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unchecked_descriptor_is_rejected() {
        let mut query: Query<TaskField> = Query::new();
        query.filters.push(FilterDescriptor {
            field: TaskField::Priority,
            operator: Operator::Contains,
            value: FilterValue::from(1i64),
        });
        assert!(matches!(
            translate::<TaskSqlMapper>(&query),
            Err(AppError::UnsupportedOperator(_))
        ));

        let mut query: Query<TaskField> = Query::new();
        query.filters.push(FilterDescriptor {
            field: TaskField::Priority,
            operator: Operator::Eq,
            value: FilterValue::from("high"),
        });
        assert!(matches!(
            translate::<TaskSqlMapper>(&query),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
