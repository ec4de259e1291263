//! Native query model of the document backend.
//!
//! Predicates address top-level fields by name; [`ID_PATH`] addresses the
//! document id. Comparisons follow document-database semantics: a missing
//! field only satisfies negative conditions, and values of different types
//! never compare as ordered.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::{json, Value};

use super::store::Document;

pub const ID_PATH: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    /// Lowercased needle matched against the lowercased string value
    ContainsText(String),
    /// Array field holds an equal element
    ArrayContains(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: String,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(path: impl Into<String>, condition: Condition) -> Self {
        Self {
            path: path.into(),
            condition,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let value = lookup(document, &self.path);
        let value = value.as_ref();
        match &self.condition {
            Condition::Eq(expected) => values_equal(value, expected),
            Condition::Ne(expected) => !values_equal(value, expected),
            Condition::Lt(bound) => compare(value, bound) == Some(Ordering::Less),
            Condition::Lte(bound) => {
                matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::Gt(bound) => compare(value, bound) == Some(Ordering::Greater),
            Condition::Gte(bound) => matches!(
                compare(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::In(candidates) => candidates.iter().any(|c| values_equal(value, c)),
            Condition::Nin(candidates) => !candidates.iter().any(|c| values_equal(value, c)),
            Condition::ContainsText(needle) => value
                .as_str()
                .map(|text| text.to_lowercase().contains(needle.as_str()))
                .unwrap_or(false),
            Condition::ArrayContains(element) => value
                .as_array()
                .map(|items| items.iter().any(|item| values_equal(item, element)))
                .unwrap_or(false),
        }
    }

    fn to_json(&self) -> Value {
        let condition = match &self.condition {
            Condition::Eq(v) => json!({ "$eq": v }),
            Condition::Ne(v) => json!({ "$ne": v }),
            Condition::Lt(v) => json!({ "$lt": v }),
            Condition::Lte(v) => json!({ "$lte": v }),
            Condition::Gt(v) => json!({ "$gt": v }),
            Condition::Gte(v) => json!({ "$gte": v }),
            Condition::In(vs) => json!({ "$in": vs }),
            Condition::Nin(vs) => json!({ "$nin": vs }),
            Condition::ContainsText(needle) => json!({ "$regex": needle, "$options": "i" }),
            Condition::ArrayContains(v) => json!({ "$elemMatch": { "$eq": v } }),
        };
        let mut clause = serde_json::Map::new();
        clause.insert(self.path.clone(), condition);
        Value::Object(clause)
    }
}

/// Conjunction of predicates. Empty matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub predicates: Vec<Predicate>,
}

impl DocumentFilter {
    pub fn matches(&self, document: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
    }

    /// Render as a document-database filter object, for logs.
    pub fn to_json(&self) -> Value {
        if self.predicates.is_empty() {
            return json!({});
        }
        let clauses: Vec<Value> = self.predicates.iter().map(Predicate::to_json).collect();
        json!({ "$and": clauses })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub path: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filter: DocumentFilter,
    pub sort: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl DocumentQuery {
    /// Filter, order and window an unordered set of documents.
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        self.apply_page(documents).0
    }

    /// Like [`apply`](Self::apply), also returning how many documents
    /// matched before the window was cut.
    pub fn apply_page(&self, documents: Vec<Document>) -> (Vec<Document>, u64) {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.filter.matches(document))
            .collect();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| self.order(a, b));

        let skip = usize::try_from(self.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let window = matched.into_iter().skip(skip);
        let page = match self.limit {
            Some(limit) => window
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => window.collect(),
        };
        (page, total)
    }

    fn order(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ordering = sort_order(
                lookup(a, &key.path).as_ref(),
                lookup(b, &key.path).as_ref(),
            );
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Cow<'a, Value> {
    if path == ID_PATH {
        return Cow::Owned(Value::String(document.id.to_string()));
    }
    document
        .fields
        .get(path)
        .map(Cow::Borrowed)
        .unwrap_or(Cow::Owned(Value::Null))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Ordering between values of the same type; `None` across types.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order for sorting: nulls first, then by type, then by value.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    compare(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn doc(title: &str, priority: i64, labels: &[&str]) -> Document {
        let mut fields = serde_json::Map::new();
        fields.insert("title".to_string(), json!(title));
        fields.insert("priority".to_string(), json!(priority));
        fields.insert("labelIds".to_string(), json!(labels));
        Document::new(Uuid::new_v4(), fields)
    }

    #[test]
    fn test_missing_field_only_matches_negative_conditions() {
        let document = doc("Plan", 1, &[]);
        assert!(!Predicate::new("dueAt", Condition::Eq(json!("x"))).matches(&document));
        assert!(Predicate::new("dueAt", Condition::Ne(json!("x"))).matches(&document));
        assert!(!Predicate::new("dueAt", Condition::Lt(json!(5))).matches(&document));
        assert!(Predicate::new("dueAt", Condition::Nin(vec![json!(1)])).matches(&document));
    }

    #[test]
    fn test_text_and_array_containment() {
        let document = doc("Buy Milk", 2, &["home", "errand"]);
        assert!(Predicate::new("title", Condition::ContainsText("milk".into())).matches(&document));
        assert!(!Predicate::new("title", Condition::ContainsText("bread".into())).matches(&document));
        assert!(Predicate::new("labelIds", Condition::ArrayContains(json!("home"))).matches(&document));
        assert!(!Predicate::new("labelIds", Condition::ArrayContains(json!("work"))).matches(&document));
    }

    #[test]
    fn test_id_path() {
        let document = doc("Plan", 1, &[]);
        let predicate = Predicate::new(ID_PATH, Condition::Eq(json!(document.id.to_string())));
        assert!(predicate.matches(&document));
    }

    #[test]
    fn test_apply_sorts_and_windows() {
        let documents = vec![doc("a", 3, &[]), doc("b", 1, &[]), doc("c", 2, &[]), doc("d", 5, &[])];
        let query = DocumentQuery {
            filter: DocumentFilter {
                predicates: vec![Predicate::new("priority", Condition::Gte(json!(2)))],
            },
            sort: vec![SortKey {
                path: "priority".to_string(),
                descending: true,
            }],
            skip: Some(1),
            limit: Some(1),
        };
        let (page, total) = query.apply_page(documents);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].fields["title"], json!("a"));
        // The total counts every match, not just the window
        assert_eq!(total, 3);
    }

    #[test]
    fn test_nulls_sort_first() {
        assert_eq!(sort_order(&Value::Null, &json!("2024")), Ordering::Less);
        assert_eq!(sort_order(&json!(2), &json!(10)), Ordering::Less);
    }

    #[test]
    fn test_filter_json() {
        let filter = DocumentFilter {
            predicates: vec![Predicate::new("priority", Condition::Gte(json!(3)))],
        };
        assert_eq!(filter.to_json(), json!({ "$and": [{ "priority": { "$gte": 3 } }] }));
        assert_eq!(DocumentFilter::default().to_json(), json!({}));
    }
}
