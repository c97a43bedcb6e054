//! Query description and evaluation.
//!
//! Semantics follow the hosted backend: ordering on a field excludes
//! documents that lack it, ties are broken by document key, and `start_at` /
//! `end_at` are inclusive cursors on the ordered field.

use std::cmp::Ordering;

use serde_json::Value;

use super::{CollectionPath, DocumentSnapshot, Fields};

/// Highest code point used to close a prefix range (`term..=term + PREFIX_END`).
pub const PREFIX_END: char = '\u{f8ff}';

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to order on.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// A query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection being queried.
    pub collection: CollectionPath,
    /// Equality filters, all of which must match.
    pub filters: Vec<(String, Value)>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Inclusive start cursor on the ordered field.
    pub start_at: Option<Value>,
    /// Inclusive end cursor on the ordered field.
    pub end_at: Option<Value>,
}

impl Query {
    /// Every document in a collection, ordered by key.
    #[must_use]
    pub const fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            start_at: None,
            end_at: None,
        }
    }

    /// Keep only documents whose `field` equals `value`.
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_owned(), value.into()));
        self
    }

    /// Order results by `field`.
    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_owned(),
            direction,
        });
        self
    }

    /// Start at (inclusive) the given value of the ordered field.
    #[must_use]
    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    /// End at (inclusive) the given value of the ordered field.
    #[must_use]
    pub fn end_at(mut self, value: impl Into<Value>) -> Self {
        self.end_at = Some(value.into());
        self
    }

    /// Strings in `field` starting with `prefix`, ordered ascending.
    #[must_use]
    pub fn prefix(self, field: &str, prefix: &str) -> Self {
        self.order_by(field, Direction::Ascending)
            .start_at(prefix)
            .end_at(format!("{prefix}{PREFIX_END}"))
    }

    /// Filter and sort documents of the queried collection.
    pub(crate) fn apply<'a>(
        &self,
        docs: impl Iterator<Item = (&'a String, &'a Fields)>,
    ) -> Vec<DocumentSnapshot> {
        let mut matched: Vec<DocumentSnapshot> = docs
            .filter(|(_, data)| self.matches(data))
            .map(|(id, data)| DocumentSnapshot {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        matched.sort_by(|a, b| self.compare(a, b));
        matched
    }

    fn matches(&self, data: &Fields) -> bool {
        let filters_match = self
            .filters
            .iter()
            .all(|(field, expected)| data.get(field).is_some_and(|v| v == expected));
        if !filters_match {
            return false;
        }

        let Some(order) = &self.order_by else {
            return true;
        };
        let Some(value) = data.get(&order.field) else {
            return false;
        };

        let directed = |bound: &Value| {
            let ord = compare_values(value, bound);
            match order.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        };

        let after_start = self
            .start_at
            .as_ref()
            .is_none_or(|start| directed(start) != Ordering::Less);
        let before_end = self
            .end_at
            .as_ref()
            .is_none_or(|end| directed(end) != Ordering::Greater);

        after_start && before_end
    }

    fn compare(&self, a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
        let Some(order) = &self.order_by else {
            return a.id.cmp(&b.id);
        };

        let ord = match (a.data.get(&order.field), b.data.get(&order.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            _ => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id));

        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

/// Rank of a value's type in cross-type ordering.
const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| compare_values(p, q))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
