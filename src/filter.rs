//! Filter predicates applied to joined entities.
//!
//! A [`Filter`] is attached to an include node (a caller `where`) or to a
//! through association (a fixed scope). Rendering qualifies columns with the
//! alias of the entity the predicate targets, so the same filter value can be
//! reused wherever its association appears in a plan.

use serde::{Deserialize, Serialize};

use crate::sql::{DatabaseType, qualify, quote_identifier};

/// A filter value that can be used in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A predicate over one entity's columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison; a null value renders as IS NULL.
    Equals(String, FilterValue),
    /// Not equals comparison; a null value renders as IS NOT NULL.
    NotEquals(String, FilterValue),

    /// Less than comparison.
    Lt(String, FilterValue),
    /// Less than or equal comparison.
    Lte(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// Greater than or equal comparison.
    Gte(String, FilterValue),

    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Not in a list of values.
    NotIn(String, Vec<FilterValue>),

    /// Contains (LIKE %value%).
    Contains(String, FilterValue),
    /// Starts with (LIKE value%).
    StartsWith(String, FilterValue),
    /// Ends with (LIKE %value).
    EndsWith(String, FilterValue),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an equality filter.
    pub fn equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// Create an IS NULL filter.
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    /// Create an IS NOT NULL filter.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    /// Create an AND filter, flattening empty operands.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap(),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter, flattening empty operands.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap(),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Column names this filter references, in encounter order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::None => {}
            Self::Equals(col, _)
            | Self::NotEquals(col, _)
            | Self::Lt(col, _)
            | Self::Lte(col, _)
            | Self::Gt(col, _)
            | Self::Gte(col, _)
            | Self::In(col, _)
            | Self::NotIn(col, _)
            | Self::Contains(col, _)
            | Self::StartsWith(col, _)
            | Self::EndsWith(col, _)
            | Self::IsNull(col)
            | Self::IsNotNull(col) => out.push(col),
            Self::And(filters) | Self::Or(filters) => {
                for f in filters {
                    f.collect_columns(out);
                }
            }
            Self::Not(f) => f.collect_columns(out),
        }
    }

    /// Render this filter as SQL with parameter placeholders.
    ///
    /// Columns are qualified with `alias` when given. Placeholders are
    /// numbered starting at `param_offset + 1`, so a fragment can be spliced
    /// into a statement that has already bound parameters. Returns the SQL
    /// and the values to bind, in placeholder order.
    pub fn to_sql(
        &self,
        alias: Option<&str>,
        db: DatabaseType,
        param_offset: usize,
    ) -> (String, Vec<FilterValue>) {
        let mut params = Vec::new();
        let sql = self.render(alias, db, param_offset, &mut params);
        (sql, params)
    }

    fn render(
        &self,
        alias: Option<&str>,
        db: DatabaseType,
        offset: usize,
        params: &mut Vec<FilterValue>,
    ) -> String {
        let column = |col: &str| match alias {
            Some(a) => qualify(a, col),
            None => quote_identifier(col),
        };
        let bind = |value: FilterValue, params: &mut Vec<FilterValue>| {
            params.push(value);
            db.placeholder(offset + params.len())
        };

        match self {
            Self::None => "TRUE".to_string(),

            Self::Equals(col, val) => {
                if val.is_null() {
                    format!("{} IS NULL", column(col))
                } else {
                    let ph = bind(val.clone(), params);
                    format!("{} = {}", column(col), ph)
                }
            }
            Self::NotEquals(col, val) => {
                if val.is_null() {
                    format!("{} IS NOT NULL", column(col))
                } else {
                    let ph = bind(val.clone(), params);
                    format!("{} != {}", column(col), ph)
                }
            }

            Self::Lt(col, val) => {
                let ph = bind(val.clone(), params);
                format!("{} < {}", column(col), ph)
            }
            Self::Lte(col, val) => {
                let ph = bind(val.clone(), params);
                format!("{} <= {}", column(col), ph)
            }
            Self::Gt(col, val) => {
                let ph = bind(val.clone(), params);
                format!("{} > {}", column(col), ph)
            }
            Self::Gte(col, val) => {
                let ph = bind(val.clone(), params);
                format!("{} >= {}", column(col), ph)
            }

            Self::In(col, values) => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| bind(v.clone(), params))
                    .collect();
                format!("{} IN ({})", column(col), placeholders.join(", "))
            }
            Self::NotIn(col, values) => {
                if values.is_empty() {
                    return "TRUE".to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| bind(v.clone(), params))
                    .collect();
                format!("{} NOT IN ({})", column(col), placeholders.join(", "))
            }

            Self::Contains(col, val) => {
                let pattern = match val {
                    FilterValue::String(s) => FilterValue::String(format!("%{}%", s)),
                    other => other.clone(),
                };
                let ph = bind(pattern, params);
                format!("{} LIKE {}", column(col), ph)
            }
            Self::StartsWith(col, val) => {
                let pattern = match val {
                    FilterValue::String(s) => FilterValue::String(format!("{}%", s)),
                    other => other.clone(),
                };
                let ph = bind(pattern, params);
                format!("{} LIKE {}", column(col), ph)
            }
            Self::EndsWith(col, val) => {
                let pattern = match val {
                    FilterValue::String(s) => FilterValue::String(format!("%{}", s)),
                    other => other.clone(),
                };
                let ph = bind(pattern, params);
                format!("{} LIKE {}", column(col), ph)
            }

            Self::IsNull(col) => format!("{} IS NULL", column(col)),
            Self::IsNotNull(col) => format!("{} IS NOT NULL", column(col)),

            Self::And(filters) => {
                if filters.is_empty() {
                    return "TRUE".to_string();
                }
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.render(alias, db, offset, params))
                    .collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(filters) => {
                if filters.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.render(alias, db, offset, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(filter) => {
                let inner = filter.render(alias, db, offset, params);
                format!("NOT ({})", inner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_value_from() {
        assert_eq!(FilterValue::from(42i32), FilterValue::Int(42));
        assert_eq!(
            FilterValue::from("hello"),
            FilterValue::String("hello".to_string())
        );
        assert_eq!(FilterValue::from(true), FilterValue::Bool(true));
        assert_eq!(FilterValue::from(None::<i64>), FilterValue::Null);
    }

    #[test]
    fn test_equals_qualified() {
        let filter = Filter::equals("name", "Rural Depot");
        let (sql, params) = filter.to_sql(Some("locations"), DatabaseType::PostgreSQL, 0);
        assert_eq!(sql, "locations.name = $1");
        assert_eq!(params, vec![FilterValue::String("Rural Depot".into())]);
    }

    #[test]
    fn test_equals_null_renders_is_null() {
        let filter = Filter::equals("endAt", FilterValue::Null);
        let (sql, params) = filter.to_sql(Some("cl"), DatabaseType::PostgreSQL, 0);
        assert_eq!(sql, "cl.endAt IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_param_offset_threads_through() {
        let filter = Filter::and([
            Filter::equals("a", 1i64),
            Filter::Gt("b".into(), FilterValue::Int(2)),
        ]);
        let (sql, params) = filter.to_sql(None, DatabaseType::PostgreSQL, 3);
        assert_eq!(sql, "(a = $4 AND b > $5)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_mysql_placeholders() {
        let filter = Filter::In("id".into(), vec![1i64.into(), 2i64.into()]);
        let (sql, params) = filter.to_sql(None, DatabaseType::MySQL, 0);
        assert_eq!(sql, "id IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_and_flattens_empty() {
        assert!(Filter::and([Filter::None, Filter::None]).is_none());
        let single = Filter::and([Filter::None, Filter::is_null("endAt")]);
        assert_eq!(single, Filter::IsNull("endAt".into()));
    }

    #[test]
    fn test_and_then() {
        let combined = Filter::is_null("endAt").and_then(Filter::equals("kind", "primary"));
        match combined {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_referenced_columns() {
        let filter = Filter::and([
            Filter::is_null("endAt"),
            Filter::or([Filter::equals("kind", "a"), Filter::Gt("rank".into(), 1i64.into())]),
        ]);
        assert_eq!(filter.referenced_columns(), vec!["endAt", "kind", "rank"]);
    }

    #[test]
    fn test_contains_pattern() {
        let filter = Filter::Contains("email".into(), "example".into());
        let (sql, params) = filter.to_sql(None, DatabaseType::PostgreSQL, 0);
        assert!(sql.contains("LIKE"));
        assert_eq!(params, vec![FilterValue::String("%example%".into())]);
    }

    #[test]
    fn test_empty_in_is_false() {
        let filter = Filter::In("id".into(), vec![]);
        let (sql, _) = filter.to_sql(None, DatabaseType::PostgreSQL, 0);
        assert_eq!(sql, "FALSE");
    }
}
