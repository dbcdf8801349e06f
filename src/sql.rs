//! SQL generation utilities shared by plan assembly.

use crate::filter::FilterValue;

/// Escape a string for use in SQL (for identifiers, not values).
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Check if an identifier needs quoting.
pub fn needs_quoting(name: &str) -> bool {
    let reserved = [
        "user", "order", "group", "select", "from", "where", "table", "index", "key", "primary",
        "foreign", "check", "default", "null", "not", "and", "or", "in", "is", "like", "between",
        "case", "when", "then", "else", "end", "as", "on", "join", "left", "right", "inner",
        "outer", "cross", "natural", "using", "limit", "offset", "union", "intersect", "except",
        "all", "distinct", "having",
    ];

    if reserved.contains(&name.to_lowercase().as_str()) {
        return true;
    }

    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier if needed.
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        escape_identifier(name)
    } else {
        name.to_string()
    }
}

/// Render an alias-qualified column reference.
pub fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(alias), quote_identifier(column))
}

/// Parameter placeholder style of the target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }
}

impl Default for DatabaseType {
    fn default() -> Self {
        Self::PostgreSQL
    }
}

/// A SQL builder for assembling statements with bound parameters.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    db_type: DatabaseType,
    parts: Vec<String>,
    params: Vec<FilterValue>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.parts.push(sql.as_ref().to_string());
        self
    }

    /// Push a SQL string with a parameter.
    pub fn push_param(&mut self, value: impl Into<FilterValue>) -> &mut Self {
        let index = self.params.len() + 1;
        self.parts.push(self.db_type.placeholder(index));
        self.params.push(value.into());
        self
    }

    /// Push an identifier (properly quoted if needed).
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        self.parts.push(quote_identifier(name));
        self
    }

    /// Push a pre-rendered fragment whose placeholders were numbered from
    /// `next_param_index`, together with its bound values.
    pub fn push_fragment(&mut self, sql: String, params: Vec<FilterValue>) -> &mut Self {
        self.parts.push(sql);
        self.params.extend(params);
        self
    }

    /// Build the final SQL string and parameters.
    pub fn build(self) -> (String, Vec<FilterValue>) {
        (self.parts.join(""), self.params)
    }

    /// Number of parameters bound so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Index the next placeholder would take.
    pub fn next_param_index(&self) -> usize {
        self.params.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user"), "\"user\"");
        assert_eq!(escape_identifier("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_needs_quoting() {
        assert!(needs_quoting("user"));
        assert!(needs_quoting("order"));
        assert!(needs_quoting("has space"));
        assert!(!needs_quoting("my_table"));
        assert!(!needs_quoting("systems"));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("systems", "locationId"), "systems.locationId");
        assert_eq!(qualify("order", "id"), "\"order\".id");
    }

    #[test]
    fn test_database_placeholder() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(1), "$1");
        assert_eq!(DatabaseType::PostgreSQL.placeholder(5), "$5");
        assert_eq!(DatabaseType::MySQL.placeholder(1), "?");
        assert_eq!(DatabaseType::SQLite.placeholder(3), "?");
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::new(DatabaseType::PostgreSQL);
        builder
            .push("SELECT * FROM ")
            .push_identifier("user")
            .push(" WHERE ")
            .push_identifier("id")
            .push(" = ")
            .push_param(42i32);

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT * FROM \"user\" WHERE id = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_sql_builder_fragment_numbering() {
        let mut builder = SqlBuilder::new(DatabaseType::PostgreSQL);
        builder.push("a = ").push_param(1i64);
        assert_eq!(builder.next_param_index(), 2);
        builder.push_fragment("b = $2".to_string(), vec![FilterValue::Int(2)]);

        let (sql, params) = builder.build();
        assert_eq!(sql, "a = $1b = $2");
        assert_eq!(params.len(), 2);
    }
}
