//! A minimal select builder that renders normalized statement text.

use super::QueryDescriptor;
use super::value::Value;
use crate::error::QueryCacheError;

/// Columns requested by the terminal fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Columns(columns) if !columns.is_empty() => {
                for (index, column) in columns.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    push_identifier(out, column);
                }
            }
            _ => out.push('*'),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        column: String,
        operator: &'static str,
    },
    In {
        column: String,
        count: usize,
    },
    Null {
        column: String,
    },
}

/// Operators accepted by [`SelectQuery::where_op`].
const OPERATORS: [&str; 8] = ["=", "<>", "!=", "<", "<=", ">", ">=", "like"];

/// Select query against a single table.
///
/// ```
/// use query_remember::{Projection, QueryDescriptor, SelectQuery, Value};
///
/// let query = SelectQuery::table("users").where_eq("id", 5);
/// assert_eq!(
///     query.statement(&Projection::All),
///     r#"select * from "users" where "id" = ?"#
/// );
/// assert_eq!(query.bindings(), &[Value::Int(5)]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    conditions: Vec<Condition>,
    orders: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    bindings: Vec<Value>,
}

impl SelectQuery {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            bindings: Vec::new(),
        }
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_compare(column.into(), "=", value.into())
    }

    /// Adds a comparison. Only `=`, `<>`, `!=`, `<`, `<=`, `>`, `>=` and `like`
    /// are accepted, case-insensitively.
    pub fn where_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryCacheError> {
        let normalized = operator.trim().to_ascii_lowercase();
        let known = OPERATORS
            .iter()
            .copied()
            .find(|candidate| *candidate == normalized)
            .ok_or_else(|| {
                QueryCacheError::configuration(
                    "operator",
                    format!("unsupported comparison operator `{operator}`"),
                )
            })?;
        Ok(self.push_compare(column.into(), known, value.into()))
    }

    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let before = self.bindings.len();
        self.bindings.extend(values.into_iter().map(Into::into));
        self.conditions.push(Condition::In {
            column: column.into(),
            count: self.bindings.len() - before,
        });
        self
    }

    pub fn where_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Condition::Null {
            column: column.into(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn push_compare(mut self, column: String, operator: &'static str, value: Value) -> Self {
        self.bindings.push(value);
        self.conditions.push(Condition::Compare { column, operator });
        self
    }

    fn render_conditions(&self, out: &mut String) {
        for (index, condition) in self.conditions.iter().enumerate() {
            out.push_str(if index == 0 { " where " } else { " and " });
            match condition {
                Condition::Compare { column, operator } => {
                    push_identifier(out, column);
                    out.push(' ');
                    out.push_str(operator);
                    out.push_str(" ?");
                }
                // An empty IN list matches nothing.
                Condition::In { count: 0, .. } => out.push_str("0 = 1"),
                Condition::In { column, count } => {
                    push_identifier(out, column);
                    out.push_str(" in (");
                    for index in 0..*count {
                        out.push_str(if index == 0 { "?" } else { ", ?" });
                    }
                    out.push(')');
                }
                Condition::Null { column } => {
                    push_identifier(out, column);
                    out.push_str(" is null");
                }
            }
        }
    }
}

impl QueryDescriptor for SelectQuery {
    fn statement(&self, projection: &Projection) -> String {
        let mut out = String::from("select ");
        projection.render(&mut out);
        out.push_str(" from ");
        push_identifier(&mut out, &self.table);
        self.render_conditions(&mut out);

        for (index, (column, direction)) in self.orders.iter().enumerate() {
            out.push_str(if index == 0 { " order by " } else { ", " });
            push_identifier(&mut out, column);
            out.push(' ');
            out.push_str(direction.as_sql());
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = self.offset {
            out.push_str(&format!(" offset {offset}"));
        }
        out
    }

    fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    fn target(&self) -> &str {
        &self.table
    }
}

fn push_identifier(out: &mut String, identifier: &str) {
    out.push('"');
    for ch in identifier.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}
