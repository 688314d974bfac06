//! Column expressions used by native filtering and ordering.

use crate::error::{Error, Result};
use crate::models::Value;

/// Reference to a column, optionally qualified with a table.
///
/// Unqualified columns resolve against the query's primary table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    table: Option<&'static str>,
    name: String,
}

/// Unqualified column reference.
pub fn col(name: impl Into<String>) -> Column {
    Column {
        table: None,
        name: name.into(),
    }
}

#[allow(clippy::should_implement_trait)]
impl Column {
    pub fn qualified(table: &'static str, name: impl Into<String>) -> Self {
        Self {
            table: Some(table),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eq(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Criterion {
        self.compare(CompareOp::Le, value)
    }

    /// Column-to-column equality, typically a join condition.
    pub fn eq_column(self, other: Column) -> Criterion {
        Criterion::Columns {
            left: self,
            op: CompareOp::Eq,
            right: other,
        }
    }

    /// `IS value`; `is_(Value::Null)` is the same as [`Column::is_null`].
    pub fn is_(self, value: impl Into<Value>) -> Criterion {
        match value.into() {
            Value::Null => self.is_null(),
            value => Criterion::Compare {
                column: self,
                op: CompareOp::Is,
                value,
            },
        }
    }

    pub fn is_null(self) -> Criterion {
        Criterion::Null {
            column: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Criterion {
        Criterion::Null {
            column: self,
            negated: true,
        }
    }

    /// Substring match through `LIKE '%needle%'`, so ASCII letters match
    /// regardless of case. `%`, `_` and `\\` in `needle` match literally.
    pub fn contains(self, needle: impl Into<String>) -> Criterion {
        Criterion::Contains {
            column: self,
            needle: needle.into(),
        }
    }

    /// SQL `LIKE` pattern match.
    pub fn like(self, pattern: impl Into<String>) -> Criterion {
        Criterion::Like {
            column: self,
            pattern: pattern.into(),
        }
    }

    pub fn in_<I, V>(self, values: I) -> Criterion
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Criterion::In {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn asc(self) -> Ordering {
        Ordering {
            column: self,
            descending: false,
        }
    }

    pub fn desc(self) -> Ordering {
        Ordering {
            column: self,
            descending: true,
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Criterion {
        Criterion::Compare {
            column: self,
            op,
            value: value.into(),
        }
    }

    pub fn table(&self) -> Option<&'static str> {
        self.table
    }

    pub(crate) fn to_sql(&self, default_table: &str) -> Result<String> {
        let table = self.table.unwrap_or(default_table);
        Ok(format!(
            "{}.{}",
            check_identifier(table)?,
            check_identifier(&self.name)?
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Is,
}

impl CompareOp {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Is => "IS",
        }
    }
}

/// A filter predicate. Built from [`Column`] methods and combined with
/// [`Criterion::and`], [`Criterion::or`] and [`Criterion::not`].
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    Columns {
        left: Column,
        op: CompareOp,
        right: Column,
    },
    Contains {
        column: Column,
        needle: String,
    },
    Like {
        column: Column,
        pattern: String,
    },
    In {
        column: Column,
        values: Vec<Value>,
    },
    Null {
        column: Column,
        negated: bool,
    },
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn and(self, other: Criterion) -> Criterion {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Criterion) -> Criterion {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Criterion {
        Self::Not(Box::new(self))
    }

    /// Tables named by qualified columns, in first-mention order.
    pub(crate) fn tables(&self, found: &mut Vec<&'static str>) {
        let column = match self {
            Self::Compare { column, .. }
            | Self::Contains { column, .. }
            | Self::Like { column, .. }
            | Self::In { column, .. }
            | Self::Null { column, .. } => column,
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.tables(found);
                }
                return;
            }
            Self::Not(inner) => return inner.tables(found),
            Self::Columns { left, right, .. } => {
                for column in [left, right] {
                    note_table(column, found);
                }
                return;
            }
        };
        note_table(column, found);
    }

    /// Render as a SQL boolean expression, appending bound values to `params`.
    pub(crate) fn to_sql(&self, default_table: &str, params: &mut Vec<Value>) -> Result<String> {
        match self {
            Self::Compare { column, op, value } => {
                params.push(value.clone());
                Ok(format!("{} {} ?", column.to_sql(default_table)?, op.as_sql()))
            }
            Self::Columns { left, op, right } => Ok(format!(
                "{} {} {}",
                left.to_sql(default_table)?,
                op.as_sql(),
                right.to_sql(default_table)?
            )),
            Self::Contains { column, needle } => {
                params.push(Value::Text(format!("%{}%", escape_like(needle))));
                Ok(format!("{} LIKE ? ESCAPE '\\'", column.to_sql(default_table)?))
            }
            Self::Like { column, pattern } => {
                params.push(Value::Text(pattern.clone()));
                Ok(format!("{} LIKE ?", column.to_sql(default_table)?))
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                params.extend(values.iter().cloned());
                let marks = vec!["?"; values.len()].join(", ");
                Ok(format!("{} IN ({})", column.to_sql(default_table)?, marks))
            }
            Self::Null { column, negated } => Ok(format!(
                "{} IS {}NULL",
                column.to_sql(default_table)?,
                if *negated { "NOT " } else { "" }
            )),
            Self::And(parts) => join_sql(parts, " AND ", "1 = 1", default_table, params),
            Self::Or(parts) => join_sql(parts, " OR ", "1 = 0", default_table, params),
            Self::Not(inner) => Ok(format!("NOT ({})", inner.to_sql(default_table, params)?)),
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn note_table(column: &Column, found: &mut Vec<&'static str>) {
    if let Some(table) = column.table {
        if !found.contains(&table) {
            found.push(table);
        }
    }
}

fn join_sql(
    parts: &[Criterion],
    separator: &str,
    empty: &str,
    default_table: &str,
    params: &mut Vec<Value>,
) -> Result<String> {
    if parts.is_empty() {
        return Ok(empty.to_string());
    }
    let rendered = parts
        .iter()
        .map(|part| part.to_sql(default_table, params).map(|sql| format!("({})", sql)))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(separator))
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub column: Column,
    pub descending: bool,
}

impl Ordering {
    pub(crate) fn to_sql(&self, default_table: &str) -> Result<String> {
        let direction = if self.descending { "DESC" } else { "ASC" };
        Ok(format!("{} {}", self.column.to_sql(default_table)?, direction))
    }
}

impl From<Column> for Ordering {
    fn from(column: Column) -> Self {
        column.asc()
    }
}

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub(crate) fn check_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}
