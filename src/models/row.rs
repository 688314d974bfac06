use std::collections::BTreeMap;

use serde::Serialize;

use super::value::Value;

/// A loaded row of a mapped entity.
///
/// `entity` is the most-derived entity the row belongs to, so a polymorphic
/// query against a parent entity still reports subclass rows as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub entity: &'static str,
    pub id: i64,
    pub values: BTreeMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }
}
