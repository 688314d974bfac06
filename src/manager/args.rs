use std::collections::BTreeMap;

use crate::db::Criterion;
use crate::error::{Error, Result};
use crate::models::{EntityType, Value};

/// One positional argument passed to an operation.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Criterion(Criterion),
    Entity(&'static EntityType),
}

impl Arg {
    fn kind(&self) -> &'static str {
        match self {
            Self::Value(value) => value.kind(),
            Self::Criterion(_) => "criterion",
            Self::Entity(_) => "entity",
        }
    }
}

macro_rules! value_args {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Value(value.into())
                }
            }
        )+
    };
}

value_args!(Value, bool, i32, i64, f64, &str, String);

impl From<Criterion> for Arg {
    fn from(criterion: Criterion) -> Self {
        Self::Criterion(criterion)
    }
}

impl From<&'static EntityType> for Arg {
    fn from(entity: &'static EntityType) -> Self {
        Self::Entity(entity)
    }
}

/// Arguments of an operation call: positional values plus keyword values.
///
/// Nothing checks arguments before an operation runs. The typed accessors
/// return [`Error::Argument`] so an operation can propagate a bad call with `?`.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keywords: BTreeMap<String, Value>,
}

/// Build [`Args`] from positional values.
///
/// ```
/// use managed_query::args;
///
/// let args = args![18, "Person 1"].kwarg("limit", 5);
/// assert_eq!(args.int(0).unwrap(), 18);
/// assert_eq!(args.text(1).unwrap(), "Person 1");
/// assert_eq!(args.keyword_int("limit").unwrap(), Some(5));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::manager::Args::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::manager::Args::new()$(.arg($arg))+
    };
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn keywords(&self) -> &BTreeMap<String, Value> {
        &self.keywords
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        match self.positional.get(index) {
            Some(Arg::Value(value)) => Ok(value),
            other => Err(mismatch(index, "a value", other)),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        self.value(index)?
            .as_i64()
            .ok_or_else(|| mismatch(index, "an integer", self.positional.get(index)))
    }

    pub fn real(&self, index: usize) -> Result<f64> {
        self.value(index)?
            .as_f64()
            .ok_or_else(|| mismatch(index, "a number", self.positional.get(index)))
    }

    pub fn text(&self, index: usize) -> Result<&str> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| mismatch(index, "text", self.positional.get(index)))
    }

    pub fn boolean(&self, index: usize) -> Result<bool> {
        self.value(index)?
            .as_bool()
            .ok_or_else(|| mismatch(index, "a boolean", self.positional.get(index)))
    }

    pub fn criterion(&self, index: usize) -> Result<&Criterion> {
        match self.positional.get(index) {
            Some(Arg::Criterion(criterion)) => Ok(criterion),
            other => Err(mismatch(index, "a criterion", other)),
        }
    }

    pub fn entity(&self, index: usize) -> Result<&'static EntityType> {
        match self.positional.get(index) {
            Some(Arg::Entity(entity)) => Ok(entity),
            other => Err(mismatch(index, "an entity", other)),
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    pub fn keyword_int(&self, name: &str) -> Result<Option<i64>> {
        match self.keywords.get(name) {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| Error::Argument {
                position: name.to_string(),
                expected: "an integer",
            }),
        }
    }
}

fn mismatch(index: usize, expected: &'static str, found: Option<&Arg>) -> Error {
    tracing::trace!(index, expected, found = found.map(Arg::kind), "argument mismatch");
    Error::Argument {
        position: index.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::col;

    #[test]
    fn test_accessors_read_positional_values() {
        let args = args![18, "x", true];
        assert_eq!(args.len(), 3);
        assert_eq!(args.int(0).unwrap(), 18);
        assert_eq!(args.text(1).unwrap(), "x");
        assert!(args.boolean(2).unwrap());
    }

    #[test]
    fn test_missing_argument_is_an_error() {
        let err = args![].int(0).unwrap_err();
        assert!(matches!(err, Error::Argument { ref position, .. } if position == "0"));
    }

    #[test]
    fn test_wrong_shape_is_an_error() {
        let args = args!["eighteen"];
        assert!(matches!(args.int(0), Err(Error::Argument { .. })));
        assert!(matches!(args.criterion(0), Err(Error::Argument { .. })));
    }

    #[test]
    fn test_criterion_and_keywords() {
        let args = Args::new().arg(col("age").gt(1)).kwarg("name", "a");
        assert!(args.criterion(0).is_ok());
        assert_eq!(args.keyword("name"), Some(&Value::Text("a".into())));
        assert!(args.keyword_int("name").is_err());
        assert_eq!(args.keyword_int("missing").unwrap(), None);
    }
}
