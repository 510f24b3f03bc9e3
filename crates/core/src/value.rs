//! Runtime values of the rule DSL.
//!
//! These are DISTINCT from the XPath engine's value types: everything an
//! XPath query returns is converted into a [`Value`] at the evaluator
//! boundary, and rule comparisons only ever see [`Value`]s.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// A value flowing through DSL evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Dec(f64),
    Str(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

/// Declared coercion target for `value`/`literal` expressions and range
/// bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Date,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Date => "date",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot interpret {found} '{text}' as {target}")]
pub struct CoercionError {
    pub text: String,
    pub found: &'static str,
    pub target: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot order {left} against {right}")]
pub struct CompareError {
    pub left: &'static str,
    pub right: &'static str,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Dec(_) => "decimal",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "list",
        }
    }

    /// The boolean projection used by `existence`, `if`, `and`, `or`, `not`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Dec(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Structural string form: numbers without trailing zeros, `Null` as the
    /// empty string, lists as `[a, b]`.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Dec(n) => render_decimal(*n),
            Value::Str(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }

    /// `Int`/`Dec` as a float; `None` for every other tag.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Dec(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Applies the declared coercion. Deterministic: succeeds or fails
    /// cleanly, never guesses.
    pub fn coerce(&self, target: DataType) -> Result<Value, CoercionError> {
        match target {
            DataType::String => Ok(Value::Str(self.render())),
            DataType::Integer => self.to_integer().map(Value::Int),
            DataType::Decimal => self.to_decimal().map(Value::Dec),
            DataType::Date => self.to_date().map(Value::Date),
        }
    }

    fn fail(&self, target: &'static str) -> CoercionError {
        CoercionError {
            text: self.render(),
            found: self.type_name(),
            target,
        }
    }

    fn to_integer(&self) -> Result<i64, CoercionError> {
        match self {
            Value::Int(n) => Ok(*n),
            // Truncation is only allowed when it loses nothing.
            Value::Dec(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
            Value::Str(s) => s.trim().parse().map_err(|_| self.fail("integer")),
            _ => Err(self.fail("integer")),
        }
    }

    fn to_decimal(&self) -> Result<f64, CoercionError> {
        match self {
            Value::Dec(n) => Ok(*n),
            Value::Int(n) => Ok(*n as f64),
            Value::Str(s) => s.trim().parse().map_err(|_| self.fail("decimal")),
            _ => Err(self.fail("decimal")),
        }
    }

    pub fn to_boolean(&self) -> Result<bool, CoercionError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Dec(n) => Ok(*n != 0.0),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.fail("boolean")),
            },
            _ => Err(self.fail("boolean")),
        }
    }

    fn to_date(&self) -> Result<NaiveDate, CoercionError> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Str(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| self.fail("date")),
            _ => Err(self.fail("date")),
        }
    }

    /// Ordering for the relational operators: numeric when both sides are
    /// numeric (integer promotes to decimal), lexical for string pairs,
    /// chronological for date pairs. Anything else is not orderable.
    pub fn compare(&self, other: &Value) -> Result<Ordering, CompareError> {
        let not_orderable = || CompareError {
            left: self.type_name(),
            right: other.type_name(),
        };
        if let (Some(l), Some(r)) = (self.as_number(), other.as_number()) {
            return l.partial_cmp(&r).ok_or_else(not_orderable);
        }
        match (self, other) {
            (Value::Str(l), Value::Str(r)) => Ok(l.cmp(r)),
            (Value::Date(l), Value::Date(r)) => Ok(l.cmp(r)),
            _ => Err(not_orderable()),
        }
    }
}

/// Typed equality: tags must agree, except that integer/decimal pairs
/// compare numerically and lists compare elementwise.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Date(l), Value::Date(r)) => l == r,
            (Value::List(l), Value::List(r)) => l == r,
            _ => match (self.as_number(), other.as_number()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
        }
    }
}

fn render_decimal(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn integer_coercion_rejects_fractions() {
        assert_eq!(Value::Str("42".into()).coerce(DataType::Integer), Ok(Value::Int(42)));
        assert_eq!(Value::Dec(3.0).coerce(DataType::Integer), Ok(Value::Int(3)));
        assert!(Value::Str("3.5".into()).coerce(DataType::Integer).is_err());
        assert!(Value::Dec(3.5).coerce(DataType::Integer).is_err());
        assert!(Value::Bool(true).coerce(DataType::Integer).is_err());
    }

    #[test]
    fn decimal_coercion() {
        assert_eq!(Value::Str(" 2.5 ".into()).coerce(DataType::Decimal), Ok(Value::Dec(2.5)));
        assert_eq!(Value::Int(7).coerce(DataType::Decimal), Ok(Value::Dec(7.0)));
        assert!(Value::Bool(true).coerce(DataType::Decimal).is_err());
    }

    #[test]
    fn boolean_coercion_is_strict_on_strings() {
        assert_eq!(Value::Str("TRUE".into()).to_boolean(), Ok(true));
        assert_eq!(Value::Str("0".into()).to_boolean(), Ok(false));
        assert!(Value::Str("yes".into()).to_boolean().is_err());
        assert_eq!(Value::Dec(-0.5).to_boolean(), Ok(true));
    }

    #[test]
    fn date_coercion_is_strict_iso() {
        assert_eq!(
            Value::Str("2024-02-29".into()).coerce(DataType::Date),
            Ok(Value::Date(date("2024-02-29")))
        );
        assert!(Value::Str("29/02/2024".into()).coerce(DataType::Date).is_err());
        assert!(Value::Str("2024-2-9".into()).coerce(DataType::Date).is_err());
    }

    #[test]
    fn coercion_round_trips_through_string() {
        for (value, ty) in [
            (Value::Int(42), DataType::Integer),
            (Value::Dec(2.5), DataType::Decimal),
            (Value::Date(date("2023-06-01")), DataType::Date),
        ] {
            let rendered = Value::Str(value.render());
            assert_eq!(rendered.coerce(ty).unwrap(), value);
        }
    }

    #[test]
    fn rendering() {
        assert_eq!(Value::Dec(600.0).render(), "600");
        assert_eq!(Value::Dec(0.25).render(), "0.25");
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::Bool(false).render(), "false");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".into())]).render(),
            "[1, a]"
        );
    }

    #[test]
    fn equality_promotes_numerics_and_respects_tags() {
        assert_eq!(Value::Int(3), Value::Dec(3.0));
        assert_ne!(Value::Str("3".into()), Value::Int(3));
        assert_ne!(Value::Null, Value::Str("".into()));
        assert_eq!(
            Value::List(vec![Value::Int(1)]),
            Value::List(vec![Value::Dec(1.0)])
        );
    }

    #[test]
    fn ordering_rules() {
        assert_eq!(Value::Int(2).compare(&Value::Dec(2.5)), Ok(Ordering::Less));
        assert_eq!(
            Value::Str("abc".into()).compare(&Value::Str("abd".into())),
            Ok(Ordering::Less)
        );
        assert_eq!(
            Value::Date(date("2024-01-01")).compare(&Value::Date(date("2023-12-31"))),
            Ok(Ordering::Greater)
        );
        assert!(Value::Str("1".into()).compare(&Value::Int(1)).is_err());
        assert!(Value::Bool(true).compare(&Value::Bool(false)).is_err());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Str("".into()).truthy());
        assert!(!Value::Dec(0.0).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Int(-5).truthy());
        assert!(Value::Date(date("2020-01-01")).truthy());
        assert!(Value::List(vec![Value::Null]).truthy());
    }
}
