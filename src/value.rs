use crate::error::InputError;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

/// The JSON data model instances and schemas are evaluated in.
///
/// Objects keep their insertion order for error reporting, but equality
/// ignores it. Numbers compare by value, so `1` and `1.0` are equal.
///
/// ```
/// use jsv::Value;
/// use serde_json::json;
/// use std::convert::TryFrom;
///
/// let a = Value::try_from(&json!({"a": 1, "b": [true]})).unwrap();
/// let b = Value::try_from(&json!({"b": [true], "a": 1.0})).unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// A JSON number: an exact 64-bit integer or a finite float.
#[derive(Clone, Copy)]
pub struct Number {
    n: N,
}

#[derive(Clone, Copy)]
enum N {
    PosInt(u64),
    NegInt(i64),
    Float(f64),
}

/// Floats whose magnitude is below this bound convert to `i128` exactly when
/// they have no fractional part.
const I128_EXACT_BOUND: f64 = 1.0e38;

const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

impl Number {
    /// Returns `None` for NaN and infinities, which have no JSON representation.
    pub fn from_f64(f: f64) -> Option<Number> {
        if f.is_finite() {
            Some(Number { n: N::Float(f) })
        } else {
            None
        }
    }

    /// Parses a JSON number literal, rejecting integers outside
    /// `[i64::MIN, u64::MAX]` and floats that overflow.
    pub fn from_literal(literal: &str) -> Result<Number, InputError> {
        if literal.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
            let f: f64 = literal
                .parse()
                .map_err(|_| InputError::InvalidNumber(literal.to_owned()))?;
            return Number::from_f64(f).ok_or_else(|| InputError::NonFiniteNumber(literal.to_owned()));
        }

        if let Ok(u) = literal.parse::<u64>() {
            return Ok(u.into());
        }

        match literal.parse::<i64>() {
            Ok(i) => Ok(i.into()),
            Err(_) if literal.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) => {
                Err(InputError::IntegerOutOfRange(literal.to_owned()))
            }
            Err(_) => Err(InputError::InvalidNumber(literal.to_owned())),
        }
    }

    /// Whether the number was written as an integer.
    pub fn is_integer(&self) -> bool {
        !matches!(self.n, N::Float(_))
    }

    /// Whether the number has no fractional part, regardless of how it was
    /// written.
    pub fn has_integer_value(&self) -> bool {
        match self.n {
            N::Float(f) => f.fract() == 0.0,
            _ => true,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.n {
            N::PosInt(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.n {
            N::PosInt(u) => i64::try_from(u).ok(),
            N::NegInt(i) => Some(i),
            N::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.n {
            N::PosInt(u) => u as f64,
            N::NegInt(i) => i as f64,
            N::Float(f) => f,
        }
    }

    /// The exact integer value, also for integral floats of moderate size.
    fn as_i128(&self) -> Option<i128> {
        match self.n {
            N::PosInt(u) => Some(i128::from(u)),
            N::NegInt(i) => Some(i128::from(i)),
            N::Float(f) if f.fract() == 0.0 && f.abs() < I128_EXACT_BOUND => Some(f as i128),
            N::Float(_) => None,
        }
    }

    pub(crate) fn is_positive(&self) -> bool {
        match self.n {
            N::PosInt(u) => u > 0,
            N::NegInt(_) => false,
            N::Float(f) => f > 0.0,
        }
    }

    /// Whether `self` is an integer multiple of `divisor`.
    ///
    /// Integral operands are checked exactly. Otherwise the quotient must lie
    /// within a few ulps of an integer.
    pub(crate) fn is_multiple_of(&self, divisor: &Number) -> bool {
        if let (Some(x), Some(m)) = (self.as_i128(), divisor.as_i128()) {
            return m != 0 && x % m == 0;
        }

        let quotient = self.as_f64() / divisor.as_f64();
        if !quotient.is_finite() {
            return false;
        }

        let deviation = (quotient - quotient.round()).abs();
        deviation <= MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0)
    }
}

const MULTIPLE_OF_TOLERANCE: f64 = 8.0 * f64::EPSILON;

/// Compares an exact integer with a finite float without rounding either.
fn cmp_int_float(i: i128, f: f64) -> Ordering {
    if f >= TWO_POW_64 {
        return Ordering::Less;
    }
    if f < -TWO_POW_64 {
        return Ordering::Greater;
    }

    let floor = f.floor();
    match i.cmp(&(floor as i128)) {
        Ordering::Equal if f > floor => Ordering::Less,
        ordering => ordering,
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Number) -> Ordering {
        match (self.n, other.n) {
            (N::Float(a), N::Float(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (N::Float(a), _) => cmp_int_float(other.int_value(), a).reverse(),
            (_, N::Float(b)) => cmp_int_float(self.int_value(), b),
            _ => self.int_value().cmp(&other.int_value()),
        }
    }
}

impl Number {
    fn int_value(&self) -> i128 {
        match self.n {
            N::PosInt(u) => i128::from(u),
            N::NegInt(i) => i128::from(i),
            N::Float(f) => f as i128,
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl From<u64> for Number {
    fn from(u: u64) -> Number {
        Number { n: N::PosInt(u) }
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Number {
        if i < 0 {
            Number { n: N::NegInt(i) }
        } else {
            Number {
                n: N::PosInt(i as u64),
            }
        }
    }
}

impl From<u32> for Number {
    fn from(u: u32) -> Number {
        u64::from(u).into()
    }
}

impl From<i32> for Number {
    fn from(i: i32) -> Number {
        i64::from(i).into()
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({})", self)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.n {
            N::PosInt(u) => write!(f, "{}", u),
            N::NegInt(i) => write!(f, "{}", i),
            N::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl Value {
    /// Follows JSON Pointer reference tokens (already unescaped).
    pub fn pointer<S: AsRef<str>>(&self, tokens: &[S]) -> Option<&Value> {
        tokens.iter().try_fold(self, |target, token| {
            let token = token.as_ref();
            match target {
                Value::Object(map) => map.get(token),
                Value::Array(items) => parse_index(token).and_then(|i| items.get(i)),
                _ => None,
            }
        })
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The JSON Schema primitive type name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_integer() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = InputError;

    fn try_from(value: &serde_json::Value) -> Result<Value, InputError> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(Number::from_literal(&n.to_string())?),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Value::try_from(v)?)))
                    .collect::<Result<_, InputError>>()?,
            ),
        })
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = InputError;

    fn try_from(value: serde_json::Value) -> Result<Value, InputError> {
        Value::try_from(&value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        Value::Number(n)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Value {
        Value::Number(u.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Number(i.into())
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.n {
            N::PosInt(u) => serializer.serialize_u64(u),
            N::NegInt(i) => serializer.serialize_i64(i),
            N::Float(f) => serializer.serialize_f64(f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::try_from(&json).unwrap()
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(value(json!(1)), value(json!(1.0)));
        assert_eq!(value(json!(-0.0)), value(json!(0)));
        assert_ne!(value(json!(1)), value(json!(1.5)));
        assert_ne!(value(json!(true)), value(json!(1)));

        let big: Number = 9_007_199_254_740_993_u64.into();
        let rounded = Number::from_f64(9_007_199_254_740_992.0).unwrap();
        assert!(big > rounded);
        assert_eq!(Ordering::Less, Number::from(-1).cmp(&Number::from_f64(-0.5).unwrap()));
        assert_eq!(Ordering::Greater, Number::from(u64::MAX).cmp(&Number::from_f64(1.0e19).unwrap()));
        assert_eq!(Ordering::Less, Number::from(u64::MAX).cmp(&Number::from_f64(1.0e20).unwrap()));
        assert_eq!(Ordering::Greater, Number::from(i64::MIN).cmp(&Number::from_f64(-1.0e19).unwrap()));
    }

    #[test]
    fn object_equality_ignores_order() {
        assert_eq!(value(json!({"a": 1, "b": 2})), value(json!({"b": 2, "a": 1})));
        assert_ne!(value(json!({"a": 1})), value(json!({"a": 1, "b": 2})));
        assert_ne!(value(json!([1, 2])), value(json!([2, 1])));
    }

    #[test]
    fn literals() {
        assert!(Number::from_literal("18446744073709551615").is_ok());
        assert!(Number::from_literal("-9223372036854775808").is_ok());
        assert_eq!(
            Err(InputError::IntegerOutOfRange("18446744073709551616".to_owned())),
            Number::from_literal("18446744073709551616")
        );
        assert_eq!(
            Err(InputError::IntegerOutOfRange("-9223372036854775809".to_owned())),
            Number::from_literal("-9223372036854775809")
        );
        assert_eq!(
            Err(InputError::NonFiniteNumber("1e400".to_owned())),
            Number::from_literal("1e400")
        );
        assert!(Number::from_literal("1.8446744073709552e19").is_ok());
        assert!(Number::from_literal("1.0").unwrap().has_integer_value());
        assert!(!Number::from_literal("1.0").unwrap().is_integer());
    }

    #[test]
    fn oversized_instance_literal() {
        let json: serde_json::Value = serde_json::from_str("[1, 100000000000000000000]").unwrap();
        assert!(matches!(
            Value::try_from(&json),
            Err(InputError::IntegerOutOfRange(_))
        ));
    }

    #[test]
    fn multiple_of() {
        let n = |s: &str| Number::from_literal(s).unwrap();
        assert!(n("10").is_multiple_of(&n("2")));
        assert!(!n("7").is_multiple_of(&n("2")));
        assert!(n("4.5").is_multiple_of(&n("1.5")));
        assert!(!n("35").is_multiple_of(&n("1.5")));
        assert!(n("0.0075").is_multiple_of(&n("0.0001")));
        assert!(!n("0.00751").is_multiple_of(&n("0.0001")));
        assert!(n("20.0").is_multiple_of(&n("4")));
        assert!(!n("1e308").is_multiple_of(&n("0.123456789")));
        assert!(n("18446744073709551615").is_multiple_of(&n("5")));
    }

    #[test]
    fn pointer() {
        let doc = value(json!({"a": [{"b/c": 1}], "01": 2}));
        assert_eq!(Some(&value(json!(1))), doc.pointer(&["a", "0", "b/c"]));
        assert_eq!(None, doc.pointer(&["a", "00"]));
        assert_eq!(Some(&value(json!(2))), doc.pointer(&["01"]));
        assert_eq!(Some(&doc), doc.pointer::<&str>(&[]));
    }

    #[test]
    fn display() {
        assert_eq!(r#"{"a":[1,2.5,null]}"#, value(json!({"a": [1, 2.5, null]})).to_string());
    }
}
