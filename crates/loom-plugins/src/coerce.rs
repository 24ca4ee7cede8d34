//! Conversion between untyped wire values and declared parameter types.
//!
//! Wire values are JSON. Each argument is converted independently to its
//! positional [`ParamType`] using the narrowest lossless rule; a value that
//! cannot keep its identity in the target type is rejected before the
//! method runs.
//!
//! | Target | Accepts |
//! |--------|---------|
//! | `int` | integers, integral floats, strings parsing as `i64` |
//! | `float` | numbers (integers up to 2^53), numeric strings |
//! | `string` | strings, numbers, booleans |
//! | `bool` | booleans, `"true"`, `"false"` |
//! | `list<T>` | arrays, element-wise |
//! | `map` | objects |
//! | `json` | anything |
//! | `optional<T>` | null, or what `T` accepts |

use loom_abi::ParamType;
use serde_json::{Map, Number, Value};

/// Largest integer magnitude an `f64` represents exactly.
const MAX_EXACT_FLOAT_INT: u64 = 9_007_199_254_740_992;

/// A typed argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Absent value: a null `optional<T>` or a `unit` return.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Str(String),
    /// Sequence.
    List(Vec<Arg>),
    /// JSON object.
    Map(Map<String, Value>),
    /// Uninterpreted JSON.
    Json(Value),
}

impl Arg {
    /// The text, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as a float, for either numeric variant.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Arg]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a wire value. Non-finite floats become their text.
    #[must_use]
    pub fn into_wire(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(n) => Value::from(n),
            Self::Float(f) => {
                Number::from_f64(f).map_or_else(|| Value::String(f.to_string()), Value::Number)
            },
            Self::Str(s) => Value::String(s),
            Self::List(items) => Value::Array(items.into_iter().map(Self::into_wire).collect()),
            Self::Map(map) => Value::Object(map),
            Self::Json(v) => v,
        }
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Self::List(items)
    }
}

/// A rejected argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    /// Zero-based argument position.
    pub position: usize,
    /// Declared type.
    pub expected: ParamType,
    /// Why the value does not fit.
    pub message: String,
}

/// Coerce a positional argument list. The caller guarantees equal lengths.
///
/// # Errors
///
/// Returns the first argument that cannot be converted.
pub fn coerce_args(args: &[Value], params: &[ParamType]) -> Result<Vec<Arg>, CoercionError> {
    debug_assert_eq!(args.len(), params.len());
    args.iter()
        .zip(params)
        .enumerate()
        .map(|(position, (value, ty))| {
            coerce(value, ty).map_err(|message| CoercionError {
                position,
                expected: ty.clone(),
                message,
            })
        })
        .collect()
}

/// Coerce one wire value to `ty`.
///
/// # Errors
///
/// Returns a description of the mismatch.
pub fn coerce(value: &Value, ty: &ParamType) -> Result<Arg, String> {
    match (ty, value) {
        (ParamType::Json, v) => Ok(Arg::Json(v.clone())),
        (ParamType::Optional(_) | ParamType::Unit, Value::Null) => Ok(Arg::Null),
        (ParamType::Optional(inner), v) => coerce(v, inner),
        (_, Value::Null) => Err(format!("null is not a {ty}")),

        (ParamType::Bool, Value::Bool(b)) => Ok(Arg::Bool(*b)),
        (ParamType::Bool, Value::String(s)) => match s.as_str() {
            "true" => Ok(Arg::Bool(true)),
            "false" => Ok(Arg::Bool(false)),
            _ => Err(format!("{s:?} is not a boolean")),
        },

        (ParamType::Int, Value::Number(n)) => number_to_int(n),
        (ParamType::Int, Value::String(s)) => s
            .parse::<i64>()
            .map(Arg::Int)
            .map_err(|_| format!("{s:?} is not an integer")),

        (ParamType::Float, Value::Number(n)) => number_to_float(n),
        (ParamType::Float, Value::String(s)) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Arg::Float(f)),
            _ => Err(format!("{s:?} is not a number")),
        },

        (ParamType::String, Value::String(s)) => Ok(Arg::Str(s.clone())),
        (ParamType::String, Value::Number(n)) => Ok(Arg::Str(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(Arg::Str(b.to_string())),

        (ParamType::List(inner), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce(item, inner).map_err(|e| format!("element {i}: {e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Arg::List),

        (ParamType::Map, Value::Object(map)) => Ok(Arg::Map(map.clone())),

        (_, v) => Err(format!("{} {v} is not a {ty}", kind_of(v))),
    }
}

/// Convert a method's result to the wire, shaped by its declared return type.
///
/// A result that does not fit the declared type is returned as its text.
#[must_use]
pub fn coerce_return(result: Arg, returns: &ParamType) -> Value {
    if *returns == ParamType::Unit {
        return Value::Null;
    }
    let wire = result.into_wire();
    match coerce(&wire, returns) {
        Ok(shaped) => shaped.into_wire(),
        Err(_) => match wire {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_int(n: &Number) -> Result<Arg, String> {
    if let Some(i) = n.as_i64() {
        return Ok(Arg::Int(i));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Arg::Int(f as i64))
        },
        _ => Err(format!("{n} is not an integer")),
    }
}

#[allow(clippy::cast_precision_loss)]
fn number_to_float(n: &Number) -> Result<Arg, String> {
    if let Some(i) = n.as_i64() {
        return if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT {
            Ok(Arg::Float(i as f64))
        } else {
            Err(format!("{n} cannot be represented exactly as a float"))
        };
    }
    if n.is_u64() {
        return Err(format!("{n} cannot be represented exactly as a float"));
    }
    n.as_f64()
        .map(Arg::Float)
        .ok_or_else(|| format!("{n} is not a number"))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
