//! Extraction of typed values from VWO flag variables.
//!
//! Resolution is split into two layers: functions here classify what happened into an
//! [`Outcome`], and the provider collapses every outcome into a single
//! [`ResolutionDetails`](crate::ResolutionDetails) shape.
use crate::{
    context::VARIABLE_KEY_ATTRIBUTE, Error, Flag, Result, Value, VariableType, VariableValue,
};

/// Classified result of extracting a value from a flag.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome<T> {
    /// A variable with the requested key and type was found.
    Matched { variable_key: String, value: T },
    /// No variable key was requested, so the flag enabled state is the value.
    FlagState(T),
    /// Structured value assembled from all variables of the flag.
    AllVariables(T),
    /// Value returned by the vendor by-name lookup of the `key` variable.
    NamedFallback(T),
    /// A variable with the requested key exists but holds another type.
    TypeMismatch {
        variable_key: String,
        expected: VariableType,
        found: VariableType,
    },
    /// No variable with the requested key.
    NoMatch,
}

/// Typed extraction from variable values.
pub(crate) trait VariableDecode: Sized + Clone {
    const VARIABLE_TYPE: VariableType;

    /// Extract `Self` from a variable of type [`Self::VARIABLE_TYPE`]. Returns `None` for other
    /// variable types and an error if the value does not fit in `Self`.
    fn from_variable(value: &VariableValue) -> Option<Result<Self>>;

    /// Convert an untagged value returned by the by-name vendor lookup.
    fn convert(value: &serde_json::Value) -> Result<Self>;

    fn to_json(&self) -> serde_json::Value;
}

fn invalid_value<T: VariableDecode>(value: impl std::fmt::Display) -> Error {
    Error::InvalidValue {
        value: value.to_string(),
        expected: T::VARIABLE_TYPE,
    }
}

impl VariableDecode for bool {
    const VARIABLE_TYPE: VariableType = VariableType::Boolean;

    fn from_variable(value: &VariableValue) -> Option<Result<Self>> {
        match value {
            VariableValue::Boolean(b) => Some(Ok(*b)),
            _ => None,
        }
    }

    fn convert(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(*b),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            value => Err(invalid_value::<Self>(value)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        (*self).into()
    }
}

impl VariableDecode for String {
    const VARIABLE_TYPE: VariableType = VariableType::String;

    fn from_variable(value: &VariableValue) -> Option<Result<Self>> {
        match value {
            VariableValue::String(s) => Some(Ok(s.clone())),
            _ => None,
        }
    }

    /// Values of other types are converted to their JSON text.
    fn convert(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Null => Err(invalid_value::<Self>(value)),
            value => Ok(value.to_string()),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        self.as_str().into()
    }
}

impl VariableDecode for i64 {
    const VARIABLE_TYPE: VariableType = VariableType::Integer;

    fn from_variable(value: &VariableValue) -> Option<Result<Self>> {
        match value {
            VariableValue::Integer(n) => {
                Some(number_to_i64(n).ok_or_else(|| invalid_value::<Self>(n)))
            }
            _ => None,
        }
    }

    fn convert(value: &serde_json::Value) -> Result<Self> {
        let converted = match value {
            serde_json::Value::Number(n) => number_to_i64(n),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        };
        converted.ok_or_else(|| invalid_value::<Self>(value))
    }

    fn to_json(&self) -> serde_json::Value {
        (*self).into()
    }
}

impl VariableDecode for f64 {
    const VARIABLE_TYPE: VariableType = VariableType::Double;

    fn from_variable(value: &VariableValue) -> Option<Result<Self>> {
        match value {
            VariableValue::Double(n) => Some(n.as_f64().ok_or_else(|| invalid_value::<Self>(n))),
            _ => None,
        }
    }

    fn convert(value: &serde_json::Value) -> Result<Self> {
        let converted = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        converted.ok_or_else(|| invalid_value::<Self>(value))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Number::from_f64(*self)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Integers stored as floats are rounded half to even. Values outside the `i64` range are
/// rejected.
fn number_to_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let rounded = round_half_even(n.as_f64()?);
    // `i64::MAX as f64` is 2^63, one past the largest i64.
    if rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn round_half_even(f: f64) -> f64 {
    if (f - f.trunc()).abs() == 0.5 {
        2.0 * (f / 2.0).round()
    } else {
        f.round()
    }
}

/// Resolve a boolean. Without a requested variable key, the flag enabled state wins.
pub(crate) fn resolve_boolean(flag: &Flag, variable_key: Option<&str>) -> Result<Outcome<bool>> {
    match variable_key {
        None => Ok(Outcome::FlagState(flag.is_enabled())),
        Some(variable_key) => find_variable(flag, variable_key),
    }
}

/// Resolve a string, integer or double. When no variable matches, falls back to the vendor lookup
/// of a variable literally named `key`. A looked up value that does not convert is an error.
pub(crate) fn resolve_scalar<T: VariableDecode>(
    flag: &Flag,
    variable_key: Option<&str>,
    default_value: &T,
) -> Result<Outcome<T>> {
    let outcome = match variable_key {
        Some(variable_key) => find_variable(flag, variable_key)?,
        None => Outcome::NoMatch,
    };

    match outcome {
        Outcome::NoMatch => {
            // Looks up the literal attribute name rather than `variable_key`.
            let fallback = default_value.to_json();
            let value = flag.get_variable(VARIABLE_KEY_ATTRIBUTE, fallback.clone());
            if value == fallback {
                return Ok(Outcome::NamedFallback(default_value.clone()));
            }
            Ok(Outcome::NamedFallback(T::convert(&value)?))
        }
        outcome => Ok(outcome),
    }
}

/// Resolve a structured value, serialized as a JSON string.
///
/// With a non-empty variable key, the first `json` variable with that key holding an object wins.
/// Unlike scalar resolution, key matches of other types do not stop the scan. If no `json`
/// variable has the key, the default value is used. Without a key, or when `json` variables have
/// the key but none holds an object, all variables are collected into one object.
pub(crate) fn resolve_structure(flag: &Flag, variable_key: Option<&str>) -> Result<Outcome<Value>> {
    if let Some(variable_key) = variable_key.filter(|key| !key.is_empty()) {
        let mut key_matched = false;
        let mut mismatch = None;
        for variable in flag.variables() {
            if variable.key != variable_key {
                continue;
            }
            match &variable.value {
                VariableValue::Json(value) => {
                    key_matched = true;
                    if value.is_object() {
                        return Ok(Outcome::Matched {
                            variable_key: variable.key.clone(),
                            value: Value::String(serde_json::to_string(value)?),
                        });
                    }
                }
                value => {
                    mismatch.get_or_insert(value.variable_type());
                }
            }
        }

        if !key_matched {
            return Ok(match mismatch {
                Some(found) => Outcome::TypeMismatch {
                    variable_key: variable_key.to_owned(),
                    expected: VariableType::Json,
                    found,
                },
                None => Outcome::NoMatch,
            });
        }
    }

    let all_variables = flag
        .variables()
        .iter()
        .map(|variable| (variable.key.clone(), variable.value.to_json()))
        .collect::<serde_json::Map<_, _>>();

    Ok(Outcome::AllVariables(Value::String(serde_json::to_string(
        &all_variables,
    )?)))
}

/// Find the first variable with `variable_key`. The scan stops there even if its type differs.
fn find_variable<T: VariableDecode>(flag: &Flag, variable_key: &str) -> Result<Outcome<T>> {
    let Some(variable) = flag
        .variables()
        .iter()
        .find(|variable| variable.key == variable_key)
    else {
        return Ok(Outcome::NoMatch);
    };

    match T::from_variable(&variable.value) {
        Some(value) => Ok(Outcome::Matched {
            variable_key: variable.key.clone(),
            value: value?,
        }),
        None => Ok(Outcome::TypeMismatch {
            variable_key: variable.key.clone(),
            expected: T::VARIABLE_TYPE,
            found: variable.value.variable_type(),
        }),
    }
}
