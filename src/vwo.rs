//! Data model of the VWO SDK as seen by the provider.
use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Context passed to the VWO SDK when evaluating a flag.
///
/// Fields that were absent in the evaluation context stay `None`, which is distinct from an empty
/// string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VwoContext {
    /// User identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// User agent of the user's device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// IP address of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Attributes used for pre-segmentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_variables: Option<HashMap<String, serde_json::Value>>,
    /// Attributes used for variation targeting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_targeting_variables: Option<HashMap<String, serde_json::Value>>,
}

/// The VWO SDK seen from the provider side.
///
/// Implementations must be safe to call concurrently from multiple threads.
///
/// Any closure with a matching signature is a `VwoClient`:
/// ```
/// # use vwo_provider::{Error, Flag, VwoClient, VwoContext};
/// let client = |_key: &str, _context: &VwoContext| Ok::<_, Error>(Flag::new(true, vec![]));
/// assert!(client.get_flag("flag", &VwoContext::default()).unwrap().is_enabled());
/// ```
pub trait VwoClient: Send + Sync {
    /// Evaluate the flag `feature_key` for the user described by `context`.
    fn get_flag(&self, feature_key: &str, context: &VwoContext) -> Result<Flag>;
}

impl<T: Fn(&str, &VwoContext) -> Result<Flag> + Send + Sync> VwoClient for T {
    fn get_flag(&self, feature_key: &str, context: &VwoContext) -> Result<Flag> {
        self(feature_key, context)
    }
}

/// Result of a flag evaluation by the VWO SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    enabled: bool,
    #[serde(default)]
    variables: Vec<Variable>,
}

impl Flag {
    /// Create a flag from its enabled state and variables.
    pub fn new(enabled: bool, variables: Vec<Variable>) -> Self {
        Flag { enabled, variables }
    }

    /// Whether the flag is enabled for the user.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Variables attached to the flag, in configuration order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Return the raw value of the first variable named `name`, or `default_value` if there is
    /// none.
    pub fn get_variable(&self, name: &str, default_value: serde_json::Value) -> serde_json::Value {
        self.variables
            .iter()
            .find(|variable| variable.key == name)
            .map(|variable| variable.value.to_json())
            .unwrap_or(default_value)
    }
}

/// A typed configuration value attached to a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name.
    pub key: String,
    /// Typed value.
    #[serde(flatten)]
    pub value: VariableValue,
}

impl Variable {
    /// Create a variable.
    pub fn new(key: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        Variable {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Variable value tagged with its `type`.
///
/// Numbers are kept as [`serde_json::Number`] so that integer and double variables can be widened
/// or narrowed on extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VariableValue {
    /// `"boolean"`
    Boolean(bool),
    /// `"string"`
    String(String),
    /// `"integer"`
    Integer(serde_json::Number),
    /// `"double"`
    Double(serde_json::Number),
    /// `"json"`. Only object values are usable as structured flag values.
    Json(serde_json::Value),
}

impl VariableValue {
    /// Type tag of the value.
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Boolean(_) => VariableType::Boolean,
            VariableValue::String(_) => VariableType::String,
            VariableValue::Integer(_) => VariableType::Integer,
            VariableValue::Double(_) => VariableType::Double,
            VariableValue::Json(_) => VariableType::Json,
        }
    }

    /// Untagged representation of the value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VariableValue::Boolean(b) => serde_json::Value::Bool(*b),
            VariableValue::String(s) => serde_json::Value::String(s.clone()),
            VariableValue::Integer(n) | VariableValue::Double(n) => {
                serde_json::Value::Number(n.clone())
            }
            VariableValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Integer(value.into())
    }
}

/// Type of a VWO variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// `"boolean"`
    Boolean,
    /// `"string"`
    String,
    /// `"integer"`
    Integer,
    /// `"double"`
    Double,
    /// `"json"`
    Json,
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VariableType::Boolean => "boolean",
            VariableType::String => "string",
            VariableType::Integer => "integer",
            VariableType::Double => "double",
            VariableType::Json => "json",
        })
    }
}
