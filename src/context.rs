use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::VwoContext;

/// Attribute holding the requested variable key.
pub(crate) const VARIABLE_KEY_ATTRIBUTE: &str = "key";
const USER_AGENT_ATTRIBUTE: &str = "userAgent";
const IP_ADDRESS_ATTRIBUTE: &str = "ipAddress";
const CUSTOM_VARIABLES_ATTRIBUTE: &str = "customVariables";
const VARIATION_TARGETING_VARIABLES_ATTRIBUTE: &str = "variationTargetingVariables";

/// Identity and attributes used to personalize a flag evaluation.
///
/// ```
/// # use std::collections::HashMap;
/// # use vwo_provider::{EvaluationContext, Value};
/// let context = EvaluationContext::default()
///     .with_targeting_key("user-1")
///     .with_attribute("key", "button-color")
///     .with_attribute("customVariables", HashMap::from([("plan".to_owned(), Value::from("pro"))]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Primary identifier of the user, e.g., user id.
    #[serde(default)]
    pub targeting_key: Option<String>,
    /// Arbitrary attributes.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl EvaluationContext {
    /// Set targeting key.
    pub fn with_targeting_key(mut self, targeting_key: impl Into<String>) -> Self {
        self.targeting_key = Some(targeting_key.into());
        self
    }

    /// Set an attribute, replacing the previous value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns `true` if the context carries neither a targeting key nor attributes.
    pub fn is_empty(&self) -> bool {
        self.targeting_key.is_none() && self.attributes.is_empty()
    }

    /// Requested variable key, if `key` attribute holds a string.
    pub(crate) fn variable_key(&self) -> Option<&str> {
        self.get(VARIABLE_KEY_ATTRIBUTE).and_then(Value::as_str)
    }
}

/// Loosely typed value carried by evaluation contexts and structured flag results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Value {
    /// Absence of value.
    #[from(ignore)]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer number.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Mapping of names to values.
    Struct(HashMap<String, Value>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl Value {
    /// Return the string if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the fields if the value is a structure.
    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Convert to JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => (*b).into(),
            Value::Int(i) => (*i).into(),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => s.clone().into(),
            Value::List(values) => values.iter().map(Value::to_json).collect(),
            Value::Struct(fields) => fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect::<serde_json::Map<_, _>>()
                .into(),
        }
    }
}

impl From<&EvaluationContext> for VwoContext {
    fn from(context: &EvaluationContext) -> Self {
        let mut vwo_context = VwoContext {
            id: context.targeting_key.clone(),
            ..VwoContext::default()
        };

        if let Some(user_agent) = context.get(USER_AGENT_ATTRIBUTE) {
            vwo_context.user_agent = Some(string_or_empty(user_agent));
        }
        if let Some(ip_address) = context.get(IP_ADDRESS_ATTRIBUTE) {
            vwo_context.ip_address = Some(string_or_empty(ip_address));
        }
        if let Some(fields) = context
            .get(CUSTOM_VARIABLES_ATTRIBUTE)
            .and_then(Value::as_struct)
        {
            vwo_context.custom_variables = Some(flatten_attributes(fields));
        }
        if let Some(fields) = context
            .get(VARIATION_TARGETING_VARIABLES_ATTRIBUTE)
            .and_then(Value::as_struct)
        {
            vwo_context.variation_targeting_variables = Some(flatten_attributes(fields));
        }

        vwo_context
    }
}

/// Convert an optional evaluation context into a VWO context.
///
/// Total: missing or empty contexts yield [`VwoContext::default()`].
pub fn to_vwo_context(context: Option<&EvaluationContext>) -> VwoContext {
    match context {
        Some(context) if !context.is_empty() => context.into(),
        _ => VwoContext::default(),
    }
}

fn string_or_empty(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_owned()
}

fn flatten_attributes(fields: &HashMap<String, Value>) -> HashMap<String, serde_json::Value> {
    fields
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Null => serde_json::Value::String(String::new()),
                value => value.to_json(),
            };
            (name.clone(), value)
        })
        .collect()
}
