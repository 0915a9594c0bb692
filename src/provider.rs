use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    context::to_vwo_context,
    resolve::{resolve_boolean, resolve_scalar, resolve_structure, Outcome},
    Error, EvaluationContext, Flag, Result, Value, VwoClient,
};

/// Name reported by [`VwoProvider::metadata()`].
pub const PROVIDER_NAME: &str = "vwo-openfeature-provider-rust";

/// Static information about a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name.
    pub name: String,
}

/// Result of a single flag resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDetails<T> {
    /// Key of the resolved flag.
    pub flag_key: String,
    /// Resolved value, or the default value if resolution failed.
    pub value: T,
    /// Key of the variable the value was taken from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Why the value was chosen.
    pub reason: Reason,
    /// Set together with `error_message` when resolution degraded to the default value because of
    /// a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Message of the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<T> ResolutionDetails<T> {
    fn new(flag_key: &str, value: T, reason: Reason) -> Self {
        ResolutionDetails {
            flag_key: flag_key.to_owned(),
            value,
            variant: None,
            reason,
            error_type: None,
            error_message: None,
        }
    }

    fn error(flag_key: &str, default_value: T, error: &Error) -> Self {
        ResolutionDetails {
            error_type: Some(ErrorType::General),
            error_message: Some(error.to_string()),
            ..ResolutionDetails::new(flag_key, default_value, Reason::Error)
        }
    }

    /// Returns `true` if resolution failed and the default value was returned.
    pub fn is_error(&self) -> bool {
        self.error_type.is_some()
    }
}

/// Reason for a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    /// Value comes from the flag evaluated for the user.
    TargetingMatch,
    /// The flag did not provide a usable value and the default value was used.
    Default,
    /// Resolution failed. See `error_message`.
    Error,
}

/// Kind of resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// Unclassified failure. The provider reports every failure with this kind.
    General,
}

/// Typed flag resolution as required by feature-flag client frameworks.
///
/// Implementations never fail: failures are reported inside [`ResolutionDetails`] along with the
/// default value.
pub trait FeatureProvider: Send + Sync {
    /// Provider metadata.
    fn metadata(&self) -> &ProviderMetadata;

    /// Resolve a boolean flag value.
    fn resolve_boolean_value(
        &self,
        flag_key: &str,
        default_value: bool,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<bool>;

    /// Resolve a string flag value.
    fn resolve_string_value(
        &self,
        flag_key: &str,
        default_value: String,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<String>;

    /// Resolve an integer flag value.
    fn resolve_integer_value(
        &self,
        flag_key: &str,
        default_value: i64,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<i64>;

    /// Resolve a floating point flag value.
    fn resolve_double_value(
        &self,
        flag_key: &str,
        default_value: f64,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<f64>;

    /// Resolve a structured flag value.
    fn resolve_structure_value(
        &self,
        flag_key: &str,
        default_value: Value,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<Value>;
}

/// A [`FeatureProvider`] backed by a VWO client.
///
/// The evaluation context is converted to a [`VwoContext`](crate::VwoContext) and the flag is
/// evaluated by the client on every call. The `key` attribute of the context selects which flag
/// variable provides the value.
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use vwo_provider::{
/// #     Error, EvaluationContext, FeatureProvider, Flag, Variable, VwoContext, VwoProvider,
/// # };
/// let client = |_key: &str, _context: &VwoContext| {
///     Ok::<_, Error>(Flag::new(true, vec![Variable::new("var1", "hello")]))
/// };
/// let provider = VwoProvider::new(Arc::new(client));
///
/// let context = EvaluationContext::default()
///     .with_targeting_key("user1")
///     .with_attribute("key", "var1");
/// let details = provider.resolve_string_value("new-feature", "default".to_owned(), Some(&context));
/// assert_eq!(details.value, "hello");
/// ```
pub struct VwoProvider {
    client: Arc<dyn VwoClient>,
    metadata: ProviderMetadata,
}

impl VwoProvider {
    /// Create a provider sharing the given VWO client.
    pub fn new(client: Arc<dyn VwoClient>) -> Self {
        VwoProvider {
            client,
            metadata: ProviderMetadata {
                name: PROVIDER_NAME.to_owned(),
            },
        }
    }

    fn get_flag(&self, flag_key: &str, context: Option<&EvaluationContext>) -> Result<Flag> {
        let vwo_context = to_vwo_context(context);
        log::trace!(target: "vwo",
                    flag_key,
                    context:serde = vwo_context;
                    "evaluating a flag");

        let client = &self.client;
        catch_unwind(AssertUnwindSafe(|| client.get_flag(flag_key, &vwo_context)))
            .unwrap_or_else(|payload| Err(Error::VendorPanicked(panic_message(payload.as_ref()))))
    }

    fn resolve<T>(
        &self,
        flag_key: &str,
        default_value: T,
        context: Option<&EvaluationContext>,
        extract: impl FnOnce(&Flag, Option<&str>, &T) -> Result<Outcome<T>>,
    ) -> ResolutionDetails<T> {
        let variable_key = context.and_then(EvaluationContext::variable_key);

        let outcome = self
            .get_flag(flag_key, context)
            .and_then(|flag| extract(&flag, variable_key, &default_value));

        match outcome {
            Ok(Outcome::Matched {
                variable_key,
                value,
            }) => {
                log::trace!(target: "vwo", flag_key, variable_key:display = variable_key; "resolved flag variable");
                ResolutionDetails {
                    variant: Some(variable_key),
                    ..ResolutionDetails::new(flag_key, value, Reason::TargetingMatch)
                }
            }
            Ok(Outcome::FlagState(value) | Outcome::AllVariables(value)) => {
                log::trace!(target: "vwo", flag_key; "resolved flag");
                ResolutionDetails::new(flag_key, value, Reason::TargetingMatch)
            }
            Ok(Outcome::NamedFallback(value)) => {
                log::debug!(target: "vwo",
                            flag_key,
                            variable_key:serde = variable_key;
                            "no variable matched, used the \"key\" variable lookup");
                ResolutionDetails::new(flag_key, value, Reason::Default)
            }
            Ok(Outcome::TypeMismatch {
                variable_key,
                expected,
                found,
            }) => {
                log::debug!(target: "vwo",
                            flag_key,
                            variable_key:display = variable_key,
                            expected:display = expected,
                            found:display = found;
                            "variable type mismatch, returning default value");
                ResolutionDetails::new(flag_key, default_value, Reason::Default)
            }
            Ok(Outcome::NoMatch) => {
                log::debug!(target: "vwo",
                            flag_key,
                            variable_key:serde = variable_key;
                            "no variable matched, returning default value");
                ResolutionDetails::new(flag_key, default_value, Reason::Default)
            }
            Err(err) => {
                log::warn!(target: "vwo",
                           flag_key,
                           variable_key:serde = variable_key;
                           "error occurred while resolving a flag: {:?}", err);
                ResolutionDetails::error(flag_key, default_value, &err)
            }
        }
    }
}

impl FeatureProvider for VwoProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn resolve_boolean_value(
        &self,
        flag_key: &str,
        default_value: bool,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<bool> {
        self.resolve(flag_key, default_value, context, |flag, variable_key, _| {
            resolve_boolean(flag, variable_key)
        })
    }

    fn resolve_string_value(
        &self,
        flag_key: &str,
        default_value: String,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<String> {
        self.resolve(flag_key, default_value, context, |flag, variable_key, default| {
            resolve_scalar(flag, variable_key, default)
        })
    }

    fn resolve_integer_value(
        &self,
        flag_key: &str,
        default_value: i64,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<i64> {
        self.resolve(flag_key, default_value, context, |flag, variable_key, default| {
            resolve_scalar(flag, variable_key, default)
        })
    }

    fn resolve_double_value(
        &self,
        flag_key: &str,
        default_value: f64,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<f64> {
        self.resolve(flag_key, default_value, context, |flag, variable_key, default| {
            resolve_scalar(flag, variable_key, default)
        })
    }

    fn resolve_structure_value(
        &self,
        flag_key: &str,
        default_value: Value,
        context: Option<&EvaluationContext>,
    ) -> ResolutionDetails<Value> {
        self.resolve(flag_key, default_value, context, |flag, variable_key, _| {
            resolve_structure(flag, variable_key)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::json;

    use super::{ErrorType, FeatureProvider, Reason, ResolutionDetails, VwoProvider};
    use crate::{
        Error, EvaluationContext, Flag, Value, Variable, VariableValue, VwoContext,
        PROVIDER_NAME,
    };

    fn provider_with(flag: Flag) -> VwoProvider {
        VwoProvider::new(Arc::new(move |_key: &str, _context: &VwoContext| {
            Ok::<_, Error>(flag.clone())
        }))
    }

    fn failing_provider(message: &'static str) -> VwoProvider {
        VwoProvider::new(Arc::new(move |_key: &str, _context: &VwoContext| {
            Err::<Flag, _>(Error::vendor(message))
        }))
    }

    fn with_key(key: &str) -> EvaluationContext {
        EvaluationContext::default()
            .with_targeting_key("user1")
            .with_attribute("key", key)
    }

    #[test]
    fn reports_provider_name() {
        assert_eq!(PROVIDER_NAME, "vwo-openfeature-provider-rust");
        assert_eq!(
            failing_provider("unused").metadata().name,
            PROVIDER_NAME.to_owned()
        );
    }

    #[test]
    fn resolves_string_variable() {
        let provider = provider_with(Flag::new(true, vec![Variable::new("var1", "hello")]));

        let details =
            provider.resolve_string_value("new-feature", "default".to_owned(), Some(&with_key("var1")));

        assert_eq!(
            details,
            ResolutionDetails {
                flag_key: "new-feature".to_owned(),
                value: "hello".to_owned(),
                variant: Some("var1".to_owned()),
                reason: Reason::TargetingMatch,
                error_type: None,
                error_message: None,
            }
        );
    }

    #[test]
    fn vendor_failure_degrades_to_default() {
        let provider = failing_provider("timeout");
        let context = with_key("var1");

        let details = provider.resolve_string_value("new-feature", "default".to_owned(), Some(&context));
        assert_eq!(details.value, "default");
        assert_eq!(details.reason, Reason::Error);
        assert_eq!(details.error_type, Some(ErrorType::General));
        assert_eq!(details.error_message.as_deref(), Some("timeout"));

        assert!(provider.resolve_boolean_value("f", true, None).value);
        assert_eq!(provider.resolve_integer_value("f", 7, None).value, 7);
        assert_eq!(provider.resolve_double_value("f", 0.5, None).value, 0.5);
        let details = provider.resolve_structure_value("f", Value::Null, Some(&context));
        assert_eq!(details.value, Value::Null);
        assert!(details.is_error());
    }

    #[test]
    fn vendor_panic_degrades_to_default() {
        let provider = VwoProvider::new(Arc::new(|_key: &str, _context: &VwoContext| {
            if true {
                panic!("vendor exploded");
            }
            Ok::<_, Error>(Flag::new(true, vec![]))
        }));

        let details = provider.resolve_integer_value("f", 3, None);
        assert_eq!(details.value, 3);
        assert_eq!(
            details.error_message.as_deref(),
            Some("vendor client panicked: vendor exploded")
        );
    }

    #[test]
    fn boolean_without_key_returns_enabled_state() {
        let variables = vec![Variable::new("var1", false)];
        let enabled = provider_with(Flag::new(true, variables.clone()));
        let disabled = provider_with(Flag::new(false, variables));
        let context = EvaluationContext::default().with_targeting_key("user1");

        assert!(enabled.resolve_boolean_value("f", false, None).value);
        assert!(enabled.resolve_boolean_value("f", false, Some(&context)).value);
        let details = disabled.resolve_boolean_value("f", true, Some(&context));
        assert!(!details.value);
        assert!(!details.is_error());
    }

    #[test]
    fn boolean_with_key_uses_variable() {
        let provider = provider_with(Flag::new(true, vec![Variable::new("var1", false)]));

        assert!(!provider.resolve_boolean_value("f", true, Some(&with_key("var1"))).value);

        let details = provider.resolve_boolean_value("f", true, Some(&with_key("missing")));
        assert!(details.value);
        assert_eq!(details.reason, Reason::Default);
    }

    #[test]
    fn type_mismatch_returns_default_without_error() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("var1", "hello"),
                Variable::new("key", 99i64),
            ],
        ));

        let details = provider.resolve_integer_value("f", 5, Some(&with_key("var1")));
        assert_eq!(details.value, 5);
        assert_eq!(details.reason, Reason::Default);
        assert!(!details.is_error());
    }

    #[test]
    fn unknown_variable_falls_back_to_key_variable() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("var1", 1i64),
                Variable::new("key", 42i64),
                Variable::new("ratio", VariableValue::Double(2.into())),
            ],
        ));

        assert_eq!(
            provider
                .resolve_integer_value("f", 0, Some(&with_key("missing")))
                .value,
            42
        );
        assert_eq!(provider.resolve_double_value("f", 0.0, None).value, 42.0);
        assert_eq!(
            provider
                .resolve_double_value("f", 0.0, Some(&with_key("ratio")))
                .value,
            2.0
        );
        let details = provider.resolve_string_value("f", "default".to_owned(), None);
        assert_eq!(details.value, "42");
        assert_eq!(details.reason, Reason::Default);
        assert!(!details.is_error());
    }

    #[test]
    fn unconvertible_key_variable_degrades_with_error() {
        let provider = provider_with(Flag::new(true, vec![Variable::new("key", "abc")]));

        let details = provider.resolve_integer_value("f", 5, Some(&with_key("missing")));
        assert_eq!(details.value, 5);
        assert_eq!(details.reason, Reason::Error);
        assert_eq!(details.error_type, Some(ErrorType::General));
        assert_eq!(
            details.error_message.as_deref(),
            Some("cannot convert \"abc\" to integer")
        );

        let details = provider.resolve_double_value("f", 0.5, None);
        assert_eq!(details.value, 0.5);
        assert!(details.is_error());

        assert_eq!(
            provider
                .resolve_string_value("f", "default".to_owned(), None)
                .value,
            "abc"
        );
    }

    #[test]
    fn integer_variable_is_rounded_or_rejected() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new(
                    "limit",
                    VariableValue::Integer(serde_json::Number::from_f64(3.9).unwrap()),
                ),
                Variable::new(
                    "huge",
                    VariableValue::Integer(serde_json::Number::from_f64(1e20).unwrap()),
                ),
            ],
        ));

        assert_eq!(
            provider
                .resolve_integer_value("f", 0, Some(&with_key("limit")))
                .value,
            4
        );

        let details = provider.resolve_integer_value("f", 7, Some(&with_key("huge")));
        assert_eq!(details.value, 7);
        assert_eq!(details.reason, Reason::Error);
    }

    #[test]
    fn structure_without_key_flattens_variables() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("a", "x"),
                Variable::new("b", VariableValue::Json(json!({"c": [1, 2]}))),
                Variable::new("a", "y"),
            ],
        ));

        let details = provider.resolve_structure_value("f", Value::Null, None);
        let Value::String(s) = details.value else {
            panic!("expected a JSON string");
        };
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&s).unwrap(),
            json!({"a": "y", "b": {"c": [1, 2]}})
        );
    }

    #[test]
    fn structure_with_key_returns_json_variable() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("config", 1i64),
                Variable::new("config", VariableValue::Json(json!({"theme": "dark"}))),
            ],
        ));

        let details = provider.resolve_structure_value("f", Value::Null, Some(&with_key("config")));
        assert_eq!(details.value, Value::from(r#"{"theme":"dark"}"#));
        assert_eq!(details.variant.as_deref(), Some("config"));
    }

    #[test]
    fn structure_key_without_json_variable_returns_default() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("config", "text"),
                Variable::new("other", VariableValue::Json(json!({"a": 1}))),
            ],
        ));
        let default_value = Value::from(HashMap::from([("fallback".to_owned(), Value::Bool(true))]));

        let details =
            provider.resolve_structure_value("f", default_value.clone(), Some(&with_key("config")));
        assert_eq!(details.value, default_value);
        assert_eq!(details.reason, Reason::Default);
        assert!(!details.is_error());

        let details =
            provider.resolve_structure_value("f", default_value.clone(), Some(&with_key("missing")));
        assert_eq!(details.value, default_value);
        assert_eq!(details.reason, Reason::Default);
        assert!(!details.is_error());
    }

    #[test]
    fn structure_json_key_without_object_flattens_variables() {
        let provider = provider_with(Flag::new(
            true,
            vec![
                Variable::new("config", VariableValue::Json(json!("plain"))),
                Variable::new("limit", 3i64),
            ],
        ));

        let details = provider.resolve_structure_value("f", Value::Null, Some(&with_key("config")));
        assert_eq!(details.reason, Reason::TargetingMatch);
        let Value::String(s) = details.value else {
            panic!("expected a JSON string");
        };
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&s).unwrap(),
            json!({"config": "plain", "limit": 3})
        );
    }

    #[test]
    fn passes_converted_context_to_client() {
        let provider = VwoProvider::new(Arc::new(|key: &str, context: &VwoContext| {
            assert_eq!(key, "new-feature");
            assert_eq!(context.id.as_deref(), Some("user1"));
            assert_eq!(context.user_agent.as_deref(), Some("agent"));
            assert_eq!(context.ip_address, None);
            Ok::<_, Error>(Flag::new(true, vec![]))
        }));
        let context = EvaluationContext::default()
            .with_targeting_key("user1")
            .with_attribute("userAgent", "agent");

        let details = provider.resolve_boolean_value("new-feature", false, Some(&context));
        assert!(!details.is_error());
        assert!(details.value);
    }

    #[test]
    fn can_resolve_from_multiple_threads() {
        let provider = provider_with(Flag::new(true, vec![Variable::new("var1", "hello")]));
        let context = with_key("var1");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let details =
                        provider.resolve_string_value("f", "default".to_owned(), Some(&context));
                    assert_eq!(details.value, "hello");
                });
            }
        });
    }
}
