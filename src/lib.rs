//! Feature flag provider backed by the VWO experimentation SDK.
//!
//! # Overview
//!
//! [`VwoProvider`] implements [`FeatureProvider`], the typed flag resolution interface expected by
//! feature flag client frameworks, on top of a [`VwoClient`]. For every call the provider converts
//! the generic [`EvaluationContext`] into a [`VwoContext`], asks the client for the [`Flag`], and
//! extracts a typed value from the flag's [`Variable`]s.
//!
//! The `key` attribute of the evaluation context names the variable to read:
//!
//! ```
//! # use std::sync::Arc;
//! # use vwo_provider::{EvaluationContext, FeatureProvider, StaticClient, VwoProvider};
//! let client = StaticClient::from_json_str(r#"
//!     {"flags": {"checkout": {"enabled": true, "variables": [
//!         {"key": "button-color", "type": "string", "value": "green"}
//!     ]}}}
//! "#).unwrap();
//! let provider = VwoProvider::new(Arc::new(client));
//!
//! let context = EvaluationContext::default()
//!     .with_targeting_key("user-1")
//!     .with_attribute("key", "button-color");
//! let color = provider.resolve_string_value("checkout", "blue".to_owned(), Some(&context));
//! assert_eq!(color.value, "green");
//! ```
//!
//! Boolean resolution without a `key` attribute returns whether the flag is enabled.
//!
//! # Error Handling
//!
//! Resolve operations never fail. If the VWO client returns an error or panics, or a variable value
//! cannot be converted to the requested type, the default value is returned and the failure message
//! is stored in [`ResolutionDetails::error_message`]. These failures are represented by the
//! [`Error`] enum.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `vwo` target. Consider integrating a `log`-compatible logger implementation for better
//! visibility into flag resolution.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod context;
mod error;
mod provider;
mod resolve;
mod static_client;
mod vwo;

pub use context::{to_vwo_context, EvaluationContext, Value};
pub use error::{Error, Result};
pub use provider::{
    ErrorType, FeatureProvider, ProviderMetadata, Reason, ResolutionDetails, VwoProvider,
    PROVIDER_NAME,
};
pub use static_client::{Settings, StaticClient, TryParse};
pub use vwo::{Flag, Variable, VariableType, VariableValue, VwoClient, VwoContext};
