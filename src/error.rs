use std::sync::Arc;

use crate::VariableType;

/// Represents a result type for operations in the provider.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur while talking to the vendor client.
///
/// Resolve operations never return these to the caller. They are folded into
/// [`ResolutionDetails`](crate::ResolutionDetails) as an error message instead.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested flag does not exist in the vendor settings.
    #[error("flag not found")]
    FlagNotFound,

    /// Settings for the requested flag could not be parsed.
    #[error("error parsing flag settings")]
    SettingsParseError,

    /// Failure reported by the vendor client. Displays the vendor message as is.
    #[error("{0}")]
    Vendor(String),

    /// The vendor client panicked while evaluating a flag.
    #[error("vendor client panicked: {0}")]
    VendorPanicked(String),

    /// A flag variable value could not be converted to the requested type.
    #[error("cannot convert {value} to {expected}")]
    InvalidValue {
        /// The value as JSON.
        value: String,
        /// The requested type.
        expected: VariableType,
    },

    /// Failed to serialize a structured value.
    #[error(transparent)]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    Serialization(Arc<serde_json::Error>),

    /// An I/O error.
    #[error(transparent)]
    Io(Arc<std::io::Error>),
}

impl Error {
    /// Create a [`Error::Vendor`] from any displayable vendor failure.
    pub fn vendor(message: impl std::fmt::Display) -> Self {
        Self::Vendor(message.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::VariableType;

    #[test]
    fn vendor_error_displays_bare_message() {
        assert_eq!(Error::vendor("timeout").to_string(), "timeout");
    }

    #[test]
    fn panic_error_keeps_payload() {
        assert_eq!(
            Error::VendorPanicked("boom".to_owned()).to_string(),
            "vendor client panicked: boom"
        );
    }

    #[test]
    fn invalid_value_names_expected_type() {
        let err = Error::InvalidValue {
            value: "\"abc\"".to_owned(),
            expected: VariableType::Integer,
        };
        assert_eq!(err.to_string(), "cannot convert \"abc\" to integer");
    }
}
