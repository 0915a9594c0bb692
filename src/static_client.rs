use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Flag, Result, VwoClient, VwoContext};

/// Flag settings served by [`StaticClient`].
///
/// ```json
/// {
///   "flags": {
///     "new-feature": {
///       "enabled": true,
///       "variables": [{"key": "var1", "type": "string", "value": "hello"}]
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Flags by key.
    pub flags: HashMap<String, TryParse<Flag>>,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed value.
    Parsed(T),
    /// Raw JSON that failed to parse.
    ParseFailed(serde_json::Value),
}
impl<T> From<T> for TryParse<T> {
    fn from(value: T) -> Self {
        TryParse::Parsed(value)
    }
}

/// A [`VwoClient`] serving fixed flag settings, regardless of the user context.
///
/// Useful for tests and for running without access to VWO servers.
///
/// ```
/// # use vwo_provider::{StaticClient, VwoClient, VwoContext};
/// let client = StaticClient::from_json_str(r#"{"flags": {"f": {"enabled": true}}}"#).unwrap();
/// assert!(client.get_flag("f", &VwoContext::default()).unwrap().is_enabled());
/// ```
pub struct StaticClient {
    settings: Settings,
}

impl StaticClient {
    /// Create a client serving `settings`.
    pub fn new(settings: Settings) -> Self {
        StaticClient { settings }
    }

    /// Parse settings from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(s)?))
    }

    /// Read settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::open(path)?;
        Ok(Self::new(serde_json::from_reader(BufReader::new(f))?))
    }

    /// Settings served by this client.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl VwoClient for StaticClient {
    fn get_flag(&self, feature_key: &str, _context: &VwoContext) -> Result<Flag> {
        let flag = self
            .settings
            .flags
            .get(feature_key)
            .ok_or(Error::FlagNotFound)?;

        match flag {
            TryParse::Parsed(flag) => Ok(flag.clone()),
            TryParse::ParseFailed(_) => {
                log::warn!(target: "vwo", feature_key; "flag settings failed to parse");
                Err(Error::SettingsParseError)
            }
        }
    }
}
