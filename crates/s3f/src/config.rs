//! Fixture configuration
//!
//! All provider settings are collected into a [`Config`] once, at setup, and
//! passed explicitly to the factory. Nothing below reads the environment
//! after that point.
//!
//! # Example
//! ```
//! use s3f::config::Config;
//!
//! let config = Config::new("secret-token", "rma").unwrap();
//! assert_eq!(config.region, "rma");
//! assert_eq!(config.api_url, "https://api.cloudscale.ch/v1");
//! ```

use crate::error::{Error, Result};

use std::env;
use std::fmt;

pub const API_TOKEN_VAR: &str = "CLOUDSCALE_API_TOKEN";
pub const REGION_VAR: &str = "CLOUDSCALE_REGION";
pub const API_URL_VAR: &str = "CLOUDSCALE_API_URL";
pub const SIGNING_REGION_VAR: &str = "S3F_SIGNING_REGION";

pub const DEFAULT_API_URL: &str = "https://api.cloudscale.ch/v1";

/// Region used for signature V4. The provider ignores it, but the SDK
/// refuses to sign without one.
pub const DEFAULT_SIGNING_REGION: &str = "us-east-1";

#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Provider API token. Never printed.
    pub api_token: String,

    /// Provider region, e.g. `rma` or `lpg`. Selects the storage endpoint.
    pub region: String,

    /// Base URL of the provider control-plane API.
    ///
    /// Default: [`DEFAULT_API_URL`]
    pub api_url: String,

    /// Region name the S3 client signs requests with.
    ///
    /// Default: [`DEFAULT_SIGNING_REGION`]
    pub signing_region: String,
}

impl Config {
    /// Creates a config with default URLs.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the token is empty or the region
    /// is not a valid region identifier.
    pub fn new(api_token: impl Into<String>, region: impl Into<String>) -> Result<Self> {
        let config = Self {
            api_token: api_token.into(),
            region: region.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            signing_region: DEFAULT_SIGNING_REGION.to_owned(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the config from process environment variables.
    ///
    /// [`API_TOKEN_VAR`] and [`REGION_VAR`] are required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(Error::MissingEnv(name))
        };

        let mut config = Self::new(required(API_TOKEN_VAR)?, required(REGION_VAR)?)?;

        if let Some(api_url) = lookup(API_URL_VAR).filter(|v| !v.is_empty()) {
            api_url.trim_end_matches('/').clone_into(&mut config.api_url);
        }
        if let Some(signing_region) = lookup(SIGNING_REGION_VAR).filter(|v| !v.is_empty()) {
            config.signing_region = signing_region;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::InvalidConfig("api token is empty".to_owned()));
        }
        if !is_valid_region(&self.region) {
            return Err(Error::InvalidConfig(format!("invalid region {:?}", self.region)));
        }
        if !is_valid_region(&self.signing_region) {
            return Err(Error::InvalidConfig(format!("invalid signing region {:?}", self.signing_region)));
        }
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(Error::InvalidConfig(format!("invalid api url {:?}", self.api_url)));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<redacted>")
            .field("region", &self.region)
            .field("api_url", &self.api_url)
            .field("signing_region", &self.signing_region)
            .finish()
    }
}

/// Checks that a region is a lowercase identifier made of letters, digits
/// and single hyphens, starting with a letter.
///
/// ```
/// # use s3f::config::is_valid_region;
/// assert!(is_valid_region("rma"));
/// assert!(is_valid_region("us-east-1"));
/// assert!(!is_valid_region(""));
/// assert!(!is_valid_region("RMA"));
/// assert!(!is_valid_region("objects.rma"));
/// ```
#[must_use]
pub fn is_valid_region(s: &str) -> bool {
    let bytes = s.as_bytes();

    let Some(first) = bytes.first() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    if bytes.last() == Some(&b'-') {
        return false;
    }

    let mut prev_hyphen = false;
    for &b in bytes {
        match b {
            b'a'..=b'z' | b'0'..=b'9' => prev_hyphen = false,
            b'-' if !prev_hyphen => prev_hyphen = true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_required_variables() {
        let config = Config::from_lookup(lookup(&[(API_TOKEN_VAR, "token"), (REGION_VAR, "lpg")])).unwrap();
        assert_eq!(config.api_token, "token");
        assert_eq!(config.region, "lpg");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.signing_region, DEFAULT_SIGNING_REGION);
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[(REGION_VAR, "rma")])).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(API_TOKEN_VAR)), "{err:?}");
    }

    #[test]
    fn empty_region_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[(API_TOKEN_VAR, "token"), (REGION_VAR, "")])).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(REGION_VAR)), "{err:?}");
    }

    #[test]
    fn optional_overrides() {
        let config = Config::from_lookup(lookup(&[
            (API_TOKEN_VAR, "token"),
            (REGION_VAR, "rma"),
            (API_URL_VAR, "http://127.0.0.1:8080/v1/"),
            (SIGNING_REGION_VAR, "eu-central-1"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:8080/v1");
        assert_eq!(config.signing_region, "eu-central-1");
    }

    #[test]
    fn rejects_bad_region() {
        let err = Config::new("token", "Objects.RMA").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err:?}");
    }

    #[test]
    fn debug_hides_token() {
        let config = Config::new("very-secret", "rma").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("rma"));
    }

    #[test]
    fn region_rules() {
        assert!(is_valid_region("a"));
        assert!(is_valid_region("eu-west-2"));
        assert!(!is_valid_region("1rma"));
        assert!(!is_valid_region("rma-"));
        assert!(!is_valid_region("us--east"));
        assert!(!is_valid_region("us east"));
    }
}
