//! Provider control-plane API
//!
//! The fixtures only need two calls: create an objects user and delete it.
//! [`UsersApi`] is the seam; [`CloudscaleApi`] talks to the real provider.

use crate::config::Config;
use crate::error::{Error, Result};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// An objects user as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub keys: Vec<ProviderKeys>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderKeys {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[async_trait::async_trait]
pub trait UsersApi: Send + Sync + 'static {
    /// Creates an objects user with its own key pair.
    async fn create_user(&self, display_name: &str) -> Result<ProviderUser>;

    /// Deletes an objects user. The provider revokes its keys.
    async fn delete_user(&self, id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    display_name: &'a str,
}

pub struct CloudscaleApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl CloudscaleApi {
    #[must_use]
    pub fn new(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: api_token.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_token, &config.api_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }
}

impl fmt::Debug for CloudscaleApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudscaleApi").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl UsersApi for CloudscaleApi {
    async fn create_user(&self, display_name: &str) -> Result<ProviderUser> {
        let resp = self
            .http
            .post(self.url("objects-users"))
            .bearer_auth(&self.token)
            .json(&CreateUserRequest { display_name })
            .send()
            .await?;

        let user: ProviderUser = Self::check(resp).await?.json().await?;
        debug!(id = %user.id, display_name, "created objects user");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("objects-users/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::check(resp).await?;
        debug!(id, "deleted objects user");
        Ok(())
    }
}
