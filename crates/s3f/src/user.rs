use crate::cleanup::{self, CleanupReport};
use crate::error::Result;
use crate::store::BucketStore;

use std::fmt;
use std::sync::{Arc, OnceLock};

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};

/// Endpoint and static credentials of one objects user.
#[derive(Debug, Clone)]
pub struct Session {
    pub endpoint_url: String,
    pub credentials: Credentials,
}

/// Builds a storage client for a session.
pub trait Connect: Send + Sync + 'static {
    type Client: BucketStore + 'static;

    fn connect(&self, session: &Session) -> Self::Client;
}

/// Connects through the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkConnector {
    signing_region: String,
}

impl SdkConnector {
    #[must_use]
    pub fn new(signing_region: impl Into<String>) -> Self {
        Self {
            signing_region: signing_region.into(),
        }
    }
}

impl Connect for SdkConnector {
    type Client = aws_sdk_s3::Client;

    fn connect(&self, session: &Session) -> Self::Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(session.credentials.clone())
            .region(Region::new(self.signing_region.clone()))
            .endpoint_url(&session.endpoint_url)
            .force_path_style(true)
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }
}

/// An objects user provisioned for one test run.
///
/// The session and the client are derived on first use and then reused for
/// as long as the user lives.
pub struct ObjectUser<C: Connect = SdkConnector> {
    region: String,
    id: String,
    access_key: String,
    secret_key: String,
    connector: Arc<C>,
    session: OnceLock<Session>,
    client: OnceLock<C::Client>,
}

impl<C: Connect> ObjectUser<C> {
    #[must_use]
    pub fn new(
        connector: Arc<C>,
        region: impl Into<String>,
        id: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            id: id.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            connector,
            session: OnceLock::new(),
            client: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    #[must_use]
    pub fn endpoint_url(&self) -> String {
        endpoint_url(&self.region)
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        self.session.get_or_init(|| Session {
            endpoint_url: self.endpoint_url(),
            credentials: Credentials::new(&self.access_key, &self.secret_key, None, None, "s3f"),
        })
    }

    /// Storage client bound to this user's own keys.
    #[must_use]
    pub fn client(&self) -> &C::Client {
        self.client.get_or_init(|| self.connector.connect(self.session()))
    }

    /// Purges every bucket this user owns. A failing bucket is logged and
    /// skipped.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        cleanup::purge_buckets(self.client(), &self.id).await
    }

    pub async fn cleanup_bucket(&self, bucket: &str) -> Result<()> {
        cleanup::purge_bucket(self.client(), bucket).await
    }
}

impl<C: Connect> fmt::Debug for ObjectUser<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUser")
            .field("region", &self.region)
            .field("id", &self.id)
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

/// Storage endpoint of a provider region.
#[must_use]
pub fn endpoint_url(region: &str) -> String {
    format!("https://objects.{region}.cloudscale.ch")
}
