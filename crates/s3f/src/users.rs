use crate::api::{CloudscaleApi, UsersApi};
use crate::cleanup::{CleanupReport, Resource};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::random_name;
use crate::user::{Connect, ObjectUser, SdkConnector};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

/// Creates objects users for one test run and removes them again.
///
/// Every user handed out by [`create`](Self::create) is tracked until
/// [`cleanup`](Self::cleanup) deletes its buckets and the user itself.
pub struct ObjectUsers<A: UsersApi = CloudscaleApi, C: Connect = SdkConnector> {
    api: A,
    connector: Arc<C>,
    region: String,
    users: HashMap<String, Arc<ObjectUser<C>>>,
}

impl ObjectUsers {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CloudscaleApi::from_config(config),
            SdkConnector::new(&config.signing_region),
            &config.region,
        )
    }

    pub fn from_api_token(api_token: &str, region: &str) -> Result<Self> {
        Ok(Self::from_config(&Config::new(api_token, region)?))
    }
}

impl<A: UsersApi, C: Connect> ObjectUsers<A, C> {
    #[must_use]
    pub fn new(api: A, connector: C, region: impl Into<String>) -> Self {
        Self {
            api,
            connector: Arc::new(connector),
            region: region.into(),
            users: HashMap::new(),
        }
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<ObjectUser<C>>> {
        self.users.get(id)
    }

    /// Provisions a new, isolated objects user.
    pub async fn create(&mut self) -> Result<Arc<ObjectUser<C>>> {
        let created = self.api.create_user(&random_name()).await?;

        let Some(keys) = created.keys.first() else {
            if let Err(err) = self.api.delete_user(&created.id).await {
                warn!(id = %created.id, ?err, "failed to delete user without keys");
            }
            return Err(Error::MissingKeys(created.id));
        };

        let user = Arc::new(ObjectUser::new(
            Arc::clone(&self.connector),
            &self.region,
            &created.id,
            &keys.access_key,
            &keys.secret_key,
        ));
        self.users.insert(created.id.clone(), Arc::clone(&user));

        info!(id = %created.id, display_name = %created.display_name, "provisioned objects user");
        Ok(user)
    }

    /// Deletes every tracked user, after purging its buckets.
    ///
    /// Failures are logged and collected in the report; cleanup always
    /// visits every user.
    pub async fn cleanup(mut self) -> CleanupReport {
        let users = std::mem::take(&mut self.users);
        let mut report = CleanupReport::default();

        for (id, user) in users {
            match user.cleanup().await {
                Ok(buckets) => report.merge(buckets),
                Err(err) => report.record(Resource::BucketList { owner: id.clone() }, err),
            }

            match self.api.delete_user(&id).await {
                Ok(()) => {
                    info!(%id, "removed objects user");
                    report.users_removed.push(id);
                }
                Err(err) => report.record(Resource::User { id }, err),
            }
        }

        report
    }
}

impl<A: UsersApi, C: Connect> Drop for ObjectUsers<A, C> {
    fn drop(&mut self) {
        if !self.users.is_empty() {
            let ids: Vec<&str> = self.users.keys().map(String::as_str).collect();
            warn!(?ids, "objects users dropped without cleanup");
        }
    }
}
