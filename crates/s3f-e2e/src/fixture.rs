use s3f::api::{CloudscaleApi, UsersApi};
use s3f::cleanup::CleanupReport;
use s3f::config::Config;
use s3f::user::{Connect, SdkConnector};
use s3f::users::ObjectUsers;

use s3s_test::Result;
use s3s_test::TestFixture;
use s3s_test::TestSuite;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Provider settings shared by every case.
pub struct Cloudscale {
    config: Config,
}

impl TestSuite for Cloudscale {
    async fn setup() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded environment file");
        }
        let config = Config::from_env()?;
        debug!(?config, "provider config");
        Ok(Self { config })
    }
}

/// A fresh factory per case. Whatever the case provisions is removed again
/// in teardown.
pub struct Users<A: UsersApi = CloudscaleApi, C: Connect = SdkConnector> {
    users: Mutex<ObjectUsers<A, C>>,
}

impl TestFixture<Cloudscale> for Users {
    async fn setup(suite: Arc<Cloudscale>) -> Result<Self> {
        Ok(Self::new(ObjectUsers::from_config(&suite.config)))
    }

    async fn teardown(self) -> Result {
        self.release().await;
        Ok(())
    }
}

impl<A: UsersApi, C: Connect> Users<A, C> {
    pub fn new(users: ObjectUsers<A, C>) -> Self {
        Self { users: Mutex::new(users) }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ObjectUsers<A, C>> {
        self.users.lock().await
    }

    /// Cleans up everything the factory created. Leftovers are logged, not
    /// returned as an error.
    pub async fn release(self) -> CleanupReport {
        let report = self.users.into_inner().cleanup().await;
        if report.is_clean() {
            info!(
                buckets = report.buckets_removed.len(),
                users = report.users_removed.len(),
                "teardown complete"
            );
        } else {
            warn!(failures = report.failures.len(), "teardown left resources behind");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use s3f::fake::FakeCloud;

    type FakeUsers = Users<FakeCloud, FakeCloud>;

    fn fixture(cloud: &FakeCloud) -> FakeUsers {
        Users::new(ObjectUsers::new(cloud.clone(), cloud.clone(), "rma"))
    }

    async fn provision(fixture: &FakeUsers, bucket: &str) -> String {
        let mut users = fixture.lock().await;
        let user = users.create().await.unwrap();
        user.client().create_bucket(bucket, true).unwrap();
        user.client().put_object(bucket, "k").unwrap();
        user.id().to_owned()
    }

    #[tokio::test]
    async fn release_removes_everything() {
        let cloud = FakeCloud::new();
        let fixture = fixture(&cloud);
        provision(&fixture, "b1").await;
        provision(&fixture, "b2").await;

        let report = fixture.release().await;

        assert!(report.is_clean());
        assert_eq!(report.users_removed.len(), 2);
        assert!(cloud.account_ids().is_empty());
        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn release_after_a_panicking_case() {
        let cloud = FakeCloud::new();
        let fixture = Arc::new(fixture(&cloud));

        let case = {
            let fixture = Arc::clone(&fixture);
            tokio::spawn(async move {
                provision(&fixture, "b1").await;
                panic!("deliberate");
            })
        };
        assert!(case.await.unwrap_err().is_panic());

        let Ok(fixture) = Arc::try_unwrap(fixture) else {
            panic!("fixture still shared")
        };
        assert!(fixture.release().await.is_clean());
        assert!(cloud.account_ids().is_empty());
        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn release_reports_leftovers() {
        let cloud = FakeCloud::new();
        let fixture = fixture(&cloud);
        let stuck = provision(&fixture, "b1").await;
        provision(&fixture, "b2").await;
        cloud.fail_delete_user(&stuck);

        let report = fixture.release().await;

        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(cloud.account_ids(), [stuck]);
        assert!(cloud.bucket_names().is_empty());
    }
}
