//! Best-effort teardown
//!
//! Every resource is cleaned up independently. A failure is logged and
//! recorded in the [`CleanupReport`], then teardown moves on to the next
//! resource.

use crate::error::{Error, Result};
use crate::policy::PolicyDocument;
use crate::store::BucketStore;

use std::fmt;

use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Bucket { owner: String, name: String },
    BucketList { owner: String },
    User { id: String },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket { owner, name } => write!(f, "bucket {name} of user {owner}"),
            Self::BucketList { owner } => write!(f, "bucket list of user {owner}"),
            Self::User { id } => write!(f, "user {id}"),
        }
    }
}

#[derive(Debug)]
pub struct CleanupFailure {
    pub resource: Resource,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub buckets_removed: Vec<String>,
    pub users_removed: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Whether every tracked resource was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: Self) {
        self.buckets_removed.extend(other.buckets_removed);
        self.users_removed.extend(other.users_removed);
        self.failures.extend(other.failures);
    }

    pub(crate) fn record(&mut self, resource: Resource, error: Error) {
        error!(%resource, error = ?error, "cleanup failed: {}", ErrorChain(&error));
        self.failures.push(CleanupFailure { resource, error });
    }
}

/// Renders an error followed by its sources.
struct ErrorChain<'a>(&'a (dyn std::error::Error + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

/// Empties and deletes one bucket.
///
/// The purge policy goes in first, since locked buckets may otherwise refuse
/// the deletes. Listings are fetched again before each phase because
/// deleting current objects of a versioned bucket produces new markers.
pub async fn purge_bucket<S>(store: &S, bucket: &str) -> Result<()>
where
    S: BucketStore + ?Sized,
{
    store.apply_policy(bucket, &PolicyDocument::purge()).await?;

    for object in store.current_objects(bucket).await? {
        store.remove_object(bucket, &object).await?;
    }

    for version in store.object_versions(bucket).await?.versions {
        store.remove_object(bucket, &version).await?;
    }

    for marker in store.object_versions(bucket).await?.delete_markers {
        store.remove_object(bucket, &marker).await?;
    }

    store.remove_bucket(bucket).await?;
    debug!(bucket, "purged bucket");
    Ok(())
}

/// Purges every bucket visible to `store`, one at a time.
///
/// Only a failure to list the buckets is returned as an error. Failures of
/// individual buckets end up in the report.
pub async fn purge_buckets<S>(store: &S, owner: &str) -> Result<CleanupReport>
where
    S: BucketStore + ?Sized,
{
    let mut report = CleanupReport::default();

    for name in store.bucket_names().await? {
        match purge_bucket(store, &name).await {
            Ok(()) => {
                info!(owner, bucket = %name, "removed bucket");
                report.buckets_removed.push(name);
            }
            Err(err) => report.record(
                Resource::Bucket {
                    owner: owner.to_owned(),
                    name,
                },
                err,
            ),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fake::{FakeCloud, Op};
    use crate::store::ObjectRef;

    fn setup_tracing() {
        use tracing_subscriber::EnvFilter;

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn purge_runs_in_order() {
        let cloud = FakeCloud::new();
        let store = cloud.store_for("AK1");
        store.create_bucket("b1", true).unwrap();
        store.put_object("b1", "k1").unwrap();
        store.put_object("b1", "k1").unwrap();
        store.put_object("b1", "k2").unwrap();
        cloud.clear_log();

        purge_bucket(&store, "b1").await.unwrap();

        let ops = cloud.log();
        assert_eq!(ops.first(), Some(&Op::ApplyPolicy("b1".to_owned())));
        assert_eq!(ops.last(), Some(&Op::RemoveBucket("b1".to_owned())));

        let first_versioned = ops
            .iter()
            .position(|op| matches!(op, Op::RemoveObject { version_id: Some(_), .. }))
            .unwrap();
        let last_unversioned = ops
            .iter()
            .rposition(|op| matches!(op, Op::RemoveObject { version_id: None, .. }))
            .unwrap();
        assert!(last_unversioned < first_versioned, "{ops:?}");

        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn purge_removes_delete_markers() {
        let cloud = FakeCloud::new();
        let store = cloud.store_for("AK1");
        store.create_bucket("b1", true).unwrap();
        store.put_object("b1", "k").unwrap();
        store.remove_object("b1", &ObjectRef::new("k", None)).await.unwrap();

        let listing = store.object_versions("b1").await.unwrap();
        assert_eq!(listing.versions.len(), 1);
        assert_eq!(listing.delete_markers.len(), 1);

        purge_bucket(&store, "b1").await.unwrap();
        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn locked_bucket_needs_purge_policy() {
        let cloud = FakeCloud::new();
        let store = cloud.store_for("AK1");
        store.create_bucket("locked", true).unwrap();
        let version = store.put_object("locked", "k").unwrap();
        store
            .apply_policy("locked", &PolicyDocument::governance_lock("guest"))
            .await
            .unwrap();

        let pinned = ObjectRef::new("k", Some(version));
        let err = store.remove_object("locked", &pinned).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }), "{err:?}");

        purge_bucket(&store, "locked").await.unwrap();
        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn governance_policy_binds_owner_and_guest() {
        let cloud = FakeCloud::new();
        let owner = cloud.store_for("AK-owner");
        let guest = cloud.store_for("AK-guest");
        owner.create_bucket("locked", true).unwrap();
        let version = owner.put_object("locked", "k").unwrap();
        owner
            .apply_policy("locked", &PolicyDocument::governance_lock("guest"))
            .await
            .unwrap();

        let current = ObjectRef::new("k", None);
        let pinned = ObjectRef::new("k", Some(version));

        guest.remove_object("locked", &current).await.unwrap();
        let err = guest.remove_object("locked", &pinned).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { ref code, .. } if code == "AccessDenied"), "{err:?}");

        // deleting the current object again only stacks another marker
        owner.remove_object("locked", &current).await.unwrap();
        let err = owner.remove_object("locked", &pinned).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { ref code, .. } if code == "AccessDenied"), "{err:?}");

        let listing = owner.object_versions("locked").await.unwrap();
        assert_eq!(listing.versions, [pinned]);
        assert_eq!(listing.delete_markers.len(), 2);

        purge_bucket(&owner, "locked").await.unwrap();
        assert!(cloud.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn one_bad_bucket_does_not_stop_the_rest() {
        setup_tracing();
        let cloud = FakeCloud::new();
        let store = cloud.store_for("AK1");
        for name in ["a", "b", "c"] {
            store.create_bucket(name, true).unwrap();
            store.put_object(name, "k").unwrap();
        }
        cloud.fail_remove_bucket("b");

        let report = purge_buckets(&store, "u1").await.unwrap();

        assert_eq!(report.buckets_removed, ["a", "c"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].resource,
            Resource::Bucket {
                owner: "u1".to_owned(),
                name: "b".to_owned()
            }
        );
        assert_eq!(cloud.bucket_names(), ["b"]);
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        setup_tracing();
        let cloud = FakeCloud::new();
        let store = cloud.store_for("AK1");
        cloud.fail_bucket_names("AK1");
        assert!(purge_buckets(&store, "u1").await.is_err());
    }

    #[test]
    fn report_merge() {
        let mut a = CleanupReport::default();
        a.buckets_removed.push("x".to_owned());
        let mut b = CleanupReport::default();
        b.users_removed.push("u".to_owned());
        b.record(Resource::User { id: "v".to_owned() }, Error::rejected("Boom", "nope"));
        a.merge(b);
        assert_eq!(a.buckets_removed, ["x"]);
        assert_eq!(a.users_removed, ["u"]);
        assert!(!a.is_clean());
        assert_eq!(a.failures[0].resource.to_string(), "user v");
    }
}
