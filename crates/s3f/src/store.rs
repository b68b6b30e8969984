//! Storage operations used by teardown
//!
//! [`BucketStore`] covers exactly the calls needed to find and purge a
//! user's buckets. It is implemented for [`aws_sdk_s3::Client`].

use crate::error::Result;
use crate::policy::PolicyDocument;

use aws_sdk_s3::types::{DeleteMarkerEntry, Object, ObjectVersion};

/// A key, optionally pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectRef {
    #[must_use]
    pub fn new(key: impl Into<String>, version_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            version_id,
        }
    }
}

/// Result of listing all versions of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectVersions {
    pub versions: Vec<ObjectRef>,
    pub delete_markers: Vec<ObjectRef>,
}

#[async_trait::async_trait]
pub trait BucketStore: Send + Sync {
    /// Names of all buckets owned by the caller.
    async fn bucket_names(&self) -> Result<Vec<String>>;

    /// Replaces the bucket policy.
    async fn apply_policy(&self, bucket: &str, policy: &PolicyDocument) -> Result<()>;

    /// Current objects of a bucket. Version ids are not reported here.
    async fn current_objects(&self, bucket: &str) -> Result<Vec<ObjectRef>>;

    /// Every stored version and delete marker of a bucket.
    async fn object_versions(&self, bucket: &str) -> Result<ObjectVersions>;

    /// Deletes an object. A pinned version is removed permanently and the
    /// request asks to bypass governance retention.
    async fn remove_object(&self, bucket: &str, object: &ObjectRef) -> Result<()>;

    /// Deletes an empty bucket.
    async fn remove_bucket(&self, bucket: &str) -> Result<()>;
}

fn from_object(obj: &Object) -> Option<ObjectRef> {
    obj.key().map(|key| ObjectRef::new(key, None))
}

fn from_version(v: &ObjectVersion) -> Option<ObjectRef> {
    v.key().map(|key| ObjectRef::new(key, v.version_id().map(str::to_owned)))
}

fn from_marker(m: &DeleteMarkerEntry) -> Option<ObjectRef> {
    m.key().map(|key| ObjectRef::new(key, m.version_id().map(str::to_owned)))
}

#[async_trait::async_trait]
impl BucketStore for aws_sdk_s3::Client {
    async fn bucket_names(&self) -> Result<Vec<String>> {
        let output = self.list_buckets().send().await?;
        Ok(output.buckets().iter().filter_map(|b| b.name()).map(str::to_owned).collect())
    }

    async fn apply_policy(&self, bucket: &str, policy: &PolicyDocument) -> Result<()> {
        self.put_bucket_policy().bucket(bucket).policy(policy.to_json()?).send().await?;
        Ok(())
    }

    async fn current_objects(&self, bucket: &str) -> Result<Vec<ObjectRef>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;
        loop {
            let output = self
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await?;

            objects.extend(output.contents().iter().filter_map(from_object));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated() == Some(true) => continuation_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn object_versions(&self, bucket: &str) -> Result<ObjectVersions> {
        let mut listing = ObjectVersions::default();
        let mut key_marker = None;
        let mut version_id_marker = None;
        loop {
            let output = self
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_id_marker.take())
                .send()
                .await?;

            listing.versions.extend(output.versions().iter().filter_map(from_version));
            listing.delete_markers.extend(output.delete_markers().iter().filter_map(from_marker));

            if output.is_truncated() != Some(true) {
                break;
            }
            let Some(next_key) = output.next_key_marker() else {
                break;
            };
            key_marker = Some(next_key.to_owned());
            version_id_marker = output.next_version_id_marker().map(str::to_owned);
        }
        Ok(listing)
    }

    async fn remove_object(&self, bucket: &str, object: &ObjectRef) -> Result<()> {
        let mut req = self.delete_object().bucket(bucket).key(&object.key);
        if let Some(version_id) = &object.version_id {
            req = req.version_id(version_id).bypass_governance_retention(true);
        }
        req.send().await?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        self.delete_bucket().bucket(bucket).send().await?;
        Ok(())
    }
}
