use crate::case;
use crate::fixture::{Cloudscale, Users};
use crate::utils::{CheckFailed, check_retention, content_md5, expect_client_error};

use s3f::naming::random_bucket_name;
use s3f::policy::PolicyDocument;
use s3f::users::ObjectUsers;

use s3s_test::Result;
use s3s_test::tcx::TestContext;

use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{DefaultRetention, ObjectLockConfiguration, ObjectLockEnabled, ObjectLockRetentionMode, ObjectLockRule};
use time::OffsetDateTime;
use tracing::info;

const KEY: &str = "test-key";
const BODY: &[u8] = b"0xdeadbeef";
const RETENTION_YEARS: i32 = 10;

pub fn register(tcx: &mut TestContext) {
    case!(tcx, Cloudscale, Users, test_governance_lock);
}

impl Users {
    async fn test_governance_lock(self: Arc<Self>) -> Result {
        let mut users = self.lock().await;
        governance_lock(&mut users).await
    }
}

async fn governance_lock(users: &mut ObjectUsers) -> Result {
    // Two users sharing one bucket
    let owner = users.create().await?;
    let guest = users.create().await?;

    let bucket = random_bucket_name();

    // Object lock can only be enabled when the bucket is created
    owner
        .client()
        .create_bucket()
        .bucket(&bucket)
        .object_lock_enabled_for_bucket(true)
        .send()
        .await?;

    let retention = DefaultRetention::builder()
        .mode(ObjectLockRetentionMode::Governance)
        .years(RETENTION_YEARS)
        .build();
    let lock = ObjectLockConfiguration::builder()
        .object_lock_enabled(ObjectLockEnabled::Enabled)
        .rule(ObjectLockRule::builder().default_retention(retention).build())
        .build();
    owner
        .client()
        .put_object_lock_configuration()
        .bucket(&bucket)
        .object_lock_configuration(lock)
        .send()
        .await?;

    // Nobody may bypass governance retention or delete versions. The guest
    // gets basic object access.
    let policy = PolicyDocument::governance_lock(guest.id());
    owner
        .client()
        .put_bucket_policy()
        .bucket(&bucket)
        .policy(policy.to_json()?)
        .send()
        .await?;

    owner
        .client()
        .put_object()
        .bucket(&bucket)
        .key(KEY)
        .content_md5(content_md5(BODY))
        .body(ByteStream::from_static(BODY))
        .send()
        .await?;

    let head = owner.client().head_object().bucket(&bucket).key(KEY).send().await?;

    let retain_until = check_retention(&head, RETENTION_YEARS, OffsetDateTime::now_utc())?;
    info!(%bucket, %retain_until, "object is under governance retention");

    // The policy lets the guest read the object
    let obj = guest.client().head_object().bucket(&bucket).key(KEY).send().await?;
    let version_id = obj.version_id().ok_or(CheckFailed::NoVersionId)?.to_owned();
    info!(%bucket, %version_id, "object is locked");

    // Governance retention still allows deleting the object...
    guest.client().delete_object().bucket(&bucket).key(KEY).send().await?;

    // ...but not its version, even when forcing it
    expect_client_error(
        "guest deletes locked version",
        guest
            .client()
            .delete_object()
            .bucket(&bucket)
            .key(KEY)
            .version_id(&version_id)
            .bypass_governance_retention(true)
            .send()
            .await,
    )?;

    // Deleting the object again works for the owner
    owner
        .client()
        .delete_object()
        .bucket(&bucket)
        .key(KEY)
        .bypass_governance_retention(true)
        .send()
        .await?;

    // The deny statement applies to the owner as well
    expect_client_error(
        "owner deletes locked version",
        owner
            .client()
            .delete_object()
            .bucket(&bucket)
            .key(KEY)
            .version_id(&version_id)
            .bypass_governance_retention(true)
            .send()
            .await,
    )?;

    Ok(())
}
