//! In-memory stand-in for the provider
//!
//! [`FakeCloud`] implements both [`UsersApi`] and [`Connect`], so a whole
//! factory can run without network access. Buckets remember their owner,
//! versions and policy. Locked buckets refuse version deletes while their
//! policy denies them. Every call is appended to an operation log.

use crate::api::{ProviderKeys, ProviderUser, UsersApi};
use crate::error::{Error, Result};
use crate::policy::{Action, Effect, PolicyDocument};
use crate::store::{BucketStore, ObjectRef, ObjectVersions};
use crate::user::{Connect, Session};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateUser(String),
    DeleteUser(String),
    Connect(String),
    BucketNames(String),
    ApplyPolicy(String),
    CurrentObjects(String),
    ObjectVersions(String),
    RemoveObject {
        bucket: String,
        key: String,
        version_id: Option<String>,
    },
    RemoveBucket(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAccount {
    pub display_name: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
struct FakeVersion {
    key: String,
    version_id: String,
    delete_marker: bool,
}

#[derive(Debug, Clone)]
struct FakeBucket {
    owner: String,
    object_lock: bool,
    policy: Option<PolicyDocument>,
    versions: Vec<FakeVersion>,
}

impl FakeBucket {
    fn denies_version_delete(&self) -> bool {
        self.policy.as_ref().is_some_and(|policy| {
            policy.statement.iter().any(|s| {
                s.effect == Effect::Deny
                    && s.action
                        .iter()
                        .any(|a| matches!(a, Action::DeleteObjectVersion | Action::BypassGovernanceRetention))
            })
        })
    }

    fn latest(&self, key: &str) -> Option<&FakeVersion> {
        self.versions.iter().rev().find(|v| v.key == key)
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    accounts: BTreeMap<String, FakeAccount>,
    buckets: BTreeMap<String, FakeBucket>,
    log: Vec<Op>,
    keyless_users: bool,
    fail_create_user: bool,
    fail_delete_user: BTreeSet<String>,
    fail_bucket_names: BTreeSet<String>,
    fail_remove_bucket: BTreeSet<String>,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut FakeBucket> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| Error::rejected("NoSuchBucket", name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A store acting with the given access key.
    #[must_use]
    pub fn store_for(&self, access_key: &str) -> FakeStore {
        FakeStore {
            cloud: self.clone(),
            access_key: access_key.to_owned(),
        }
    }

    #[must_use]
    pub fn log(&self) -> Vec<Op> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    #[must_use]
    pub fn account(&self, id: &str) -> Option<FakeAccount> {
        self.lock().accounts.get(id).cloned()
    }

    #[must_use]
    pub fn account_ids(&self) -> Vec<String> {
        self.lock().accounts.keys().cloned().collect()
    }

    /// Names of all buckets, regardless of owner.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        self.lock().buckets.keys().cloned().collect()
    }

    pub fn create_users_without_keys(&self) {
        self.lock().keyless_users = true;
    }

    pub fn fail_create_user(&self) {
        self.lock().fail_create_user = true;
    }

    pub fn fail_delete_user(&self, id: &str) {
        self.lock().fail_delete_user.insert(id.to_owned());
    }

    pub fn fail_bucket_names(&self, access_key: &str) {
        self.lock().fail_bucket_names.insert(access_key.to_owned());
    }

    pub fn fail_remove_bucket(&self, bucket: &str) {
        self.lock().fail_remove_bucket.insert(bucket.to_owned());
    }
}

#[async_trait::async_trait]
impl UsersApi for FakeCloud {
    async fn create_user(&self, display_name: &str) -> Result<ProviderUser> {
        let mut state = self.lock();
        state.log.push(Op::CreateUser(display_name.to_owned()));
        if state.fail_create_user {
            return Err(Error::Api {
                status: 500,
                body: "create failed".to_owned(),
            });
        }

        let n = state.next();
        let id = format!("user-{n:04}");
        let account = FakeAccount {
            display_name: display_name.to_owned(),
            access_key: format!("AK{n:04}"),
            secret_key: format!("SK{n:04}"),
        };
        let keys = if state.keyless_users {
            Vec::new()
        } else {
            vec![ProviderKeys {
                access_key: account.access_key.clone(),
                secret_key: account.secret_key.clone(),
            }]
        };
        state.accounts.insert(id.clone(), account);

        Ok(ProviderUser {
            id,
            display_name: display_name.to_owned(),
            keys,
            tags: BTreeMap::new(),
        })
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.log.push(Op::DeleteUser(id.to_owned()));
        if state.fail_delete_user.contains(id) {
            return Err(Error::Api {
                status: 500,
                body: "delete failed".to_owned(),
            });
        }
        match state.accounts.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::Api {
                status: 404,
                body: format!("no user {id}"),
            }),
        }
    }
}

impl Connect for FakeCloud {
    type Client = FakeStore;

    fn connect(&self, session: &Session) -> Self::Client {
        let access_key = session.credentials.access_key_id();
        self.lock().log.push(Op::Connect(access_key.to_owned()));
        self.store_for(access_key)
    }
}

/// Storage client of one fake user.
#[derive(Debug, Clone)]
pub struct FakeStore {
    cloud: FakeCloud,
    access_key: String,
}

impl FakeStore {
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Creates a bucket owned by this store's user. Object lock implies
    /// versioning.
    pub fn create_bucket(&self, name: &str, object_lock: bool) -> Result<()> {
        let mut state = self.cloud.lock();
        if state.buckets.contains_key(name) {
            return Err(Error::rejected("BucketAlreadyExists", name));
        }
        state.buckets.insert(
            name.to_owned(),
            FakeBucket {
                owner: self.access_key.clone(),
                object_lock,
                policy: None,
                versions: Vec::new(),
            },
        );
        Ok(())
    }

    /// Uploads an object and returns its version id.
    pub fn put_object(&self, bucket: &str, key: &str) -> Result<String> {
        let mut state = self.cloud.lock();
        let n = state.next();
        let b = state.bucket_mut(bucket)?;
        let version_id = if b.object_lock { format!("v{n:04}") } else { "null".to_owned() };
        if !b.object_lock {
            b.versions.retain(|v| v.key != key);
        }
        b.versions.push(FakeVersion {
            key: key.to_owned(),
            version_id: version_id.clone(),
            delete_marker: false,
        });
        Ok(version_id)
    }
}

#[async_trait::async_trait]
impl BucketStore for FakeStore {
    async fn bucket_names(&self) -> Result<Vec<String>> {
        let mut state = self.cloud.lock();
        state.log.push(Op::BucketNames(self.access_key.clone()));
        if state.fail_bucket_names.contains(&self.access_key) {
            return Err(Error::rejected("InternalError", "list buckets failed"));
        }
        Ok(state
            .buckets
            .iter()
            .filter(|(_, b)| b.owner == self.access_key)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn apply_policy(&self, bucket: &str, policy: &PolicyDocument) -> Result<()> {
        let mut state = self.cloud.lock();
        state.log.push(Op::ApplyPolicy(bucket.to_owned()));
        state.bucket_mut(bucket)?.policy = Some(policy.clone());
        Ok(())
    }

    async fn current_objects(&self, bucket: &str) -> Result<Vec<ObjectRef>> {
        let mut state = self.cloud.lock();
        state.log.push(Op::CurrentObjects(bucket.to_owned()));
        let b = state.bucket_mut(bucket)?;

        let keys: BTreeSet<&str> = b.versions.iter().map(|v| v.key.as_str()).collect();
        Ok(keys
            .into_iter()
            .filter(|key| b.latest(key).is_some_and(|v| !v.delete_marker))
            .map(|key| ObjectRef::new(key, None))
            .collect())
    }

    async fn object_versions(&self, bucket: &str) -> Result<ObjectVersions> {
        let mut state = self.cloud.lock();
        state.log.push(Op::ObjectVersions(bucket.to_owned()));
        let b = state.bucket_mut(bucket)?;

        let mut listing = ObjectVersions::default();
        for v in &b.versions {
            let r = ObjectRef::new(v.key.clone(), Some(v.version_id.clone()));
            if v.delete_marker {
                listing.delete_markers.push(r);
            } else {
                listing.versions.push(r);
            }
        }
        Ok(listing)
    }

    async fn remove_object(&self, bucket: &str, object: &ObjectRef) -> Result<()> {
        let mut state = self.cloud.lock();
        state.log.push(Op::RemoveObject {
            bucket: bucket.to_owned(),
            key: object.key.clone(),
            version_id: object.version_id.clone(),
        });
        let n = state.next();
        let b = state.bucket_mut(bucket)?;

        match &object.version_id {
            Some(version_id) => {
                let Some(pos) = b
                    .versions
                    .iter()
                    .position(|v| v.key == object.key && &v.version_id == version_id)
                else {
                    return Ok(());
                };
                let is_marker = b.versions[pos].delete_marker;
                if b.object_lock && !is_marker && b.denies_version_delete() {
                    return Err(Error::rejected("AccessDenied", "version delete denied by bucket policy"));
                }
                b.versions.remove(pos);
            }
            None if b.object_lock => b.versions.push(FakeVersion {
                key: object.key.clone(),
                version_id: format!("m{n:04}"),
                delete_marker: true,
            }),
            None => b.versions.retain(|v| v.key != object.key),
        }
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.cloud.lock();
        state.log.push(Op::RemoveBucket(bucket.to_owned()));
        if state.fail_remove_bucket.contains(bucket) {
            return Err(Error::rejected("InternalError", "delete bucket failed"));
        }
        if !state.bucket_mut(bucket)?.versions.is_empty() {
            return Err(Error::rejected("BucketNotEmpty", bucket));
        }
        state.buckets.remove(bucket);
        Ok(())
    }
}
