//! Bucket policy documents
//!
//! Only the subset of the IAM policy grammar the suites need: a fixed
//! version, principals given as `{"AWS": ...}` and string resources.

use serde::Serialize;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub principal: Principal,
    pub action: Vec<Action>,
    pub resource: OneOrMany<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    #[serde(rename = "AWS")]
    pub aws: OneOrMany<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    #[serde(rename = "s3:BypassGovernanceRetention")]
    BypassGovernanceRetention,
    #[serde(rename = "s3:DeleteObject")]
    DeleteObject,
    #[serde(rename = "s3:DeleteObjectVersion")]
    DeleteObjectVersion,
    #[serde(rename = "s3:GetObject")]
    GetObject,
    #[serde(rename = "s3:GetObjectAcl")]
    GetObjectAcl,
    #[serde(rename = "s3:PutObject")]
    PutObject,
    #[serde(rename = "s3:PutObjectAcl")]
    PutObjectAcl,
}

impl Principal {
    /// Every principal, including the bucket owner.
    #[must_use]
    pub fn everyone() -> Self {
        Self {
            aws: OneOrMany::Many(vec!["*".to_owned()]),
        }
    }

    /// A single objects user of the provider account.
    #[must_use]
    pub fn user(id: &str) -> Self {
        Self {
            aws: OneOrMany::One(format!("arn:aws:iam:::user/{id}")),
        }
    }
}

impl Statement {
    #[must_use]
    pub fn new(effect: Effect, principal: Principal, action: impl Into<Vec<Action>>) -> Self {
        Self {
            effect,
            principal,
            action: action.into(),
            resource: OneOrMany::One("*".to_owned()),
        }
    }

    #[must_use]
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.resource = OneOrMany::Many(resources.into_iter().map(Into::into).collect());
        self
    }
}

impl PolicyDocument {
    #[must_use]
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    /// Grants everyone what is needed to purge a bucket under governance
    /// retention. Installed right before a bucket is emptied.
    #[must_use]
    pub fn purge() -> Self {
        Self::new(vec![Statement::new(
            Effect::Allow,
            Principal::everyone(),
            [
                Action::BypassGovernanceRetention,
                Action::DeleteObjectVersion,
                Action::DeleteObject,
            ],
        )])
    }

    /// Denies retention bypass and version deletes to everyone, and grants
    /// `guest` basic object access.
    #[must_use]
    pub fn governance_lock(guest: &str) -> Self {
        Self::new(vec![
            Statement::new(
                Effect::Deny,
                Principal::everyone(),
                [Action::BypassGovernanceRetention, Action::DeleteObjectVersion],
            ),
            Statement::new(
                Effect::Allow,
                Principal::user(guest),
                [
                    Action::PutObject,
                    Action::PutObjectAcl,
                    Action::GetObject,
                    Action::GetObjectAcl,
                    Action::DeleteObject,
                ],
            )
            .with_resources(["*"]),
        ])
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
