//! Ephemeral object storage fixtures
//!
//! `s3f` provisions throwaway objects users on the provider, hands out S3
//! clients bound to their keys, and tears everything down again after a
//! test scenario, including buckets protected by object lock.
//!
//! # Example
//!
//! ```rust,no_run
//! use s3f::config::Config;
//! use s3f::users::ObjectUsers;
//!
//! # async fn run() -> s3f::Result<()> {
//! let config = Config::from_env()?;
//! let mut users = ObjectUsers::from_config(&config);
//!
//! let owner = users.create().await?;
//! owner.client().list_buckets().send().await?;
//!
//! let report = users.cleanup().await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: explicit provider configuration
//! - [`api`]: provider users API
//! - [`users`]: the resource factory
//! - [`user`]: credentials holder with a lazily built client
//! - [`store`]: storage calls used by teardown
//! - [`cleanup`]: best-effort teardown and its report
//! - [`policy`]: bucket policy documents

#![allow(clippy::missing_panics_doc)]

mod error;
pub use self::error::{Error, Result};

pub mod api;
pub mod cleanup;
pub mod config;
pub mod naming;
pub mod policy;
pub mod store;
pub mod user;
pub mod users;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
