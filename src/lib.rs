// ABOUTME: Main library entry point for the presence provider integration core
// ABOUTME: Credential lifecycle, provider adapters, sync/publish jobs and the audit sink
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Presence Core
//!
//! The provider integration core of a multi-location presence platform.
//! It connects organizations to external platforms (a map/business-profile
//! provider and a social-pages provider) and keeps the interactions safe
//! and observable:
//!
//! - **Credentials**: OAuth tokens encrypted at rest, refreshed proactively,
//!   locked out when reauthorization is needed
//! - **Providers**: one adapter trait per platform, all failures normalized
//!   to a stable error vocabulary
//! - **Jobs**: bulk review sync and multi-channel publishing, every run
//!   recorded in a single-flight ledger
//! - **Schedules**: recurring sync dispatch with fixed cadences
//! - **Audit**: append-only record of every state-changing action
//!
//! ## Example
//!
//! ```rust,no_run
//! use presence_core::crypto::SecretCodec;
//! use presence_core::database::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let database = Arc::new(Database::new("sqlite:presence.db").await?);
//!     let codec = SecretCodec::from_env()?;
//!     let adapters = presence_core::providers::default_registry();
//!
//!     let credentials =
//!         presence_core::credentials::CredentialManager::new(database, codec, adapters);
//!     let _ = credentials;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod credentials;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod providers;

pub use credentials::CredentialManager;
pub use database::Database;
pub use errors::{CoreError, CoreResult, ProviderError, ProviderErrorKind};
