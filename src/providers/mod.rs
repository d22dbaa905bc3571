// ABOUTME: Provider integration module: adapter contract, error taxonomy and platform adapters
// ABOUTME: Orchestrators depend only on the ProviderAdapter trait from this module
//
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod core;
pub mod map_profile;
pub mod social_pages;
pub mod taxonomy;

pub use core::{
    AdapterRegistry, ProviderAdapter, PublishRequest, RefreshedToken, RemoteResource, RemoteReview,
};
pub use map_profile::{MapProfileAdapter, MapProfileConfig};
pub use social_pages::{SocialPagesAdapter, SocialPagesConfig};

use std::time::Duration;

/// Shared outbound HTTP client: per-call timeout is enforced here, not by
/// the orchestrators.
#[must_use]
pub fn api_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Build the default registry with both HTTP adapters, credentials from the
/// environment
#[must_use]
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new(
        std::sync::Arc::new(MapProfileAdapter::new(MapProfileConfig::from_env())),
        std::sync::Arc::new(SocialPagesAdapter::new(SocialPagesConfig::from_env())),
    )
}
