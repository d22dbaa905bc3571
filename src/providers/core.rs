// ABOUTME: Core provider adapter trait and shared request/response types
// ABOUTME: Adapters are injected at construction; there is no global mock switch
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Provider Adapter Contract
//!
//! Every platform integration implements [`ProviderAdapter`]. The trait is the
//! only surface orchestrators see, so swapping a real HTTP adapter for a
//! scripted one in tests is a constructor argument, not a runtime flag.
//!
//! All methods return [`ProviderError`]; implementations must funnel raw
//! upstream failures through the taxonomy before they escape this boundary.

use crate::errors::ProviderError;
use crate::models::{ProviderKind, PublishChannel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A provider-side resource a location can be linked to (map location, page)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResource {
    pub external_id: String,
    pub display_name: String,
}

/// A review/rating as the provider reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteReview {
    pub external_id: String,
    /// 1..=5 where the platform exposes star ratings
    pub rating: Option<i64>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub has_reply: bool,
}

/// One publish attempt against a provider-side resource
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub channel: PublishChannel,
    /// Resource id from the location link (map location path, page id)
    pub resource_id: String,
    pub body: String,
    pub image_url: Option<String>,
}

/// Result of a successful token refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// None means the provider keeps the existing refresh token valid
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

/// Outbound operations against one provider platform.
///
/// Implementations must be `Send + Sync`; orchestrators hold them as
/// `Arc<dyn ProviderAdapter>` and may call them from concurrent tasks.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which platform this adapter talks to
    fn provider(&self) -> ProviderKind;

    /// List resources the connected account can manage (locations, pages)
    async fn list_resources(&self, access_token: &str)
        -> Result<Vec<RemoteResource>, ProviderError>;

    /// List reviews/ratings for one linked resource
    async fn list_reviews(
        &self,
        access_token: &str,
        resource_id: &str,
    ) -> Result<Vec<RemoteReview>, ProviderError>;

    /// Post a public reply to one review
    async fn reply_to_review(
        &self,
        access_token: &str,
        resource_id: &str,
        review_id: &str,
        body: &str,
    ) -> Result<(), ProviderError>;

    /// Publish one post; returns the provider-side id of the created content
    async fn publish_post(
        &self,
        access_token: &str,
        request: &PublishRequest,
    ) -> Result<String, ProviderError>;

    /// Exchange a refresh token for a fresh access token
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, ProviderError>;
}

/// Adapter lookup by provider, fixed at construction time
#[derive(Clone)]
pub struct AdapterRegistry {
    map_profile: Arc<dyn ProviderAdapter>,
    social_pages: Arc<dyn ProviderAdapter>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new(map_profile: Arc<dyn ProviderAdapter>, social_pages: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            map_profile,
            social_pages,
        }
    }

    #[must_use]
    pub fn get(&self, provider: ProviderKind) -> Arc<dyn ProviderAdapter> {
        match provider {
            ProviderKind::MapProfile => Arc::clone(&self.map_profile),
            ProviderKind::SocialPages => Arc::clone(&self.social_pages),
        }
    }
}
