// ABOUTME: Social pages provider adapter (pages, ratings, feed and Instagram publishing)
// ABOUTME: Wraps a Graph-style API including the two-step Instagram container publish
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::core::{ProviderAdapter, PublishRequest, RefreshedToken, RemoteResource, RemoteReview};
use super::taxonomy::{classify, RawFailure};
use crate::errors::ProviderError;
use crate::models::{ProviderKind, PublishChannel};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const PROVIDER: ProviderKind = ProviderKind::SocialPages;

/// Configuration for the social pages API integration
#[derive(Debug, Clone)]
pub struct SocialPagesConfig {
    /// App (client) ID
    pub client_id: String,
    /// App secret
    pub client_secret: String,
    /// Graph API base URL, versioned
    pub api_base: String,
}

impl Default for SocialPagesConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base: "https://graph.facebook.com/v19.0".into(),
        }
    }
}

impl SocialPagesConfig {
    /// Load app credentials from the environment, keeping the default base URL
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client_id: std::env::var("PRESENCE_SOCIAL_PAGES_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("PRESENCE_SOCIAL_PAGES_CLIENT_SECRET").unwrap_or_default(),
            ..Self::default()
        }
    }
}

pub struct SocialPagesAdapter {
    client: Client,
    config: SocialPagesConfig,
}

impl SocialPagesAdapter {
    #[must_use]
    pub fn new(config: SocialPagesConfig) -> Self {
        Self {
            client: super::api_client(),
            config,
        }
    }

    async fn api_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let raw = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => RawFailure {
                http_status: Some(status),
                code: envelope.error.code,
                subcode: envelope.error.error_subcode,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "request failed".into()),
                ..RawFailure::default()
            },
            Err(_) => RawFailure::http(status, "request failed"),
        };
        classify(PROVIDER, &raw)
    }

    fn transport_error(err: &reqwest::Error) -> ProviderError {
        classify(PROVIDER, &RawFailure::transport(err.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        path_and_query: &str,
    ) -> Result<T, ProviderError> {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}/{path_and_query}{separator}access_token={access_token}",
            self.config.api_base
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Self::transport_error(&e))
    }

    async fn post_form(
        &self,
        access_token: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<CreatedObject, ProviderError> {
        let url = format!("{}/{path}", self.config.api_base);
        let mut form: Vec<(&str, &str)> = form.to_vec();
        form.push(("access_token", access_token));
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        response
            .json::<CreatedObject>()
            .await
            .map_err(|e| Self::transport_error(&e))
    }

    /// Two-step Instagram publish: create a media container, then publish it
    async fn publish_instagram(
        &self,
        access_token: &str,
        request: &PublishRequest,
    ) -> Result<String, ProviderError> {
        let Some(image_url) = &request.image_url else {
            return Err(ProviderError::validation(
                PROVIDER,
                "instagram publishing requires an image",
            ));
        };

        let container = self
            .post_form(
                access_token,
                &format!("{}/media", request.resource_id),
                &[("image_url", image_url), ("caption", &request.body)],
            )
            .await?;
        debug!(container = %container.id, "created instagram media container");

        let published = self
            .post_form(
                access_token,
                &format!("{}/media_publish", request.resource_id),
                &[("creation_id", &container.id)],
            )
            .await?;
        Ok(published.id)
    }
}

#[async_trait]
impl ProviderAdapter for SocialPagesAdapter {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    /// List pages the connected user manages
    async fn list_resources(
        &self,
        access_token: &str,
    ) -> Result<Vec<RemoteResource>, ProviderError> {
        let pages: DataList<Page> = self.get_json(access_token, "me/accounts").await?;
        Ok(pages
            .data
            .into_iter()
            .map(|page| RemoteResource {
                external_id: page.id,
                display_name: page.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_reviews(
        &self,
        access_token: &str,
        resource_id: &str,
    ) -> Result<Vec<RemoteReview>, ProviderError> {
        let ratings: DataList<Rating> = self
            .get_json(
                access_token,
                &format!(
                    "{resource_id}/ratings?fields=review_text,rating,created_time,reviewer,open_graph_story"
                ),
            )
            .await?;

        Ok(ratings
            .data
            .into_iter()
            .map(|rating| {
                let external_id = rating
                    .open_graph_story
                    .as_ref()
                    .map_or_else(|| format!("rating:{}", rating.created_time_raw()), |s| s.id.clone());
                RemoteReview {
                    external_id,
                    rating: rating.rating,
                    author: rating.reviewer.and_then(|r| r.name),
                    body: rating.review_text,
                    created_at: rating.created_time,
                    has_reply: false,
                }
            })
            .collect())
    }

    async fn reply_to_review(
        &self,
        access_token: &str,
        _resource_id: &str,
        review_id: &str,
        body: &str,
    ) -> Result<(), ProviderError> {
        self.post_form(
            access_token,
            &format!("{review_id}/comments"),
            &[("message", body)],
        )
        .await?;
        Ok(())
    }

    async fn publish_post(
        &self,
        access_token: &str,
        request: &PublishRequest,
    ) -> Result<String, ProviderError> {
        match request.channel {
            PublishChannel::FacebookPage => {
                let mut form: Vec<(&str, &str)> = vec![("message", &request.body)];
                if let Some(image_url) = &request.image_url {
                    form.push(("link", image_url));
                }
                let created = self
                    .post_form(access_token, &format!("{}/feed", request.resource_id), &form)
                    .await?;
                Ok(created.id)
            }
            PublishChannel::InstagramFeed => self.publish_instagram(access_token, request).await,
            PublishChannel::MapProfile => Err(ProviderError::not_supported(
                PROVIDER,
                format!("publish channel {}", request.channel),
            )),
        }
    }

    /// Long-lived token exchange; the platform has no classic refresh token,
    /// the current long-lived token is traded for a new one
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, ProviderError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ProviderError::not_configured(
                PROVIDER,
                "app credentials not configured",
            ));
        }

        let url = format!(
            "{}/oauth/access_token?grant_type=fb_exchange_token&client_id={}&client_secret={}&fb_exchange_token={refresh_token}",
            self.config.api_base, self.config.client_id, self.config.client_secret
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        let access = token.access_token;
        Ok(RefreshedToken {
            // The exchanged token serves as both access and next refresh token
            refresh_token: Some(access.clone()),
            access_token: access,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: Vec::new(),
        })
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<i64>,
    error_subcode: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Page {
    id: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct Rating {
    review_text: Option<String>,
    rating: Option<i64>,
    created_time: Option<DateTime<Utc>>,
    reviewer: Option<Reviewer>,
    open_graph_story: Option<Story>,
}

impl Rating {
    fn created_time_raw(&self) -> String {
        self.created_time
            .map_or_else(|| "unknown".into(), |t| t.timestamp().to_string())
    }
}

#[derive(Deserialize)]
struct Reviewer {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Story {
    id: String,
}

#[derive(Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}
