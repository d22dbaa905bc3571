// ABOUTME: Map profile provider adapter (business locations, reviews, local posts)
// ABOUTME: Wraps the v4-style locations API and the OAuth2 refresh-token grant
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

const PROVIDER: ProviderKind = ProviderKind::MapProfile;

/// Configuration for the map profile API integration
#[derive(Debug, Clone)]
pub struct MapProfileConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Base URL of the business-profile API
    pub api_base: String,
    /// OAuth token endpoint for refresh grants
    pub token_url: String,
}

impl Default for MapProfileConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base: "https://mybusiness.googleapis.com/v4".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
        }
    }
}

impl MapProfileConfig {
    /// Load client credentials from the environment, keeping default URLs
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client_id: std::env::var("PRESENCE_MAP_PROFILE_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("PRESENCE_MAP_PROFILE_CLIENT_SECRET").unwrap_or_default(),
            ..Self::default()
        }
    }
}

pub struct MapProfileAdapter {
    client: Client,
    config: MapProfileConfig,
}

impl MapProfileAdapter {
    #[must_use]
    pub fn new(config: MapProfileConfig) -> Self {
        Self {
            client: super::api_client(),
            config,
        }
    }

    /// Turn a non-success response into a classified `ProviderError`
    async fn api_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let raw = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => RawFailure {
                http_status: Some(status),
                status_text: envelope.error.status,
                message: envelope.error.message.unwrap_or_else(|| "request failed".into()),
                ..RawFailure::default()
            },
            Err(_) => RawFailure::http(status, "request failed"),
        };
        classify(PROVIDER, &raw)
    }

    fn transport_error(err: &reqwest::Error) -> ProviderError {
        classify(PROVIDER, &RawFailure::transport(err.to_string()))
    }

    /// The OAuth token endpoint uses the RFC 6749 error shape, not the API's
    /// error envelope; `invalid_grant` means the refresh token is dead.
    async fn token_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        match response.json::<OAuthErrorBody>().await {
            Ok(body) => {
                let code = body.error.unwrap_or_default();
                let message = body
                    .error_description
                    .unwrap_or_else(|| format!("token request failed: {code}"));
                if code == "invalid_grant" || code == "invalid_token" {
                    ProviderError::auth_required(PROVIDER, message).with_http_status(status)
                } else {
                    classify(PROVIDER, &RawFailure::http(status, message))
                }
            }
            Err(_) => classify(PROVIDER, &RawFailure::http(status, "token request failed")),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        url: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
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
}

#[async_trait]
impl ProviderAdapter for MapProfileAdapter {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    /// List locations across the first accessible account
    async fn list_resources(
        &self,
        access_token: &str,
    ) -> Result<Vec<RemoteResource>, ProviderError> {
        let accounts: AccountList = self
            .get_json(access_token, &format!("{}/accounts", self.config.api_base))
            .await?;
        let Some(account) = accounts.accounts.first() else {
            return Ok(Vec::new());
        };

        let locations: LocationList = self
            .get_json(
                access_token,
                &format!("{}/{}/locations", self.config.api_base, account.name),
            )
            .await?;
        debug!(
            account = %account.name,
            count = locations.locations.len(),
            "listed map profile locations"
        );

        Ok(locations
            .locations
            .into_iter()
            .map(|loc| RemoteResource {
                external_id: loc.name,
                display_name: loc.title.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_reviews(
        &self,
        access_token: &str,
        resource_id: &str,
    ) -> Result<Vec<RemoteReview>, ProviderError> {
        let reviews: ReviewList = self
            .get_json(
                access_token,
                &format!("{}/{resource_id}/reviews", self.config.api_base),
            )
            .await?;

        Ok(reviews
            .reviews
            .into_iter()
            .map(|review| RemoteReview {
                external_id: review.review_id,
                rating: review.star_rating.as_deref().and_then(star_rating_value),
                author: review.reviewer.and_then(|r| r.display_name),
                body: review.comment,
                created_at: review.create_time,
                has_reply: review.review_reply.is_some(),
            })
            .collect())
    }

    async fn reply_to_review(
        &self,
        access_token: &str,
        resource_id: &str,
        review_id: &str,
        body: &str,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{}/{resource_id}/reviews/{review_id}/reply",
            self.config.api_base
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "comment": body }))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn publish_post(
        &self,
        access_token: &str,
        request: &PublishRequest,
    ) -> Result<String, ProviderError> {
        if request.channel != PublishChannel::MapProfile {
            return Err(ProviderError::not_supported(
                PROVIDER,
                format!("publish channel {}", request.channel),
            ));
        }

        let mut payload = serde_json::json!({
            "languageCode": "en",
            "summary": request.body,
            "topicType": "STANDARD",
        });
        if let Some(image_url) = &request.image_url {
            payload["media"] = serde_json::json!([
                { "mediaFormat": "PHOTO", "sourceUrl": image_url }
            ]);
        }

        let url = format!("{}/{}/localPosts", self.config.api_base, request.resource_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let created: LocalPost = response
            .json()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(created.name)
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, ProviderError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ProviderError::not_configured(
                PROVIDER,
                "client credentials not configured",
            ));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ])
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        if !response.status().is_success() {
            return Err(Self::token_error(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: token
                .scope
                .map(|s| s.split(' ').map(str::to_owned).collect())
                .unwrap_or_default(),
        })
    }
}

/// Map the API's textual star rating to a numeric value
fn star_rating_value(rating: &str) -> Option<i64> {
    match rating {
        "ONE" => Some(1),
        "TWO" => Some(2),
        "THREE" => Some(3),
        "FOUR" => Some(4),
        "FIVE" => Some(5),
        _ => None,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    status: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AccountList {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct Account {
    name: String,
}

#[derive(Deserialize)]
struct LocationList {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct Location {
    name: String,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ReviewList {
    #[serde(default)]
    reviews: Vec<ApiReview>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    review_id: String,
    star_rating: Option<String>,
    comment: Option<String>,
    reviewer: Option<Reviewer>,
    create_time: Option<DateTime<Utc>>,
    review_reply: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reviewer {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct LocalPost {
    name: String,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_rating_mapping() {
        assert_eq!(star_rating_value("FIVE"), Some(5));
        assert_eq!(star_rating_value("ONE"), Some(1));
        assert_eq!(star_rating_value("STAR_RATING_UNSPECIFIED"), None);
    }

    #[test]
    fn test_error_envelope_parsing() {
        let body = r#"{"error": {"code": 401, "status": "UNAUTHENTICATED", "message": "bad token"}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.status.as_deref(), Some("UNAUTHENTICATED"));
        assert_eq!(envelope.error.message.as_deref(), Some("bad token"));
    }

    #[test]
    fn test_oauth_error_body_parsing() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
        let parsed: OAuthErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("invalid_grant"));
    }

    #[test]
    fn test_review_parsing() {
        let body = r#"{
            "reviews": [{
                "reviewId": "r1",
                "starRating": "FOUR",
                "comment": "Great service",
                "reviewer": {"displayName": "Ada"},
                "createTime": "2025-05-01T12:00:00Z",
                "reviewReply": {"comment": "thanks"}
            }]
        }"#;
        let list: ReviewList = serde_json::from_str(body).unwrap();
        assert_eq!(list.reviews.len(), 1);
        let review = &list.reviews[0];
        assert_eq!(review.review_id, "r1");
        assert!(review.review_reply.is_some());
    }
}
