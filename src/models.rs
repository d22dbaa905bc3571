// ABOUTME: Domain models for provider accounts, location links, job runs, schedules, posts and reviews
// ABOUTME: All enums stored as snake_case text; timestamps are chrono UTC
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// External platforms the core integrates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Map/business-profile platform (locations, reviews, local posts)
    MapProfile,
    /// Social pages platform (pages, ratings, feed + Instagram publishing)
    SocialPages,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MapProfile => "map_profile",
            Self::SocialPages => "social_pages",
        }
    }

    /// Parse the stored text form back into the enum
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "map_profile" => Some(Self::MapProfile),
            "social_pages" => Some(Self::SocialPages),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One credential record per (organization, provider).
///
/// Tokens are stored encrypted (base64 blobs from `crypto::SecretCodec`);
/// only the credential lifecycle manager decrypts them. While
/// `reauth_required` is set the access token must not be used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub org_id: Uuid,
    pub provider: ProviderKind,
    /// Encrypted access token
    pub access_token: String,
    /// Encrypted refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// Granted OAuth scopes, in grant order
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_account_id: String,
    pub display_name: Option<String>,
    pub reauth_required: bool,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Association between an internal location and a provider-side resource.
/// At most one link per (location, provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationLink {
    pub location_id: Uuid,
    pub org_id: Uuid,
    pub provider: ProviderKind,
    /// Provider-side resource id (e.g. `accounts/1/locations/2`, page id)
    pub external_resource_id: String,
    pub display_name: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_review_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Overall status of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Running,
    Succeeded,
    Failed,
    Partial,
}

impl JobRunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// Terminal states are final; a run never leaves them
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for JobRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a named job for an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: Uuid,
    pub org_id: Uuid,
    pub job_key: String,
    pub status: JobRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Job-specific counters, written once at finalization
    pub summary: serde_json::Value,
    pub error: Option<serde_json::Value>,
    /// None means the run was system/schedule-triggered
    pub actor_user_id: Option<Uuid>,
}

/// Per-unit outcome of a job run, written in one batch at finalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunItem {
    pub id: i64,
    pub job_run_id: Uuid,
    pub location_id: Option<Uuid>,
    pub status: JobRunStatus,
    /// Numeric outcome where it makes sense (e.g. reviews synced)
    pub count: Option<i64>,
    pub error: Option<String>,
}

/// Recurring schedule for a named job, one per (organization, job key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedule {
    pub org_id: Uuid,
    pub job_key: String,
    pub enabled: bool,
    pub cadence_minutes: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_enqueued_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Publish channels a post can target. Facebook pages and Instagram share
/// the social-pages account; the map profile channel has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishChannel {
    MapProfile,
    FacebookPage,
    InstagramFeed,
}

impl PublishChannel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MapProfile => "map_profile",
            Self::FacebookPage => "facebook_page",
            Self::InstagramFeed => "instagram_feed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "map_profile" => Some(Self::MapProfile),
            "facebook_page" => Some(Self::FacebookPage),
            "instagram_feed" => Some(Self::InstagramFeed),
            _ => None,
        }
    }

    /// Which provider account this channel publishes through
    #[must_use]
    pub const fn provider(self) -> ProviderKind {
        match self {
            Self::MapProfile => ProviderKind::MapProfile,
            Self::FacebookPage | Self::InstagramFeed => ProviderKind::SocialPages,
        }
    }
}

impl fmt::Display for PublishChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a post or of one of its publish targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    Queued,
    Published,
    Failed,
}

impl PublishStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Queued => "queued",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "queued" => Some(Self::Queued),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authored unit of content for one location.
///
/// The post's own status is a coarse two-state summary of its targets:
/// `published` as soon as at least one target succeeded, `failed` when
/// none did. Per-target detail lives on the `PostTarget` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub org_id: Uuid,
    pub location_id: Uuid,
    pub body: String,
    pub image_url: Option<String>,
    pub status: PublishStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (post, channel) publish attempt with its own independent status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTarget {
    pub id: Uuid,
    pub post_id: Uuid,
    pub channel: PublishChannel,
    pub status: PublishStatus,
    pub external_id: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A review synced down from a provider, one per (location, provider, external id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub location_id: Uuid,
    pub provider: ProviderKind,
    pub external_id: String,
    pub rating: Option<i64>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub has_reply: bool,
    pub remote_created_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Append-only audit record of a state-changing or security-relevant action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    /// None means the system/scheduler acted, not a user
    pub actor_user_id: Option<Uuid>,
    pub org_id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Derive a post's overall status from its targets.
///
/// `published` wins as soon as one target made it out; only an all-failed
/// set is `failed`. Targets still queued or drafted keep the post queued.
#[must_use]
pub fn derive_post_status(targets: &[PostTarget]) -> PublishStatus {
    if targets.iter().any(|t| t.status == PublishStatus::Published) {
        return PublishStatus::Published;
    }
    if !targets.is_empty() && targets.iter().all(|t| t.status == PublishStatus::Failed) {
        return PublishStatus::Failed;
    }
    PublishStatus::Queued
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(channel: PublishChannel, status: PublishStatus) -> PostTarget {
        PostTarget {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            channel,
            status,
            external_id: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_provider_kind_text_round_trip() {
        for kind in [ProviderKind::MapProfile, ProviderKind::SocialPages] {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("yelp"), None);
    }

    #[test]
    fn test_post_status_mixed_outcome_is_published() {
        let targets = vec![
            target(PublishChannel::FacebookPage, PublishStatus::Published),
            target(PublishChannel::InstagramFeed, PublishStatus::Failed),
        ];
        assert_eq!(derive_post_status(&targets), PublishStatus::Published);
    }

    #[test]
    fn test_post_status_all_failed() {
        let targets = vec![
            target(PublishChannel::FacebookPage, PublishStatus::Failed),
            target(PublishChannel::InstagramFeed, PublishStatus::Failed),
        ];
        assert_eq!(derive_post_status(&targets), PublishStatus::Failed);
    }

    #[test]
    fn test_job_run_status_terminality() {
        assert!(!JobRunStatus::Running.is_terminal());
        assert!(JobRunStatus::Partial.is_terminal());
    }
}
