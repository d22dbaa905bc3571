// ABOUTME: Publish coordinator: fan one post out to its channel targets independently
// ABOUTME: Each target records its own outcome; the post status is derived from the full set
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Publishing
//!
//! A post fans out to one target per requested channel. Targets are
//! attempted independently: one channel failing never blocks another, and
//! retrying a failed target never re-publishes the ones that succeeded.
//! After every pass the post's coarse status is re-derived from all of its
//! targets (`published` as soon as one made it out).

use crate::audit;
use crate::credentials::CredentialManager;
use crate::database::Database;
use crate::errors::{CoreError, CoreResult};
use crate::models::{derive_post_status, Post, PostTarget, PublishChannel, PublishStatus};
use crate::providers::{AdapterRegistry, PublishRequest};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Coordinates multi-channel publishing of posts
#[derive(Clone)]
pub struct PublishCoordinator {
    database: Arc<Database>,
    credentials: CredentialManager,
    adapters: AdapterRegistry,
}

impl PublishCoordinator {
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        credentials: CredentialManager,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            database,
            credentials,
            adapters,
        }
    }

    /// Publish a post to the given channels. Every channel gets its own
    /// target row and its own independent attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the post is unknown, no channels were requested,
    /// or a storage operation fails; per-target publish failures are
    /// recorded on the targets instead
    pub async fn publish(
        &self,
        post_id: Uuid,
        channels: &[PublishChannel],
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<Post> {
        if channels.is_empty() {
            return Err(CoreError::InvalidInput(
                "at least one publish channel is required".into(),
            ));
        }

        let post = self
            .database
            .get_post(post_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("post {post_id}")))?;

        for &channel in channels {
            self.database.upsert_post_target(post_id, channel).await?;
            self.attempt_target(&post, channel).await?;
        }

        let post = self.finalize_post_status(post_id).await?;

        self.database
            .write_audit_log(
                actor_user_id,
                post.org_id,
                audit::actions::POST_PUBLISH_COMPLETED,
                "post",
                &post_id.to_string(),
                &serde_json::json!({
                    "channels": channels,
                    "status": post.status,
                }),
            )
            .await?;

        Ok(post)
    }

    /// Re-attempt one target, creating its row first if the channel was
    /// never attempted. Other targets are not touched, so a channel that
    /// already published stays published with its external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the post is unknown, the target already
    /// published, or a storage operation fails
    pub async fn retry_target(
        &self,
        post_id: Uuid,
        channel: PublishChannel,
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<PostTarget> {
        let post = self
            .database
            .get_post(post_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("post {post_id}")))?;

        // A channel that was never attempted gets its row created here; an
        // existing one is reset unless it already made it out
        if let Some(target) = self.database.get_post_target(post_id, channel).await? {
            if target.status == PublishStatus::Published {
                return Err(CoreError::InvalidInput(format!(
                    "target {channel} already published"
                )));
            }
        }

        self.database.upsert_post_target(post_id, channel).await?;
        self.attempt_target(&post, channel).await?;
        self.finalize_post_status(post_id).await?;

        let target = self
            .database
            .get_post_target(post_id, channel)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("target {channel} of post {post_id}")))?;

        self.database
            .write_audit_log(
                actor_user_id,
                post.org_id,
                audit::actions::POST_TARGET_RETRIED,
                "post",
                &post_id.to_string(),
                &serde_json::json!({
                    "channel": channel,
                    "status": target.status,
                }),
            )
            .await?;

        Ok(target)
    }

    /// Attempt one target and record its outcome. Publish failures land on
    /// the target row; only storage failures escape.
    async fn attempt_target(&self, post: &Post, channel: PublishChannel) -> CoreResult<()> {
        let provider = channel.provider();

        let Some(link) = self
            .database
            .get_location_link(post.location_id, provider)
            .await?
        else {
            self.database
                .update_post_target(
                    post.id,
                    channel,
                    PublishStatus::Failed,
                    None,
                    Some(&format!(
                        "validation_error: location {} is not linked to {provider}",
                        post.location_id
                    )),
                )
                .await?;
            return Ok(());
        };

        let token = match self
            .credentials
            .ensure_access_token(post.org_id, provider)
            .await
        {
            Ok((token, _)) => token,
            Err(e) => {
                warn!(post_id = %post.id, channel = %channel, error = %e, "credential gate rejected publish");
                self.database
                    .update_post_target(post.id, channel, PublishStatus::Failed, None, Some(&e.to_string()))
                    .await?;
                return Ok(());
            }
        };

        let request = PublishRequest {
            channel,
            resource_id: link.external_resource_id,
            body: post.body.clone(),
            image_url: post.image_url.clone(),
        };

        match self
            .adapters
            .get(provider)
            .publish_post(&token, &request)
            .await
        {
            Ok(external_id) => {
                info!(post_id = %post.id, channel = %channel, external_id, "target published");
                self.database
                    .update_post_target(
                        post.id,
                        channel,
                        PublishStatus::Published,
                        Some(&external_id),
                        None,
                    )
                    .await?;
            }
            Err(e) => {
                warn!(post_id = %post.id, channel = %channel, error = %e, "target publish failed");
                if e.is_auth_required() {
                    // Lock the account so later targets and callers
                    // short-circuit instead of repeating the failed call.
                    self.database
                        .mark_account_reauth_required(post.org_id, provider, &e.message)
                        .await?;
                }
                self.database
                    .update_post_target(post.id, channel, PublishStatus::Failed, None, Some(&e.to_string()))
                    .await?;
            }
        }

        Ok(())
    }

    /// Re-derive the post's coarse status from the full target set
    async fn finalize_post_status(&self, post_id: Uuid) -> CoreResult<Post> {
        let targets = self.database.list_post_targets(post_id).await?;
        let status = derive_post_status(&targets);
        self.database.update_post_status(post_id, status).await?;

        self.database
            .get_post(post_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("post {post_id}")))
    }
}
