// ABOUTME: Post store: authored content plus per-channel publish targets
// ABOUTME: One target row per (post, channel); the post's status is derived from its targets
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::{Post, PostTarget, PublishChannel, PublishStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    pub(super) async fn migrate_posts(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                location_id TEXT NOT NULL,
                body TEXT NOT NULL,
                image_url TEXT,
                status TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_org ON posts(org_id, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS post_targets (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                external_id TEXT,
                error TEXT,
                updated_at DATETIME NOT NULL,
                UNIQUE(post_id, channel)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a post in `draft` state
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails
    pub async fn create_post(
        &self,
        org_id: Uuid,
        location_id: Uuid,
        body: &str,
        image_url: Option<&str>,
    ) -> Result<Post> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            org_id,
            location_id,
            body: body.to_string(),
            image_url: image_url.map(str::to_string),
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO posts (id, org_id, location_id, body, image_url, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ",
        )
        .bind(post.id.to_string())
        .bind(org_id.to_string())
        .bind(location_id.to_string())
        .bind(body)
        .bind(image_url)
        .bind(PublishStatus::Draft.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(post)
    }

    /// Get one post by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            r"
            SELECT id, org_id, location_id, body, image_url, status, created_at, updated_at
            FROM posts WHERE id = $1
            ",
        )
        .bind(post_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_post(&row)?)))
    }

    /// Set a post's overall status
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn update_post_status(&self, post_id: Uuid, status: PublishStatus) -> Result<()> {
        sqlx::query("UPDATE posts SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(post_id.to_string())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Ensure a target row exists for (post, channel) and reset it to
    /// `queued` for a fresh publish attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_post_target(&self, post_id: Uuid, channel: PublishChannel) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO post_targets (id, post_id, channel, status, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (post_id, channel)
            DO UPDATE SET
                status = EXCLUDED.status,
                external_id = NULL,
                error = NULL,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(post_id.to_string())
        .bind(channel.as_str())
        .bind(PublishStatus::Queued.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the outcome of one target's publish attempt
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn update_post_target(
        &self,
        post_id: Uuid,
        channel: PublishChannel,
        status: PublishStatus,
        external_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE post_targets
            SET status = $3, external_id = $4, error = $5, updated_at = $6
            WHERE post_id = $1 AND channel = $2
            ",
        )
        .bind(post_id.to_string())
        .bind(channel.as_str())
        .bind(status.as_str())
        .bind(external_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get one (post, channel) target
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_post_target(
        &self,
        post_id: Uuid,
        channel: PublishChannel,
    ) -> Result<Option<PostTarget>> {
        let row = sqlx::query(
            r"
            SELECT id, post_id, channel, status, external_id, error, updated_at
            FROM post_targets
            WHERE post_id = $1 AND channel = $2
            ",
        )
        .bind(post_id.to_string())
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_post_target(&row)?)))
    }

    /// List all of a post's targets
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_post_targets(&self, post_id: Uuid) -> Result<Vec<PostTarget>> {
        let rows = sqlx::query(
            r"
            SELECT id, post_id, channel, status, external_id, error, updated_at
            FROM post_targets
            WHERE post_id = $1
            ORDER BY channel ASC
            ",
        )
        .bind(post_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            targets.push(Self::row_to_post_target(&row)?);
        }
        Ok(targets)
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
        let id_str: String = row.get("id");
        let org_id_str: String = row.get("org_id");
        let location_id_str: String = row.get("location_id");
        let status_str: String = row.get("status");

        Ok(Post {
            id: Uuid::parse_str(&id_str)?,
            org_id: Uuid::parse_str(&org_id_str)?,
            location_id: Uuid::parse_str(&location_id_str)?,
            body: row.get("body"),
            image_url: row.get("image_url"),
            status: PublishStatus::parse(&status_str)
                .ok_or_else(|| anyhow!("unknown publish status: {status_str}"))?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_post_target(row: &sqlx::sqlite::SqliteRow) -> Result<PostTarget> {
        let id_str: String = row.get("id");
        let post_id_str: String = row.get("post_id");
        let channel_str: String = row.get("channel");
        let status_str: String = row.get("status");

        Ok(PostTarget {
            id: Uuid::parse_str(&id_str)?,
            post_id: Uuid::parse_str(&post_id_str)?,
            channel: PublishChannel::parse(&channel_str)
                .ok_or_else(|| anyhow!("unknown publish channel: {channel_str}"))?,
            status: PublishStatus::parse(&status_str)
                .ok_or_else(|| anyhow!("unknown publish status: {status_str}"))?,
            external_id: row.get("external_id"),
            error: row.get("error"),
            updated_at: row.get("updated_at"),
        })
    }
}
