// ABOUTME: Review store: synced-down review content, one row per (location, provider, external id)
// ABOUTME: Bulk upserts during sync runs; reply marking after a reply is posted
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::{ProviderKind, Review};
use crate::providers::RemoteReview;
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    pub(super) async fn migrate_reviews(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS reviews (
                location_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                external_id TEXT NOT NULL,
                rating INTEGER,
                author TEXT,
                body TEXT,
                has_reply INTEGER NOT NULL DEFAULT 0,
                remote_created_at DATETIME,
                fetched_at DATETIME NOT NULL,
                UNIQUE(location_id, provider, external_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_location ON reviews(location_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upsert a batch of fetched reviews for one location; returns how many
    /// rows were written.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or any insert fails
    pub async fn upsert_reviews(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
        reviews: &[RemoteReview],
    ) -> Result<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for review in reviews {
            sqlx::query(
                r"
                INSERT INTO reviews (
                    location_id, provider, external_id, rating, author, body,
                    has_reply, remote_created_at, fetched_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (location_id, provider, external_id)
                DO UPDATE SET
                    rating = EXCLUDED.rating,
                    author = EXCLUDED.author,
                    body = EXCLUDED.body,
                    has_reply = EXCLUDED.has_reply,
                    remote_created_at = EXCLUDED.remote_created_at,
                    fetched_at = EXCLUDED.fetched_at
                ",
            )
            .bind(location_id.to_string())
            .bind(provider.as_str())
            .bind(&review.external_id)
            .bind(review.rating)
            .bind(&review.author)
            .bind(&review.body)
            .bind(review.has_reply)
            .bind(review.created_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(reviews.len() as i64)
    }

    /// List stored reviews for one location, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_reviews(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r"
            SELECT location_id, provider, external_id, rating, author, body,
                   has_reply, remote_created_at, fetched_at
            FROM reviews
            WHERE location_id = $1 AND provider = $2
            ORDER BY remote_created_at DESC
            ",
        )
        .bind(location_id.to_string())
        .bind(provider.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            reviews.push(Self::row_to_review(&row)?);
        }
        Ok(reviews)
    }

    /// Mark a stored review as replied to
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn mark_review_replied(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
        external_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE reviews SET has_reply = 1
            WHERE location_id = $1 AND provider = $2 AND external_id = $3
            ",
        )
        .bind(location_id.to_string())
        .bind(provider.as_str())
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_review(row: &sqlx::sqlite::SqliteRow) -> Result<Review> {
        let location_id_str: String = row.get("location_id");
        let provider_str: String = row.get("provider");

        Ok(Review {
            location_id: Uuid::parse_str(&location_id_str)?,
            provider: ProviderKind::parse(&provider_str)
                .ok_or_else(|| anyhow!("unknown provider: {provider_str}"))?,
            external_id: row.get("external_id"),
            rating: row.get("rating"),
            author: row.get("author"),
            body: row.get("body"),
            has_reply: row.get("has_reply"),
            remote_created_at: row.get("remote_created_at"),
            fetched_at: row.get("fetched_at"),
        })
    }
}
