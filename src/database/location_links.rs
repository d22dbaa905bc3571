// ABOUTME: Location-provider link store: association between a location and a provider resource
// ABOUTME: At most one link per (location, provider); sync operations update the bookkeeping fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::{LocationLink, ProviderKind};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    pub(super) async fn migrate_location_links(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS location_links (
                location_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                external_resource_id TEXT NOT NULL,
                display_name TEXT,
                last_synced_at DATETIME,
                last_review_count INTEGER,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE(location_id, provider)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_location_links_org_provider ON location_links(org_id, provider)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Link a location to a provider-side resource (or re-point an existing link)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_location_link(
        &self,
        location_id: Uuid,
        org_id: Uuid,
        provider: ProviderKind,
        external_resource_id: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r"
            INSERT INTO location_links (
                location_id, org_id, provider, external_resource_id, display_name,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (location_id, provider)
            DO UPDATE SET
                external_resource_id = EXCLUDED.external_resource_id,
                display_name = EXCLUDED.display_name,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(location_id.to_string())
        .bind(org_id.to_string())
        .bind(provider.as_str())
        .bind(external_resource_id)
        .bind(display_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get one location's link to a provider
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_location_link(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<LocationLink>> {
        let row = sqlx::query(
            r"
            SELECT location_id, org_id, provider, external_resource_id, display_name,
                   last_synced_at, last_review_count, created_at, updated_at
            FROM location_links
            WHERE location_id = $1 AND provider = $2
            ",
        )
        .bind(location_id.to_string())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_location_link(&row)?)))
    }

    /// List all of an organization's links to one provider, in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_location_links(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Vec<LocationLink>> {
        let rows = sqlx::query(
            r"
            SELECT location_id, org_id, provider, external_resource_id, display_name,
                   last_synced_at, last_review_count, created_at, updated_at
            FROM location_links
            WHERE org_id = $1 AND provider = $2
            ORDER BY created_at ASC
            ",
        )
        .bind(org_id.to_string())
        .bind(provider.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut links = Vec::with_capacity(rows.len());
        for row in rows {
            links.push(Self::row_to_location_link(&row)?);
        }
        Ok(links)
    }

    /// Unlink a location from a provider
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails
    pub async fn delete_location_link(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
    ) -> Result<()> {
        sqlx::query("DELETE FROM location_links WHERE location_id = $1 AND provider = $2")
            .bind(location_id.to_string())
            .bind(provider.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record a successful sync pass over a link
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn touch_link_sync(
        &self,
        location_id: Uuid,
        provider: ProviderKind,
        synced_at: DateTime<Utc>,
        review_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE location_links
            SET last_synced_at = $3, last_review_count = $4, updated_at = $3
            WHERE location_id = $1 AND provider = $2
            ",
        )
        .bind(location_id.to_string())
        .bind(provider.as_str())
        .bind(synced_at)
        .bind(review_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_location_link(row: &sqlx::sqlite::SqliteRow) -> Result<LocationLink> {
        let location_id_str: String = row.get("location_id");
        let org_id_str: String = row.get("org_id");
        let provider_str: String = row.get("provider");

        Ok(LocationLink {
            location_id: Uuid::parse_str(&location_id_str)?,
            org_id: Uuid::parse_str(&org_id_str)?,
            provider: ProviderKind::parse(&provider_str)
                .ok_or_else(|| anyhow!("unknown provider: {provider_str}"))?,
            external_resource_id: row.get("external_resource_id"),
            display_name: row.get("display_name"),
            last_synced_at: row.get("last_synced_at"),
            last_review_count: row.get("last_review_count"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
