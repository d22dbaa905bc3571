// ABOUTME: Provider account store: one encrypted credential record per (org, provider)
// ABOUTME: Upsert keyed on (org_id, provider); targeted mutators for refresh and reauth marking
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::{ProviderAccount, ProviderKind};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

/// Provider account data for upserts; tokens arrive already encrypted
pub struct ProviderAccountData<'a> {
    pub org_id: Uuid,
    pub provider: ProviderKind,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub scopes: &'a [String],
    pub expires_at: Option<DateTime<Utc>>,
    pub external_account_id: &'a str,
    pub display_name: Option<&'a str>,
}

impl Database {
    pub(super) async fn migrate_provider_accounts(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS provider_accounts (
                org_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                scopes TEXT NOT NULL DEFAULT '[]',
                expires_at DATETIME,
                external_account_id TEXT NOT NULL,
                display_name TEXT,
                reauth_required INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE(org_id, provider)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_provider_accounts_org ON provider_accounts(org_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert a provider account; a fresh authorization or refresh always
    /// clears the reauth flag and last error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_provider_account(&self, data: &ProviderAccountData<'_>) -> Result<()> {
        let scopes = serde_json::to_string(data.scopes)?;
        let now = Utc::now();
        sqlx::query(
            r"
            INSERT INTO provider_accounts (
                org_id, provider, access_token, refresh_token, scopes, expires_at,
                external_account_id, display_name, reauth_required, last_error,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, NULL, $9, $9)
            ON CONFLICT (org_id, provider)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                scopes = EXCLUDED.scopes,
                expires_at = EXCLUDED.expires_at,
                external_account_id = EXCLUDED.external_account_id,
                display_name = EXCLUDED.display_name,
                reauth_required = 0,
                last_error = NULL,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(data.org_id.to_string())
        .bind(data.provider.as_str())
        .bind(data.access_token)
        .bind(data.refresh_token)
        .bind(&scopes)
        .bind(data.expires_at)
        .bind(data.external_account_id)
        .bind(data.display_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the provider account for an organization
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_provider_account(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<ProviderAccount>> {
        let row = sqlx::query(
            r"
            SELECT org_id, provider, access_token, refresh_token, scopes, expires_at,
                   external_account_id, display_name, reauth_required, last_error,
                   created_at, updated_at
            FROM provider_accounts
            WHERE org_id = $1 AND provider = $2
            ",
        )
        .bind(org_id.to_string())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_provider_account(&row)?)))
    }

    /// Flag the account as needing reauthorization; the token must not be
    /// used again until a fresh authorization replaces the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn mark_account_reauth_required(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE provider_accounts
            SET reauth_required = 1, last_error = $3, updated_at = $4
            WHERE org_id = $1 AND provider = $2
            ",
        )
        .bind(org_id.to_string())
        .bind(provider.as_str())
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist refreshed tokens (already encrypted), clearing the reauth
    /// flag and last error. Last write wins under concurrent refreshes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn store_refreshed_tokens(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE provider_accounts
            SET access_token = $3,
                refresh_token = COALESCE($4, refresh_token),
                expires_at = $5,
                reauth_required = 0,
                last_error = NULL,
                updated_at = $6
            WHERE org_id = $1 AND provider = $2
            ",
        )
        .bind(org_id.to_string())
        .bind(provider.as_str())
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the account on explicit disconnect
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails
    pub async fn delete_provider_account(&self, org_id: Uuid, provider: ProviderKind) -> Result<()> {
        sqlx::query("DELETE FROM provider_accounts WHERE org_id = $1 AND provider = $2")
            .bind(org_id.to_string())
            .bind(provider.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_provider_account(row: &sqlx::sqlite::SqliteRow) -> Result<ProviderAccount> {
        let org_id_str: String = row.get("org_id");
        let provider_str: String = row.get("provider");
        let scopes_json: String = row.get("scopes");

        Ok(ProviderAccount {
            org_id: Uuid::parse_str(&org_id_str)?,
            provider: ProviderKind::parse(&provider_str)
                .ok_or_else(|| anyhow!("unknown provider: {provider_str}"))?,
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            scopes: serde_json::from_str(&scopes_json)?,
            expires_at: row.get("expires_at"),
            external_account_id: row.get("external_account_id"),
            display_name: row.get("display_name"),
            reauth_required: row.get("reauth_required"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
