// ABOUTME: Audit log store: append-only record of state-changing and security-relevant actions
// ABOUTME: Writes never update or delete; reads are newest-first for inspection
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::AuditEntry;
use anyhow::Result;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    pub(super) async fn migrate_audit_log(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor_user_id TEXT,
                org_id TEXT NOT NULL,
                action TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_log_org ON audit_log(org_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one audit record. `actor_user_id` None means the scheduler or
    /// another system component acted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails
    pub async fn write_audit_log(
        &self,
        actor_user_id: Option<Uuid>,
        org_id: Uuid,
        action: &str,
        target_type: &str,
        target_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO audit_log (actor_user_id, org_id, action, target_type, target_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(actor_user_id.map(|id| id.to_string()))
        .bind(org_id.to_string())
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(metadata.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List an organization's audit records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_audit_log(&self, org_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r"
            SELECT id, actor_user_id, org_id, action, target_type, target_id, metadata, created_at
            FROM audit_log
            WHERE org_id = $1
            ORDER BY id DESC
            LIMIT $2
            ",
        )
        .bind(org_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let actor_str: Option<String> = row.get("actor_user_id");
            let org_id_str: String = row.get("org_id");
            let metadata_json: String = row.get("metadata");
            entries.push(AuditEntry {
                id: row.get("id"),
                actor_user_id: actor_str.map(|s| Uuid::parse_str(&s)).transpose()?,
                org_id: Uuid::parse_str(&org_id_str)?,
                action: row.get("action"),
                target_type: row.get("target_type"),
                target_id: row.get("target_id"),
                metadata: serde_json::from_str(&metadata_json)?,
                created_at: row.get("created_at"),
            });
        }
        Ok(entries)
    }
}
