// ABOUTME: Schedule store: recurring job cadence state, one row per (org, job_key)
// ABOUTME: Due selection orders never-run schedules first; advancing happens in Rust
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::JobSchedule;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    pub(super) async fn migrate_job_schedules(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS job_schedules (
                org_id TEXT NOT NULL,
                job_key TEXT NOT NULL,
                cadence_minutes INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                next_run_at DATETIME,
                last_enqueued_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE(org_id, job_key)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_schedules_due ON job_schedules(job_key, enabled, next_run_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create or update an organization's schedule for a job. A new schedule
    /// starts with `next_run_at` NULL so it is picked up on the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn save_schedule(
        &self,
        org_id: Uuid,
        job_key: &str,
        cadence_minutes: i64,
        enabled: bool,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r"
            INSERT INTO job_schedules (
                org_id, job_key, cadence_minutes, enabled, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (org_id, job_key)
            DO UPDATE SET
                cadence_minutes = EXCLUDED.cadence_minutes,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(org_id.to_string())
        .bind(job_key)
        .bind(cadence_minutes)
        .bind(enabled)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get one organization's schedule for a job
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_schedule(&self, org_id: Uuid, job_key: &str) -> Result<Option<JobSchedule>> {
        let row = sqlx::query(
            r"
            SELECT org_id, job_key, cadence_minutes, enabled, next_run_at,
                   last_enqueued_at, created_at, updated_at
            FROM job_schedules
            WHERE org_id = $1 AND job_key = $2
            ",
        )
        .bind(org_id.to_string())
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_schedule(&row)?)))
    }

    /// List enabled schedules that are due at `now`. Schedules that have
    /// never been enqueued (`next_run_at` NULL) sort first; SQLite orders
    /// NULLs first under ASC.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_due_schedules(
        &self,
        job_key: &str,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JobSchedule>> {
        let rows = sqlx::query(
            r"
            SELECT org_id, job_key, cadence_minutes, enabled, next_run_at,
                   last_enqueued_at, created_at, updated_at
            FROM job_schedules
            WHERE job_key = $1
              AND enabled = 1
              AND (next_run_at IS NULL OR next_run_at <= $2)
            ORDER BY next_run_at ASC
            LIMIT $3
            ",
        )
        .bind(job_key)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in rows {
            schedules.push(Self::row_to_schedule(&row)?);
        }
        Ok(schedules)
    }

    /// Advance a schedule after it has been dispatched: stamp
    /// `last_enqueued_at` and move `next_run_at` one cadence forward from
    /// `now`. Called regardless of how the dispatched run turns out.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub async fn mark_schedule_enqueued(
        &self,
        org_id: Uuid,
        job_key: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(schedule) = self.get_schedule(org_id, job_key).await? else {
            return Err(anyhow!("no schedule for org {org_id} job {job_key}"));
        };

        let next_run_at = now + Duration::minutes(schedule.cadence_minutes);
        sqlx::query(
            r"
            UPDATE job_schedules
            SET last_enqueued_at = $3, next_run_at = $4, updated_at = $3
            WHERE org_id = $1 AND job_key = $2
            ",
        )
        .bind(org_id.to_string())
        .bind(job_key)
        .bind(now)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> Result<JobSchedule> {
        let org_id_str: String = row.get("org_id");

        Ok(JobSchedule {
            org_id: Uuid::parse_str(&org_id_str)?,
            job_key: row.get("job_key"),
            cadence_minutes: row.get("cadence_minutes"),
            enabled: row.get("enabled"),
            next_run_at: row.get("next_run_at"),
            last_enqueued_at: row.get("last_enqueued_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
