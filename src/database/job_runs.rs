// ABOUTME: Job run ledger: run records, per-item outcomes and the single-flight guard
// ABOUTME: Single-flight is a partial unique index on (org_id, job_key) WHERE status='running'
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Database;
use crate::models::{JobRun, JobRunItem, JobRunStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

/// One unit-of-work outcome, collected during a run and written in a single
/// batch at finalization
#[derive(Debug, Clone)]
pub struct NewJobRunItem {
    pub location_id: Option<Uuid>,
    pub status: JobRunStatus,
    pub count: Option<i64>,
    pub error: Option<String>,
}

impl Database {
    pub(super) async fn migrate_job_runs(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS job_runs (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                job_key TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at DATETIME NOT NULL,
                finished_at DATETIME,
                summary TEXT NOT NULL DEFAULT '{}',
                error TEXT,
                actor_user_id TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // The single-flight guard: scoped to exactly (org, job_key, running)
        // so historical runs coexist and different organizations never
        // conflict with each other.
        sqlx::query(
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_job_runs_single_flight
            ON job_runs(org_id, job_key) WHERE status = 'running'
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_runs_org_key ON job_runs(org_id, job_key, started_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS job_run_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_run_id TEXT NOT NULL REFERENCES job_runs(id) ON DELETE CASCADE,
                location_id TEXT,
                status TEXT NOT NULL,
                count INTEGER,
                error TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_run_items_run ON job_run_items(job_run_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a run in `running` state. Returns `None` when another run is
    /// already running for this (org, job key); the caller must abort
    /// without side effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails for any reason other than the
    /// single-flight conflict
    pub async fn start_job_run(
        &self,
        org_id: Uuid,
        job_key: &str,
        actor_user_id: Option<Uuid>,
    ) -> Result<Option<JobRun>> {
        let run = JobRun {
            id: Uuid::new_v4(),
            org_id,
            job_key: job_key.to_string(),
            status: JobRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            summary: serde_json::json!({}),
            error: None,
            actor_user_id,
        };

        let result = sqlx::query(
            r"
            INSERT INTO job_runs (id, org_id, job_key, status, started_at, summary, actor_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(run.id.to_string())
        .bind(org_id.to_string())
        .bind(job_key)
        .bind(JobRunStatus::Running.as_str())
        .bind(run.started_at)
        .bind(run.summary.to_string())
        .bind(actor_user_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Some(run)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Transition a run to its terminal state and batch-write its items.
    ///
    /// The WHERE clause guards finality: a run that already left `running`
    /// is never rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown or already finalized, or if
    /// the transaction fails
    pub async fn finish_job_run(
        &self,
        run_id: Uuid,
        status: JobRunStatus,
        summary: &serde_json::Value,
        error: Option<&serde_json::Value>,
        items: &[NewJobRunItem],
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(anyhow!("finish_job_run requires a terminal status"));
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE job_runs
            SET status = $2, finished_at = $3, summary = $4, error = $5
            WHERE id = $1 AND status = 'running'
            ",
        )
        .bind(run_id.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(summary.to_string())
        .bind(error.map(std::string::ToString::to_string))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(anyhow!("job run {run_id} is not running"));
        }

        for item in items {
            sqlx::query(
                r"
                INSERT INTO job_run_items (job_run_id, location_id, status, count, error)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(run_id.to_string())
            .bind(item.location_id.map(|id| id.to_string()))
            .bind(item.status.as_str())
            .bind(item.count)
            .bind(&item.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get one run by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_job_run(&self, run_id: Uuid) -> Result<Option<JobRun>> {
        let row = sqlx::query(
            r"
            SELECT id, org_id, job_key, status, started_at, finished_at, summary, error, actor_user_id
            FROM job_runs WHERE id = $1
            ",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(Self::row_to_job_run(&row)?)))
    }

    /// List an organization's runs for a job, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_job_runs(
        &self,
        org_id: Uuid,
        job_key: &str,
        limit: i64,
    ) -> Result<Vec<JobRun>> {
        let rows = sqlx::query(
            r"
            SELECT id, org_id, job_key, status, started_at, finished_at, summary, error, actor_user_id
            FROM job_runs
            WHERE org_id = $1 AND job_key = $2
            ORDER BY started_at DESC
            LIMIT $3
            ",
        )
        .bind(org_id.to_string())
        .bind(job_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            runs.push(Self::row_to_job_run(&row)?);
        }
        Ok(runs)
    }

    /// List the per-item outcomes of one run, in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_job_run_items(&self, run_id: Uuid) -> Result<Vec<JobRunItem>> {
        let rows = sqlx::query(
            r"
            SELECT id, job_run_id, location_id, status, count, error
            FROM job_run_items
            WHERE job_run_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let run_id_str: String = row.get("job_run_id");
            let location_id_str: Option<String> = row.get("location_id");
            let status_str: String = row.get("status");
            items.push(JobRunItem {
                id: row.get("id"),
                job_run_id: Uuid::parse_str(&run_id_str)?,
                location_id: location_id_str
                    .map(|s| Uuid::parse_str(&s))
                    .transpose()?,
                status: JobRunStatus::parse(&status_str)
                    .ok_or_else(|| anyhow!("unknown job status: {status_str}"))?,
                count: row.get("count"),
                error: row.get("error"),
            });
        }
        Ok(items)
    }

    fn row_to_job_run(row: &sqlx::sqlite::SqliteRow) -> Result<JobRun> {
        let id_str: String = row.get("id");
        let org_id_str: String = row.get("org_id");
        let status_str: String = row.get("status");
        let summary_json: String = row.get("summary");
        let error_json: Option<String> = row.get("error");
        let actor_str: Option<String> = row.get("actor_user_id");

        Ok(JobRun {
            id: Uuid::parse_str(&id_str)?,
            org_id: Uuid::parse_str(&org_id_str)?,
            job_key: row.get("job_key"),
            status: JobRunStatus::parse(&status_str)
                .ok_or_else(|| anyhow!("unknown job status: {status_str}"))?,
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            summary: serde_json::from_str(&summary_json)?,
            error: error_json.map(|s| serde_json::from_str(&s)).transpose()?,
            actor_user_id: actor_str.map(|s| Uuid::parse_str(&s)).transpose()?,
        })
    }
}
