// ABOUTME: Schedule dispatcher: picks due schedules and dispatches review sync runs
// ABOUTME: A dispatched schedule always advances, whatever the run's outcome
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Schedule Dispatch
//!
//! `tick` selects every enabled schedule that is due (never-enqueued ones
//! first) and dispatches a review sync run per organization. The schedule
//! advances one cadence from the tick time regardless of whether the run
//! succeeded, failed, or was skipped by the single-flight guard; a broken
//! organization must not be re-dispatched every tick.

use crate::audit;
use crate::database::Database;
use crate::errors::{CoreError, CoreResult, ProviderError};
use crate::jobs::{ReviewSync, REVIEW_SYNC_JOB};
use crate::models::ProviderKind;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cadences (in minutes) a schedule may use
pub const ALLOWED_CADENCES_MINUTES: [i64; 7] = [15, 30, 60, 180, 360, 720, 1440];

/// Most schedules dispatched per tick
const DISPATCH_BATCH: i64 = 100;

/// Outcome counters for one dispatch tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Runs that reached a terminal state (succeeded, failed or partial)
    pub completed: usize,
    /// Schedules skipped because a run was already in flight
    pub skipped_running: usize,
    /// Dispatches that errored before or during the run
    pub failed: usize,
}

/// Dispatches due review sync schedules
#[derive(Clone)]
pub struct ScheduleDispatcher {
    database: Arc<Database>,
    sync: ReviewSync,
    provider: ProviderKind,
}

impl ScheduleDispatcher {
    #[must_use]
    pub fn new(database: Arc<Database>, sync: ReviewSync, provider: ProviderKind) -> Self {
        Self {
            database,
            sync,
            provider,
        }
    }

    /// Create or update an organization's review sync schedule.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a cadence outside
    /// [`ALLOWED_CADENCES_MINUTES`], `not_configured` when the organization
    /// has no connected provider account, or a storage error
    pub async fn save_schedule(
        &self,
        org_id: Uuid,
        cadence_minutes: i64,
        enabled: bool,
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<()> {
        if !ALLOWED_CADENCES_MINUTES.contains(&cadence_minutes) {
            return Err(CoreError::InvalidInput(format!(
                "cadence {cadence_minutes} minutes is not allowed"
            )));
        }

        if self
            .database
            .get_provider_account(org_id, self.provider)
            .await?
            .is_none()
        {
            return Err(CoreError::Provider(ProviderError::not_configured(
                self.provider,
                "cannot schedule sync without a connected account",
            )));
        }

        self.database
            .save_schedule(org_id, REVIEW_SYNC_JOB, cadence_minutes, enabled)
            .await?;

        self.database
            .write_audit_log(
                actor_user_id,
                org_id,
                audit::actions::SCHEDULE_SAVED,
                "job_schedule",
                REVIEW_SYNC_JOB,
                &serde_json::json!({
                    "cadence_minutes": cadence_minutes,
                    "enabled": enabled,
                }),
            )
            .await?;

        Ok(())
    }

    /// Dispatch every due schedule once. Returns counters for the tick.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing due schedules fails; per-schedule
    /// failures are counted and logged
    pub async fn tick(&self, now: DateTime<Utc>) -> CoreResult<TickOutcome> {
        let due = self
            .database
            .list_due_schedules(REVIEW_SYNC_JOB, now, DISPATCH_BATCH)
            .await?;
        let mut outcome = TickOutcome::default();

        for schedule in due {
            match self.sync.run(schedule.org_id, None).await {
                Ok(run) => {
                    info!(
                        org_id = %schedule.org_id,
                        run_id = %run.id,
                        status = %run.status,
                        "scheduled sync dispatched"
                    );
                    outcome.completed += 1;
                }
                Err(CoreError::JobAlreadyRunning { org_id, .. }) => {
                    info!(org_id = %org_id, "scheduled sync skipped, run already in flight");
                    outcome.skipped_running += 1;
                }
                Err(e) => {
                    warn!(org_id = %schedule.org_id, error = %e, "scheduled sync failed");
                    outcome.failed += 1;
                }
            }

            // Advance unconditionally so a failing organization waits a full
            // cadence instead of being retried every tick. An advance failure
            // is counted against this schedule only; the rest of the batch
            // still dispatches.
            if let Err(e) = self
                .database
                .mark_schedule_enqueued(schedule.org_id, REVIEW_SYNC_JOB, now)
                .await
            {
                warn!(org_id = %schedule.org_id, error = %e, "failed to advance schedule");
                outcome.failed += 1;
            }
        }

        Ok(outcome)
    }
}
