// ABOUTME: Bulk review sync: fetch reviews for every linked location in one ledgered run
// ABOUTME: Per-location isolation; one bad location never aborts the others
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Review Sync
//!
//! One run walks every location link an organization has for a provider,
//! pulls that location's reviews and upserts them. Failures are recorded
//! per location; the run's terminal status aggregates the item outcomes:
//! all good is `succeeded`, all bad is `failed`, a mix is `partial`. An
//! empty link set finishes `succeeded` without touching the adapter.

use crate::audit;
use crate::credentials::CredentialManager;
use crate::database::{Database, NewJobRunItem};
use crate::errors::{CoreError, CoreResult, ProviderError};
use crate::jobs::{ReviewSyncSummary, REVIEW_SYNC_JOB};
use crate::models::{JobRun, JobRunStatus, LocationLink, ProviderKind};
use crate::providers::AdapterRegistry;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Orchestrates bulk review sync runs for one provider
#[derive(Clone)]
pub struct ReviewSync {
    database: Arc<Database>,
    credentials: CredentialManager,
    adapters: AdapterRegistry,
    provider: ProviderKind,
}

impl ReviewSync {
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        credentials: CredentialManager,
        adapters: AdapterRegistry,
        provider: ProviderKind,
    ) -> Self {
        Self {
            database,
            credentials,
            adapters,
            provider,
        }
    }

    /// Run one sync for an organization. Rejected with
    /// [`CoreError::JobAlreadyRunning`] while a previous run is still open.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the run or a storage
    /// operation fails; per-location failures do not error the call
    pub async fn run(&self, org_id: Uuid, actor_user_id: Option<Uuid>) -> CoreResult<JobRun> {
        let Some(run) = self
            .database
            .start_job_run(org_id, REVIEW_SYNC_JOB, actor_user_id)
            .await?
        else {
            return Err(CoreError::JobAlreadyRunning {
                org_id,
                job_key: REVIEW_SYNC_JOB.to_string(),
            });
        };

        let links = self
            .database
            .list_location_links(org_id, self.provider)
            .await?;

        let mut summary = ReviewSyncSummary {
            total_locations: links.len(),
            ..ReviewSyncSummary::default()
        };
        let mut items = Vec::with_capacity(links.len());

        for link in &links {
            match self.sync_location(org_id, link).await {
                Ok(count) => {
                    summary.success_count += 1;
                    summary.review_count += count;
                    items.push(NewJobRunItem {
                        location_id: Some(link.location_id),
                        status: JobRunStatus::Succeeded,
                        count: Some(count),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        org_id = %org_id,
                        location_id = %link.location_id,
                        error = %e,
                        "location sync failed"
                    );
                    summary.failed_count += 1;
                    items.push(NewJobRunItem {
                        location_id: Some(link.location_id),
                        status: JobRunStatus::Failed,
                        count: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let status = if summary.failed_count == 0 {
            JobRunStatus::Succeeded
        } else if summary.success_count == 0 {
            JobRunStatus::Failed
        } else {
            JobRunStatus::Partial
        };

        let summary_json = serde_json::to_value(&summary)
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        self.database
            .finish_job_run(run.id, status, &summary_json, None, &items)
            .await?;

        info!(
            org_id = %org_id,
            run_id = %run.id,
            status = %status,
            locations = summary.total_locations,
            reviews = summary.review_count,
            "review sync finished"
        );
        self.database
            .write_audit_log(
                actor_user_id,
                org_id,
                audit::actions::REVIEW_SYNC_COMPLETED,
                "job_run",
                &run.id.to_string(),
                &summary_json,
            )
            .await?;

        self.database
            .get_job_run(run.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("job run {}", run.id)))
    }

    /// Sync one location. The credential gate runs per location so a
    /// lockout discovered mid-run fails the remaining items fast instead
    /// of hammering the platform.
    async fn sync_location(
        &self,
        org_id: Uuid,
        link: &LocationLink,
    ) -> Result<i64, ProviderError> {
        let (token, _) = self
            .credentials
            .ensure_access_token(org_id, self.provider)
            .await?;

        let reviews = self
            .adapters
            .get(self.provider)
            .list_reviews(&token, &link.external_resource_id)
            .await?;

        let count = self
            .database
            .upsert_reviews(link.location_id, self.provider, &reviews)
            .await
            .map_err(|e| ProviderError::unknown(self.provider, e.to_string()))?;

        self.database
            .touch_link_sync(link.location_id, self.provider, Utc::now(), count)
            .await
            .map_err(|e| ProviderError::unknown(self.provider, e.to_string()))?;

        Ok(count)
    }

    /// Post a public reply to one stored review and mark it replied.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is not linked, the credential gate
    /// rejects the call, or the provider rejects the reply
    pub async fn reply_to_review(
        &self,
        org_id: Uuid,
        location_id: Uuid,
        review_external_id: &str,
        body: &str,
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<()> {
        let link = self
            .database
            .get_location_link(location_id, self.provider)
            .await?
            .ok_or_else(|| {
                CoreError::Provider(ProviderError::validation(
                    self.provider,
                    format!("location {location_id} is not linked"),
                ))
            })?;

        let (token, _) = self
            .credentials
            .ensure_access_token(org_id, self.provider)
            .await?;

        self.adapters
            .get(self.provider)
            .reply_to_review(&token, &link.external_resource_id, review_external_id, body)
            .await?;

        self.database
            .mark_review_replied(location_id, self.provider, review_external_id)
            .await?;

        self.database
            .write_audit_log(
                actor_user_id,
                org_id,
                audit::actions::REVIEW_REPLY_POSTED,
                "review",
                review_external_id,
                &serde_json::json!({ "location_id": location_id }),
            )
            .await?;

        Ok(())
    }
}
