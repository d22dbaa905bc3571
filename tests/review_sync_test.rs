// ABOUTME: Bulk review sync tests: per-location isolation, aggregation, single-flight behavior
// ABOUTME: Scripted adapters control which locations fail; counters prove call discipline
//
// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use common::{create_test_harness, remote_review};
use presence_core::errors::{CoreError, ProviderError};
use presence_core::jobs::ReviewSyncSummary;
use presence_core::models::{JobRunStatus, ProviderKind};
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
async fn test_empty_link_set_succeeds_without_provider_calls() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();

    let run = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap();

    assert_eq!(run.status, JobRunStatus::Succeeded);
    let summary: ReviewSyncSummary = serde_json::from_value(run.summary).unwrap();
    assert_eq!(summary.total_locations, 0);
    assert_eq!(summary.review_count, 0);
    assert_eq!(harness.map_profile.list_reviews_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_bad_location_yields_partial_run() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();

    let locations = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    for (i, location_id) in locations.iter().enumerate() {
        harness
            .database
            .upsert_location_link(
                *location_id,
                org_id,
                ProviderKind::MapProfile,
                &format!("accounts/1/locations/{i}"),
                None,
            )
            .await
            .unwrap();
    }
    harness
        .map_profile
        .script_reviews("accounts/1/locations/0", Ok(vec![remote_review("r1", 5)]));
    harness.map_profile.script_reviews(
        "accounts/1/locations/1",
        Err(ProviderError::upstream(ProviderKind::MapProfile, "backend error")),
    );
    harness
        .map_profile
        .script_reviews("accounts/1/locations/2", Ok(vec![remote_review("r2", 4), remote_review("r3", 3)]));

    let run = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap();

    assert_eq!(run.status, JobRunStatus::Partial);
    let summary: ReviewSyncSummary = serde_json::from_value(run.summary).unwrap();
    assert_eq!(summary.total_locations, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.review_count, 3);

    let items = harness.database.list_job_run_items(run.id).await.unwrap();
    assert_eq!(items.len(), 3);
    let failed: Vec<_> = items
        .iter()
        .filter(|i| i.status == JobRunStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].location_id, Some(locations[1]));
    assert!(failed[0].error.as_deref().unwrap().contains("upstream_error"));

    // Successful locations got their reviews stored and bookkeeping touched
    let stored = harness
        .database
        .list_reviews(locations[2], ProviderKind::MapProfile)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    let link = harness
        .database
        .get_location_link(locations[2], ProviderKind::MapProfile)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_synced_at.is_some());
    assert_eq!(link.last_review_count, Some(2));
    let bad_link = harness
        .database
        .get_location_link(locations[1], ProviderKind::MapProfile)
        .await
        .unwrap()
        .unwrap();
    assert!(bad_link.last_synced_at.is_none());
}

#[tokio::test]
async fn test_all_locations_failing_yields_failed_run() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();
    harness
        .database
        .upsert_location_link(location_id, org_id, ProviderKind::MapProfile, "accounts/1/locations/0", None)
        .await
        .unwrap();
    harness.map_profile.script_reviews(
        "accounts/1/locations/0",
        Err(ProviderError::rate_limited(ProviderKind::MapProfile, "throttled")),
    );

    let run = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap();

    assert_eq!(run.status, JobRunStatus::Failed);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected_before_any_work() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();
    harness
        .database
        .upsert_location_link(location_id, org_id, ProviderKind::MapProfile, "accounts/1/locations/0", None)
        .await
        .unwrap();

    // Hold the single-flight slot open, as a stuck run would
    harness
        .database
        .start_job_run(org_id, "review_sync", None)
        .await
        .unwrap()
        .unwrap();

    let err = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::JobAlreadyRunning { .. }));
    assert_eq!(harness.map_profile.list_reviews_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unconnected_provider_fails_items_not_the_run() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();
    harness
        .database
        .upsert_location_link(location_id, org_id, ProviderKind::MapProfile, "accounts/1/locations/0", None)
        .await
        .unwrap();

    let run = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap();

    assert_eq!(run.status, JobRunStatus::Failed);
    let items = harness.database.list_job_run_items(run.id).await.unwrap();
    assert!(items[0].error.as_deref().unwrap().contains("auth_required"));
}

#[tokio::test]
async fn test_sync_completion_is_audited() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();

    let run = harness
        .review_sync(ProviderKind::MapProfile)
        .run(org_id, None)
        .await
        .unwrap();

    let entries = harness.database.list_audit_log(org_id, 10).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == "job.review_sync.completed" && e.target_id == run.id.to_string()));
}

#[tokio::test]
async fn test_reply_to_review_marks_and_audits() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();
    harness
        .database
        .upsert_location_link(location_id, org_id, ProviderKind::MapProfile, "accounts/1/locations/0", None)
        .await
        .unwrap();
    harness
        .database
        .upsert_reviews(location_id, ProviderKind::MapProfile, &[remote_review("rev-9", 2)])
        .await
        .unwrap();

    harness
        .review_sync(ProviderKind::MapProfile)
        .reply_to_review(org_id, location_id, "rev-9", "Sorry to hear that", Some(actor))
        .await
        .unwrap();

    assert_eq!(harness.map_profile.reply_calls.load(Ordering::SeqCst), 1);
    let reviews = harness
        .database
        .list_reviews(location_id, ProviderKind::MapProfile)
        .await
        .unwrap();
    assert!(reviews[0].has_reply);

    let entries = harness.database.list_audit_log(org_id, 10).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == "review.reply_posted" && e.target_id == "rev-9"));
}
