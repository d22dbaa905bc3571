// ABOUTME: Credential lifecycle tests: proactive refresh, reauth lockout, dead-end handling
// ABOUTME: All provider traffic goes through scripted adapters; counters prove call behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use chrono::{Duration, Utc};
use common::create_test_harness;
use presence_core::errors::{ProviderErrorKind, ProviderError};
use presence_core::models::ProviderKind;
use presence_core::providers::RefreshedToken;
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
async fn test_fresh_token_is_used_without_refresh() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::MapProfile,
            "live-token",
            Some("refresh-1"),
            Some(Utc::now() + Duration::minutes(10)),
        )
        .await
        .unwrap();

    let (token, account) = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap();

    assert_eq!(token, "live-token");
    assert!(!account.reauth_required);
    assert_eq!(harness.map_profile.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_token_expiring_soon_is_refreshed_first() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::MapProfile,
            "stale-token",
            Some("refresh-1"),
            Some(Utc::now() + Duration::minutes(4)),
        )
        .await
        .unwrap();
    harness.map_profile.script_refresh(Ok(RefreshedToken {
        access_token: "minted-token".into(),
        refresh_token: None,
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scopes: Vec::new(),
    }));

    let (token, _) = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap();

    assert_eq!(token, "minted-token");
    assert_eq!(harness.map_profile.refresh_calls.load(Ordering::SeqCst), 1);

    // The provider kept the refresh token valid, so the stored one survives
    let account = harness
        .database
        .get_provider_account(org_id, ProviderKind::MapProfile)
        .await
        .unwrap()
        .unwrap();
    let stored_refresh = harness
        .codec
        .decrypt(account.refresh_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(stored_refresh, "refresh-1");
    assert_eq!(
        harness.codec.decrypt(&account.access_token).unwrap(),
        "minted-token"
    );
}

#[tokio::test]
async fn test_no_expiry_means_no_refresh() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::SocialPages, "page-token", None, None)
        .await
        .unwrap();

    let (token, _) = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::SocialPages)
        .await
        .unwrap();

    assert_eq!(token, "page-token");
    assert_eq!(harness.social_pages.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_locked_out_account_makes_no_outbound_calls() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::MapProfile,
            "token",
            Some("refresh-1"),
            Some(Utc::now() + Duration::minutes(1)),
        )
        .await
        .unwrap();
    harness
        .database
        .mark_account_reauth_required(org_id, ProviderKind::MapProfile, "revoked upstream")
        .await
        .unwrap();

    let err = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::AuthRequired);
    assert!(err.message.contains("revoked upstream"));
    assert_eq!(harness.map_profile.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unconnected_account_requires_auth() {
    let harness = create_test_harness().await.unwrap();

    // Never-connected organizations get the same reconnect steer as
    // revoked ones
    let err = harness
        .credentials
        .ensure_access_token(Uuid::new_v4(), ProviderKind::MapProfile)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::AuthRequired);
    assert!(err.message.contains("not connected"));
}

#[tokio::test]
async fn test_failed_refresh_locks_the_account() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::MapProfile,
            "token",
            Some("refresh-1"),
            Some(Utc::now() + Duration::minutes(2)),
        )
        .await
        .unwrap();
    harness.map_profile.script_refresh(Err(ProviderError::auth_required(
        ProviderKind::MapProfile,
        "invalid_grant",
    )));

    let err = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::AuthRequired);

    let account = harness
        .database
        .get_provider_account(org_id, ProviderKind::MapProfile)
        .await
        .unwrap()
        .unwrap();
    assert!(account.reauth_required);
    assert_eq!(account.last_error.as_deref(), Some("refresh_failed"));

    // Locked out now: the second call must not hit the adapter again
    let err = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::AuthRequired);
    assert_eq!(harness.map_profile.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_refresh_failure_does_not_lock() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::MapProfile,
            "token",
            Some("refresh-1"),
            Some(Utc::now() + Duration::minutes(2)),
        )
        .await
        .unwrap();
    harness.map_profile.script_refresh(Err(ProviderError::rate_limited(
        ProviderKind::MapProfile,
        "slow down",
    )));

    let err = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::RateLimited);

    let account = harness
        .database
        .get_provider_account(org_id, ProviderKind::MapProfile)
        .await
        .unwrap()
        .unwrap();
    assert!(!account.reauth_required);
}

#[tokio::test]
async fn test_expired_token_without_refresh_token_locks() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(
            org_id,
            ProviderKind::SocialPages,
            "token",
            None,
            Some(Utc::now() - Duration::minutes(1)),
        )
        .await
        .unwrap();

    let err = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::SocialPages)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::AuthRequired);

    let account = harness
        .database
        .get_provider_account(org_id, ProviderKind::SocialPages)
        .await
        .unwrap()
        .unwrap();
    assert!(account.reauth_required);
    assert_eq!(account.last_error.as_deref(), Some("refresh_token_missing"));
}

#[tokio::test]
async fn test_reconnect_clears_lockout() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "old", None, None)
        .await
        .unwrap();
    harness
        .database
        .mark_account_reauth_required(org_id, ProviderKind::MapProfile, "revoked")
        .await
        .unwrap();

    harness
        .connect_account(org_id, ProviderKind::MapProfile, "new", Some("r2"), None)
        .await
        .unwrap();

    let (token, account) = harness
        .credentials
        .ensure_access_token(org_id, ProviderKind::MapProfile)
        .await
        .unwrap();
    assert_eq!(token, "new");
    assert!(!account.reauth_required);
    assert_eq!(account.last_error, None);
}

#[tokio::test]
async fn test_disconnect_removes_account_and_audits() {
    let harness = create_test_harness().await.unwrap();
    let org_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    harness
        .connect_account(org_id, ProviderKind::MapProfile, "token", None, None)
        .await
        .unwrap();

    harness
        .credentials
        .disconnect(org_id, ProviderKind::MapProfile, Some(actor))
        .await
        .unwrap();

    assert!(harness
        .database
        .get_provider_account(org_id, ProviderKind::MapProfile)
        .await
        .unwrap()
        .is_none());

    let entries = harness.database.list_audit_log(org_id, 10).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == "provider.disconnected" && e.actor_user_id == Some(actor)));
}
