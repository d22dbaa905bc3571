// ABOUTME: Audit action vocabulary used by the append-only audit sink
// ABOUTME: Action names are dotted verb.noun strings and must stay stable once written
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Audit action names written by the core. Stored as-is in the audit log, so
/// renaming one is a data migration.
pub mod actions {
    pub const PROVIDER_CONNECTED: &str = "provider.connected";
    pub const PROVIDER_DISCONNECTED: &str = "provider.disconnected";
    pub const PROVIDER_TOKEN_REFRESHED: &str = "provider.token_refreshed";
    pub const PROVIDER_REAUTH_REQUIRED: &str = "provider.reauth_required";
    pub const REVIEW_REPLY_POSTED: &str = "review.reply_posted";
    pub const REVIEW_SYNC_COMPLETED: &str = "job.review_sync.completed";
    pub const POST_PUBLISH_COMPLETED: &str = "post.publish.completed";
    pub const POST_TARGET_RETRIED: &str = "post.target.retried";
    pub const SCHEDULE_SAVED: &str = "schedule.saved";
}
