// ABOUTME: Background job orchestration: bulk review sync, publishing and schedule dispatch
// ABOUTME: All runs go through the job run ledger and its single-flight guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod publish;
pub mod review_sync;
pub mod schedule;

pub use publish::PublishCoordinator;
pub use review_sync::ReviewSync;
pub use schedule::ScheduleDispatcher;

use serde::{Deserialize, Serialize};

/// Job key for the bulk review sync job
pub const REVIEW_SYNC_JOB: &str = "review_sync";

/// Counters written into a review sync run's summary at finalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSyncSummary {
    pub total_locations: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Reviews written across all successful locations
    pub review_count: i64,
}
