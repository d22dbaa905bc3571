// ABOUTME: Database management: connection pool, migrations and per-domain store modules
// ABOUTME: SQLite via sqlx; all writes are upserts or inserts, reads use row_to_* helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Storage Layer
//!
//! One `Database` handle over a SQLite pool. Each domain area lives in its
//! own file with a `migrate_*` function and the CRUD methods for its tables:
//!
//! - `provider_accounts`: encrypted credentials per (org, provider)
//! - `location_links`: location to provider resource associations
//! - `reviews`: synced-down review content
//! - `job_runs`: the job run ledger with its single-flight guard
//! - `job_schedules`: recurring schedule state
//! - `posts`: posts and their per-channel publish targets
//! - `audit_log`: append-only audit records

mod audit_log;
mod job_runs;
mod job_schedules;
mod location_links;
mod posts;
mod provider_accounts;
mod reviews;

pub use job_runs::NewJobRunItem;
pub use provider_accounts::ProviderAccountData;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

/// Database manager for the provider integration core
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        // In-memory SQLite gives every pooled connection its own private
        // database; pin the pool to one connection so state is shared.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&connection_options)
                .await?
        } else {
            SqlitePoolOptions::new().connect(&connection_options).await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index creation fails.
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_provider_accounts().await?;
        self.migrate_location_links().await?;
        self.migrate_reviews().await?;
        self.migrate_job_runs().await?;
        self.migrate_job_schedules().await?;
        self.migrate_posts().await?;
        self.migrate_audit_log().await?;
        Ok(())
    }
}
