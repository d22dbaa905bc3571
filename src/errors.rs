// ABOUTME: Unified error types for the provider integration core
// ABOUTME: ProviderError carries the stable error vocabulary; CoreError wraps orchestration failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::models::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The stable error vocabulary every provider failure is reduced to.
///
/// Presentation-layer collaborators branch on this set to pick a
/// next-action hint, so it must remain small and exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The connection must be (re)authorized before any call can succeed
    AuthRequired,
    /// The platform throttled us; wait and retry
    RateLimited,
    /// The request or linking state is wrong; fix input before retrying
    ValidationError,
    /// Transient platform-side failure
    UpstreamError,
    /// Required configuration (client credentials, connected account) is missing
    NotConfigured,
    /// The operation is not implemented for this provider
    NotSupported,
    /// Anything we could not classify
    Unknown,
}

impl ProviderErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::RateLimited => "rate_limited",
            Self::ValidationError => "validation_error",
            Self::UpstreamError => "upstream_error",
            Self::NotConfigured => "not_configured",
            Self::NotSupported => "not_supported",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized provider failure.
///
/// Produced by the error taxonomy (`providers::taxonomy::classify`) or by the
/// typed constructors below; raw transport errors never cross the provider
/// boundary in any other shape.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{provider} {kind}: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
}

impl ProviderError {
    #[must_use]
    pub fn new(
        provider: ProviderKind,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    #[must_use]
    pub const fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Reconnect/reauthorize before retrying
    #[must_use]
    pub fn auth_required(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::AuthRequired, message)
    }

    #[must_use]
    pub fn rate_limited(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::RateLimited, message)
    }

    #[must_use]
    pub fn validation(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::ValidationError, message)
    }

    #[must_use]
    pub fn upstream(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::UpstreamError, message)
    }

    #[must_use]
    pub fn not_configured(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::NotConfigured, message)
    }

    #[must_use]
    pub fn not_supported(provider: ProviderKind, feature: impl Into<String>) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::NotSupported,
            format!("not supported: {}", feature.into()),
        )
    }

    #[must_use]
    pub fn unknown(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unknown, message)
    }

    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::AuthRequired)
    }
}

/// Error type for orchestration-level operations (sync runs, publishing,
/// schedules). Provider failures pass through unchanged so callers can
/// still branch on `ProviderErrorKind`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The single-flight guard rejected a second concurrent run
    #[error("job '{job_key}' is already running for organization {org_id}")]
    JobAlreadyRunning { org_id: Uuid, job_key: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for CoreError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Result type alias for orchestration-level operations
pub type CoreResult<T> = Result<T, CoreError>;
