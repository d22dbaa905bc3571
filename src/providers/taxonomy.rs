// ABOUTME: Error taxonomy mapping raw upstream failures to the stable ProviderError vocabulary
// ABOUTME: Pure and total; every branch is covered by test fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ProviderError;
use crate::models::ProviderKind;

/// Social-pages error codes that mean the grant is gone or insufficient
const SOCIAL_AUTH_CODES: [i64; 3] = [10, 200, 250];
/// Social-pages error subcodes for expired/invalidated sessions
const SOCIAL_AUTH_SUBCODES: [i64; 5] = [458, 459, 460, 463, 467];
/// Social-pages throttling codes (app, user, page and custom rate limits)
const SOCIAL_RATE_CODES: [i64; 4] = [4, 17, 32, 613];

/// An upstream failure before classification: HTTP status plus whatever
/// structured error fields the provider's error body carried.
#[derive(Debug, Clone, Default)]
pub struct RawFailure {
    pub http_status: Option<u16>,
    /// Provider error code (social pages `error.code`)
    pub code: Option<i64>,
    /// Provider error subcode (social pages `error.error_subcode`)
    pub subcode: Option<i64>,
    /// Provider status text (map profile `error.status`, e.g. `UNAUTHENTICATED`)
    pub status_text: Option<String>,
    pub message: String,
}

impl RawFailure {
    /// A transport-level failure with no HTTP response at all
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// An HTTP failure with no parseable error body
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(status),
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Classify a raw upstream failure into the stable error vocabulary.
///
/// Pure and total: never panics, always returns exactly one of the seven
/// kinds. Insufficient-permission responses are deliberately framed as
/// `auth_required` so the user is steered to reauthorize.
#[must_use]
pub fn classify(provider: ProviderKind, raw: &RawFailure) -> ProviderError {
    let kind_error = |err: ProviderError| match raw.http_status {
        Some(status) => err.with_http_status(status),
        None => err,
    };

    if is_auth_failure(provider, raw) {
        return kind_error(ProviderError::auth_required(provider, raw.message.clone()));
    }
    if is_rate_limit(provider, raw) {
        return kind_error(ProviderError::rate_limited(provider, raw.message.clone()));
    }
    match raw.http_status {
        Some(status) if status >= 500 => {
            kind_error(ProviderError::upstream(provider, raw.message.clone()))
        }
        Some(status) if (400..500).contains(&status) => {
            kind_error(ProviderError::validation(provider, raw.message.clone()))
        }
        _ => kind_error(ProviderError::unknown(provider, raw.message.clone())),
    }
}

fn is_auth_failure(provider: ProviderKind, raw: &RawFailure) -> bool {
    if matches!(raw.http_status, Some(401 | 403)) {
        return true;
    }
    match provider {
        ProviderKind::MapProfile => raw
            .status_text
            .as_deref()
            .is_some_and(|s| s == "UNAUTHENTICATED" || s == "PERMISSION_DENIED"),
        ProviderKind::SocialPages => {
            raw.code.is_some_and(|c| SOCIAL_AUTH_CODES.contains(&c))
                || raw.subcode.is_some_and(|s| SOCIAL_AUTH_SUBCODES.contains(&s))
        }
    }
}

fn is_rate_limit(provider: ProviderKind, raw: &RawFailure) -> bool {
    if raw.http_status == Some(429) {
        return true;
    }
    match provider {
        ProviderKind::MapProfile => raw
            .status_text
            .as_deref()
            .is_some_and(|s| s == "RESOURCE_EXHAUSTED"),
        ProviderKind::SocialPages => raw.code.is_some_and(|c| SOCIAL_RATE_CODES.contains(&c)),
    }
}
