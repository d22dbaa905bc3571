// ABOUTME: Credential lifecycle manager: decrypt, proactive refresh and reauth lockout
// ABOUTME: The only component that turns stored blobs back into usable access tokens

// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Credential Lifecycle
//!
//! `CredentialManager::ensure_access_token` is the single gate every outbound
//! provider call goes through. It enforces three rules:
//!
//! 1. An account flagged `reauth_required` yields `auth_required` immediately,
//!    with no outbound traffic.
//! 2. A token expiring within [`REFRESH_THRESHOLD`] is refreshed before use;
//!    tokens without an expiry are used as-is.
//! 3. Any refresh dead end (missing refresh token, undecryptable blob, or a
//!    failed exchange) flags the account and yields `auth_required`, so the
//!    next caller short-circuits at rule 1.

use crate::audit;
use crate::crypto::SecretCodec;
use crate::database::{Database, ProviderAccountData};
use crate::errors::{CoreResult, ProviderError};
use crate::models::{ProviderAccount, ProviderKind};
use crate::providers::AdapterRegistry;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Refresh a token when it expires within this window
pub const REFRESH_THRESHOLD: Duration = Duration::seconds(300);

/// Manages the stored-credential lifecycle for all provider accounts
#[derive(Clone)]
pub struct CredentialManager {
    database: Arc<Database>,
    codec: SecretCodec,
    adapters: AdapterRegistry,
}

impl CredentialManager {
    #[must_use]
    pub fn new(database: Arc<Database>, codec: SecretCodec, adapters: AdapterRegistry) -> Self {
        Self {
            database,
            codec,
            adapters,
        }
    }

    /// Store a freshly authorized connection, encrypting both tokens.
    ///
    /// Reconnecting replaces the previous record and clears any reauth flag.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the database write fails
    pub async fn store_connection(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        access_token: &str,
        refresh_token: Option<&str>,
        scopes: &[String],
        expires_at: Option<chrono::DateTime<Utc>>,
        external_account_id: &str,
        display_name: Option<&str>,
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<()> {
        let encrypted_access = self
            .codec
            .encrypt(access_token)
            .map_err(|e| crate::errors::CoreError::Storage(e.to_string()))?;
        let encrypted_refresh = refresh_token
            .map(|t| self.codec.encrypt(t))
            .transpose()
            .map_err(|e| crate::errors::CoreError::Storage(e.to_string()))?;

        self.database
            .upsert_provider_account(&ProviderAccountData {
                org_id,
                provider,
                access_token: &encrypted_access,
                refresh_token: encrypted_refresh.as_deref(),
                scopes,
                expires_at,
                external_account_id,
                display_name,
            })
            .await?;

        info!(org_id = %org_id, provider = %provider, "provider account connected");
        self.database
            .write_audit_log(
                actor_user_id,
                org_id,
                audit::actions::PROVIDER_CONNECTED,
                "provider_account",
                provider.as_str(),
                &serde_json::json!({ "external_account_id": external_account_id }),
            )
            .await?;

        Ok(())
    }

    /// Remove a connection entirely
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete or audit write fails
    pub async fn disconnect(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        actor_user_id: Option<Uuid>,
    ) -> CoreResult<()> {
        self.database
            .delete_provider_account(org_id, provider)
            .await?;

        info!(org_id = %org_id, provider = %provider, "provider account disconnected");
        self.database
            .write_audit_log(
                actor_user_id,
                org_id,
                audit::actions::PROVIDER_DISCONNECTED,
                "provider_account",
                provider.as_str(),
                &serde_json::json!({}),
            )
            .await?;

        Ok(())
    }

    /// Produce a usable plaintext access token for one (org, provider),
    /// refreshing it first if it is expired or about to expire.
    ///
    /// # Errors
    ///
    /// Always a [`ProviderError`]: `auth_required` when no account exists,
    /// the account is locked out, or refresh hit a dead end; `unknown` for
    /// storage failures.
    pub async fn ensure_access_token(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(String, ProviderAccount), ProviderError> {
        let account = self
            .database
            .get_provider_account(org_id, provider)
            .await
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?
            .ok_or_else(|| ProviderError::auth_required(provider, "not connected"))?;

        if account.reauth_required {
            return Err(ProviderError::auth_required(
                provider,
                account
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "account requires reauthorization".into()),
            ));
        }

        let needs_refresh = account
            .expires_at
            .is_some_and(|expires_at| expires_at - Utc::now() <= REFRESH_THRESHOLD);

        if needs_refresh {
            return self.refresh_and_store(&account).await;
        }

        let token = self.codec.decrypt(&account.access_token).map_err(|e| {
            ProviderError::auth_required(provider, format!("stored token unreadable: {e}"))
        })?;
        Ok((token, account))
    }

    /// Exchange the stored refresh token and persist the result. Every dead
    /// end flags the account before the error escapes.
    async fn refresh_and_store(
        &self,
        account: &ProviderAccount,
    ) -> Result<(String, ProviderAccount), ProviderError> {
        let provider = account.provider;
        let org_id = account.org_id;

        let Some(encrypted_refresh) = account.refresh_token.as_deref() else {
            return Err(self
                .lock_out(org_id, provider, "refresh_token_missing", "token expired and no refresh token is stored")
                .await);
        };

        let refresh_token = match self.codec.decrypt(encrypted_refresh) {
            Ok(token) => token,
            Err(e) => {
                return Err(self
                    .lock_out(
                        org_id,
                        provider,
                        "refresh_token_unreadable",
                        &format!("stored refresh token unreadable: {e}"),
                    )
                    .await);
            }
        };

        let refreshed = match self
            .adapters
            .get(provider)
            .refresh_access_token(&refresh_token)
            .await
        {
            Ok(refreshed) => refreshed,
            Err(e) if e.is_auth_required() => {
                return Err(self
                    .lock_out(org_id, provider, "refresh_failed", &e.message)
                    .await);
            }
            // Transient failures (rate limit, upstream outage) pass through
            // without locking the account out.
            Err(e) => return Err(e),
        };

        let encrypted_access = self
            .codec
            .encrypt(&refreshed.access_token)
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?;
        let encrypted_refresh = refreshed
            .refresh_token
            .as_deref()
            .map(|t| self.codec.encrypt(t))
            .transpose()
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?;

        self.database
            .store_refreshed_tokens(
                org_id,
                provider,
                &encrypted_access,
                encrypted_refresh.as_deref(),
                refreshed.expires_at,
            )
            .await
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?;

        info!(org_id = %org_id, provider = %provider, "access token refreshed");
        self.database
            .write_audit_log(
                None,
                org_id,
                audit::actions::PROVIDER_TOKEN_REFRESHED,
                "provider_account",
                provider.as_str(),
                &serde_json::json!({}),
            )
            .await
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?;

        let account = self
            .database
            .get_provider_account(org_id, provider)
            .await
            .map_err(|e| ProviderError::unknown(provider, e.to_string()))?
            .ok_or_else(|| {
                ProviderError::unknown(provider, "account vanished during refresh")
            })?;

        Ok((refreshed.access_token, account))
    }

    /// Flag the account, audit the lockout and build the error callers get.
    /// Storage failures here degrade to logging; the auth error still wins.
    async fn lock_out(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        reason: &str,
        message: &str,
    ) -> ProviderError {
        warn!(org_id = %org_id, provider = %provider, reason, "locking account pending reauthorization");

        if let Err(e) = self
            .database
            .mark_account_reauth_required(org_id, provider, reason)
            .await
        {
            warn!(org_id = %org_id, provider = %provider, error = %e, "failed to persist reauth flag");
        }
        if let Err(e) = self
            .database
            .write_audit_log(
                None,
                org_id,
                audit::actions::PROVIDER_REAUTH_REQUIRED,
                "provider_account",
                provider.as_str(),
                &serde_json::json!({ "reason": reason }),
            )
            .await
        {
            warn!(org_id = %org_id, provider = %provider, error = %e, "failed to write audit entry");
        }

        ProviderError::auth_required(provider, message)
    }
}
