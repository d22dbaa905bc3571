// ABOUTME: Shared test utilities: in-memory database, codec and scripted provider adapters
// ABOUTME: ScriptedAdapter replaces HTTP adapters through the registry, no network in tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presence_core::credentials::CredentialManager;
use presence_core::crypto::{generate_key, SecretCodec};
use presence_core::database::Database;
use presence_core::errors::ProviderError;
use presence_core::models::{ProviderKind, PublishChannel};
use presence_core::providers::{
    AdapterRegistry, ProviderAdapter, PublishRequest, RefreshedToken, RemoteResource, RemoteReview,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Arc<Database>> {
    init_test_logging();
    Ok(Arc::new(Database::new("sqlite::memory:").await?))
}

pub fn test_codec() -> SecretCodec {
    SecretCodec::new(generate_key())
}

/// A provider adapter driven entirely by pre-scripted results.
///
/// Unscripted calls succeed with empty/default values, so tests only
/// script the interactions they care about. Every call is recorded.
pub struct ScriptedAdapter {
    provider: ProviderKind,
    pub list_reviews_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub reply_calls: AtomicUsize,
    /// (channel, resource id) per publish invocation, in order
    pub publish_calls: Mutex<Vec<(PublishChannel, String)>>,
    reviews: Mutex<HashMap<String, Result<Vec<RemoteReview>, ProviderError>>>,
    publish: Mutex<HashMap<PublishChannel, Result<String, ProviderError>>>,
    refresh: Mutex<Option<Result<RefreshedToken, ProviderError>>>,
}

impl ScriptedAdapter {
    pub fn new(provider: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            provider,
            list_reviews_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reply_calls: AtomicUsize::new(0),
            publish_calls: Mutex::new(Vec::new()),
            reviews: Mutex::new(HashMap::new()),
            publish: Mutex::new(HashMap::new()),
            refresh: Mutex::new(None),
        })
    }

    pub fn script_reviews(&self, resource_id: &str, result: Result<Vec<RemoteReview>, ProviderError>) {
        self.reviews
            .lock()
            .unwrap()
            .insert(resource_id.to_string(), result);
    }

    pub fn script_publish(&self, channel: PublishChannel, result: Result<String, ProviderError>) {
        self.publish.lock().unwrap().insert(channel, result);
    }

    pub fn script_refresh(&self, result: Result<RefreshedToken, ProviderError>) {
        *self.refresh.lock().unwrap() = Some(result);
    }

    pub fn publish_count(&self, channel: PublishChannel) -> usize {
        self.publish_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .count()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn list_resources(
        &self,
        _access_token: &str,
    ) -> Result<Vec<RemoteResource>, ProviderError> {
        Ok(Vec::new())
    }

    async fn list_reviews(
        &self,
        _access_token: &str,
        resource_id: &str,
    ) -> Result<Vec<RemoteReview>, ProviderError> {
        self.list_reviews_calls.fetch_add(1, Ordering::SeqCst);
        self.reviews
            .lock()
            .unwrap()
            .get(resource_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn reply_to_review(
        &self,
        _access_token: &str,
        _resource_id: &str,
        _review_id: &str,
        _body: &str,
    ) -> Result<(), ProviderError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish_post(
        &self,
        _access_token: &str,
        request: &PublishRequest,
    ) -> Result<String, ProviderError> {
        self.publish_calls
            .lock()
            .unwrap()
            .push((request.channel, request.resource_id.clone()));
        self.publish
            .lock()
            .unwrap()
            .get(&request.channel)
            .cloned()
            .unwrap_or_else(|| Ok(format!("ext-{}", request.resource_id)))
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<RefreshedToken, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh.lock().unwrap().clone().unwrap_or_else(|| {
            Ok(RefreshedToken {
                access_token: "scripted-refreshed-token".into(),
                refresh_token: None,
                expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
                scopes: Vec::new(),
            })
        })
    }
}

/// One scripted adapter per provider, wired into a registry
pub fn scripted_registry() -> (AdapterRegistry, Arc<ScriptedAdapter>, Arc<ScriptedAdapter>) {
    let map_profile = ScriptedAdapter::new(ProviderKind::MapProfile);
    let social_pages = ScriptedAdapter::new(ProviderKind::SocialPages);
    let registry = AdapterRegistry::new(
        Arc::clone(&map_profile) as Arc<dyn ProviderAdapter>,
        Arc::clone(&social_pages) as Arc<dyn ProviderAdapter>,
    );
    (registry, map_profile, social_pages)
}

/// Database + codec + scripted adapters + credential manager in one bundle
pub struct TestHarness {
    pub database: Arc<Database>,
    pub codec: SecretCodec,
    pub registry: AdapterRegistry,
    pub map_profile: Arc<ScriptedAdapter>,
    pub social_pages: Arc<ScriptedAdapter>,
    pub credentials: CredentialManager,
}

pub async fn create_test_harness() -> Result<TestHarness> {
    let database = create_test_database().await?;
    let codec = test_codec();
    let (registry, map_profile, social_pages) = scripted_registry();
    let credentials = CredentialManager::new(
        Arc::clone(&database),
        codec.clone(),
        registry.clone(),
    );
    Ok(TestHarness {
        database,
        codec,
        registry,
        map_profile,
        social_pages,
        credentials,
    })
}

impl TestHarness {
    /// Connect a provider account with sensible defaults
    pub async fn connect_account(
        &self,
        org_id: Uuid,
        provider: ProviderKind,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.credentials
            .store_connection(
                org_id,
                provider,
                access_token,
                refresh_token,
                &["manage".to_string()],
                expires_at,
                "acct-1",
                Some("Test Account"),
                None,
            )
            .await?;
        Ok(())
    }

    pub fn review_sync(&self, provider: ProviderKind) -> presence_core::jobs::ReviewSync {
        presence_core::jobs::ReviewSync::new(
            Arc::clone(&self.database),
            self.credentials.clone(),
            self.registry.clone(),
            provider,
        )
    }

    pub fn publisher(&self) -> presence_core::jobs::PublishCoordinator {
        presence_core::jobs::PublishCoordinator::new(
            Arc::clone(&self.database),
            self.credentials.clone(),
            self.registry.clone(),
        )
    }

    pub fn dispatcher(&self, provider: ProviderKind) -> presence_core::jobs::ScheduleDispatcher {
        presence_core::jobs::ScheduleDispatcher::new(
            Arc::clone(&self.database),
            self.review_sync(provider),
            provider,
        )
    }
}

/// A review fixture with the given external id
pub fn remote_review(external_id: &str, rating: i64) -> RemoteReview {
    RemoteReview {
        external_id: external_id.to_string(),
        rating: Some(rating),
        author: Some("Sam".to_string()),
        body: Some("Great spot".to_string()),
        created_at: Some(Utc::now()),
        has_reply: false,
    }
}
