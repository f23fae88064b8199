// tests/common/mod.rs
pub use axum::{body::Body, Router};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{RelayError, RelayResult};
use crate::identity::{GuestIdentity, IdentityProvider, IdentitySource};
use crate::notify::Notifier;
use crate::publish::BatchPublisher;
use crate::refresh::{RefreshOrchestrator, TokenBatchCache};
use crate::token::{SignedToken, TokenForger};

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_VALIDITY_SECONDS: u64 = 14_400;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// An address nothing listens on.
pub async fn closed_port_url(path: &str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, path)
}

pub fn identities(ids: &[&str]) -> Vec<GuestIdentity> {
    ids.iter().map(|id| GuestIdentity::new(*id, format!("pw-{id}"))).collect()
}

pub fn write_identity_file(path: &Path, batch: &[GuestIdentity]) {
    std::fs::write(path, serde_json::to_string(batch).unwrap()).unwrap();
}

pub fn test_forger() -> TokenForger {
    TokenForger::new(TEST_SECRET, "1", TEST_VALIDITY_SECONDS)
}

// -------------------------------
// Identity tiers
// -------------------------------

/// Fixed answer, counts calls, optionally slow.
pub struct StaticProvider {
    tier: &'static str,
    answer: RelayResult<Vec<GuestIdentity>>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn ok(tier: &'static str, batch: Vec<GuestIdentity>) -> Self {
        Self { tier, answer: Ok(batch), delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    pub fn failing(tier: &'static str) -> Self {
        Self {
            tier,
            answer: Err(RelayError::SourceUnavailable(format!("{tier} is down"))),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    fn tier(&self) -> &str {
        self.tier
    }

    async fn load(&self) -> RelayResult<Vec<GuestIdentity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

// -------------------------------
// Downstream fakes
// -------------------------------

pub struct RecordingPublisher {
    succeed: bool,
    pub batches: Mutex<Vec<Vec<SignedToken>>>,
}

impl RecordingPublisher {
    pub fn new(succeed: bool) -> Self {
        Self { succeed, batches: Mutex::new(Vec::new()) }
    }

    pub fn published(&self) -> Vec<Vec<SignedToken>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchPublisher for RecordingPublisher {
    async fn publish(&self, batch: &[SignedToken]) -> bool {
        self.batches.lock().unwrap().push(batch.to_vec());
        self.succeed
    }

    async fn current(&self) -> RelayResult<Option<Vec<SignedToken>>> {
        if !self.succeed {
            return Err(RelayError::PublishUnreachable("store is down".to_string()));
        }
        Ok(self.batches.lock().unwrap().last().cloned())
    }
}

pub struct RecordingNotifier {
    succeed: bool,
    pub batches: Mutex<Vec<usize>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self { succeed, batches: Mutex::new(Vec::new()), errors: Mutex::new(Vec::new()) }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_batch(&self, batch: &[SignedToken]) -> bool {
        self.batches.lock().unwrap().push(batch.len());
        self.succeed
    }

    async fn notify_error(&self, message: &str) -> bool {
        self.errors.lock().unwrap().push(message.to_string());
        self.succeed
    }
}

/// Orchestrator wired to the given tiers and fakes, caching under `cache_path`.
pub fn orchestrator(
    providers: Vec<Arc<dyn IdentityProvider>>,
    cache_path: &Path,
    publisher: Arc<RecordingPublisher>,
    notifier: Arc<RecordingNotifier>,
) -> Arc<RefreshOrchestrator> {
    Arc::new(RefreshOrchestrator::new(
        IdentitySource::new(providers),
        test_forger(),
        TokenBatchCache::new(cache_path),
        publisher,
        notifier,
    ))
}
