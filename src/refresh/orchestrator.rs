use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::error::{RelayError, RelayResult};
use crate::helpers::time::{get_instant, now_i64};
use crate::identity::IdentitySource;
use crate::notify::Notifier;
use crate::observability::metrics::{get_metrics, OUTCOME_ABORTED, OUTCOME_OK, OUTCOME_PARTIAL};
use crate::publish::BatchPublisher;
use crate::refresh::cache::TokenBatchCache;
use crate::refresh::result::{RefreshResult, RefreshStage};
use crate::token::{SignedToken, TokenForger};

type InFlight = watch::Receiver<Option<RefreshResult>>;

/// Runs refresh cycles: load identities, forge, persist, then publish and notify.
///
/// At most one cycle runs at a time. Callers arriving while a cycle is in flight
/// wait for it and get its result instead of starting another one.
pub struct RefreshOrchestrator {
    identities: IdentitySource,
    forger: TokenForger,
    cache: TokenBatchCache,
    publisher: Arc<dyn BatchPublisher>,
    notifier: Arc<dyn Notifier>,
    stage: watch::Sender<RefreshStage>,
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshOrchestrator {
    pub fn new(
        identities: IdentitySource,
        forger: TokenForger,
        cache: TokenBatchCache,
        publisher: Arc<dyn BatchPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (stage, _) = watch::channel(RefreshStage::Idle);
        Self {
            identities,
            forger,
            cache,
            publisher,
            notifier,
            stage,
            in_flight: Mutex::new(None),
        }
    }

    pub fn stage(&self) -> RefreshStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<RefreshStage> {
        self.stage.subscribe()
    }

    pub fn cache(&self) -> &TokenBatchCache {
        &self.cache
    }

    pub fn identities(&self) -> &IdentitySource {
        &self.identities
    }

    pub fn publisher(&self) -> &Arc<dyn BatchPublisher> {
        &self.publisher
    }

    /// Run a cycle, or join the one already running.
    ///
    /// The cycle runs on its own task, so dropping the returned future does not cancel it.
    pub async fn refresh(self: &Arc<Self>) -> RefreshResult {
        let mut rx = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.as_ref() {
                // a closed channel means the cycle task died without reporting
                Some(rx) if rx.has_changed().is_ok() => {
                    get_metrics().await.refresh_coalesced.inc();
                    info!("refresh already in flight, joining it");
                    rx.clone()
                }
                _ => {
                    let (tx, rx) = watch::channel(None);
                    *in_flight = Some(rx.clone());
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        let result = this.run_cycle().await;
                        let mut in_flight = this.in_flight.lock().await;
                        tx.send_replace(Some(result));
                        *in_flight = None;
                    });
                    rx
                }
            }
        };

        let result = match rx.wait_for(Option::is_some).await {
            Ok(result) => (*result).clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| {
            error!("refresh cycle ended without a result");
            RefreshResult::aborted("refresh cycle ended without a result".to_string(), false)
        })
    }

    /// Wait up to `grace` for the in-flight cycle, if any, to finish. Returns `false` on timeout.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let rx = self.in_flight.lock().await.clone();
        let Some(mut rx) = rx else {
            return true;
        };
        // a closed channel also means the cycle is over
        let finished = tokio::time::timeout(grace, rx.wait_for(Option::is_some))
            .await
            .is_ok();
        finished
    }

    async fn run_cycle(&self) -> RefreshResult {
        let metrics = get_metrics().await;
        let start = get_instant();
        info!("refresh cycle start");

        let result = match self.forge_batch().await {
            Ok(batch) => self.propagate(batch).await,
            Err(e) => self.abort(e).await,
        };

        let outcome = if !result.is_success() {
            OUTCOME_ABORTED
        } else if result.is_complete() {
            OUTCOME_OK
        } else {
            OUTCOME_PARTIAL
        };
        metrics.refresh_cycles.with_label_values(&[outcome]).inc();
        metrics
            .refresh_duration
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        metrics.last_refresh_unix.set(now_i64());
        self.stage.send_replace(result.stage);

        info!(
            outcome,
            token_count = result.token_count,
            persisted = result.persisted,
            published = result.published,
            notified = result.notified,
            "refresh cycle finished"
        );
        result
    }

    /// Loading → Forging. All or nothing.
    async fn forge_batch(&self) -> RelayResult<Vec<SignedToken>> {
        self.stage.send_replace(RefreshStage::Loading);
        let identities = self.identities.load().await?;

        self.stage.send_replace(RefreshStage::Forging);
        if identities.is_empty() {
            return Err(RelayError::EmptyBatch);
        }
        self.forger.forge_all(&identities)
    }

    /// Persist locally, then publish and notify side by side.
    async fn propagate(&self, batch: Vec<SignedToken>) -> RefreshResult {
        get_metrics().await.tokens_in_batch.set(batch.len() as i64);

        let (persisted, error) = match self.cache.store(&batch).await {
            Ok(()) => (true, None),
            Err(e) => {
                error!(error = %e, "writing local token cache failed");
                (false, Some(e.to_string()))
            }
        };

        self.stage.send_replace(RefreshStage::Publishing);
        let (published, notified) = tokio::join!(
            self.publisher.publish(&batch),
            self.notifier.notify_batch(&batch)
        );

        RefreshResult::done(batch.len(), persisted, published, notified, error)
    }

    async fn abort(&self, e: RelayError) -> RefreshResult {
        error!(error = %e, "refresh aborted before publishing");
        let notified = self
            .notifier
            .notify_error(&format!("Token refresh failed: {e}"))
            .await;
        RefreshResult::aborted(e.to_string(), notified)
    }
}
