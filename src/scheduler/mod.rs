//! Cron-driven refresh trigger.
//!
//! Evaluates the cadence expression in UTC, sleeps until the next fire time and
//! calls the orchestrator. Manual refreshes go through the same orchestrator path.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::service::SchedulerConfig;
use crate::refresh::{RefreshOrchestrator, RefreshResult};

/// Parse a cron cadence. Classic 5-field expressions get a leading `0` seconds field.
pub fn parse_cadence(expression: &str) -> Result<Schedule, cron::error::Error> {
    let expression = expression.trim();
    if expression.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expression}"))
    } else {
        Schedule::from_str(expression)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub running: bool,
    pub cadence: String,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub last_result: Option<RefreshResult>,
}

pub struct Scheduler {
    orchestrator: Arc<RefreshOrchestrator>,
    schedule: Schedule,
    cadence: String,
    run_on_start: bool,
    state: watch::Sender<SchedulerState>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<RefreshOrchestrator>,
        cadence: &str,
        run_on_start: bool,
    ) -> Result<Self, cron::error::Error> {
        let schedule = parse_cadence(cadence)?;
        let (state, _) = watch::channel(SchedulerState {
            running: false,
            cadence: cadence.to_owned(),
            next_fire_time: None,
            last_result: None,
        });
        Ok(Self {
            orchestrator,
            schedule,
            cadence: cadence.to_owned(),
            run_on_start,
            state,
            shutdown: Mutex::new(None),
        })
    }

    pub fn from_config(
        orchestrator: Arc<RefreshOrchestrator>,
        cfg: &SchedulerConfig,
    ) -> Result<Self, cron::error::Error> {
        Self::new(orchestrator, &cfg.cadence, cfg.run_on_start)
    }

    /// Begin periodic triggering. Also fires one refresh right away unless disabled.
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut shutdown) = self.shutdown.lock() else {
            warn!("scheduler lock poisoned, not starting");
            return;
        };
        if shutdown.is_some() {
            warn!("scheduler is already running");
            return;
        }
        let (tx, rx) = watch::channel(false);
        *shutdown = Some(tx);

        let next = self.next_fire_time();
        self.state.send_modify(|state| {
            state.running = true;
            state.next_fire_time = next;
        });
        info!("token refresh scheduler started with cadence '{}'", self.cadence);

        tokio::spawn(Arc::clone(self).run_loop(rx));
        if self.run_on_start {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.run_refresh("startup").await;
            });
        }
    }

    /// Cancel future firing. An in-flight refresh still completes and is recorded.
    pub fn stop(&self) {
        let sender = self.shutdown.lock().ok().and_then(|mut shutdown| shutdown.take());
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
        self.state.send_modify(|state| {
            state.running = false;
            state.next_fire_time = None;
        });
        info!("token refresh scheduler stopped");
    }

    /// On-demand refresh through the orchestrator's single-flight path.
    pub async fn force_refresh(&self) -> RefreshResult {
        info!("force refresh requested");
        self.run_refresh("manual").await
    }

    /// Snapshot of the scheduler state. Never waits on a running cycle.
    pub fn status(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    async fn run_refresh(&self, trigger: &str) -> RefreshResult {
        info!(trigger, "starting token refresh");
        let result = self.orchestrator.refresh().await;
        self.state.send_modify(|state| state.last_result = Some(result.clone()));
        result
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let Some(next) = self.next_fire_time() else {
                warn!("cadence '{}' has no upcoming fire time, scheduler loop ends", self.cadence);
                break;
            };
            // stop() may have run since the check above
            self.state.send_modify(|state| {
                if state.running {
                    state.next_fire_time = Some(next);
                }
            });
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.run_refresh("scheduled").await;
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }
        info!("scheduler loop exited");
    }
}
