use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use reqwest::Client;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use token_relay::config::proc_loader;
use token_relay::control::ControlSurface;
use token_relay::identity::IdentitySource;
use token_relay::notify::discord::DiscordWebhook;
use token_relay::publish::github::GitHubContentsPublisher;
use token_relay::refresh::{RefreshOrchestrator, TokenBatchCache};
use token_relay::scheduler::Scheduler;
use token_relay::server;
use token_relay::token::TokenForger;
use token_relay::utils::logging::LogLevel;
use token_relay::utils::{config_loader, logging, shutdown};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-relay.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Read args, load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let mut service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);
    proc_loader::resolve_secret(&mut service_config);

    // -------------------------------
    // 2. Shared request client
    // -------------------------------

    let client = Client::new();

    // -------------------------------
    // 3. Refresh pipeline: identities → forger → cache → store + webhook
    // -------------------------------

    let identities = IdentitySource::from_config(&service_config.identities, &client);
    info!(tiers = ?identities.tiers(), "identity tiers configured");

    let forger = TokenForger::from_config(&service_config.signing);
    let cache = TokenBatchCache::new(&service_config.tokens.cache_path);
    let publisher = GitHubContentsPublisher::new(client.clone(), service_config.store.clone());
    let notifier = DiscordWebhook::new(
        client.clone(),
        &service_config.notify,
        service_config.scheduler.cadence_description(),
    );

    let orchestrator = Arc::new(RefreshOrchestrator::new(
        identities,
        forger,
        cache,
        Arc::new(publisher),
        Arc::new(notifier),
    ));

    // -------------------------------
    // 4. Scheduler
    // -------------------------------

    let scheduler = Arc::new(
        Scheduler::from_config(orchestrator.clone(), &service_config.scheduler)
            .map_err(|e| anyhow!("invalid cadence: {}", e))?,
    );
    scheduler.start();

    // -------------------------------
    // 5. HTTP control API + metrics, until SIGINT/SIGTERM
    // -------------------------------

    let control = Arc::new(ControlSurface::new(orchestrator.clone(), scheduler.clone()));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let http_server = server::server::start(&service_config.settings, control, async move {
        let _ = stop_rx.await;
    });

    info!("Service starting...");
    let signals = async {
        let outcome = shutdown::wait_for_signal().await;
        let _ = stop_tx.send(());
        outcome
    };
    let result = tokio::try_join!(http_server, signals);

    // -------------------------------
    // 6. Stop firing, let a running cycle finish publishing
    // -------------------------------

    scheduler.stop();
    if !orchestrator.wait_idle(SHUTDOWN_GRACE).await {
        warn!("refresh cycle still running after {:?}, exiting anyway", SHUTDOWN_GRACE);
    }
    if let Err(e) = &result {
        error!("service stopped with error: {}", e);
    }
    result.map(|_| ())
}
