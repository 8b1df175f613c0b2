//! depot server binary.

use clap::Parser;
use depot_core::AppConfig;
use depot_metadata::MetadataStore;
use depot_server::{AppState, create_router, metrics};
use depot_storage::ArtifactStore;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "depot-server", version, about = "Artifact repository manager")]
struct Args {
    /// Path to the configuration file.
    #[arg(
        short,
        long,
        env = "DEPOT_CONFIG",
        default_value = "config/depot.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("DEPOT_LOG").unwrap_or_else(|_| "info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    if !args.config.exists() {
        warn!(
            "configuration file {} not found; using defaults and DEPOT_* environment overrides",
            args.config.display()
        );
    }
    let config: AppConfig = Figment::new()
        .merge(Toml::file(&args.config))
        .merge(Env::prefixed("DEPOT_").split("__"))
        .extract()?;

    metrics::register_metrics();

    let store = depot_storage::open(&config.storage.root).await?;
    store.health_check().await?;
    let records = depot_metadata::open(&config.ledger.path).await?;
    records.health_check().await?;

    let bind = config.server.bind.clone();
    let state = AppState::new(config, store, records)?;
    info!(
        storages = state.config.storages.len(),
        repositories = state.index.len(),
        "repository index built"
    );

    spawn_liveness_refresh(state.clone());
    if state.config.cleanup.enabled {
        spawn_cleanup_schedule(state.clone());
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("depot server listening on {bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Probe every proxy remote on a fixed interval so resolution and cleanup
/// see fresh verdicts instead of probing on the request path.
fn spawn_liveness_refresh(state: AppState) {
    tokio::spawn(async move {
        let interval = state.config.liveness.refresh_interval();
        let probe_timeout = state.config.liveness.probe_timeout();
        let resolver_state = state.resolver.state();
        loop {
            tokio::time::sleep(interval).await;
            let mut down = 0i64;
            for (key, repository) in state.index.proxy_repositories() {
                let Some(remote) = repository.remote.as_ref() else {
                    continue;
                };
                let Ok(client) = resolver_state.transport(key) else {
                    continue;
                };
                let alive = state
                    .liveness
                    .probe(client.as_ref(), &remote.url, probe_timeout)
                    .await;
                if !alive {
                    down += 1;
                    warn!(repository = %key, remote = %remote.url, "remote failed liveness probe");
                }
            }
            metrics::REMOTES_DOWN.set(down);
        }
    });
}

/// Scheduled eviction of expired proxied content.
fn spawn_cleanup_schedule(state: AppState) {
    tokio::spawn(async move {
        let interval = state.config.cleanup.interval();
        loop {
            tokio::time::sleep(interval).await;
            let timer = metrics::CLEANUP_SWEEP_DURATION.start_timer();
            match state
                .cleaner
                .cleanup(
                    state.config.cleanup.min_days_unused,
                    state.config.cleanup.min_size_bytes,
                )
                .await
            {
                Ok(stats) => {
                    metrics::CLEANUP_DELETED.inc_by(stats.deleted);
                    metrics::CLEANUP_FAILURES.inc_by(stats.failed);
                    info!(
                        examined = stats.examined,
                        deleted = stats.deleted,
                        failed = stats.failed,
                        skipped_repositories = stats.skipped_repositories,
                        "scheduled cleanup sweep finished"
                    );
                }
                Err(e) => error!("scheduled cleanup sweep failed: {e}"),
            }
            timer.observe_duration();
        }
    });
}
