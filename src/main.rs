use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tidebridge::channel::{Broadcaster, ConsumerGateway};
use tidebridge::config::{self, Config};
use tidebridge::db::Database;
use tidebridge::http::{self, AppState};

/// Interval for the expired-code sweep.
const CODE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Interval for rate-limiter bookkeeping.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(%e, "configuration error");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    enforce_secret_strength(&config)?;

    let config = Arc::new(config);
    info!(name = %config.server.name, "Starting tidebridge");

    tidebridge::metrics::init();

    let db = Database::new(&config.database.path)
        .await
        .context("failed to open database")?;

    let broadcaster = Broadcaster::new();
    let state = AppState::new(config.clone(), db.clone(), broadcaster.clone());

    // Background sweep for codes nobody ever tried to redeem.
    {
        let db = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CODE_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match db.link_codes().purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => info!(count = n, "purged expired link codes"),
                    Err(e) => warn!(error = %e, "link code purge failed"),
                }
            }
        });
    }

    {
        let rate_limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                rate_limiter.cleanup();
            }
        });
    }

    let gateway = ConsumerGateway::bind(
        config.server.consumer_listen,
        config.security.consumer_token.clone(),
        broadcaster,
    )
    .await
    .context("failed to bind consumer channel listener")?;
    tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            error!(error = %e, "consumer gateway exited");
        }
    });

    let listener = tokio::net::TcpListener::bind(config.server.http_listen)
        .await
        .context("failed to bind HTTP listener")?;
    info!(address = %listener.local_addr()?, "HTTP API listener bound");

    axum::serve(listener, http::router(state))
        .await
        .context("HTTP server exited")?;

    Ok(())
}

/// Refuse to start with forgeable secrets. `TIDEBRIDGE_ALLOW_INSECURE=1`
/// overrides for local development only.
fn enforce_secret_strength(config: &Config) -> anyhow::Result<()> {
    let allow_insecure = std::env::var("TIDEBRIDGE_ALLOW_INSECURE").as_deref() == Ok("1");

    if config.security.step_up_secret_is_weak() {
        if allow_insecure {
            warn!("running with a weak step_up_secret (TIDEBRIDGE_ALLOW_INSECURE=1)");
        } else {
            anyhow::bail!(
                "security.step_up_secret is missing or weak (need at least 32 random characters); \
                 set TIDEBRIDGE_ALLOW_INSECURE=1 to override for local development"
            );
        }
    }

    if config.security.consumer_token_is_weak() {
        if allow_insecure {
            warn!("running with a weak consumer_token (TIDEBRIDGE_ALLOW_INSECURE=1)");
        } else {
            anyhow::bail!(
                "security.consumer_token is missing or weak (need at least 16 random characters); \
                 set TIDEBRIDGE_ALLOW_INSECURE=1 to override for local development"
            );
        }
    }

    Ok(())
}
