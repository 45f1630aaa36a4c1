//! Subscription Core server.
//!
//! Loads configuration, picks adapters, starts the policy sweeps and serves
//! the HTTP API until SIGINT or SIGTERM.

use std::error::Error;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use subscription_core::adapters::http::{app_router, SubscriptionAppState};
use subscription_core::adapters::memory::{
    InMemoryAccessTokens, InMemoryProcessedEventLog, InMemorySubscriptionStore,
};
use subscription_core::adapters::notifications::{HttpNotifier, LogNotifier};
use subscription_core::adapters::postgres::{
    self, PostgresAccessTokens, PostgresProcessedEventLog, PostgresSubscriptionStore,
};
use subscription_core::adapters::stripe::{
    MockPaymentProvider, StripeConfig, StripePaymentAdapter,
};
use subscription_core::application::{LifecycleService, PolicySweepScheduler, SideEffectDispatcher};
use subscription_core::config::AppConfig;
use subscription_core::domain::subscription::WebhookVerifier;
use subscription_core::ports::{
    AccessTokenService, Notifier, PaymentProvider, ProcessedEventLog, SubscriptionStore,
};

type BoxError = Box<dyn Error + Send + Sync>;

struct Persistence {
    store: Arc<dyn SubscriptionStore>,
    event_log: Arc<dyn ProcessedEventLog>,
    access_tokens: Arc<dyn AccessTokenService>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = config.server.environment.as_str(),
        "Starting subscription-core"
    );

    let persistence = persistence(&config).await?;
    let payment_provider = payment_provider(&config)?;
    let notifier = notifier(&config)?;

    let dispatcher = Arc::new(SideEffectDispatcher::new(
        persistence.access_tokens.clone(),
        notifier.clone(),
        payment_provider,
        config.payment.callback_timeout(),
    ));
    let lifecycle = Arc::new(LifecycleService::new(
        persistence.store.clone(),
        dispatcher,
        config.lifecycle.max_cas_attempts,
    ));

    let verifier = Arc::new(WebhookVerifier::new(config.payment.webhook_secret.clone()));
    if !verifier.is_enforcing() {
        tracing::warn!("No webhook signing secret configured; provider events are NOT verified");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(PolicySweepScheduler::new(
        lifecycle.clone(),
        notifier,
        persistence.event_log.clone(),
        config.lifecycle.clone(),
    ));
    let sweeps = scheduler.spawn(shutdown_rx);

    let state = SubscriptionAppState {
        lifecycle,
        verifier,
        event_log: persistence.event_log,
        trial_days: config.lifecycle.trial_days,
    };
    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped; stopping sweeps");
    // Receivers may already be gone if every sweep exited.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.server.shutdown_grace(), join_all(sweeps)).await {
        Ok(results) => {
            for error in results.into_iter().filter_map(Result::err) {
                tracing::error!(error = %error, "Sweep task panicked");
            }
        }
        Err(_) => tracing::warn!(
            grace_secs = config.server.shutdown_grace_secs,
            "Sweeps still running after shutdown grace period"
        ),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.server.json_logs() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }
}

async fn persistence(config: &AppConfig) -> Result<Persistence, BoxError> {
    if !config.database.is_configured() {
        tracing::warn!("No database configured; using in-memory storage");
        return Ok(Persistence {
            store: Arc::new(InMemorySubscriptionStore::new()),
            event_log: Arc::new(InMemoryProcessedEventLog::new()),
            access_tokens: Arc::new(InMemoryAccessTokens::new()),
        });
    }

    let pool = postgres::create_pool(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(Persistence {
        store: Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        event_log: Arc::new(PostgresProcessedEventLog::new(pool.clone())),
        access_tokens: Arc::new(PostgresAccessTokens::new(pool)),
    })
}

fn payment_provider(config: &AppConfig) -> Result<Arc<dyn PaymentProvider>, BoxError> {
    match &config.payment.api_key {
        Some(key) => {
            let stripe = StripeConfig::new(key.clone())
                .with_base_url(config.payment.api_base_url.clone())
                .with_timeout(config.payment.callback_timeout());
            if config.payment.is_test_mode() {
                tracing::info!("Payment provider in test mode");
            }
            Ok(Arc::new(StripePaymentAdapter::new(stripe)?))
        }
        None => {
            tracing::warn!("No payment API key configured; provider callbacks are recorded only");
            Ok(Arc::new(MockPaymentProvider::new()))
        }
    }
}

fn notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, BoxError> {
    match &config.notifications.base_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, "Using HTTP notification service");
            Ok(Arc::new(HttpNotifier::new(
                base_url,
                config.notifications.api_key.clone(),
                config.notifications.timeout(),
            )?))
        }
        None => {
            tracing::info!("No notification service configured; notifications are logged");
            Ok(Arc::new(LogNotifier::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
