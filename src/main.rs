//! Newswire - post-commit notification engine for a news publishing backend
//!
//! The binary prepares the shared state (database, cache, mailer, event
//! bus) and hosts the retention sweep loop. The write-side operations
//! (`AccountService`, `PublishingService`) are the library's embedding
//! surface: the owning application constructs them against this same bus
//! and dispatches through it during its own writes.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newswire::{
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxActivationTokenRepository, SqlxAuthorRepository, SqlxGroupRepository,
            SqlxPostRepository, SqlxSubscriptionRepository, SqlxUserRepository,
        },
    },
    events::{build_bus, Notifier},
    services::{RetentionService, SmtpMailer},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newswire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Newswire notification engine...");

    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;
    tracing::info!("Configuration loaded from {}", config_path);

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized: {:?}", config.cache.driver);

    // Wire the notifier and event bus
    let mailer = Arc::new(SmtpMailer::new(
        config.email.clone(),
        config.site.name.clone(),
        SqlxGroupRepository::boxed(pool.clone()),
    ));
    let notifier = Arc::new(Notifier::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxAuthorRepository::boxed(pool.clone()),
        SqlxActivationTokenRepository::boxed(pool.clone()),
        SqlxPostRepository::boxed(pool.clone()),
        SqlxSubscriptionRepository::boxed(pool.clone()),
        SqlxGroupRepository::boxed(pool.clone()),
        cache,
        mailer,
        config.site.clone(),
    ));
    let bus = Arc::new(build_bus(notifier));
    tracing::info!(
        "Event bus ready ({} handler binding(s))",
        bus.handler_count()
    );

    // Retention sweep loop
    let retention = RetentionService::new(
        SqlxActivationTokenRepository::boxed(pool.clone()),
        config.retention.token_days,
    );
    let sweep_interval =
        std::time::Duration::from_secs(config.retention.sweep_interval_hours * 3600);
    tracing::info!(
        "Token retention: {} day(s), sweeping every {} hour(s)",
        config.retention.token_days,
        config.retention.sweep_interval_hours
    );

    let mut interval = tokio::time::interval(sweep_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                retention.run_sweep().await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping");
                break;
            }
        }
    }

    Ok(())
}
