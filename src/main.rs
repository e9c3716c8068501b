//! Pulse Feed Engine
//!
//! Feed ranking and interaction tracking service for the Pulse social
//! platform.
//!
//! # Architecture
//!
//! - **Ranking Engine**: Personalized feed ordering with diversification
//! - **Feed Warmer**: Background refresh of cached feeds for active users
//! - **API Server**: REST endpoints for frontend consumption
//!
//! # Graceful Shutdown
//!
//! The engine handles SIGTERM and SIGINT signals, ensuring:
//! - In-flight requests complete
//! - Kafka messages are flushed
//! - Database connections are closed cleanly

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulsefeed::api;
use pulsefeed::config::Config;
use pulsefeed::database::{self, Database};
use pulsefeed::error::Result;
use pulsefeed::kafka::KafkaProducer;
use pulsefeed::ranking::{engine::RankingEngine, updater};

/// Application state shared across components
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub kafka: KafkaProducer,
    pub shutdown: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with structured logging
    init_tracing();

    info!("═══════════════════════════════════════════════════════════════");
    info!("  🚀 Pulse Feed Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════════════════════════");
    info!("  Components:");
    info!("    • Ranking Engine");
    info!("    • Feed Warmer");
    info!("    • REST API Server");
    info!("═══════════════════════════════════════════════════════════════");

    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);
    info!("✅ Configuration loaded and validated");

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Initialize Kafka producer
    let kafka_producer = KafkaProducer::new(&config.kafka)?;
    info!("✅ Kafka producer initialized");

    // Initialize database connection pool
    let db = Database::new(&config.database).await?;
    info!("✅ Database connection pool established");

    // Run migrations
    info!("📦 Running database migrations...");
    database::run_migrations(db.pool()).await?;
    info!("✅ Database migrations applied");

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        kafka: kafka_producer.clone(),
        shutdown: shutdown_tx.clone(),
    });

    // Spawn all services
    let mut handles = Vec::new();

    // Spawn feed warmer
    info!("📊 Starting feed warmer...");
    handles.push(spawn_feed_warmer(state.clone()));

    // Spawn API server
    info!("🌐 Starting API server on port {}...", config.api.port);
    handles.push(spawn_api_server(state.clone()));

    info!("═══════════════════════════════════════════════════════════════");
    info!("  ✅ All services started successfully");
    info!("  📡 API: http://{}:{}", config.api.host, config.api.port);
    info!(
        "  🔗 Health: http://{}:{}/health",
        config.api.host, config.api.port
    );
    info!("═══════════════════════════════════════════════════════════════");

    // Wait for shutdown signal or service failure
    tokio::select! {
        _ = shutdown_signal() => {
            info!("📴 Shutdown signal received");
        }
        _ = wait_for_any_failure(&mut handles) => {
            warn!("⚠️ A service failed, initiating shutdown");
        }
    }

    // Graceful shutdown
    info!("🛑 Initiating graceful shutdown...");

    // Signal all services to stop
    let _ = shutdown_tx.send(());

    // Wait for services to finish with timeout
    let shutdown_timeout = Duration::from_secs(30);
    if tokio::time::timeout(shutdown_timeout, shutdown_services(handles))
        .await
        .is_err()
    {
        warn!("⚠️ Shutdown timeout exceeded, forcing exit");
    }

    // Cleanup resources
    let producer_stats = kafka_producer.stats();
    info!(
        "Kafka producer: {} sent, {} failed",
        producer_stats.messages_sent, producer_stats.messages_failed
    );
    kafka_producer.flush(Duration::from_secs(5));
    db.close().await;

    info!("👋 Pulse Feed Engine stopped gracefully");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels
        EnvFilter::new("pulsefeed_engine=debug,pulsefeed=debug,tower_http=debug,sqlx=warn,rdkafka=warn,info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .init();
}

/// Spawn the background feed warmer
fn spawn_feed_warmer(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = state.shutdown.subscribe();

    tokio::spawn(async move {
        let warm_interval = state.config.ranking.warm_interval;
        let mut interval = tokio::time::interval(warm_interval);

        let engine = RankingEngine::new(state.db.pool().clone(), state.config.ranking.clone());

        // Skip first tick (runs immediately otherwise)
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    info!("📊 Running scheduled feed warming...");

                    if let Err(e) = updater::warm_active_feeds(state.db.pool(), &engine).await {
                        error!("Failed to warm feeds: {:?}", e);
                    }

                    info!("✅ Feed warming completed");
                }
                _ = shutdown_rx.recv() => {
                    info!("Feed warmer shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn the API server
fn spawn_api_server(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let db = state.db.clone();
    let kafka = state.kafka.clone();
    let config = state.config.clone();
    let mut shutdown_rx = state.shutdown.subscribe();

    tokio::spawn(async move {
        tokio::select! {
            result = api::start_server(db, kafka, &config) => {
                if let Err(e) = result {
                    error!("API server error: {:?}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("API server shutting down");
            }
        }
    })
}

/// Wait for any task to fail
async fn wait_for_any_failure(handles: &mut [tokio::task::JoinHandle<()>]) {
    loop {
        for handle in handles.iter_mut() {
            if handle.is_finished() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for all services to complete shutdown
async fn shutdown_services(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
