//! HTTP API Server for the Feed Engine
//!
//! Provides REST endpoints for the frontend to fetch ranked feeds and report
//! interactions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::kafka::KafkaProducer;
use crate::ranking::{
    history::{self, NewInteraction},
    InteractionKind, RankingEngine, ScoredPost,
};

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub engine: RankingEngine,
    pub kafka: KafkaProducer,
    pub interactions_topic: String,
}

/// Query params for feed endpoints
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Response for feed endpoints
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<ScoredPost>,
    pub total: usize,
    pub has_more: bool,
}

/// Request body for recording interactions
#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub interaction_kind: String,
    pub duration_secs: Option<i64>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
    pub kafka: bool,
}

/// Start the API server
pub async fn start_server(db: Database, kafka: KafkaProducer, config: &Config) -> Result<()> {
    let engine = RankingEngine::new(db.pool().clone(), config.ranking.clone());

    let state = Arc::new(AppState {
        db,
        engine,
        kafka,
        interactions_topic: config.kafka.topics.interactions.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Feed endpoints
        .route("/api/v1/feed/:user_id", get(get_ranked_feed))
        .route("/api/v1/trending", get(get_trending_feed))
        // Interaction tracking
        .route("/api/v1/interactions", post(record_user_interaction))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    info!("Starting feed API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(Error::internal)?;
    axum::serve(listener, app).await.map_err(Error::internal)?;

    Ok(())
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.db.health_check().await.is_ok();
    let kafka = state.kafka.is_healthy();

    let status = if database && kafka {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        kafka,
    })
}

/// Get the personalized ranked feed for a user
async fn get_ranked_feed(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let items = state
        .engine
        .ranked_feed(user_id, query.limit, query.offset)
        .await?;

    let total = items.len();
    let has_more = total == query.limit;
    Ok(Json(FeedResponse {
        items,
        total,
        has_more,
    }))
}

/// Get the anonymous trending feed
async fn get_trending_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let items = state.engine.trending_feed(query.limit, query.offset).await?;

    let total = items.len();
    let has_more = total == query.limit;
    Ok(Json(FeedResponse {
        items,
        total,
        has_more,
    }))
}

/// Record a user interaction.
///
/// The write is fire-and-forget: the request is acknowledged as soon as the
/// kind validates, and storage or publish failures are logged without ever
/// reaching the caller.
async fn record_user_interaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractionRequest>,
) -> Result<StatusCode> {
    let kind: InteractionKind = req.interaction_kind.parse()?;

    let event = NewInteraction {
        user_id: req.user_id,
        post_id: req.post_id,
        kind,
        duration_secs: req.duration_secs,
    };

    let pool = state.db.pool().clone();
    let producer = state.kafka.clone();
    let topic = state.interactions_topic.clone();
    tokio::spawn(async move {
        history::track_interaction(&pool, &producer, &topic, event).await;
    });

    Ok(StatusCode::ACCEPTED)
}
