use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_api::config::Config;
use encore_api::events::{EventBroker, EventNotifier};
use encore_api::middleware::{
    CLIENT_HEADER, CLIENT_UNIQUE_ID_HEADER, PLAYER_ID_HEADER, PLAYER_NAME_HEADER, USERNAME_HEADER,
    USER_ID_HEADER,
};
use encore_api::repositories::{
    AnnotationRepository, LibraryRepository, PlayHistoryRepository, PlayQueueRepository,
};
use encore_api::routes::{app_router, AnnotationState, HealthState, ScrobbleState};
use encore_api::services::{
    AnnotationService, EntityResolver, HealthService, PlayHistoryScrobbler,
    QueueContinuationEngine, ScrobbleCoordinator, SimilarityRecommender,
};

/// Headers a browser client may send cross-origin
const ALLOWED_HEADERS: [&str; 6] = [
    USER_ID_HEADER,
    USERNAME_HEADER,
    PLAYER_ID_HEADER,
    PLAYER_NAME_HEADER,
    CLIENT_HEADER,
    CLIENT_UNIQUE_ID_HEADER,
];

/// CORS policy
///
/// Listed origins are always honoured. Without a list, development allows
/// any origin and production allows none.
fn cors_layer(config: &Config) -> CorsLayer {
    let Some(origins) = &config.cors_allowed_origins else {
        if config.is_production() {
            tracing::warn!("CORS_ORIGINS not set, cross-origin requests will be rejected");
            return CorsLayer::new();
        }
        tracing::warn!("CORS_ORIGINS not set, allowing any origin in development");
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        tracing::error!("No usable CORS origin, cross-origin requests will be rejected");
        return CorsLayer::new();
    }

    let mut headers = vec![header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN];
    headers.extend(ALLOWED_HEADERS.map(HeaderName::from_static));

    tracing::info!(?origins, "CORS restricted to configured origins");
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .max_age(Duration::from_secs(3600))
}

async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let db = config.database();
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.connect_timeout_secs))
        .connect(&db.url)
        .await
        .context("failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to apply migrations")?;
    tracing::info!("Database ready");

    Ok(pool)
}

/// Wire repositories, services and route state
async fn build_app(config: &Config, pool: PgPool) -> anyhow::Result<Router> {
    let broker = EventBroker::try_with_redis(
        &config.redis().connection_url(),
        &config.redis().events_channel,
    )
    .await;
    let notifier: Arc<dyn EventNotifier> = Arc::new(broker.clone());

    let library = Arc::new(LibraryRepository::new(pool.clone()));
    let queues = Arc::new(PlayQueueRepository::new(pool.clone()));

    let annotations = AnnotationService::new(
        EntityResolver::new(library.clone()),
        Arc::new(AnnotationRepository::new(pool.clone())),
        notifier.clone(),
    );

    let scrobbler = PlayHistoryScrobbler::new(
        PlayHistoryRepository::new(pool.clone()),
        Duration::from_secs(config.now_playing_ttl_secs),
    );
    let mut coordinator = ScrobbleCoordinator::new(library.clone(), Arc::new(scrobbler));

    if let Some(settings) = config.recommender() {
        let recommender = SimilarityRecommender::new(settings)?;
        let engine =
            QueueContinuationEngine::new(queues, library, Arc::new(recommender), notifier)
                .with_limit(settings.top_k);
        coordinator = coordinator.with_continuation(engine);
        tracing::info!(url = %settings.url, top_k = settings.top_k, "Queue continuation enabled");
    } else {
        tracing::info!("Queue continuation disabled, RECOMMENDER_URL not set");
    }

    let health = HealthService::new(
        pool,
        broker.redis_client(),
        config.recommender().map(|settings| settings.url.clone()),
    );

    Ok(Router::new()
        .route("/", get(|| async { "Encore" }))
        .merge(app_router(
            AnnotationState::new(annotations),
            ScrobbleState::new(coordinator),
            HealthState::new(health),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment(), port = config.port, "Starting Encore API");

    let pool = connect_database(&config).await?;
    let app = build_app(&config, pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}
