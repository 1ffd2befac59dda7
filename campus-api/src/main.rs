use std::net::SocketAddr;
use std::sync::Arc;

use campus_api::{app, auth::JwtIdentityProvider, metrics::Metrics, worker, AppState, Services};
use campus_shared::SystemClock;
use campus_store::{Config, RedisClient, Stores};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_api=debug,campus_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        "Starting campus ordering API on port {} ({:?} storage)",
        config.server.port,
        config.storage.backend
    );

    let stores = Stores::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open store: {}", e))?;

    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).await?)),
        None => {
            tracing::warn!("Redis not configured; rate limiting and the sweeper lease are disabled");
            None
        }
    };

    let services = Services::new(&stores, &config.business_rules, Arc::new(SystemClock))?;

    let state = AppState {
        services: Arc::new(services),
        identity: Arc::new(JwtIdentityProvider::new(&config.auth.jwt_secret)),
        metrics: Arc::new(Metrics::new()?),
        redis,
        rate_limit_per_minute: config.redis.rate_limit_per_minute,
    };

    tokio::spawn(worker::start_confirmation_sweeper(
        state.clone(),
        config.business_rules.sweep_interval(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
