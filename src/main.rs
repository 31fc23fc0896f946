use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_alias_server::constants::{DNS_PROVISIONING_QUEUE, FORWARDING_QUEUE};
use relay_alias_server::db::{create_pool, run_migrations};
use relay_alias_server::jobs::{JobSink, JobSinks, NoopJobSink, PgJobSink};
use relay_alias_server::{routes, AppState, Config, PgStore, RelayStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_alias_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Relay Alias Server...");

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "Environment: {}, Server: {}, Domains: {}",
        config.environment,
        config.server_address(),
        config.relay_domains.join(", ")
    );

    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

    // Create database connection pool and bring the schema up to date
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    store.seed_domains(&config.relay_domains).await?;

    let provisioning: Arc<dyn JobSink> = if config.provisioning_enabled {
        Arc::new(PgJobSink::new(pool.clone(), DNS_PROVISIONING_QUEUE))
    } else {
        tracing::info!("DNS provisioning disabled; identity jobs are dropped");
        Arc::new(NoopJobSink)
    };
    let sinks = JobSinks {
        forwarding: Arc::new(PgJobSink::new(pool, FORWARDING_QUEUE)),
        provisioning,
    };

    // Configure CORS
    let origins = config
        .allowed_origins
        .iter()
        .map(|s| s.parse())
        .collect::<Result<Vec<HeaderValue>, _>>()?;
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    // Create app state
    let state = AppState::new(config.clone(), store.clone(), store, sinks);

    // Build router
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
