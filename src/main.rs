mod api;
mod arrivals;
mod board;
mod config;
mod fetch;
mod freshness;
mod live;
mod models;
mod source;
mod store;

use axum::http::{header, HeaderValue, Method};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

use api::AppState;
use config::{Config, SourceConfig};
use live::LiveCache;
use source::{HttpSource, StoreSource, TransitSource};
use store::MemStore;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nightride=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("NIGHTRIDE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        info!(path = %config_path, "Loading configuration");
        Config::load(&config_path)?
    } else {
        info!(path = %config_path, "No configuration file, using defaults");
        Config::default()
    };
    let tz = config.tz()?;

    info!("Starting Nightride server");
    let store = Arc::new(if config.seed_demo_data {
        info!("Seeding demo network");
        MemStore::seeded(Utc::now())
    } else {
        MemStore::new()
    });

    let source: Arc<dyn TransitSource> = match &config.source {
        SourceConfig::Local => Arc::new(StoreSource::new(store.clone())),
        SourceConfig::Remote {
            base_url,
            timeout_secs,
            api_key,
        } => {
            info!(base_url = %base_url, "Reading live datasets from remote API");
            Arc::new(HttpSource::new(
                base_url,
                Duration::from_secs(*timeout_secs),
                api_key.clone(),
            )?)
        }
    };
    let cache = LiveCache::new(source, config.freshness.table(), config.retry);

    let nsw_api_key = std::env::var("NSW_TRANSPORT_API_KEY")
        .or_else(|_| std::env::var("VITE_NSW_TRANSPORT_API_KEY"))
        .ok()
        .filter(|key| !key.is_empty());
    if nsw_api_key.is_none() {
        warn!("NSW_TRANSPORT_API_KEY not set, realtime endpoint will report an error");
    }

    let state = AppState {
        store,
        cache,
        tz,
        board: config.board,
        nsw_api_key,
    };

    let (router, openapi) = api::app(state);
    let app = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if config.cors_permissive {
        warn!("CORS is permissive, allowing all origins");
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        warn!("No CORS origins configured, cross-origin requests will be rejected");
    }
    cors.allow_origin(AllowOrigin::list(origins))
}
