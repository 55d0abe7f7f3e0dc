use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use ecoliste_search::config::{CacheSettings, Settings, StoreBackend};
use ecoliste_search::routes::{self, handle_json_payload_error, handle_path_error, AppState};
use ecoliste_search::services::{CacheManager, InMemoryStore, PostgresStore, Store};
use ecoliste_search::SearchEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting Ecoliste search service...");

    let app_state = match settings.database.backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::from_settings(
                &settings.database.url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
            info!("PostgreSQL store initialized");
            build_state(Arc::new(store), &settings).await
        }
        StoreBackend::Memory => {
            let store = match &settings.database.fixture_path {
                Some(path) => InMemoryStore::from_fixture_file(path).map_err(|e| {
                    error!("Failed to load fixture: {}", e);
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                })?,
                None => {
                    warn!("No fixture configured, starting with an empty in-memory store");
                    InMemoryStore::default()
                }
            };
            build_state(Arc::new(store), &settings).await
        }
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

/// Wire one store into both the search engine and the catalog endpoints
async fn build_state<S: Store + 'static>(store: Arc<S>, settings: &Settings) -> AppState {
    let engine = SearchEngine::new(store.clone()).with_max_radius_km(settings.search.max_radius_km);

    info!(
        "Search engine initialized ({} store, max radius {} km, timeout {} ms)",
        store.backend(),
        settings.search.max_radius_km,
        settings.search.timeout_ms
    );

    AppState {
        engine,
        catalog: store,
        cache: build_cache(&settings.cache).await,
        search_timeout: Duration::from_millis(settings.search.timeout_ms),
    }
}

/// Build the result cache; the service runs without Redis when it is unreachable
async fn build_cache(settings: &CacheSettings) -> Option<Arc<CacheManager>> {
    if !settings.enabled {
        info!("Result cache disabled");
        return None;
    }

    let ttl = settings.ttl_secs.unwrap_or(60);
    let l1_size = settings.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.redis_url {
        Some(url) => match CacheManager::with_redis(url, l1_size, ttl).await {
            Ok(cache) => {
                info!("Cache manager initialized with Redis (L1: {} entries, TTL: {}s)", l1_size, ttl);
                cache
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), caching in process only", e);
                CacheManager::in_memory(l1_size, ttl)
            }
        },
        None => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_size, ttl);
            CacheManager::in_memory(l1_size, ttl)
        }
    };

    Some(Arc::new(cache))
}
