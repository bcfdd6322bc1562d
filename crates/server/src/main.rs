use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod routes;
mod services;
mod store;

use handlers::ws::EventFeed;
use services::{
    advisor::{self, Advisor},
    farms::Farms,
    marketplace::Marketplace,
    session::SessionRegistry,
};
use store::{EntityStore, InMemoryStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anddbaay_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env();

    let store = open_store(&config).await?;
    let advisor = advisor::from_config(&config)?;

    let state = AppState::new(config.clone(), store, advisor);
    let app = app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// SQLite when `DATABASE_URL` is set, otherwise the demo data in memory.
/// An empty database is seeded with the demo data on first start.
async fn open_store(config: &config::Config) -> anyhow::Result<Arc<dyn EntityStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("No DATABASE_URL set, using in-memory store");
        return Ok(Arc::new(InMemoryStore::new(db::seed::demo())));
    };

    let db = db::Database::connect(url).await?;
    db.run_migrations().await?;

    let store = SqliteStore::new(db);
    if store.seed_if_empty(&db::seed::demo()).await? {
        tracing::info!("Seeded empty database with demo data");
    }

    Ok(Arc::new(store))
}

pub fn app(state: AppState) -> Router {
    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .nest("/users", routes::users::router())
        .nest("/session", routes::session::router())
        .nest("/projects", routes::projects::router())
        .nest("/listings", routes::listings::router())
        .merge(routes::dashboard::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Build API router
    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub farms: Farms,
    pub marketplace: Marketplace,
    pub sessions: SessionRegistry,
    pub events: EventFeed,
    pub advisor: Arc<dyn Advisor>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        store: Arc<dyn EntityStore>,
        advisor: Arc<dyn Advisor>,
    ) -> Self {
        Self {
            config,
            farms: Farms::new(store.clone()),
            marketplace: Marketplace::new(store),
            sessions: SessionRegistry::new(),
            events: EventFeed::new(),
            advisor,
        }
    }
}
