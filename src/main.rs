use mishwar::notify::TracingDispatcher;
use mishwar::{
    api, config::Config, db::init_db, FareEngine, LedgerManager, Repository, RideLifecycle,
    RideMatcher,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let dispatcher: Arc<dyn mishwar::NotificationDispatcher> = Arc::new(TracingDispatcher);
    let ledger = Arc::new(LedgerManager::new(
        repo.clone(),
        dispatcher.clone(),
        config.debt,
    ));
    let lifecycle = Arc::new(RideLifecycle::new(
        repo.clone(),
        FareEngine::new(config.pricing),
        RideMatcher::new(repo.clone()),
        ledger.clone(),
        dispatcher,
        config.matching,
    ));

    // Create router
    let app = api::create_router(api::AppState::new(repo, lifecycle, ledger));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
