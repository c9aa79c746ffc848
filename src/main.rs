use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroute::config::{Config, SyncRole};
use stockroute::infrastructure::AppState;
use stockroute::{db, seed, server, sync};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockroute=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    // Check for --profile CLI argument
    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--profile")
        && let Some(val) = args.get(pos + 1)
    {
        // SAFETY: still single-threaded work, nothing else reads the environment yet
        unsafe { std::env::set_var("PROFILE", val) };
    }

    let config = Config::from_env();

    // Initialize database
    let db = match db::init_db(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to initialize database {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };

    if config.seed_demo {
        tracing::info!("Seeding demo data...");
        if let Err(e) = seed::seed_demo_data(&db).await {
            tracing::error!("Failed to seed data: {}", e);
        } else {
            tracing::info!("Demo data seeded successfully.");
        }
    }

    let state = AppState::new(db.clone(), config.clone());

    match config.sync_role {
        SyncRole::Server => {
            // Replays operations pushed by devices
            tokio::spawn(sync::processor::run_processor(db.clone()));
        }
        SyncRole::Client => match state.sync_service.clone() {
            Some(service) => {
                tokio::spawn(sync::run_sync_loop(
                    service,
                    Duration::from_secs(config.sync_interval_secs),
                ));
            }
            None => tracing::warn!(
                "Client role without REMOTE_URL/REMOTE_USERNAME/REMOTE_PASSWORD, changes stay local"
            ),
        },
    }

    let app = server::build_app(state);

    // Find available port
    let Some(port) = server::find_available_port(config.port) else {
        tracing::error!("No available port found from {}", config.port);
        std::process::exit(1);
    };

    if port != config.port {
        tracing::warn!(
            "Preferred port {} was not available, using port {} instead",
            config.port,
            port
        );
    }

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(
        "Stockroute {} listening on {}",
        config.sync_role.as_str(),
        addr
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
